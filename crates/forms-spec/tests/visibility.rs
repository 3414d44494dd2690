use pretty_assertions::assert_eq;

use forms_spec::{
    Composite, Control, ControlEvaluator, ControlKind, DisplayComposer, EntityReader,
    EntityStore, FormDisplay, FormDocument, MemoryStore, Responses, ValidatorRegistry,
    WarningCode,
};

fn survey() -> MemoryStore {
    let document = FormDocument::from_json(include_str!("fixtures/survey.json")).expect("fixture");
    MemoryStore::from_document(document).expect("store")
}

fn visible_ids(store: &MemoryStore, step_id: u32, responses: &Responses) -> Vec<(u32, usize)> {
    let registry = ValidatorRegistry::with_defaults();
    let composer = DisplayComposer::new(ControlEvaluator::new(store, &registry));
    composer
        .compose_step(step_id, responses)
        .expect("compose")
        .nodes
        .into_iter()
        .map(|node| (node.display.id, node.depth))
        .collect()
}

fn display(id: u32, parent_id: Option<u32>, composite: Composite, order: u32) -> FormDisplay {
    FormDisplay {
        id,
        step_id: 2,
        parent_id,
        composite,
        order,
    }
}

#[test]
fn failing_condition_hides_the_whole_group() {
    let store = survey();
    let registry = ValidatorRegistry::with_defaults();
    let composer = DisplayComposer::new(ControlEvaluator::new(&store, &registry));

    let tree = composer
        .compose_step(2, &Responses::new().with(20, &["no"]))
        .expect("compose");
    let visible: Vec<u32> = tree.nodes.iter().map(|node| node.display.id).collect();
    let hidden: Vec<u32> = tree.hidden.iter().map(|display| display.id).collect();
    assert_eq!(visible, vec![4]);
    assert_eq!(hidden, vec![5, 6, 7]);
    assert_eq!(tree.hidden_questions().into_iter().collect::<Vec<_>>(), vec![21, 22]);
    assert!(tree.warnings.is_empty());
}

#[test]
fn passing_condition_shows_the_group_in_preorder() {
    let store = survey();
    assert_eq!(
        visible_ids(&store, 2, &Responses::new().with(20, &["yes"])),
        vec![(4, 0), (5, 0), (6, 1), (7, 1)]
    );
}

#[test]
fn unanswered_condition_hides_the_group() {
    let store = survey();
    assert_eq!(visible_ids(&store, 2, &Responses::new()), vec![(4, 0)]);
}

#[test]
fn hidden_parent_wins_over_a_passing_child_condition() {
    let store = survey();
    store
        .run_in_transaction(&mut |tx| {
            tx.insert_control(Control {
                id: 0,
                kind: ControlKind::Conditional {
                    question_id: 20,
                    display_id: 6,
                },
                validator: "equals".into(),
                value: "no".into(),
            })
            .map(|_| ())
        })
        .expect("commit");

    assert_eq!(
        visible_ids(&store, 2, &Responses::new().with(20, &["no"])),
        vec![(4, 0)]
    );
    // With the group shown, the child's own condition now hides it.
    assert_eq!(
        visible_ids(&store, 2, &Responses::new().with(20, &["yes"])),
        vec![(4, 0), (5, 0), (7, 1)]
    );
}

#[test]
fn siblings_follow_order_then_id() {
    let store = survey();
    let registry = ValidatorRegistry::with_defaults();
    let composer = DisplayComposer::new(ControlEvaluator::new(&store, &registry));
    let step = store.load_step(2).expect("step");

    let displays = vec![
        display(30, None, Composite::Question(22), 2),
        display(20, None, Composite::Question(21), 2),
        display(10, None, Composite::Question(20), 1),
        display(40, None, Composite::Question(21), 0),
    ];
    let ids: Vec<u32> = composer
        .compose_visible_tree(&step, &displays, &Responses::new())
        .iter()
        .map(|node| node.display.id)
        .collect();
    assert_eq!(ids, vec![40, 10, 20, 30]);
}

#[test]
fn orphans_cycles_and_foreign_displays_are_skipped() {
    let store = survey();
    let registry = ValidatorRegistry::with_defaults();
    let composer = DisplayComposer::new(ControlEvaluator::new(&store, &registry));
    let step = store.load_step(2).expect("step");

    let mut foreign = display(50, None, Composite::Question(10), 0);
    foreign.step_id = 1;
    let displays = vec![
        display(1, None, Composite::Question(20), 0),
        // Parent does not exist.
        display(2, Some(99), Composite::Question(21), 0),
        // Two groups nesting each other never reach a root.
        display(3, Some(4), Composite::Group(100), 0),
        display(4, Some(3), Composite::Group(100), 0),
        foreign,
    ];
    let tree = composer.compose(&step, &displays, &Responses::new());
    let ids: Vec<u32> = tree.nodes.iter().map(|node| node.display.id).collect();
    assert_eq!(ids, vec![1]);
    assert!(tree.hidden.is_empty());
}

#[test]
fn stale_validator_hides_with_a_warning() {
    let store = survey();
    store
        .run_in_transaction(&mut |tx| {
            let mut control = tx.load_control(2)?;
            control.validator = "greater_than".into();
            tx.update_control(&control)
        })
        .expect("commit");

    let registry = ValidatorRegistry::with_defaults();
    let composer = DisplayComposer::new(ControlEvaluator::new(&store, &registry));
    let tree = composer
        .compose_step(2, &Responses::new().with(20, &["yes"]))
        .expect("compose");
    let ids: Vec<u32> = tree.nodes.iter().map(|node| node.display.id).collect();
    assert_eq!(ids, vec![4]);
    assert_eq!(tree.warnings.len(), 1);
    assert_eq!(tree.warnings[0].code, WarningCode::InapplicableValidator);
    assert_eq!(tree.warnings[0].control_id, Some(2));
}

#[test]
fn unknown_validator_hides_with_a_warning() {
    let store = survey();
    store
        .run_in_transaction(&mut |tx| {
            let mut control = tx.load_control(2)?;
            control.validator = "sounds_like".into();
            tx.update_control(&control)
        })
        .expect("commit");

    let registry = ValidatorRegistry::with_defaults();
    let composer = DisplayComposer::new(ControlEvaluator::new(&store, &registry));
    let tree = composer
        .compose_step(2, &Responses::new().with(20, &["yes"]))
        .expect("compose");
    assert_eq!(tree.nodes.len(), 1);
    assert_eq!(tree.warnings[0].code, WarningCode::UnknownValidator);
}
