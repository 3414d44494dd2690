use pretty_assertions::assert_eq;

use forms_spec::{
    Control, ControlKind, ControlRequest, EntityReader, EntityStore, FormDocument, FormsError,
    MemoryStore, ValidatorRegistry, WarningCode, check_configuration, remove_control,
    remove_transition, save_control,
};

fn survey() -> MemoryStore {
    let document = FormDocument::from_json(include_str!("fixtures/survey.json")).expect("fixture");
    MemoryStore::from_document(document).expect("store")
}

fn request(kind: ControlKind, validator: &str, value: &str) -> ControlRequest {
    ControlRequest {
        id: 0,
        kind,
        validator: validator.into(),
        value: value.into(),
        transition_id: None,
    }
}

#[test]
fn empty_validator_name_picks_the_first_applicable() {
    let store = survey();
    let registry = ValidatorRegistry::with_defaults();
    let saved = save_control(
        &store,
        &registry,
        request(ControlKind::Validation { question_id: 21 }, "", ""),
    )
    .expect("save");
    assert_eq!(saved.validator, "is_not_empty");
    assert_eq!(store.load_validation_control(21).expect("lookup"), Some(saved));
}

#[test]
fn second_validation_control_updates_the_first() {
    let store = survey();
    let registry = ValidatorRegistry::with_defaults();
    let saved = save_control(
        &store,
        &registry,
        request(ControlKind::Validation { question_id: 11 }, "less_than", "120"),
    )
    .expect("save");
    assert_eq!(
        saved,
        Control {
            id: 3,
            kind: ControlKind::Validation { question_id: 11 },
            validator: "less_than".into(),
            value: "120".into(),
        }
    );
    assert_eq!(store.load_controls().expect("controls").len(), 5);
}

#[test]
fn second_conditional_control_updates_the_first() {
    let store = survey();
    let registry = ValidatorRegistry::with_defaults();
    let saved = save_control(
        &store,
        &registry,
        request(
            ControlKind::Conditional {
                question_id: 20,
                display_id: 5,
            },
            "not_equals",
            "no",
        ),
    )
    .expect("save");
    assert_eq!(saved.id, 2);
    assert_eq!(saved.validator, "not_equals");
}

#[test]
fn misconfigured_requests_are_rejected() {
    let store = survey();
    let registry = ValidatorRegistry::with_defaults();
    let before = store.to_document();

    let cases = vec![
        // Numeric bound on a text question.
        request(ControlKind::Validation { question_id: 12 }, "greater_than", "3"),
        request(ControlKind::Validation { question_id: 12 }, "sounds_like", "x"),
        request(ControlKind::Validation { question_id: 12 }, "pattern", "(unclosed"),
        request(ControlKind::Validation { question_id: 11 }, "less_than", "many"),
        // A transition guard must name its transition.
        request(ControlKind::Transition { question_id: 20 }, "equals", "yes"),
    ];
    for case in cases {
        let err = save_control(&store, &registry, case.clone()).expect_err("rejected");
        assert!(
            matches!(err, FormsError::MisconfiguredControl { .. }),
            "{:?} gave {:?}",
            case,
            err
        );
    }
    assert_eq!(store.to_document(), before);
}

#[test]
fn unknown_references_are_not_found() {
    let store = survey();
    let registry = ValidatorRegistry::with_defaults();
    let missing_question = save_control(
        &store,
        &registry,
        request(ControlKind::Validation { question_id: 999 }, "", ""),
    )
    .expect_err("missing question");
    assert!(missing_question.is_not_found());

    let missing_display = save_control(
        &store,
        &registry,
        request(
            ControlKind::Conditional {
                question_id: 20,
                display_id: 999,
            },
            "equals",
            "yes",
        ),
    )
    .expect_err("missing display");
    assert!(missing_display.is_not_found());
}

#[test]
fn new_transition_control_guards_its_transition() {
    let store = survey();
    let registry = ValidatorRegistry::with_defaults();
    let mut guard = request(ControlKind::Transition { question_id: 20 }, "equals", "yes");
    guard.transition_id = Some(3);
    let saved = save_control(&store, &registry, guard).expect("save");

    assert_eq!(saved.id, 6);
    assert_eq!(store.load_transition(3).expect("transition").control_id, Some(6));
}

#[test]
fn retargeted_transition_control_leaves_its_old_transition() {
    let store = survey();
    let registry = ValidatorRegistry::with_defaults();
    let mut moved = request(ControlKind::Transition { question_id: 10 }, "equals", "yes");
    moved.id = 1;
    moved.transition_id = Some(3);
    let saved = save_control(&store, &registry, moved).expect("save");

    assert_eq!(saved.id, 1);
    assert_eq!(store.load_transition(3).expect("target").control_id, Some(1));
    assert_eq!(store.load_transition(1).expect("source").control_id, None);
    assert_eq!(
        store
            .load_transitions_guarded_by(1)
            .expect("guarded")
            .iter()
            .map(|transition| transition.id)
            .collect::<Vec<_>>(),
        vec![3]
    );

    remove_transition(&store, 1).expect("remove old transition");
    assert!(store.load_control(1).is_ok());
    assert_eq!(store.load_transition(3).expect("target").control_id, Some(1));
}

#[test]
fn retargeting_onto_a_guarded_transition_is_rejected() {
    let store = survey();
    let registry = ValidatorRegistry::with_defaults();
    let mut guard = request(ControlKind::Transition { question_id: 20 }, "equals", "yes");
    guard.transition_id = Some(3);
    assert_eq!(save_control(&store, &registry, guard).expect("save").id, 6);
    let before = store.to_document();

    let mut moved = request(ControlKind::Transition { question_id: 10 }, "equals", "yes");
    moved.id = 1;
    moved.transition_id = Some(3);
    let err = save_control(&store, &registry, moved).expect_err("target already guarded");
    assert!(matches!(err, FormsError::MisconfiguredControl { control_id: 1, .. }));
    assert_eq!(store.to_document(), before);
}

#[test]
fn updated_conditional_control_needs_a_free_existing_display() {
    let store = survey();
    let registry = ValidatorRegistry::with_defaults();
    let conditional = |display_id| {
        let mut update = request(
            ControlKind::Conditional {
                question_id: 20,
                display_id,
            },
            "equals",
            "yes",
        );
        update.id = 2;
        update
    };

    let missing = save_control(&store, &registry, conditional(999)).expect_err("missing display");
    assert!(missing.is_not_found());

    let other = save_control(
        &store,
        &registry,
        request(
            ControlKind::Conditional {
                question_id: 20,
                display_id: 6,
            },
            "equals",
            "yes",
        ),
    )
    .expect("conditional on display 6");
    let before = store.to_document();
    let taken = save_control(&store, &registry, conditional(6)).expect_err("display taken");
    assert!(matches!(taken, FormsError::MisconfiguredControl { control_id: 2, .. }));
    assert_eq!(store.to_document(), before);
    assert_eq!(store.load_conditional_control(6).expect("lookup"), Some(other));

    let moved = save_control(&store, &registry, conditional(7)).expect("free display");
    assert_eq!(moved.id, 2);
    assert_eq!(store.load_conditional_control(5).expect("lookup"), None);
}

#[test]
fn new_control_after_the_highest_id_is_refused() {
    let mut document: serde_json::Value =
        serde_json::from_str(include_str!("fixtures/survey.json")).expect("fixture");
    document["controls"][4]["id"] = serde_json::json!(u32::MAX);
    let store = MemoryStore::from_document(
        FormDocument::from_json(&document.to_string()).expect("document"),
    )
    .expect("store");
    let registry = ValidatorRegistry::with_defaults();
    let before = store.to_document();

    let err = save_control(
        &store,
        &registry,
        request(ControlKind::Validation { question_id: 10 }, "", ""),
    )
    .expect_err("ids exhausted");
    assert!(matches!(err, FormsError::InvalidDocument(_)));
    assert_eq!(store.to_document(), before);
}

#[test]
fn removing_a_control_clears_the_transition_guard() {
    let store = survey();
    let cleared = remove_control(&store, 1).expect("remove");
    assert_eq!(cleared, vec![1]);
    assert!(store.load_control(1).is_err());
    let transition = store.load_transition(1).expect("transition kept");
    assert_eq!(transition.control_id, None);

    assert!(remove_control(&store, 1).expect_err("gone").is_not_found());
}

#[test]
fn removing_a_transition_takes_its_guard() {
    let store = survey();
    let report = remove_transition(&store, 1).expect("remove");
    assert_eq!(report.transitions.into_iter().collect::<Vec<_>>(), vec![1]);
    assert_eq!(report.controls.into_iter().collect::<Vec<_>>(), vec![1]);
    assert!(store.load_control(1).is_err());
    assert_eq!(store.load_outgoing_transitions(1).expect("left").len(), 1);
}

#[test]
fn pristine_fixture_has_no_configuration_warnings() {
    let store = survey();
    let registry = ValidatorRegistry::with_defaults();
    let warnings = check_configuration(&store, &registry, 1).expect("check");
    assert!(warnings.is_empty(), "{:?}", warnings);
}

#[test]
fn configuration_check_reports_every_kind_of_problem() {
    let store = survey();
    store
        .run_in_transaction(&mut |tx| {
            let mut stale = tx.load_control(3)?;
            stale.validator = "pattern".into();
            tx.update_control(&stale)?;

            let mut unknown = tx.load_control(5)?;
            unknown.validator = "sounds_like".into();
            tx.update_control(&unknown)?;

            let mut dangling = tx.load_transition(3)?;
            dangling.control_id = Some(77);
            tx.update_transition(&dangling)?;

            tx.delete_transition(4)?;
            let mut first = tx.load_step(1)?;
            first.is_first = false;
            tx.insert_step(first)?;
            Ok(())
        })
        .expect("commit");

    let registry = ValidatorRegistry::with_defaults();
    let mut codes: Vec<WarningCode> = check_configuration(&store, &registry, 1)
        .expect("check")
        .into_iter()
        .map(|warning| warning.code)
        .collect();
    codes.sort_by_key(|code| format!("{:?}", code));
    assert_eq!(
        codes,
        vec![
            WarningCode::DeadEndStep,
            WarningCode::InapplicableValidator,
            WarningCode::MissingControl,
            WarningCode::MissingFirstStep,
            WarningCode::UnknownValidator,
        ]
    );
}

#[test]
fn disabled_validators_become_unknown() {
    let store = survey();
    let config = forms_spec::EngineConfig {
        disabled_validators: vec!["pattern".into()],
        ..Default::default()
    };
    let registry = ValidatorRegistry::from_config(&config);
    let warnings = check_configuration(&store, &registry, 1).expect("check");
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].code, WarningCode::UnknownValidator);
    assert_eq!(warnings[0].control_id, Some(4));
}
