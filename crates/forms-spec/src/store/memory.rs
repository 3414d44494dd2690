//! In-memory [`EntityStore`] backed by ordered maps.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{FormsError, Result};
use crate::responses::Responses;
use crate::spec::{
    Control, ControlId, DisplayId, FormDisplay, FormDocument, FormId, FormInfo, Group, GroupId,
    Question, QuestionId, Step, StepId, Transition, TransitionId,
};
use crate::store::{EntityReader, EntityStore, Transaction};

#[derive(Debug, Clone, Default)]
struct Tables {
    steps: BTreeMap<StepId, Step>,
    questions: BTreeMap<QuestionId, Question>,
    groups: BTreeMap<GroupId, Group>,
    displays: BTreeMap<DisplayId, FormDisplay>,
    transitions: BTreeMap<TransitionId, Transition>,
    controls: BTreeMap<ControlId, Control>,
    responses: Responses,
}

/// `requested`, or one past the highest id when it is 0.
fn next_id<T>(table: &BTreeMap<u32, T>, entity: &'static str, requested: u32) -> Result<u32> {
    if requested != 0 {
        return Ok(requested);
    }
    match table.keys().next_back() {
        None => Ok(1),
        Some(last) => last.checked_add(1).ok_or_else(|| {
            FormsError::InvalidDocument(format!("no {} identifier left after {}", entity, last))
        }),
    }
}

fn fetch<T: Clone>(table: &BTreeMap<u32, T>, entity: &'static str, id: u32) -> Result<T> {
    table
        .get(&id)
        .cloned()
        .ok_or_else(|| FormsError::not_found(entity, id))
}

fn remove<T>(table: &mut BTreeMap<u32, T>, entity: &'static str, id: u32) -> Result<()> {
    table
        .remove(&id)
        .map(|_| ())
        .ok_or_else(|| FormsError::not_found(entity, id))
}

impl EntityReader for Tables {
    fn load_step(&self, id: StepId) -> Result<Step> {
        fetch(&self.steps, "step", id)
    }

    fn load_steps(&self, form_id: FormId) -> Result<Vec<Step>> {
        let mut steps: Vec<Step> = self
            .steps
            .values()
            .filter(|step| step.form_id == form_id)
            .cloned()
            .collect();
        steps.sort_by_key(|step| (step.order, step.id));
        Ok(steps)
    }

    fn load_transition(&self, id: TransitionId) -> Result<Transition> {
        fetch(&self.transitions, "transition", id)
    }

    fn load_outgoing_transitions(&self, step_id: StepId) -> Result<Vec<Transition>> {
        let mut transitions: Vec<Transition> = self
            .transitions
            .values()
            .filter(|transition| transition.from_step == step_id)
            .cloned()
            .collect();
        transitions.sort_by_key(|transition| (transition.order, transition.id));
        Ok(transitions)
    }

    fn load_incoming_transitions(&self, step_id: StepId) -> Result<Vec<Transition>> {
        Ok(self
            .transitions
            .values()
            .filter(|transition| transition.to_step == step_id)
            .cloned()
            .collect())
    }

    fn load_transitions_guarded_by(&self, control_id: ControlId) -> Result<Vec<Transition>> {
        Ok(self
            .transitions
            .values()
            .filter(|transition| transition.control_id == Some(control_id))
            .cloned()
            .collect())
    }

    fn load_display(&self, id: DisplayId) -> Result<FormDisplay> {
        fetch(&self.displays, "display", id)
    }

    fn load_display_tree(&self, step_id: StepId) -> Result<Vec<FormDisplay>> {
        Ok(self
            .displays
            .values()
            .filter(|display| display.step_id == step_id)
            .cloned()
            .collect())
    }

    fn load_control(&self, id: ControlId) -> Result<Control> {
        fetch(&self.controls, "control", id)
    }

    fn load_controls(&self) -> Result<Vec<Control>> {
        Ok(self.controls.values().cloned().collect())
    }

    fn load_conditional_control(&self, display_id: DisplayId) -> Result<Option<Control>> {
        Ok(self
            .controls
            .values()
            .find(|control| control.target_display() == Some(display_id))
            .cloned())
    }

    fn load_validation_control(&self, question_id: QuestionId) -> Result<Option<Control>> {
        Ok(self
            .controls
            .values()
            .find(|control| control.is_validation() && control.question_id() == question_id)
            .cloned())
    }

    fn load_controls_for_question(&self, question_id: QuestionId) -> Result<Vec<Control>> {
        Ok(self
            .controls
            .values()
            .filter(|control| control.question_id() == question_id)
            .cloned()
            .collect())
    }

    fn load_question(&self, id: QuestionId) -> Result<Question> {
        fetch(&self.questions, "question", id)
    }

    fn load_group(&self, id: GroupId) -> Result<Group> {
        fetch(&self.groups, "group", id)
    }

    fn load_responses(&self, question_id: QuestionId) -> Result<Vec<String>> {
        Ok(self
            .responses
            .get(question_id)
            .map(<[String]>::to_vec)
            .unwrap_or_default())
    }

    fn load_all_responses(&self) -> Result<Responses> {
        Ok(self.responses.clone())
    }
}

impl Transaction for Tables {
    fn insert_step(&mut self, mut step: Step) -> Result<StepId> {
        step.id = next_id(&self.steps, "step", step.id)?;
        let id = step.id;
        self.steps.insert(id, step);
        Ok(id)
    }

    fn delete_step(&mut self, id: StepId) -> Result<()> {
        remove(&mut self.steps, "step", id)
    }

    fn insert_question(&mut self, mut question: Question) -> Result<QuestionId> {
        question.id = next_id(&self.questions, "question", question.id)?;
        let id = question.id;
        self.questions.insert(id, question);
        Ok(id)
    }

    fn delete_question(&mut self, id: QuestionId) -> Result<()> {
        remove(&mut self.questions, "question", id)
    }

    fn insert_group(&mut self, mut group: Group) -> Result<GroupId> {
        group.id = next_id(&self.groups, "group", group.id)?;
        let id = group.id;
        self.groups.insert(id, group);
        Ok(id)
    }

    fn delete_group(&mut self, id: GroupId) -> Result<()> {
        remove(&mut self.groups, "group", id)
    }

    fn insert_display(&mut self, mut display: FormDisplay) -> Result<DisplayId> {
        display.id = next_id(&self.displays, "display", display.id)?;
        let id = display.id;
        self.displays.insert(id, display);
        Ok(id)
    }

    fn delete_display(&mut self, id: DisplayId) -> Result<()> {
        remove(&mut self.displays, "display", id)
    }

    fn insert_transition(&mut self, mut transition: Transition) -> Result<TransitionId> {
        transition.id = next_id(&self.transitions, "transition", transition.id)?;
        let id = transition.id;
        self.transitions.insert(id, transition);
        Ok(id)
    }

    fn update_transition(&mut self, transition: &Transition) -> Result<()> {
        let slot = self
            .transitions
            .get_mut(&transition.id)
            .ok_or_else(|| FormsError::not_found("transition", transition.id))?;
        *slot = transition.clone();
        Ok(())
    }

    fn delete_transition(&mut self, id: TransitionId) -> Result<()> {
        remove(&mut self.transitions, "transition", id)
    }

    fn insert_control(&mut self, mut control: Control) -> Result<ControlId> {
        control.id = next_id(&self.controls, "control", control.id)?;
        let id = control.id;
        self.controls.insert(id, control);
        Ok(id)
    }

    fn update_control(&mut self, control: &Control) -> Result<()> {
        let slot = self
            .controls
            .get_mut(&control.id)
            .ok_or_else(|| FormsError::not_found("control", control.id))?;
        *slot = control.clone();
        Ok(())
    }

    fn delete_control(&mut self, id: ControlId) -> Result<()> {
        remove(&mut self.controls, "control", id)
    }

    fn save_responses(&mut self, question_id: QuestionId, values: Vec<String>) -> Result<()> {
        self.responses.insert(question_id, values);
        Ok(())
    }

    fn delete_responses(&mut self, question_id: QuestionId) -> Result<()> {
        self.responses.remove(question_id);
        Ok(())
    }
}

/// Thread-safe in-memory store for one form.
///
/// Transactions hold the write lock, work on a copy of the tables and swap it
/// in only on success.
#[derive(Debug)]
pub struct MemoryStore {
    form: FormInfo,
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new(form: FormInfo) -> Self {
        Self {
            form,
            tables: RwLock::new(Tables::default()),
        }
    }

    pub fn from_document(document: FormDocument) -> Result<Self> {
        document.check_structure()?;
        let FormDocument {
            form,
            steps,
            questions,
            groups,
            displays,
            transitions,
            controls,
            responses,
        } = document;
        let tables = Tables {
            steps: steps.into_iter().map(|step| (step.id, step)).collect(),
            questions: questions
                .into_iter()
                .map(|question| (question.id, question))
                .collect(),
            groups: groups.into_iter().map(|group| (group.id, group)).collect(),
            displays: displays
                .into_iter()
                .map(|display| (display.id, display))
                .collect(),
            transitions: transitions
                .into_iter()
                .map(|transition| (transition.id, transition))
                .collect(),
            controls: controls
                .into_iter()
                .map(|control| (control.id, control))
                .collect(),
            responses,
        };
        debug!(
            form_id = form.id,
            steps = tables.steps.len(),
            controls = tables.controls.len(),
            "loaded form document"
        );
        Ok(Self {
            form,
            tables: RwLock::new(tables),
        })
    }

    pub fn to_document(&self) -> FormDocument {
        let tables = self.tables.read();
        FormDocument {
            form: self.form.clone(),
            steps: tables.steps.values().cloned().collect(),
            questions: tables.questions.values().cloned().collect(),
            groups: tables.groups.values().cloned().collect(),
            displays: tables.displays.values().cloned().collect(),
            transitions: tables.transitions.values().cloned().collect(),
            controls: tables.controls.values().cloned().collect(),
            responses: tables.responses.clone(),
        }
    }

    pub fn form(&self) -> &FormInfo {
        &self.form
    }
}

impl EntityReader for MemoryStore {
    fn load_step(&self, id: StepId) -> Result<Step> {
        self.tables.read().load_step(id)
    }

    fn load_steps(&self, form_id: FormId) -> Result<Vec<Step>> {
        self.tables.read().load_steps(form_id)
    }

    fn load_transition(&self, id: TransitionId) -> Result<Transition> {
        self.tables.read().load_transition(id)
    }

    fn load_outgoing_transitions(&self, step_id: StepId) -> Result<Vec<Transition>> {
        self.tables.read().load_outgoing_transitions(step_id)
    }

    fn load_incoming_transitions(&self, step_id: StepId) -> Result<Vec<Transition>> {
        self.tables.read().load_incoming_transitions(step_id)
    }

    fn load_transitions_guarded_by(&self, control_id: ControlId) -> Result<Vec<Transition>> {
        self.tables.read().load_transitions_guarded_by(control_id)
    }

    fn load_display(&self, id: DisplayId) -> Result<FormDisplay> {
        self.tables.read().load_display(id)
    }

    fn load_display_tree(&self, step_id: StepId) -> Result<Vec<FormDisplay>> {
        self.tables.read().load_display_tree(step_id)
    }

    fn load_control(&self, id: ControlId) -> Result<Control> {
        self.tables.read().load_control(id)
    }

    fn load_controls(&self) -> Result<Vec<Control>> {
        self.tables.read().load_controls()
    }

    fn load_conditional_control(&self, display_id: DisplayId) -> Result<Option<Control>> {
        self.tables.read().load_conditional_control(display_id)
    }

    fn load_validation_control(&self, question_id: QuestionId) -> Result<Option<Control>> {
        self.tables.read().load_validation_control(question_id)
    }

    fn load_controls_for_question(&self, question_id: QuestionId) -> Result<Vec<Control>> {
        self.tables.read().load_controls_for_question(question_id)
    }

    fn load_question(&self, id: QuestionId) -> Result<Question> {
        self.tables.read().load_question(id)
    }

    fn load_group(&self, id: GroupId) -> Result<Group> {
        self.tables.read().load_group(id)
    }

    fn load_responses(&self, question_id: QuestionId) -> Result<Vec<String>> {
        self.tables.read().load_responses(question_id)
    }

    fn load_all_responses(&self) -> Result<Responses> {
        self.tables.read().load_all_responses()
    }
}

impl EntityStore for MemoryStore {
    fn run_in_transaction(
        &self,
        f: &mut dyn FnMut(&mut dyn Transaction) -> Result<()>,
    ) -> Result<()> {
        let mut live = self.tables.write();
        let mut working = live.clone();
        match f(&mut working) {
            Ok(()) => {
                *live = working;
                debug!(form_id = self.form.id, "transaction committed");
                Ok(())
            }
            Err(err) => {
                debug!(form_id = self.form.id, %err, "transaction rolled back");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{Composite, ControlKind};

    fn store() -> MemoryStore {
        MemoryStore::new(FormInfo {
            id: 1,
            title: "Test".into(),
            description: None,
        })
    }

    fn step(id: StepId, order: u32) -> Step {
        Step {
            id,
            form_id: 1,
            title: format!("Step {}", id),
            order,
            is_first: id == 1,
            is_final: false,
        }
    }

    #[test]
    fn insert_allocates_ids_when_zero() {
        let store = store();
        let mut ids = Vec::new();
        store
            .run_in_transaction(&mut |tx| {
                ids.push(tx.insert_step(step(0, 0))?);
                ids.push(tx.insert_step(step(0, 1))?);
                Ok(())
            })
            .expect("commit");
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(store.load_steps(1).expect("steps").len(), 2);
    }

    #[test]
    fn exhausted_ids_are_an_error() {
        let store = store();
        store
            .run_in_transaction(&mut |tx| tx.insert_step(step(u32::MAX, 0)).map(|_| ()))
            .expect("commit");

        let err = store
            .run_in_transaction(&mut |tx| tx.insert_step(step(0, 1)).map(|_| ()))
            .expect_err("no id left");
        assert!(matches!(err, FormsError::InvalidDocument(_)));
        assert_eq!(store.load_steps(1).expect("steps").len(), 1);
    }

    #[test]
    fn failed_transaction_leaves_tables_untouched() {
        let store = store();
        store
            .run_in_transaction(&mut |tx| tx.insert_step(step(1, 0)).map(|_| ()))
            .expect("commit");

        let result = store.run_in_transaction(&mut |tx| {
            tx.delete_step(1)?;
            tx.delete_step(99)
        });

        assert!(result.expect_err("missing step").is_not_found());
        assert!(store.load_step(1).is_ok());
    }

    #[test]
    fn lookups_by_question_and_display() {
        let store = store();
        store
            .run_in_transaction(&mut |tx| {
                tx.insert_display(FormDisplay {
                    id: 4,
                    step_id: 1,
                    parent_id: None,
                    composite: Composite::Question(7),
                    order: 0,
                })?;
                tx.insert_control(Control {
                    id: 0,
                    kind: ControlKind::Validation { question_id: 7 },
                    validator: "is_not_empty".into(),
                    value: String::new(),
                })?;
                tx.insert_control(Control {
                    id: 0,
                    kind: ControlKind::Conditional {
                        question_id: 8,
                        display_id: 4,
                    },
                    validator: "equals".into(),
                    value: "yes".into(),
                })?;
                Ok(())
            })
            .expect("commit");

        let validation = store.load_validation_control(7).expect("load");
        assert_eq!(validation.map(|control| control.id), Some(1));
        let conditional = store.load_conditional_control(4).expect("load");
        assert_eq!(conditional.map(|control| control.id), Some(2));
        assert!(store.load_conditional_control(5).expect("load").is_none());
    }
}
