//! Entity store traits: the persistence boundary of the engine.
//!
//! Evaluation code reads through [`EntityReader`]; multi-entity writes go
//! through [`EntityStore::run_in_transaction`] so cascades apply all-or-nothing.

mod memory;

pub use memory::MemoryStore;

use crate::error::Result;
use crate::responses::Responses;
use crate::spec::{
    Control, ControlId, DisplayId, FormDisplay, FormId, Group, GroupId, Question, QuestionId,
    Step, StepId, Transition, TransitionId,
};

/// Read access to form entities. Missing entities yield `FormsError::NotFound`.
pub trait EntityReader {
    fn load_step(&self, id: StepId) -> Result<Step>;

    /// Steps of a form, ascending by order.
    fn load_steps(&self, form_id: FormId) -> Result<Vec<Step>>;

    fn load_transition(&self, id: TransitionId) -> Result<Transition>;

    fn load_outgoing_transitions(&self, step_id: StepId) -> Result<Vec<Transition>>;

    fn load_incoming_transitions(&self, step_id: StepId) -> Result<Vec<Transition>>;

    /// Transitions whose guard is the given control.
    fn load_transitions_guarded_by(&self, control_id: ControlId) -> Result<Vec<Transition>>;

    fn load_display(&self, id: DisplayId) -> Result<FormDisplay>;

    /// Every display node of the step, unordered.
    fn load_display_tree(&self, step_id: StepId) -> Result<Vec<FormDisplay>>;

    fn load_control(&self, id: ControlId) -> Result<Control>;

    fn load_controls(&self) -> Result<Vec<Control>>;

    /// The conditional control targeting a display node, if any.
    fn load_conditional_control(&self, display_id: DisplayId) -> Result<Option<Control>>;

    /// The validation control owned by a question, if any.
    fn load_validation_control(&self, question_id: QuestionId) -> Result<Option<Control>>;

    /// Every control keyed by the question, whatever its kind.
    fn load_controls_for_question(&self, question_id: QuestionId) -> Result<Vec<Control>>;

    fn load_question(&self, id: QuestionId) -> Result<Question>;

    fn load_group(&self, id: GroupId) -> Result<Group>;

    /// Saved responses for one question; empty when none were saved.
    fn load_responses(&self, question_id: QuestionId) -> Result<Vec<String>>;

    fn load_all_responses(&self) -> Result<Responses>;
}

/// Write primitives available inside a transaction.
///
/// Inserting an entity whose id is `0` allocates the next free id; the
/// effective id is returned.
pub trait Transaction: EntityReader {
    fn insert_step(&mut self, step: Step) -> Result<StepId>;
    fn delete_step(&mut self, id: StepId) -> Result<()>;

    fn insert_question(&mut self, question: Question) -> Result<QuestionId>;
    fn delete_question(&mut self, id: QuestionId) -> Result<()>;

    fn insert_group(&mut self, group: Group) -> Result<GroupId>;
    fn delete_group(&mut self, id: GroupId) -> Result<()>;

    fn insert_display(&mut self, display: FormDisplay) -> Result<DisplayId>;
    fn delete_display(&mut self, id: DisplayId) -> Result<()>;

    fn insert_transition(&mut self, transition: Transition) -> Result<TransitionId>;
    fn update_transition(&mut self, transition: &Transition) -> Result<()>;
    fn delete_transition(&mut self, id: TransitionId) -> Result<()>;

    fn insert_control(&mut self, control: Control) -> Result<ControlId>;
    fn update_control(&mut self, control: &Control) -> Result<()>;
    fn delete_control(&mut self, id: ControlId) -> Result<()>;

    fn save_responses(&mut self, question_id: QuestionId, values: Vec<String>) -> Result<()>;
    fn delete_responses(&mut self, question_id: QuestionId) -> Result<()>;
}

/// A store that can apply a group of writes atomically.
pub trait EntityStore: EntityReader {
    /// Runs `f` against a transaction; nothing is kept unless `f` returns `Ok`.
    fn run_in_transaction(
        &self,
        f: &mut dyn FnMut(&mut dyn Transaction) -> Result<()>,
    ) -> Result<()>;
}
