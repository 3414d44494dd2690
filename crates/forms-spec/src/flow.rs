//! Step graph routing: picks the next step from a step's outgoing transitions.

use tracing::debug;

use crate::condition::ControlEvaluator;
use crate::config::DeadEndPolicy;
use crate::error::{ConfigWarning, FormsError, Result};
use crate::responses::Responses;
use crate::spec::{FormId, Step, StepId, Transition};

/// Result of resolving the outgoing transitions of one step.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// The transition taken, if any matched.
    pub transition: Option<Transition>,
    pub step: Option<Step>,
    pub warnings: Vec<ConfigWarning>,
}

/// Where a submission leads.
#[derive(Debug, Clone, PartialEq)]
pub enum Routing {
    Next { step: Step, transition_id: u32 },
    Finished,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Advance {
    pub routing: Routing,
    pub warnings: Vec<ConfigWarning>,
}

#[derive(Clone, Copy)]
pub struct StepRouter<'a> {
    evaluator: ControlEvaluator<'a>,
    dead_end: DeadEndPolicy,
}

impl<'a> StepRouter<'a> {
    pub fn new(evaluator: ControlEvaluator<'a>, dead_end: DeadEndPolicy) -> Self {
        Self {
            evaluator,
            dead_end,
        }
    }

    /// The step flagged as first; the lowest order wins if several are flagged.
    pub fn first_step(&self, form_id: FormId) -> Result<Step> {
        self.evaluator
            .store()
            .load_steps(form_id)?
            .into_iter()
            .find(|step| step.is_first)
            .ok_or_else(|| FormsError::not_found("first step of form", form_id))
    }

    /// Picks the transition to follow.
    ///
    /// Guarded transitions are tried by ascending order (ties by id) and the
    /// first passing guard wins; otherwise the lowest-order unguarded
    /// transition is taken.
    pub fn select_transition<'t>(
        &self,
        current: &Step,
        transitions: &'t [Transition],
        responses: &Responses,
        warnings: &mut Vec<ConfigWarning>,
    ) -> Option<&'t Transition> {
        let (mut guarded, mut unguarded): (Vec<&Transition>, Vec<&Transition>) = transitions
            .iter()
            .filter(|transition| {
                let owned = transition.from_step == current.id;
                if !owned {
                    debug!(
                        transition_id = transition.id,
                        step_id = current.id,
                        "ignoring transition that leaves another step"
                    );
                }
                owned
            })
            .partition(|transition| transition.is_guarded());
        guarded.sort_by_key(|transition| (transition.order, transition.id));
        unguarded.sort_by_key(|transition| (transition.order, transition.id));

        for transition in guarded {
            let Some(control_id) = transition.control_id else {
                continue;
            };
            let evaluation = self.evaluator.inspect_by_id(control_id, responses);
            warnings.extend(evaluation.warning);
            if evaluation.passed {
                debug!(
                    transition_id = transition.id,
                    to_step = transition.to_step,
                    "guarded transition matched"
                );
                return Some(transition);
            }
        }

        let fallback = unguarded.into_iter().next();
        if let Some(transition) = fallback {
            debug!(
                transition_id = transition.id,
                to_step = transition.to_step,
                "falling back to unguarded transition"
            );
        }
        fallback
    }

    pub fn resolve(
        &self,
        current: &Step,
        transitions: &[Transition],
        responses: &Responses,
    ) -> Result<Resolution> {
        let mut warnings = Vec::new();
        let transition = self
            .select_transition(current, transitions, responses, &mut warnings)
            .cloned();
        let step = match &transition {
            Some(transition) => Some(self.evaluator.store().load_step(transition.to_step)?),
            None => None,
        };
        Ok(Resolution {
            transition,
            step,
            warnings,
        })
    }

    /// The next step, or `None` when no transition is eligible.
    pub fn resolve_next_step(
        &self,
        current: &Step,
        transitions: &[Transition],
        responses: &Responses,
    ) -> Result<Option<Step>> {
        Ok(self.resolve(current, transitions, responses)?.step)
    }

    /// Loads the step and its transitions and routes the submission.
    ///
    /// A step without an eligible transition finishes the form when it is
    /// flagged final or the dead-end policy says so; otherwise it is a
    /// `DeadEndStep` error.
    pub fn advance(&self, step_id: StepId, responses: &Responses) -> Result<Advance> {
        let store = self.evaluator.store();
        let current = store.load_step(step_id)?;
        let transitions = store.load_outgoing_transitions(step_id)?;
        let resolution = self.resolve(&current, &transitions, responses)?;

        let routing = match (resolution.step, resolution.transition) {
            (Some(step), Some(transition)) => Routing::Next {
                step,
                transition_id: transition.id,
            },
            _ if current.is_final || self.dead_end == DeadEndPolicy::Finish => {
                debug!(step_id, is_final = current.is_final, "form finished");
                Routing::Finished
            }
            _ => return Err(FormsError::DeadEndStep { step_id }),
        };

        Ok(Advance {
            routing,
            warnings: resolution.warnings,
        })
    }
}
