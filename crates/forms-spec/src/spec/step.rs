use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::spec::{ControlId, FormId, StepId, TransitionId, sentinel};

/// A node of the step graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Step {
    pub id: StepId,
    pub form_id: FormId,
    pub title: String,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub is_first: bool,
    /// Marks a step where the form intentionally ends.
    #[serde(default)]
    pub is_final: bool,
}

/// Directed edge between two steps, optionally guarded by a control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Transition {
    pub id: TransitionId,
    pub from_step: StepId,
    pub to_step: StepId,
    #[serde(default)]
    pub order: u32,
    #[serde(default, with = "sentinel")]
    #[schemars(with = "u32")]
    pub control_id: Option<ControlId>,
}

impl Transition {
    pub fn is_guarded(&self) -> bool {
        self.control_id.is_some()
    }

    pub fn touches(&self, step_id: StepId) -> bool {
        self.from_step == step_id || self.to_step == step_id
    }
}
