use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::spec::{ControlId, DisplayId, QuestionId};

/// Kind-specific payload of a control.
///
/// Every kind is keyed by the question whose answer is checked; only
/// conditional controls also name the display node they show or hide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ControlKind {
    /// Rejects a submission whose answer fails the validator.
    Validation { question_id: QuestionId },
    /// Guards an outgoing transition of the step graph.
    Transition { question_id: QuestionId },
    /// Shows `display_id` and its subtree only when the check passes.
    Conditional {
        question_id: QuestionId,
        display_id: DisplayId,
    },
}

impl ControlKind {
    pub fn label(&self) -> &'static str {
        match self {
            ControlKind::Validation { .. } => "validation",
            ControlKind::Transition { .. } => "transition",
            ControlKind::Conditional { .. } => "conditional",
        }
    }

    pub fn question_id(&self) -> QuestionId {
        match *self {
            ControlKind::Validation { question_id }
            | ControlKind::Transition { question_id }
            | ControlKind::Conditional { question_id, .. } => question_id,
        }
    }
}

/// A guard or validator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Control {
    pub id: ControlId,
    #[serde(flatten)]
    pub kind: ControlKind,
    #[serde(default)]
    pub validator: String,
    #[serde(default)]
    pub value: String,
}

impl Control {
    pub fn question_id(&self) -> QuestionId {
        self.kind.question_id()
    }

    pub fn target_display(&self) -> Option<DisplayId> {
        match self.kind {
            ControlKind::Conditional { display_id, .. } => Some(display_id),
            _ => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self.kind, ControlKind::Validation { .. })
    }

    pub fn is_conditional(&self) -> bool {
        matches!(self.kind, ControlKind::Conditional { .. })
    }
}
