use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::spec::{DisplayId, GroupId, QuestionId, StepId, sentinel};

/// What a display node renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Composite {
    Question(QuestionId),
    Group(GroupId),
}

impl Composite {
    pub fn label(&self) -> &'static str {
        match self {
            Composite::Question(_) => "question",
            Composite::Group(_) => "group",
        }
    }

    pub fn question_id(&self) -> Option<QuestionId> {
        match self {
            Composite::Question(id) => Some(*id),
            Composite::Group(_) => None,
        }
    }
}

/// A node of a step's rendering tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FormDisplay {
    pub id: DisplayId,
    pub step_id: StepId,
    #[serde(default, with = "sentinel")]
    #[schemars(with = "u32")]
    pub parent_id: Option<DisplayId>,
    pub composite: Composite,
    #[serde(default)]
    pub order: u32,
}

impl FormDisplay {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_group(&self) -> bool {
        matches!(self.composite, Composite::Group(_))
    }
}
