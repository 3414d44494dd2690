use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::spec::{GroupId, QuestionId, StepId};

/// Answer types a question entry may collect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnswerType {
    Text,
    TextArea,
    Number,
    Date,
    Radio,
    Checkbox,
    Select,
    File,
    /// Static text; collects nothing.
    Comment,
}

impl AnswerType {
    pub const ALL: [AnswerType; 9] = [
        AnswerType::Text,
        AnswerType::TextArea,
        AnswerType::Number,
        AnswerType::Date,
        AnswerType::Radio,
        AnswerType::Checkbox,
        AnswerType::Select,
        AnswerType::File,
        AnswerType::Comment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerType::Text => "text",
            AnswerType::TextArea => "text_area",
            AnswerType::Number => "number",
            AnswerType::Date => "date",
            AnswerType::Radio => "radio",
            AnswerType::Checkbox => "checkbox",
            AnswerType::Select => "select",
            AnswerType::File => "file",
            AnswerType::Comment => "comment",
        }
    }

    /// Whether answers of this type may carry several values.
    pub fn is_multi_valued(&self) -> bool {
        matches!(self, AnswerType::Checkbox | AnswerType::File)
    }
}

impl fmt::Display for AnswerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnswerType {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        AnswerType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == raw)
            .ok_or_else(|| format!("unknown answer type '{}'", raw))
    }
}

/// The answer description embedded in a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Entry {
    pub answer_type: AnswerType,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
}

/// A single data-collection unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Question {
    pub id: QuestionId,
    pub step_id: StepId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub entry: Entry,
}

impl Question {
    pub fn answer_type(&self) -> AnswerType {
        self.entry.answer_type
    }
}

/// A titled container of questions and sub-groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Group {
    pub id: GroupId,
    pub step_id: StepId,
    pub title: String,
}
