pub mod control;
pub mod display;
pub mod document;
pub mod question;
pub mod step;

pub use control::{Control, ControlKind};
pub use display::{Composite, FormDisplay};
pub use document::{FormDocument, FormInfo};
pub use question::{AnswerType, Entry, Group, Question};
pub use step::{Step, Transition};

pub type FormId = u32;
pub type StepId = u32;
pub type QuestionId = u32;
pub type GroupId = u32;
pub type DisplayId = u32;
pub type TransitionId = u32;
pub type ControlId = u32;

/// Serde adapter for optional references stored with `0` as the "none" value.
pub(crate) mod sentinel {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<u32>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u32(value.unwrap_or(0))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<u32>::deserialize(deserializer)?;
        Ok(raw.filter(|id| *id != 0))
    }
}
