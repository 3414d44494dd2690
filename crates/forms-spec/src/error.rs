//! Error and warning types shared by the engine.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::spec::{ControlId, StepId};
use crate::validate::ValidationError;

/// Errors returned by engine and store operations.
#[derive(Debug, Error)]
pub enum FormsError {
    /// A referenced entity no longer exists.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A control's validator does not resolve or does not apply to its question.
    #[error("control {control_id} is misconfigured: {reason}")]
    MisconfiguredControl { control_id: ControlId, reason: String },

    /// No transition leaves the step and the step is not final.
    #[error("step {step_id} has no eligible transition and is not a final step")]
    DeadEndStep { step_id: StepId },

    /// A submitted response failed its validation control.
    #[error("submission for step {step_id} rejected ({} error(s))", errors.len())]
    ValidationFailure {
        step_id: StepId,
        errors: Vec<ValidationError>,
    },

    #[error("invalid form document: {0}")]
    InvalidDocument(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FormsError>;

impl FormsError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn misconfigured(control_id: ControlId, reason: impl Into<String>) -> Self {
        Self::MisconfiguredControl {
            control_id,
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Stable machine-readable label for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::MisconfiguredControl { .. } => "misconfigured_control",
            Self::DeadEndStep { .. } => "dead_end_step",
            Self::ValidationFailure { .. } => "validation_failure",
            Self::InvalidDocument(_) => "invalid_document",
            Self::Config(_) => "config",
            Self::Json(_) => "json",
            Self::Io(_) => "io",
        }
    }
}

/// Category of a configuration problem surfaced to administrators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WarningCode {
    UnknownValidator,
    InapplicableValidator,
    InvalidValue,
    MissingQuestion,
    MissingDisplay,
    MissingControl,
    MissingStep,
    DeadEndStep,
    MissingFirstStep,
    StoreError,
}

/// A configuration problem that does not stop evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ConfigWarning {
    pub code: WarningCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_id: Option<ControlId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<StepId>,
    pub message: String,
}

impl ConfigWarning {
    pub fn control(code: WarningCode, control_id: ControlId, message: impl Into<String>) -> Self {
        Self {
            code,
            control_id: Some(control_id),
            step_id: None,
            message: message.into(),
        }
    }

    pub fn step(code: WarningCode, step_id: StepId, message: impl Into<String>) -> Self {
        Self {
            code,
            control_id: None,
            step_id: Some(step_id),
            message: message.into(),
        }
    }
}
