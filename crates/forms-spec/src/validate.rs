use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::condition::ControlEvaluator;
use crate::error::{ConfigWarning, FormsError, Result, WarningCode};
use crate::responses::Responses;
use crate::spec::{ControlId, Question, QuestionId, StepId};
use crate::visibility::DisplayNode;

/// One rejected answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationError {
    pub question_id: QuestionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_id: Option<ControlId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator: Option<String>,
    pub message: String,
    pub code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StepValidation {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ConfigWarning>,
}

impl StepValidation {
    /// Turns a failed validation into `FormsError::ValidationFailure`.
    pub fn into_result(self, step_id: StepId) -> Result<Self> {
        if self.valid {
            Ok(self)
        } else {
            Err(FormsError::ValidationFailure {
                step_id,
                errors: self.errors,
            })
        }
    }
}

/// Checks the answers of every visible question node.
///
/// Hidden questions are never validated. A mandatory question needs a
/// non-blank answer; an answered question with a validation control must
/// pass it. Optional questions left without any response are not checked.
pub fn validate_step(
    evaluator: &ControlEvaluator<'_>,
    nodes: &[DisplayNode],
    responses: &Responses,
) -> StepValidation {
    let store = evaluator.store();
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for question_id in nodes
        .iter()
        .filter_map(|node| node.display.composite.question_id())
    {
        let question = match store.load_question(question_id) {
            Ok(question) => question,
            Err(err) => {
                warnings.push(ConfigWarning {
                    code: WarningCode::MissingQuestion,
                    control_id: None,
                    step_id: None,
                    message: format!("visible question {}: {}", question_id, err),
                });
                continue;
            }
        };

        if question.entry.mandatory && !responses.is_answered(question_id) {
            errors.push(mandatory_error(&question));
            continue;
        }
        if !responses.contains(question_id) {
            continue;
        }

        let control = match store.load_validation_control(question_id) {
            Ok(Some(control)) => control,
            Ok(None) => continue,
            Err(err) => {
                warnings.push(ConfigWarning {
                    code: WarningCode::StoreError,
                    control_id: None,
                    step_id: Some(question.step_id),
                    message: err.to_string(),
                });
                continue;
            }
        };

        let evaluation = evaluator.inspect(&control, responses);
        if evaluation.passed {
            continue;
        }
        let (message, code) = match &evaluation.warning {
            Some(warning) => (warning.message.clone(), "misconfigured_control"),
            None => (
                evaluator
                    .registry()
                    .get(&control.validator)
                    .map(|validator| format!("{}: {}", validator.label(), control.value))
                    .unwrap_or_else(|_| "answer rejected".to_string()),
                "validator_failed",
            ),
        };
        warnings.extend(evaluation.warning);
        errors.push(ValidationError {
            question_id,
            control_id: Some(control.id),
            validator: Some(control.validator.clone()),
            message,
            code: code.into(),
        });
    }

    StepValidation {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

fn mandatory_error(question: &Question) -> ValidationError {
    ValidationError {
        question_id: question.id,
        control_id: None,
        validator: None,
        message: format!("'{}' requires an answer", question.title),
        code: "mandatory".into(),
    }
}
