//! Control evaluation: decides pass/fail for validation, transition and
//! conditional-display controls against a set of responses.

use tracing::{debug, warn};

use crate::error::{ConfigWarning, FormsError, WarningCode};
use crate::responses::Responses;
use crate::spec::{Control, ControlId};
use crate::store::EntityReader;
use crate::validator::ValidatorRegistry;

/// Outcome of one control evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub passed: bool,
    /// Set when the control could not be evaluated as configured.
    pub warning: Option<ConfigWarning>,
}

impl Evaluation {
    fn pass() -> Self {
        Self {
            passed: true,
            warning: None,
        }
    }

    fn fail() -> Self {
        Self {
            passed: false,
            warning: None,
        }
    }

    fn misconfigured(warning: ConfigWarning) -> Self {
        warn!(
            control_id = ?warning.control_id,
            code = ?warning.code,
            "{}",
            warning.message
        );
        Self {
            passed: false,
            warning: Some(warning),
        }
    }
}

/// Evaluates controls against a read-only snapshot of the store.
///
/// Evaluation is total: every failure to resolve the configuration turns into
/// a failing result carrying a warning, never into an error.
#[derive(Clone, Copy)]
pub struct ControlEvaluator<'a> {
    store: &'a dyn EntityReader,
    registry: &'a ValidatorRegistry,
}

impl<'a> ControlEvaluator<'a> {
    pub fn new(store: &'a dyn EntityReader, registry: &'a ValidatorRegistry) -> Self {
        Self { store, registry }
    }

    pub fn registry(&self) -> &'a ValidatorRegistry {
        self.registry
    }

    pub fn store(&self) -> &'a dyn EntityReader {
        self.store
    }

    /// An absent control always passes.
    pub fn evaluate(&self, control: Option<&Control>, responses: &Responses) -> bool {
        match control {
            None => true,
            Some(control) => self.inspect(control, responses).passed,
        }
    }

    pub fn inspect(&self, control: &Control, responses: &Responses) -> Evaluation {
        let question_id = control.question_id();
        let question = match self.store.load_question(question_id) {
            Ok(question) => question,
            Err(err) => {
                return Evaluation::misconfigured(lookup_warning(
                    control.id,
                    WarningCode::MissingQuestion,
                    err,
                ));
            }
        };

        let validator = match self.registry.get(&control.validator) {
            Ok(validator) => validator,
            Err(_) => {
                return Evaluation::misconfigured(ConfigWarning::control(
                    WarningCode::UnknownValidator,
                    control.id,
                    format!(
                        "{} control uses unknown validator '{}'",
                        control.kind.label(),
                        control.validator
                    ),
                ));
            }
        };

        if !validator.is_applicable_to(question.answer_type()) {
            return Evaluation::misconfigured(ConfigWarning::control(
                WarningCode::InapplicableValidator,
                control.id,
                format!(
                    "validator '{}' does not apply to {} question {}",
                    validator.name(),
                    question.answer_type(),
                    question.id
                ),
            ));
        }

        let Some(values) = responses.get(question_id) else {
            debug!(control_id = control.id, question_id, "no response for guarded question");
            return Evaluation::fail();
        };

        let passed = validator.check(control, values);
        debug!(
            control_id = control.id,
            kind = control.kind.label(),
            validator = validator.name(),
            passed,
            "control evaluated"
        );
        if passed {
            Evaluation::pass()
        } else {
            Evaluation::fail()
        }
    }

    /// Loads the control by id and evaluates it; a dangling id fails.
    pub fn inspect_by_id(&self, control_id: ControlId, responses: &Responses) -> Evaluation {
        match self.store.load_control(control_id) {
            Ok(control) => self.inspect(&control, responses),
            Err(err) => Evaluation::misconfigured(lookup_warning(
                control_id,
                WarningCode::MissingControl,
                err,
            )),
        }
    }
}

fn lookup_warning(control_id: ControlId, missing: WarningCode, err: FormsError) -> ConfigWarning {
    let code = if err.is_not_found() {
        missing
    } else {
        WarningCode::StoreError
    };
    ConfigWarning::control(code, control_id, err.to_string())
}
