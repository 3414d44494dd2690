mod runtime;

pub use runtime::{FormRuntime, StepView, SubmitOutcome};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use forms_spec::{
    AnswerType, EngineConfig, FormDocument, FormId, FormsError, MemoryStore, Responses, Routing,
    StepId, ValidatorRegistry, check_configuration, render_json_ui as spec_render_json_ui,
    render_text as spec_render_text,
};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to parse config: {0}")]
    ConfigParse(#[source] serde_json::Error),
    #[error("failed to parse answers: {0}")]
    AnswersParse(#[source] serde_json::Error),
    #[error("config does not carry a form document")]
    MissingDocument,
    #[error("form {0} is not available")]
    FormUnavailable(FormId),
    #[error("json encode error: {0}")]
    JsonEncode(#[source] serde_json::Error),
    #[error(transparent)]
    Forms(#[from] FormsError),
}

/// Configuration accepted by every facade function.
#[derive(Debug, Deserialize, Serialize, Default)]
pub struct RuntimeConfig {
    /// The serialized form document to operate on.
    #[serde(default)]
    pub document_json: Option<String>,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl RuntimeConfig {
    pub fn new(document_json: impl Into<String>, engine: EngineConfig) -> Self {
        Self {
            document_json: Some(document_json.into()),
            engine,
        }
    }

    pub fn to_json(&self) -> String {
        json!({
            "document_json": self.document_json,
            "engine": self.engine,
        })
        .to_string()
    }
}

fn load_config(config_json: &str) -> Result<RuntimeConfig, RuntimeError> {
    if config_json.trim().is_empty() {
        Ok(RuntimeConfig::default())
    } else {
        serde_json::from_str(config_json).map_err(RuntimeError::ConfigParse)
    }
}

fn parse_answers(answers_json: &str) -> Result<Responses, RuntimeError> {
    if answers_json.trim().is_empty() {
        Ok(Responses::new())
    } else {
        serde_json::from_str(answers_json).map_err(RuntimeError::AnswersParse)
    }
}

fn ensure_form(form_id: FormId, config_json: &str) -> Result<FormRuntime<MemoryStore>, RuntimeError> {
    let config = load_config(config_json)?;
    let document_json = config
        .document_json
        .as_deref()
        .ok_or(RuntimeError::MissingDocument)?;
    let document = FormDocument::from_json(document_json)?;
    if document.form.id != form_id {
        return Err(RuntimeError::FormUnavailable(form_id));
    }
    Ok(FormRuntime::from_document(document, config.engine)?)
}

fn respond(result: Result<Value, RuntimeError>) -> String {
    match result {
        Ok(value) => serde_json::to_string(&value).unwrap_or_else(|error| {
            json!({"error": format!("json encode: {}", error)}).to_string()
        }),
        Err(err) => error_value(&err).to_string(),
    }
}

fn respond_string(result: Result<String, RuntimeError>) -> String {
    match result {
        Ok(value) => value,
        Err(err) => error_value(&err).to_string(),
    }
}

fn error_value(err: &RuntimeError) -> Value {
    match err {
        RuntimeError::Forms(FormsError::ValidationFailure { step_id, errors }) => json!({
            "error": err.to_string(),
            "code": "validation_failure",
            "step_id": step_id,
            "errors": errors,
        }),
        RuntimeError::Forms(inner) => json!({ "error": err.to_string(), "code": inner.code() }),
        _ => json!({ "error": err.to_string() }),
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, RuntimeError> {
    serde_json::to_value(value).map_err(RuntimeError::JsonEncode)
}

pub fn describe(form_id: FormId, config_json: &str) -> String {
    respond(ensure_form(form_id, config_json).and_then(|runtime| to_value(&runtime.to_document())))
}

pub fn start(form_id: FormId, config_json: &str) -> String {
    respond(ensure_form(form_id, config_json).and_then(|runtime| to_value(&runtime.start()?)))
}

pub fn render_step(form_id: FormId, config_json: &str, step_id: StepId, answers_json: &str) -> String {
    respond(ensure_form(form_id, config_json).and_then(|runtime| {
        let answers = parse_answers(answers_json)?;
        let payload = runtime.payload(step_id, &answers, false)?;
        Ok(spec_render_json_ui(&payload))
    }))
}

pub fn render_step_text(
    form_id: FormId,
    config_json: &str,
    step_id: StepId,
    answers_json: &str,
) -> String {
    respond_string(ensure_form(form_id, config_json).and_then(|runtime| {
        let answers = parse_answers(answers_json)?;
        let payload = runtime.payload(step_id, &answers, false)?;
        Ok(spec_render_text(&payload))
    }))
}

pub fn next_step(form_id: FormId, config_json: &str, step_id: StepId, answers_json: &str) -> String {
    respond(ensure_form(form_id, config_json).and_then(|runtime| {
        let answers = parse_answers(answers_json)?;
        let advance = runtime.next_step(step_id, &answers)?;
        let mut value = match advance.routing {
            Routing::Next {
                step,
                transition_id,
            } => json!({
                "status": "next",
                "step_id": step.id,
                "step_title": step.title,
                "transition_id": transition_id,
            }),
            Routing::Finished => json!({ "status": "finished" }),
        };
        if !advance.warnings.is_empty() {
            value["warnings"] = to_value(&advance.warnings)?;
        }
        Ok(value)
    }))
}

/// Submits a step; a successful submission also returns the updated document.
pub fn submit_step(
    form_id: FormId,
    config_json: &str,
    step_id: StepId,
    answers_json: &str,
) -> String {
    respond(ensure_form(form_id, config_json).and_then(|runtime| {
        let answers = parse_answers(answers_json)?;
        let outcome = runtime.submit(step_id, &answers)?;
        let mut value = to_value(&outcome)?;
        if !matches!(outcome, SubmitOutcome::Rejected { .. }) {
            value["document"] = to_value(&runtime.to_document())?;
        }
        Ok(value)
    }))
}

/// Submits a step, reporting rejected answers as an error object.
pub fn submit_step_strict(
    form_id: FormId,
    config_json: &str,
    step_id: StepId,
    answers_json: &str,
) -> String {
    respond(ensure_form(form_id, config_json).and_then(|runtime| {
        let answers = parse_answers(answers_json)?;
        let outcome = runtime.submit_strict(step_id, &answers)?;
        let mut value = to_value(&outcome)?;
        value["document"] = to_value(&runtime.to_document())?;
        Ok(value)
    }))
}

/// Validators applicable to an answer type, or every validator when blank.
pub fn list_validators(answer_type: &str, config_json: &str) -> String {
    respond(load_config(config_json).and_then(|config| {
        let registry = ValidatorRegistry::from_config(&config.engine);
        let listed = if answer_type.trim().is_empty() {
            registry
                .names()
                .into_iter()
                .filter_map(|name| registry.get(name).ok())
                .map(|validator| {
                    let applies_to: Vec<&str> = AnswerType::ALL
                        .iter()
                        .filter(|kind| validator.is_applicable_to(**kind))
                        .map(AnswerType::as_str)
                        .collect();
                    json!({
                        "name": validator.name(),
                        "label": validator.label(),
                        "applies_to": applies_to,
                    })
                })
                .collect::<Vec<_>>()
        } else {
            let kind: AnswerType = answer_type
                .trim()
                .parse()
                .map_err(|reason: String| FormsError::Config(reason))?;
            registry
                .list_applicable(kind)
                .into_iter()
                .map(|validator| json!({ "name": validator.name(), "label": validator.label() }))
                .collect::<Vec<_>>()
        };
        Ok(Value::Array(listed))
    }))
}

pub fn check(form_id: FormId, config_json: &str) -> String {
    respond(ensure_form(form_id, config_json).and_then(|runtime| {
        let warnings = check_configuration(runtime.store(), runtime.registry(), form_id)?;
        Ok(json!({
            "form_id": form_id,
            "ok": warnings.is_empty(),
            "warnings": to_value(&warnings)?,
        }))
    }))
}
