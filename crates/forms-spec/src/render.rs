use serde_json::{Map, Value, json};

use crate::error::ConfigWarning;
use crate::responses::Responses;
use crate::spec::{AnswerType, Composite, DisplayId, FormInfo, Step, StepId};
use crate::store::EntityReader;
use crate::validate::StepValidation;
use crate::visibility::VisibleTree;

/// Status labels returned by the renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// A visible mandatory question is still unanswered.
    NeedInput,
    /// Every visible mandatory question has an answer.
    Complete,
    /// The last submission was rejected.
    Invalid,
}

impl RenderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStatus::NeedInput => "need_input",
            RenderStatus::Complete => "complete",
            RenderStatus::Invalid => "invalid",
        }
    }
}

/// Progress counters over the visible questions that collect answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderProgress {
    pub answered: usize,
    pub total: usize,
}

/// One visible display node, resolved to what it shows.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderNode {
    pub display_id: DisplayId,
    pub depth: usize,
    pub composite: Composite,
    pub title: String,
    pub description: Option<String>,
    pub answer_type: Option<AnswerType>,
    pub mandatory: bool,
    pub choices: Vec<String>,
    pub current_value: Vec<String>,
    pub errors: Vec<String>,
}

/// Collected payload used by both text and JSON renderers.
#[derive(Debug, Clone)]
pub struct RenderPayload {
    pub form_id: u32,
    pub form_title: String,
    pub step_id: StepId,
    pub step_title: String,
    pub status: RenderStatus,
    pub progress: RenderProgress,
    pub help: Option<String>,
    pub nodes: Vec<RenderNode>,
    pub warnings: Vec<ConfigWarning>,
}

/// Build the renderer payload from a composed tree and the current answers.
pub fn build_render_payload(
    store: &dyn EntityReader,
    form: &FormInfo,
    step: &Step,
    tree: &VisibleTree,
    responses: &Responses,
    validation: Option<&StepValidation>,
) -> RenderPayload {
    let mut nodes = Vec::with_capacity(tree.nodes.len());
    let mut progress = RenderProgress {
        answered: 0,
        total: 0,
    };
    let mut missing_mandatory = false;

    for node in &tree.nodes {
        let display = &node.display;
        let mut rendered = RenderNode {
            display_id: display.id,
            depth: node.depth,
            composite: display.composite,
            title: String::new(),
            description: None,
            answer_type: None,
            mandatory: false,
            choices: Vec::new(),
            current_value: Vec::new(),
            errors: Vec::new(),
        };
        match display.composite {
            Composite::Question(question_id) => {
                match store.load_question(question_id) {
                    Ok(question) => {
                        rendered.title = question.title.clone();
                        rendered.description = question.description.clone();
                        rendered.answer_type = Some(question.answer_type());
                        rendered.mandatory = question.entry.mandatory;
                        rendered.choices = question.entry.choices.clone();
                    }
                    Err(_) => rendered.title = format!("question {}", question_id),
                }
                rendered.current_value = responses
                    .get(question_id)
                    .map(<[String]>::to_vec)
                    .unwrap_or_default();
                if let Some(validation) = validation {
                    rendered.errors = validation
                        .errors
                        .iter()
                        .filter(|error| error.question_id == question_id)
                        .map(|error| error.message.clone())
                        .collect();
                }
                if rendered.answer_type != Some(AnswerType::Comment) {
                    progress.total += 1;
                    if responses.is_answered(question_id) {
                        progress.answered += 1;
                    } else if rendered.mandatory {
                        missing_mandatory = true;
                    }
                }
            }
            Composite::Group(group_id) => {
                rendered.title = store
                    .load_group(group_id)
                    .map(|group| group.title)
                    .unwrap_or_else(|_| format!("group {}", group_id));
            }
        }
        nodes.push(rendered);
    }

    let status = match validation {
        Some(validation) if !validation.valid => RenderStatus::Invalid,
        _ if missing_mandatory => RenderStatus::NeedInput,
        _ => RenderStatus::Complete,
    };

    let mut warnings = tree.warnings.clone();
    if let Some(validation) = validation {
        warnings.extend(validation.warnings.iter().cloned());
    }

    RenderPayload {
        form_id: form.id,
        form_title: form.title.clone(),
        step_id: step.id,
        step_title: step.title.clone(),
        status,
        progress,
        help: form.description.clone(),
        nodes,
        warnings,
    }
}

/// Render the payload as a structured JSON-friendly value.
pub fn render_json_ui(payload: &RenderPayload) -> Value {
    let nodes = payload
        .nodes
        .iter()
        .map(|node| {
            let mut map = Map::new();
            map.insert("display_id".into(), json!(node.display_id));
            map.insert("depth".into(), json!(node.depth));
            map.insert("kind".into(), Value::String(node.composite.label().into()));
            match node.composite {
                Composite::Question(id) => map.insert("question_id".into(), json!(id)),
                Composite::Group(id) => map.insert("group_id".into(), json!(id)),
            };
            map.insert("title".into(), Value::String(node.title.clone()));
            if let Some(description) = &node.description {
                map.insert("description".into(), Value::String(description.clone()));
            }
            if let Some(answer_type) = node.answer_type {
                map.insert("type".into(), Value::String(answer_type.as_str().into()));
                map.insert("mandatory".into(), Value::Bool(node.mandatory));
                map.insert("current_value".into(), json!(node.current_value));
            }
            if !node.choices.is_empty() {
                map.insert("choices".into(), json!(node.choices));
            }
            if !node.errors.is_empty() {
                map.insert("errors".into(), json!(node.errors));
            }
            Value::Object(map)
        })
        .collect::<Vec<_>>();

    let mut rendered = json!({
        "form_id": payload.form_id,
        "form_title": payload.form_title,
        "step_id": payload.step_id,
        "step_title": payload.step_title,
        "status": payload.status.as_str(),
        "progress": {
            "answered": payload.progress.answered,
            "total": payload.progress.total,
        },
        "help": payload.help,
        "nodes": nodes,
    });
    if !payload.warnings.is_empty()
        && let Some(map) = rendered.as_object_mut()
    {
        map.insert("warnings".into(), json!(payload.warnings));
    }
    rendered
}

/// Render the payload as human-friendly text.
pub fn render_text(payload: &RenderPayload) -> String {
    let mut lines = Vec::new();
    lines.push(format!("Form: {} ({})", payload.form_title, payload.form_id));
    lines.push(format!("Step: {} ({})", payload.step_title, payload.step_id));
    lines.push(format!(
        "Status: {} ({}/{})",
        payload.status.as_str(),
        payload.progress.answered,
        payload.progress.total
    ));
    if let Some(help) = &payload.help {
        lines.push(format!("Help: {}", help));
    }

    for node in &payload.nodes {
        let indent = "  ".repeat(node.depth);
        let mut entry = match node.composite {
            Composite::Group(_) => format!("{}+ {}", indent, node.title),
            Composite::Question(id) => format!("{}- [{}] {}", indent, id, node.title),
        };
        if let Some(answer_type) = node.answer_type {
            entry.push_str(&format!(" ({})", answer_type));
        }
        if node.mandatory {
            entry.push_str(" [required]");
        }
        if !node.current_value.is_empty() {
            entry.push_str(&format!(" = {}", node.current_value.join(", ")));
        }
        lines.push(entry);
        for error in &node.errors {
            lines.push(format!("{}    ! {}", indent, error));
        }
    }

    if payload.nodes.is_empty() {
        lines.push("Nothing to display on this step.".to_string());
    }

    lines.join("\n")
}
