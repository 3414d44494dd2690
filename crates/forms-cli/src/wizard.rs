use forms_spec::{AnswerType, QuestionId, Responses};
use serde_json::Value;

/// Controls which bits of state the wizard prints.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Verbosity {
    /// Clean output: step titles and prompts only.
    Clean,
    /// Verbose output: status, visible tree, help text.
    Verbose,
}

impl Verbosity {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Clean
        }
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self, Verbosity::Verbose)
    }
}

/// Prints steps and prompts as the runtime yields them.
pub struct WizardPresenter {
    verbosity: Verbosity,
    header_printed: bool,
    current_step: Option<u64>,
    show_answers_json: bool,
}

impl WizardPresenter {
    pub fn new(verbosity: Verbosity, show_answers_json: bool) -> Self {
        Self {
            verbosity,
            header_printed: false,
            current_step: None,
            show_answers_json,
        }
    }

    pub fn show_header(&mut self, payload: &WizardPayload) {
        if self.header_printed {
            return;
        }
        println!("Form: {}", payload.form_title);
        if self.verbosity.is_verbose()
            && let Some(help) = &payload.help
        {
            println!("Help: {}", help);
        }
        self.header_printed = true;
    }

    /// Prints the step banner once per step.
    pub fn show_step(&mut self, payload: &WizardPayload) {
        if self.current_step == Some(payload.step_id) {
            return;
        }
        println!();
        println!("== {} ==", payload.step_title);
        self.current_step = Some(payload.step_id);
    }

    pub fn show_status(&self, payload: &WizardPayload) {
        if self.verbosity.is_verbose() {
            println!(
                "Status: {} ({}/{})",
                payload.status,
                payload.progress.answered,
                payload.progress.total
            );
            self.print_visible_nodes(payload);
        } else if payload.nodes.is_empty() {
            println!("Nothing to answer on this step.");
        }
    }

    fn print_visible_nodes(&self, payload: &WizardPayload) {
        println!("Visible nodes:");
        for node in &payload.nodes {
            let indent = "  ".repeat(node.depth);
            match &node.question {
                Some(question) => {
                    let mut entry = format!(" {}- {} ({})", indent, question.id, node.title);
                    if question.mandatory {
                        entry.push_str(" [required]");
                    }
                    println!("{}", entry);
                }
                None => println!(" {}+ {}", indent, node.title),
            }
        }
    }

    pub fn show_note(&self, node: &WizardNode) {
        println!("{}", node.title);
        if let Some(description) = &node.description {
            println!("{}", description);
        }
    }

    pub fn show_prompt(&self, prompt: &PromptContext) {
        let mut line = if prompt.total > 0 {
            format!("{}/{} {}", prompt.index, prompt.total, prompt.title)
        } else {
            format!("{} {}", prompt.index, prompt.title)
        };
        if prompt.required {
            line.push_str(" *");
        }
        if let Some(hint) = &prompt.hint {
            line.push(' ');
            line.push_str(hint);
        }
        if !prompt.current.is_empty() {
            line.push_str(&format!(" [{}]", prompt.current.join(", ")));
        }
        println!("{}", line);
        if let Some(description) = &prompt.description {
            println!("{}", description);
        }
    }

    pub fn show_parse_error(&self, error: &AnswerParseError) {
        eprintln!("Invalid answer: {}", error.user_message);
        if let Some(debug) = &error.debug_message
            && self.verbosity.is_verbose()
        {
            eprintln!("  Expected: {}", debug);
        }
    }

    pub fn show_rejections(&self, errors: &[(QuestionId, String)]) {
        eprintln!("Some answers were rejected:");
        for (question_id, message) in errors {
            eprintln!("  [{}] {}", question_id, message);
        }
    }

    pub fn show_completion(&self, responses: &Responses) {
        println!("Done ✅ ({} answers saved)", responses.len());
        if self.show_answers_json {
            match serde_json::to_string_pretty(responses) {
                Ok(pretty) => println!("{}", pretty),
                Err(err) => eprintln!("Failed to serialize answers to JSON: {}", err),
            }
        }
    }
}

/// Render payload extracted from the runtime's JSON UI.
pub struct WizardPayload {
    pub step_id: u64,
    pub form_title: String,
    pub step_title: String,
    pub help: Option<String>,
    pub status: String,
    pub progress: RenderProgress,
    pub nodes: Vec<WizardNode>,
}

impl WizardPayload {
    pub fn from_json(json: &Value) -> Result<Self, String> {
        let form_title = required_str(json, "form_title")?;
        let step_title = required_str(json, "step_title")?;
        let step_id = json
            .get("step_id")
            .and_then(Value::as_u64)
            .ok_or_else(|| "wizard payload missing step_id".to_string())?;
        let help = json
            .get("help")
            .and_then(Value::as_str)
            .map(|value| value.to_string());
        let status = json
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("need_input")
            .to_string();
        let progress = json
            .get("progress")
            .and_then(Value::as_object)
            .ok_or_else(|| "wizard payload missing progress".to_string())?;
        let answered = progress
            .get("answered")
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize;
        let total = progress.get("total").and_then(Value::as_u64).unwrap_or(0) as usize;
        let nodes = json
            .get("nodes")
            .and_then(Value::as_array)
            .ok_or_else(|| "wizard payload missing nodes".to_string())?
            .iter()
            .map(WizardNode::from_json)
            .collect::<Result<_, _>>()?;
        Ok(Self {
            step_id,
            form_title,
            step_title,
            help,
            status,
            progress: RenderProgress { answered, total },
            nodes,
        })
    }

    /// First visible question that still needs a prompt.
    pub fn next_prompt(&self, skip: impl Fn(QuestionId) -> bool) -> Option<&WizardNode> {
        self.nodes.iter().find(|node| {
            node.question
                .as_ref()
                .is_some_and(|question| !skip(question.id))
        })
    }
}

fn required_str(json: &Value, key: &str) -> Result<String, String> {
    json.get(key)
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| format!("wizard payload missing {}", key))
}

/// Progress counters from the render payload.
pub struct RenderProgress {
    pub answered: usize,
    pub total: usize,
}

/// One visible node; `question` is empty for groups.
pub struct WizardNode {
    pub depth: usize,
    pub title: String,
    pub description: Option<String>,
    pub question: Option<WizardQuestion>,
}

pub struct WizardQuestion {
    pub id: QuestionId,
    pub answer_type: AnswerType,
    pub mandatory: bool,
    pub choices: Vec<String>,
    pub current: Vec<String>,
}

impl WizardNode {
    fn from_json(value: &Value) -> Result<Self, String> {
        let title = value
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let description = value
            .get("description")
            .and_then(Value::as_str)
            .map(|value| value.to_string());
        let depth = value.get("depth").and_then(Value::as_u64).unwrap_or(0) as usize;
        let question = match value.get("question_id").and_then(Value::as_u64) {
            Some(id) => Some(WizardQuestion::from_json(id as QuestionId, value)?),
            None => None,
        };
        Ok(Self {
            depth,
            title,
            description,
            question,
        })
    }
}

impl WizardQuestion {
    fn from_json(id: QuestionId, value: &Value) -> Result<Self, String> {
        let answer_type = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| format!("question {} missing type", id))?
            .parse::<AnswerType>()?;
        let mandatory = value
            .get("mandatory")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Ok(Self {
            id,
            answer_type,
            mandatory,
            choices: string_list(value.get("choices")),
            current: string_list(value.get("current_value")),
        })
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default()
}

/// Context used to format a single prompt.
pub struct PromptContext {
    pub index: usize,
    pub total: usize,
    pub title: String,
    pub description: Option<String>,
    pub required: bool,
    pub hint: Option<String>,
    pub current: Vec<String>,
}

impl PromptContext {
    pub fn new(node: &WizardNode, question: &WizardQuestion, progress: &RenderProgress) -> Self {
        Self {
            index: (progress.answered + 1).max(1),
            total: progress.total,
            title: node.title.clone(),
            description: node.description.clone(),
            required: question.mandatory,
            hint: hint_for(question.answer_type, &question.choices),
            current: question.current.clone(),
        }
    }
}

fn hint_for(answer_type: AnswerType, choices: &[String]) -> Option<String> {
    match answer_type {
        AnswerType::Number => Some("(number)".to_string()),
        AnswerType::Date => Some("(YYYY-MM-DD)".to_string()),
        AnswerType::File => Some("(file path)".to_string()),
        AnswerType::Radio | AnswerType::Select if !choices.is_empty() => {
            Some(format!("({})", choices.join("/")))
        }
        AnswerType::Checkbox if !choices.is_empty() => {
            Some(format!("(comma separated: {})", choices.join(", ")))
        }
        _ => None,
    }
}

/// Error produced when parsing answers from the user.
#[derive(Debug)]
pub struct AnswerParseError {
    pub user_message: String,
    pub debug_message: Option<String>,
}

impl AnswerParseError {
    pub fn new(user_message: impl Into<String>, debug_message: Option<String>) -> Self {
        Self {
            user_message: user_message.into(),
            debug_message,
        }
    }
}
