mod wizard;

use clap::{Parser, Subcommand, ValueEnum};
use forms_runtime::{
    RuntimeConfig, check as forms_check, list_validators, next_step, render_step,
    render_step_text, start, submit_step,
};
use forms_spec::{
    AnswerType, DisplayId, EngineConfig, FormDocument, FormId, MemoryStore, QuestionId,
    RemovalReport, Responses, StepId, remove_display_subtree, remove_step,
};
use serde_json::Value;
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use wizard::{
    AnswerParseError, PromptContext, Verbosity, WizardPayload, WizardPresenter, WizardQuestion,
};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Environment variable holding a `tracing` filter; setting it enables logging.
const LOG_ENV: &str = "FORMS_LOG";

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Multi-step form CLI",
    long_about = "Walks forms step by step, inspects routing and visibility, and administers form documents"
)]
struct Cli {
    /// Engine configuration file (defaults to FORMS_CONFIG).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Log engine decisions to stderr.
    #[arg(long, global = true, alias = "debug")]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum RenderMode {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Walk a form interactively, one step at a time.
    Walk {
        /// Path to the form document JSON.
        #[arg(long, value_name = "FORM")]
        form: PathBuf,
        /// Optional JSON file with answers to pre-fill.
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
        /// Also print the collected answers as JSON when done.
        #[arg(long)]
        answers_json: bool,
        /// Print the JSON UI of every step.
        #[arg(long, value_enum, default_value_t = RenderMode::Text)]
        format: RenderMode,
        /// Write the completed document here.
        #[arg(long, value_name = "FILE")]
        save: Option<PathBuf>,
    },
    /// Resolve the step the answers lead to.
    Next {
        #[arg(long, value_name = "FORM")]
        form: PathBuf,
        #[arg(long, value_name = "STEP")]
        step: StepId,
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
    },
    /// Show the visible display tree of a step.
    Tree {
        #[arg(long, value_name = "FORM")]
        form: PathBuf,
        #[arg(long, value_name = "STEP")]
        step: StepId,
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = RenderMode::Text)]
        format: RenderMode,
    },
    /// Validate, save and route the answers of one step.
    Submit {
        #[arg(long, value_name = "FORM")]
        form: PathBuf,
        #[arg(long, value_name = "STEP")]
        step: StepId,
        #[arg(long, value_name = "ANSWERS")]
        answers: PathBuf,
        /// Write the updated document back to the form file.
        #[arg(long)]
        write: bool,
    },
    /// List validators, optionally only those applicable to an answer type.
    Validators {
        #[arg(long = "type", value_name = "TYPE")]
        answer_type: Option<String>,
    },
    /// Report configuration problems in a form document.
    Check {
        #[arg(long, value_name = "FORM")]
        form: PathBuf,
        /// Fail when any problem is found.
        #[arg(long)]
        strict: bool,
    },
    /// Remove a step with its displays, questions, transitions and controls.
    RemoveStep {
        #[arg(long, value_name = "FORM")]
        form: PathBuf,
        #[arg(long, value_name = "STEP")]
        step: StepId,
        /// Write the result here instead of overwriting the form file.
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Remove a display node and everything nested under it.
    RemoveDisplay {
        #[arg(long, value_name = "FORM")]
        form: PathBuf,
        #[arg(long, value_name = "DISPLAY")]
        display: DisplayId,
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Print the JSON schema of form documents.
    Schema,
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    let engine = EngineConfig::load(cli.config.as_deref())?;
    init_tracing(cli.verbose, &engine);
    debug!(?engine, "engine configuration loaded");

    match cli.command {
        Command::Walk {
            form,
            answers,
            answers_json,
            format,
            save,
        } => run_walk(
            &engine,
            &form,
            answers.as_deref(),
            cli.verbose,
            answers_json,
            format,
            save.as_deref(),
        ),
        Command::Next {
            form,
            step,
            answers,
        } => run_next(&engine, &form, step, answers.as_deref()),
        Command::Tree {
            form,
            step,
            answers,
            format,
        } => run_tree(&engine, &form, step, answers.as_deref(), format),
        Command::Submit {
            form,
            step,
            answers,
            write,
        } => run_submit(&engine, &form, step, &answers, write),
        Command::Validators { answer_type } => run_validators(&engine, answer_type.as_deref()),
        Command::Check { form, strict } => run_check(&engine, &form, strict),
        Command::RemoveStep { form, step, out } => {
            run_removal(&form, out.as_deref(), |store| remove_step(store, step))
        }
        Command::RemoveDisplay { form, display, out } => {
            run_removal(&form, out.as_deref(), |store| {
                remove_display_subtree(store, display)
            })
        }
        Command::Schema => {
            let schema = schemars::schema_for!(FormDocument);
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool, engine: &EngineConfig) {
    if !verbose && env::var_os(LOG_ENV).is_none() {
        return;
    }
    let fallback = engine
        .log_filter
        .as_deref()
        .unwrap_or("forms_spec=debug,forms_runtime=debug");
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// Reads a form document, returning its form id and raw JSON.
fn load_document(path: &Path) -> CliResult<(FormId, String)> {
    let contents = fs::read_to_string(path)?;
    let document = FormDocument::from_json(&contents)
        .map_err(|err| format!("{}: {}", path.display(), err))?;
    Ok((document.form.id, contents))
}

fn load_answers(path: Option<&Path>) -> CliResult<Responses> {
    match path {
        Some(path) => {
            let contents = fs::read_to_string(path)?;
            Ok(serde_json::from_str(&contents)?)
        }
        None => Ok(Responses::new()),
    }
}

fn config_json(engine: &EngineConfig, document: &str) -> String {
    RuntimeConfig::new(document, engine.clone()).to_json()
}

fn write_json(path: &Path, value: &Value) -> CliResult<()> {
    fs::write(path, serde_json::to_string_pretty(value)? + "\n")?;
    Ok(())
}

fn run_walk(
    engine: &EngineConfig,
    form_path: &Path,
    answers_path: Option<&Path>,
    verbose: bool,
    answers_json: bool,
    format: RenderMode,
    save: Option<&Path>,
) -> CliResult<()> {
    let (form_id, mut document) = load_document(form_path)?;
    let mut pending = load_answers(answers_path)?;
    let mut presenter = WizardPresenter::new(Verbosity::from_verbose(verbose), answers_json);

    let first = parse_component_result(&start(form_id, &config_json(engine, &document)))?;
    let mut step_id = step_of(&first["step"])?;
    let mut asked: BTreeSet<QuestionId> = BTreeSet::new();

    loop {
        let config = config_json(engine, &document);
        let answers_str = serde_json::to_string(&pending)?;
        let ui_raw = render_step(form_id, &config, step_id, &answers_str);
        let ui = parse_component_result(&ui_raw)?;
        let payload =
            WizardPayload::from_json(&ui).map_err(|err| format!("wizard UI error: {}", err))?;
        presenter.show_header(&payload);
        presenter.show_step(&payload);
        if let RenderMode::Json = format {
            println!("JSON UI:\n{}", ui_raw);
        }
        presenter.show_status(&payload);

        let skip = |question_id: QuestionId| {
            asked.contains(&question_id) || pending.contains(question_id)
        };
        if let Some(node) = payload.next_prompt(skip) {
            let Some(question) = &node.question else {
                continue;
            };
            asked.insert(question.id);
            if question.answer_type == AnswerType::Comment {
                presenter.show_note(node);
                continue;
            }
            let prompt = PromptContext::new(node, question, &payload.progress);
            if let Some(values) = prompt_question(&prompt, question, &presenter)? {
                pending.insert(question.id, values);
            }
            continue;
        }

        let outcome = parse_component_result(&submit_step(form_id, &config, step_id, &answers_str))?;
        match outcome["status"].as_str() {
            Some("rejected") => {
                let errors = rejected_answers(&outcome);
                presenter.show_rejections(&errors);
                for (question_id, _) in &errors {
                    asked.remove(question_id);
                    pending.remove(*question_id);
                }
            }
            Some("advanced") => {
                document = outcome["document"].to_string();
                pending.retain(|question_id| !asked.contains(&question_id));
                asked.clear();
                step_id = step_of(&outcome["next"]["step"])?;
            }
            Some("completed") => {
                let saved: FormDocument = serde_json::from_value(outcome["document"].clone())?;
                presenter.show_completion(&saved.responses);
                if let Some(path) = save {
                    write_json(path, &outcome["document"])?;
                }
                return Ok(());
            }
            _ => return Err(format!("unexpected submission outcome: {}", outcome).into()),
        }
    }
}

fn step_of(step: &Value) -> CliResult<StepId> {
    let id = step
        .get("id")
        .and_then(Value::as_u64)
        .ok_or("runtime did not return a step")?;
    Ok(StepId::try_from(id)?)
}

fn rejected_answers(outcome: &Value) -> Vec<(QuestionId, String)> {
    outcome["validation"]["errors"]
        .as_array()
        .map(|errors| {
            errors
                .iter()
                .filter_map(|error| {
                    let question_id = QuestionId::try_from(error["question_id"].as_u64()?).ok()?;
                    let message = error["message"].as_str().unwrap_or_default().to_string();
                    Some((question_id, message))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_component_result(response: &str) -> CliResult<Value> {
    let value: Value = serde_json::from_str(response)?;
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        Err(error.into())
    } else {
        Ok(value)
    }
}

/// Text responses carry errors as JSON objects.
fn parse_component_text(response: String) -> CliResult<String> {
    if let Ok(value) = serde_json::from_str::<Value>(&response)
        && let Some(error) = value.get("error").and_then(Value::as_str)
    {
        return Err(error.into());
    }
    Ok(response)
}

fn prompt_question(
    prompt: &PromptContext,
    question: &WizardQuestion,
    presenter: &WizardPresenter,
) -> CliResult<Option<Vec<String>>> {
    loop {
        presenter.show_prompt(prompt);
        print!("> ");
        io::stdout().flush()?;
        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Err("wizard aborted: input closed".into());
        }

        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case("exit") {
            return Err("wizard aborted by user".into());
        }
        if trimmed.is_empty() {
            if !question.current.is_empty() {
                return Ok(Some(question.current.clone()));
            }
            if question.mandatory {
                presenter.show_parse_error(&AnswerParseError::new("an answer is required", None));
                continue;
            }
            return Ok(None);
        }

        match parse_answer(question, trimmed) {
            Ok(values) => return Ok(Some(values)),
            Err(err) => presenter.show_parse_error(&err),
        }
    }
}

fn parse_answer(question: &WizardQuestion, raw: &str) -> Result<Vec<String>, AnswerParseError> {
    match question.answer_type {
        AnswerType::Number => parse_number(raw).map(|value| vec![value]),
        AnswerType::Date => parse_date(raw).map(|value| vec![value]),
        AnswerType::Radio | AnswerType::Select => {
            parse_choice(&question.choices, raw).map(|value| vec![value])
        }
        AnswerType::Checkbox => raw
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| parse_choice(&question.choices, value))
            .collect(),
        _ => Ok(vec![raw.to_string()]),
    }
}

fn parse_number(raw: &str) -> Result<String, AnswerParseError> {
    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .map(|_| raw.to_string())
        .ok_or_else(|| {
            AnswerParseError::new(
                format!("'{}' is not a number", raw),
                Some("a decimal number such as 42 or 3.5".into()),
            )
        })
}

fn parse_date(raw: &str) -> Result<String, AnswerParseError> {
    let parts: Vec<&str> = raw.split('-').collect();
    let valid = matches!(parts.as_slice(), [year, month, day]
        if year.len() == 4
            && year.parse::<u16>().is_ok()
            && month.parse::<u8>().is_ok_and(|month| (1..=12).contains(&month))
            && day.parse::<u8>().is_ok_and(|day| (1..=31).contains(&day)));
    if valid {
        Ok(raw.to_string())
    } else {
        Err(AnswerParseError::new(
            format!("'{}' is not a date", raw),
            Some("YYYY-MM-DD".into()),
        ))
    }
}

fn parse_choice(choices: &[String], raw: &str) -> Result<String, AnswerParseError> {
    if choices.is_empty() {
        return Ok(raw.to_string());
    }
    choices
        .iter()
        .find(|choice| choice.eq_ignore_ascii_case(raw))
        .cloned()
        .ok_or_else(|| {
            AnswerParseError::new(
                format!("'{}' is not one of the choices", raw),
                Some(choices.join(", ")),
            )
        })
}

fn run_next(
    engine: &EngineConfig,
    form_path: &Path,
    step_id: StepId,
    answers_path: Option<&Path>,
) -> CliResult<()> {
    let (form_id, document) = load_document(form_path)?;
    let answers = serde_json::to_string(&load_answers(answers_path)?)?;
    let value = parse_component_result(&next_step(
        form_id,
        &config_json(engine, &document),
        step_id,
        &answers,
    ))?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn run_tree(
    engine: &EngineConfig,
    form_path: &Path,
    step_id: StepId,
    answers_path: Option<&Path>,
    format: RenderMode,
) -> CliResult<()> {
    let (form_id, document) = load_document(form_path)?;
    let config = config_json(engine, &document);
    let answers = serde_json::to_string(&load_answers(answers_path)?)?;
    match format {
        RenderMode::Text => {
            let text =
                parse_component_text(render_step_text(form_id, &config, step_id, &answers))?;
            println!("{}", text);
        }
        RenderMode::Json => {
            let ui = parse_component_result(&render_step(form_id, &config, step_id, &answers))?;
            println!("{}", serde_json::to_string_pretty(&ui)?);
        }
    }
    Ok(())
}

fn run_submit(
    engine: &EngineConfig,
    form_path: &Path,
    step_id: StepId,
    answers_path: &Path,
    write: bool,
) -> CliResult<()> {
    let (form_id, document) = load_document(form_path)?;
    let answers = serde_json::to_string(&load_answers(Some(answers_path))?)?;
    let mut outcome = parse_component_result(&submit_step(
        form_id,
        &config_json(engine, &document),
        step_id,
        &answers,
    ))?;
    let updated = outcome.as_object_mut().and_then(|map| map.remove("document"));
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if outcome["status"] == "rejected" {
        return Err(format!("step {} was rejected", step_id).into());
    }
    if write && let Some(updated) = updated {
        write_json(form_path, &updated)?;
    }
    Ok(())
}

fn run_validators(engine: &EngineConfig, answer_type: Option<&str>) -> CliResult<()> {
    let config = RuntimeConfig {
        document_json: None,
        engine: engine.clone(),
    }
    .to_json();
    let listed = parse_component_result(&list_validators(answer_type.unwrap_or(""), &config))?;
    for validator in listed.as_array().into_iter().flatten() {
        let name = validator["name"].as_str().unwrap_or_default();
        let label = validator["label"].as_str().unwrap_or_default();
        match validator["applies_to"].as_array() {
            Some(types) => {
                let types: Vec<&str> = types.iter().filter_map(Value::as_str).collect();
                println!("{:<14} {} [{}]", name, label, types.join(", "));
            }
            None => println!("{:<14} {}", name, label),
        }
    }
    Ok(())
}

fn run_check(engine: &EngineConfig, form_path: &Path, strict: bool) -> CliResult<()> {
    let (form_id, document) = load_document(form_path)?;
    let report = parse_component_result(&forms_check(form_id, &config_json(engine, &document)))?;
    let warnings = report["warnings"].as_array().cloned().unwrap_or_default();
    if warnings.is_empty() {
        println!("No configuration problems found.");
        return Ok(());
    }
    for warning in &warnings {
        println!(
            "[{}] {}",
            warning["code"].as_str().unwrap_or("unknown"),
            warning["message"].as_str().unwrap_or_default()
        );
    }
    if strict {
        return Err(format!("{} configuration problem(s) found", warnings.len()).into());
    }
    Ok(())
}

fn run_removal(
    form_path: &Path,
    out: Option<&Path>,
    remove: impl FnOnce(&MemoryStore) -> forms_spec::Result<RemovalReport>,
) -> CliResult<()> {
    let contents = fs::read_to_string(form_path)?;
    let store = MemoryStore::from_document(FormDocument::from_json(&contents)?)?;
    let report = remove(&store)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    let target = out.unwrap_or(form_path);
    write_json(target, &serde_json::to_value(store.to_document())?)?;
    Ok(())
}
