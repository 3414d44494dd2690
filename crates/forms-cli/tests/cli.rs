use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use serde_json::{Value, json};
use std::fs;
use std::path::Path;

const SURVEY: &str = include_str!("../../forms-spec/tests/fixtures/survey.json");

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn forms() -> Result<Command, Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("forms")?;
    cmd.env_remove("FORMS_CONFIG")
        .env_remove("FORMS_DEAD_END")
        .env_remove("FORMS_LOG");
    Ok(cmd)
}

fn read_json(path: &Path) -> Result<Value, Box<dyn std::error::Error>> {
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}

fn stdout_of(cmd: &mut Command) -> Result<String, Box<dyn std::error::Error>> {
    let output = cmd.assert().success().get_output().stdout.clone();
    Ok(String::from_utf8(output)?)
}

#[test]
fn walk_follows_answers_to_the_final_step() -> TestResult {
    let temp = TempDir::new()?;
    let form = temp.child("survey.json");
    form.write_str(SURVEY)?;
    let saved = temp.child("done.json");

    // Step 1: city, age, email (skipped). Step 2: no pets. Step 4: no comment.
    let stdin = ["yes", "30", "", "no", ""].join("\n") + "\n";
    let stdout = stdout_of(
        forms()?
            .arg("walk")
            .arg("--form")
            .arg(form.path())
            .arg("--save")
            .arg(saved.path())
            .write_stdin(stdin),
    )?;
    assert!(stdout.contains("Form: Household survey"));
    assert!(stdout.contains("== Details =="));
    assert!(stdout.contains("== Summary =="));
    assert!(!stdout.contains("== Alternative =="));
    assert!(stdout.contains("Done"));

    let document = read_json(saved.path())?;
    assert_eq!(document["responses"]["11"], json!(["30"]));
    assert_eq!(document["responses"]["20"], json!(["no"]));
    assert!(document["responses"].get("22").is_none());
    Ok(())
}

#[test]
fn walk_reprompts_rejected_answers() -> TestResult {
    let temp = TempDir::new()?;
    let form = temp.child("survey.json");
    form.write_str(SURVEY)?;

    // The first age is below the configured minimum and gets asked again.
    let stdin = ["no", "12", "", "40", "", "", ""].join("\n") + "\n";
    let output = forms()?
        .arg("walk")
        .arg("--form")
        .arg(form.path())
        .write_stdin(stdin)
        .assert()
        .success()
        .get_output()
        .clone();
    let stdout = String::from_utf8(output.stdout)?;
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("Some answers were rejected"));
    assert!(stdout.contains("== Alternative =="));
    assert!(stdout.contains("Done"));
    Ok(())
}

#[test]
fn walk_aborts_on_exit() -> TestResult {
    let temp = TempDir::new()?;
    let form = temp.child("survey.json");
    form.write_str(SURVEY)?;
    forms()?
        .arg("walk")
        .arg("--form")
        .arg(form.path())
        .write_stdin("exit\n")
        .assert()
        .failure();
    Ok(())
}

#[test]
fn next_reports_the_resolved_step() -> TestResult {
    let temp = TempDir::new()?;
    let form = temp.child("survey.json");
    form.write_str(SURVEY)?;
    let answers = temp.child("answers.json");
    answers.write_str(r#"{"10":["no"]}"#)?;

    let saved: Value = serde_json::from_str(&stdout_of(
        forms()?.args(["next", "--step", "1", "--form"]).arg(form.path()),
    )?)?;
    assert_eq!(saved["status"], "next");
    assert_eq!(saved["step_id"], 2);

    let overridden: Value = serde_json::from_str(&stdout_of(
        forms()?
            .args(["next", "--step", "1", "--form"])
            .arg(form.path())
            .arg("--answers")
            .arg(answers.path()),
    )?)?;
    assert_eq!(overridden["step_id"], 3);
    Ok(())
}

#[test]
fn dead_end_policy_comes_from_the_config_file() -> TestResult {
    let temp = TempDir::new()?;
    let mut document: Value = serde_json::from_str(SURVEY)?;
    document["transitions"] = json!([]);
    document["controls"] = json!([]);
    let form = temp.child("dead-end.json");
    form.write_str(&document.to_string())?;
    let config = temp.child("forms.json");
    config.write_str(r#"{ "dead_end": "finish" }"#)?;

    forms()?
        .args(["next", "--step", "3", "--form"])
        .arg(form.path())
        .assert()
        .failure();

    let finished: Value = serde_json::from_str(&stdout_of(
        forms()?
            .arg("--config")
            .arg(config.path())
            .args(["next", "--step", "3", "--form"])
            .arg(form.path()),
    )?)?;
    assert_eq!(finished["status"], "finished");
    Ok(())
}

#[test]
fn tree_hides_conditional_groups() -> TestResult {
    let temp = TempDir::new()?;
    let form = temp.child("survey.json");
    form.write_str(SURVEY)?;
    let answers = temp.child("answers.json");
    answers.write_str(r#"{"20":["no"]}"#)?;

    let shown = stdout_of(forms()?.args(["tree", "--step", "2", "--form"]).arg(form.path()))?;
    assert!(shown.contains("Step: Details (2)"));
    assert!(shown.contains("+ Pets"));

    let hidden = stdout_of(
        forms()?
            .args(["tree", "--step", "2", "--format", "json", "--form"])
            .arg(form.path())
            .arg("--answers")
            .arg(answers.path()),
    )?;
    let ui: Value = serde_json::from_str(&hidden)?;
    assert_eq!(ui["nodes"].as_array().map(Vec::len), Some(1));
    Ok(())
}

#[test]
fn submit_writes_back_accepted_answers() -> TestResult {
    let temp = TempDir::new()?;
    let form = temp.child("survey.json");
    form.write_str(SURVEY)?;
    let answers = temp.child("answers.json");
    answers.write_str(r#"{"20":["no"]}"#)?;

    let stdout = stdout_of(
        forms()?
            .args(["submit", "--step", "2", "--write", "--form"])
            .arg(form.path())
            .arg("--answers")
            .arg(answers.path()),
    )?;
    let outcome: Value = serde_json::from_str(&stdout)?;
    assert_eq!(outcome["status"], "advanced");
    assert_eq!(outcome["next"]["step"]["id"], 4);
    assert!(outcome.get("document").is_none());

    let document = read_json(form.path())?;
    assert_eq!(document["responses"]["20"], json!(["no"]));
    assert!(document["responses"].get("22").is_none());
    Ok(())
}

#[test]
fn submit_fails_on_rejected_answers() -> TestResult {
    let temp = TempDir::new()?;
    let form = temp.child("survey.json");
    form.write_str(SURVEY)?;
    let answers = temp.child("answers.json");
    answers.write_str(r#"{"11":["15"]}"#)?;

    let output = forms()?
        .args(["submit", "--step", "1", "--write", "--form"])
        .arg(form.path())
        .arg("--answers")
        .arg(answers.path())
        .assert()
        .failure()
        .get_output()
        .stdout
        .clone();
    assert!(String::from_utf8(output)?.contains("\"rejected\""));
    assert_eq!(read_json(form.path())?, serde_json::from_str::<Value>(SURVEY)?);
    Ok(())
}

#[test]
fn validators_are_filtered_by_answer_type() -> TestResult {
    let listed = stdout_of(forms()?.args(["validators", "--type", "number"]))?;
    assert!(listed.contains("greater_than"));
    assert!(!listed.contains("pattern"));

    let all = stdout_of(forms()?.arg("validators"))?;
    assert_eq!(all.lines().count(), 8);
    assert!(all.contains("[text, text_area]"));
    Ok(())
}

#[test]
fn check_reports_configuration_problems() -> TestResult {
    let temp = TempDir::new()?;
    let clean = temp.child("survey.json");
    clean.write_str(SURVEY)?;
    let report = stdout_of(forms()?.arg("check").arg("--form").arg(clean.path()))?;
    assert!(report.contains("No configuration problems found."));

    let mut document: Value = serde_json::from_str(SURVEY)?;
    if let Some(controls) = document["controls"].as_array_mut() {
        controls.push(json!({
            "id": 9,
            "kind": "validation",
            "question_id": 21,
            "validator": "greater_than",
            "value": "3"
        }));
    }
    let broken = temp.child("broken.json");
    broken.write_str(&document.to_string())?;

    let lenient = stdout_of(forms()?.arg("check").arg("--form").arg(broken.path()))?;
    assert!(lenient.contains("[inapplicable_validator]"));
    forms()?
        .args(["check", "--strict", "--form"])
        .arg(broken.path())
        .assert()
        .failure();
    Ok(())
}

#[test]
fn remove_step_writes_the_pruned_document() -> TestResult {
    let temp = TempDir::new()?;
    let form = temp.child("survey.json");
    form.write_str(SURVEY)?;
    let out = temp.child("pruned.json");

    let stdout = stdout_of(
        forms()?
            .args(["remove-step", "--step", "2", "--form"])
            .arg(form.path())
            .arg("--out")
            .arg(out.path()),
    )?;
    let report: Value = serde_json::from_str(&stdout)?;
    assert_eq!(report["groups"], json!([100]));
    assert_eq!(report["transitions"], json!([1, 3]));

    let pruned = read_json(out.path())?;
    let steps: Vec<u64> = pruned["steps"]
        .as_array()
        .map(|steps| steps.iter().filter_map(|step| step["id"].as_u64()).collect())
        .unwrap_or_default();
    assert_eq!(steps, vec![1, 3, 4]);
    assert_eq!(read_json(form.path())?, serde_json::from_str::<Value>(SURVEY)?);
    Ok(())
}

#[test]
fn remove_display_rewrites_the_form_in_place() -> TestResult {
    let temp = TempDir::new()?;
    let form = temp.child("survey.json");
    form.write_str(SURVEY)?;

    let stdout = stdout_of(
        forms()?
            .args(["remove-display", "--display", "5", "--form"])
            .arg(form.path()),
    )?;
    let report: Value = serde_json::from_str(&stdout)?;
    assert_eq!(report["displays"], json!([5, 6, 7]));

    let document = read_json(form.path())?;
    assert!(document["responses"].get("22").is_none());
    assert_eq!(document["responses"]["20"], json!(["yes"]));
    Ok(())
}

#[test]
fn unknown_step_is_an_error() -> TestResult {
    let temp = TempDir::new()?;
    let form = temp.child("survey.json");
    form.write_str(SURVEY)?;
    forms()?
        .args(["tree", "--step", "42", "--form"])
        .arg(form.path())
        .assert()
        .failure();
    Ok(())
}

#[test]
fn schema_describes_form_documents() -> TestResult {
    let schema: Value = serde_json::from_str(&stdout_of(forms()?.arg("schema"))?)?;
    assert_eq!(schema["title"], "FormDocument");
    assert!(schema["properties"].get("steps").is_some());
    Ok(())
}
