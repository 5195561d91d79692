mod wizard;

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use component_forms::{
    form_schema, handle_answer, render_json_ui, render_text, validate_answers, validate_form,
};
use form_spec::{
    AnswerSet, Answers, FormDefinition, Outcome, TextDecisionPolicy, ValidationResult,
    export_file_name, export_sheet, window::parse_candidate_date,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use wizard::{
    AnswerParseError, PromptContext, QuestionKind, Verbosity, WizardPayload, WizardPresenter,
    WizardQuestion,
};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

const OUTPUT_DIR_ENV: &str = "DECISION_FORMS_OUTPUT_DIR";

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Decision form preview CLI",
    long_about = "Previews conditional questionnaires, evaluates answer sets, validates definitions and exports them as spreadsheets"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum RenderMode {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum TextDecisionArg {
    /// Decisions on text questions never fire.
    Unreachable,
    /// Decisions on text questions fire on exact string equality.
    ExactMatch,
}

impl From<TextDecisionArg> for TextDecisionPolicy {
    fn from(arg: TextDecisionArg) -> Self {
        match arg {
            TextDecisionArg::Unreachable => TextDecisionPolicy::Unreachable,
            TextDecisionArg::ExactMatch => TextDecisionPolicy::ExactMatch,
        }
    }
}

/// Options shared by every command that evaluates a form.
#[derive(Args)]
struct EngineArgs {
    /// Path to the form definition JSON.
    #[arg(long, value_name = "FORM")]
    form: PathBuf,
    /// Date used as "today" for date windows (defaults to the local date).
    #[arg(long, value_name = "YYYY-MM-DD")]
    today: Option<NaiveDate>,
    /// How decisions on text questions are evaluated.
    #[arg(long, value_enum, value_name = "POLICY")]
    text_decisions: Option<TextDecisionArg>,
}

impl EngineArgs {
    /// Component config carrying the form definition and evaluation settings.
    fn config_json(&self) -> CliResult<String> {
        let form_json = fs::read_to_string(&self.form)
            .map_err(|err| format!("failed to read {}: {}", self.form.display(), err))?;
        Ok(json!({
            "form_json": form_json,
            "today": self.today,
            "text_decisions": self.text_decisions.map(TextDecisionPolicy::from),
        })
        .to_string())
    }
}

#[derive(Subcommand)]
enum Command {
    /// Walk through a form interactively, showing decisions as answers are entered.
    Preview {
        #[command(flatten)]
        engine: EngineArgs,
        /// Optional JSON file containing initial answers keyed by attribute.
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
        /// Show verbose output (statuses, visible questions, parse expectations).
        #[arg(long, alias = "debug")]
        verbose: bool,
        /// Also emit answer JSON on completion.
        #[arg(long)]
        answers_json: bool,
        /// Render output mode for each step.
        #[arg(long, value_enum, default_value_t = RenderMode::Text)]
        format: RenderMode,
    },
    /// Evaluate a complete answer set and print visibility and decisions.
    Evaluate {
        #[command(flatten)]
        engine: EngineArgs,
        /// Path to the answers JSON file.
        #[arg(long, value_name = "ANSWERS")]
        answers: PathBuf,
        /// Output format.
        #[arg(long, value_enum, default_value_t = RenderMode::Text)]
        format: RenderMode,
    },
    /// Validate a form definition and, optionally, an answer set against it.
    Validate {
        #[command(flatten)]
        engine: EngineArgs,
        /// Path to the answers JSON file.
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
    },
    /// Export the form's questions, options and decisions as a CSV sheet.
    Export {
        /// Path to the form definition JSON.
        #[arg(long, value_name = "FORM")]
        form: PathBuf,
        /// Directory receiving the export (defaults to DECISION_FORMS_OUTPUT_DIR or current working directory).
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,
        /// Overwrite an existing export.
        #[arg(long)]
        force: bool,
    },
    /// Print the JSON Schema of the form definition format.
    Schema,
}

fn main() -> CliResult<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Preview {
            engine,
            answers,
            verbose,
            answers_json,
            format,
        } => run_preview(&engine, answers, verbose, answers_json, format),
        Command::Evaluate {
            engine,
            answers,
            format,
        } => run_evaluate(&engine, answers, format),
        Command::Validate { engine, answers } => run_validate(&engine, answers),
        Command::Export { form, out, force } => run_export(form, out, force),
        Command::Schema => run_schema(),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .without_time()
        .try_init();
}

fn read_answers(path: &Path) -> CliResult<Answers> {
    let contents = fs::read_to_string(path)
        .map_err(|err| format!("failed to read {}: {}", path.display(), err))?;
    Ok(serde_json::from_str(&contents)?)
}

fn parse_component_result(response: &str) -> CliResult<Value> {
    let value: Value = serde_json::from_str(response)?;
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        Err(error.into())
    } else {
        Ok(value)
    }
}

fn component_result<T: DeserializeOwned>(response: &str) -> CliResult<T> {
    Ok(serde_json::from_value(parse_component_result(response)?)?)
}

#[derive(Deserialize)]
struct AnswerResponse {
    outcome: Option<Outcome>,
    answers: Answers,
}

fn run_preview(
    engine: &EngineArgs,
    answers_path: Option<PathBuf>,
    verbose: bool,
    answers_json: bool,
    format: RenderMode,
) -> CliResult<()> {
    let config_json = engine.config_json()?;
    let mut answers = match answers_path {
        Some(path) => read_answers(&path)?,
        None => Answers::new(),
    };
    let mut skipped = BTreeSet::new();
    let mut presenter = WizardPresenter::new(Verbosity::from_verbose(verbose), answers_json);

    loop {
        let answers_str = serde_json::to_string(&answers)?;
        let ui_raw = render_json_ui(&config_json, &answers_str);
        let ui = parse_component_result(&ui_raw)?;
        let payload =
            WizardPayload::from_json(&ui).map_err(|err| format!("preview UI error: {}", err))?;
        presenter.show_header(&payload);

        let Some(question) = next_prompt(&payload, &skipped) else {
            let answer_set = AnswerSet {
                form_name: payload.form_name.clone(),
                answers,
                outcomes: payload.outcomes(),
            };
            presenter.show_completion(&answer_set);
            break;
        };

        print_render_output(format, &ui)?;
        presenter.show_status(&payload);

        let prompt = PromptContext::new(question, &payload.progress);
        let Some(raw) = prompt_question(&prompt, question, &presenter)? else {
            debug!(question = %question.id, "optional question skipped");
            skipped.insert(question.id.clone());
            continue;
        };

        let response: AnswerResponse = component_result(&handle_answer(
            &config_json,
            &answers_str,
            &question.id,
            &raw,
        ))?;
        presenter.show_outcome(response.outcome);
        answers = response.answers;
    }

    Ok(())
}

/// First visible question that has neither an answer nor been skipped.
fn next_prompt<'a>(
    payload: &'a WizardPayload,
    skipped: &BTreeSet<String>,
) -> Option<&'a WizardQuestion> {
    payload.questions.iter().find(|question| {
        question.visible && !question.answered && !skipped.contains(&question.id)
    })
}

fn prompt_question(
    prompt: &PromptContext,
    question: &WizardQuestion,
    presenter: &WizardPresenter,
) -> CliResult<Option<String>> {
    loop {
        presenter.show_prompt(prompt);
        print!("> ");
        io::stdout().flush()?;
        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Err("input closed before the form was complete".into());
        }

        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case("exit") {
            return Err("preview aborted by user".into());
        }

        match parse_answer(question, trimmed) {
            Ok(value) => return Ok(value),
            Err(err) => presenter.show_parse_error(&err),
        }
    }
}

/// Checks raw input against the question type; `Ok(None)` skips an optional question.
fn parse_answer(question: &WizardQuestion, raw: &str) -> Result<Option<String>, AnswerParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        if question.required {
            return Err(AnswerParseError::new(
                "This question requires an answer.",
                None,
            ));
        }
        return Ok(None);
    }

    match question.kind {
        QuestionKind::Integer => raw.parse::<i64>().map(|_| ()).map_err(|_| {
            AnswerParseError::new(
                "Please enter a whole number.",
                Some("expected integer".to_string()),
            )
        }),
        QuestionKind::Date => parse_candidate_date(raw).map(|_| ()).ok_or_else(|| {
            AnswerParseError::new(
                "Please enter a date.",
                Some("expected YYYY-MM-DD".to_string()),
            )
        }),
        QuestionKind::Picklist => {
            if question.options.iter().any(|option| option == raw) {
                Ok(())
            } else {
                Err(AnswerParseError::new(
                    "Please choose one of the listed options.",
                    Some(format!("expected one of: {}", question.options.join(", "))),
                ))
            }
        }
        QuestionKind::Text => Ok(()),
    }?;
    Ok(Some(raw.to_string()))
}

fn print_render_output(mode: RenderMode, ui: &Value) -> CliResult<()> {
    match mode {
        RenderMode::Text => Ok(()),
        RenderMode::Json => {
            println!("JSON UI:\n{}", serde_json::to_string_pretty(ui)?);
            Ok(())
        }
    }
}

fn run_evaluate(engine: &EngineArgs, answers_path: PathBuf, format: RenderMode) -> CliResult<()> {
    let config_json = engine.config_json()?;
    let answers = serde_json::to_string(&read_answers(&answers_path)?)?;
    let ui = parse_component_result(&render_json_ui(&config_json, &answers))?;
    match format {
        RenderMode::Text => println!("{}", render_text(&config_json, &answers)),
        RenderMode::Json => println!("{}", serde_json::to_string_pretty(&ui)?),
    }
    Ok(())
}

fn run_validate(engine: &EngineArgs, answers_path: Option<PathBuf>) -> CliResult<()> {
    let config_json = engine.config_json()?;
    let form_result: ValidationResult = component_result(&validate_form(&config_json))?;
    println!(
        "Form validation: {}",
        if form_result.valid { "valid" } else { "invalid" }
    );
    describe_validation(&form_result);

    let mut valid = form_result.valid;
    if let Some(path) = answers_path {
        let answers = serde_json::to_string(&read_answers(&path)?)?;
        let answer_result: ValidationResult =
            component_result(&validate_answers(&config_json, &answers))?;
        println!(
            "Answer validation: {}",
            if answer_result.valid { "valid" } else { "invalid" }
        );
        describe_validation(&answer_result);
        valid &= answer_result.valid;
    }

    if valid {
        Ok(())
    } else {
        Err("validation failed".into())
    }
}

fn describe_validation(result: &ValidationResult) {
    if !result.errors.is_empty() {
        println!("Errors:");
        for error in &result.errors {
            println!(
                "  {} - {} [{}]",
                error.path.as_deref().unwrap_or("<unknown>"),
                error.message,
                error.code.as_deref().unwrap_or("error")
            );
        }
    }
    if !result.missing_required.is_empty() {
        println!(
            "Missing required answers: {}",
            result.missing_required.join(", ")
        );
    }
    if !result.unknown_fields.is_empty() {
        println!(
            "Unknown answer fields: {}",
            result.unknown_fields.join(", ")
        );
    }
}

fn run_export(form_path: PathBuf, out_dir: Option<PathBuf>, force: bool) -> CliResult<()> {
    let contents = fs::read_to_string(&form_path)
        .map_err(|err| format!("failed to read {}: {}", form_path.display(), err))?;
    let spec = FormDefinition::from_json(&contents)?.compile();
    let out_root = resolve_output_root(out_dir)?;
    let target = out_root.join(export_file_name(&spec.name));
    if target.exists() && !force {
        return Err(format!(
            "{} already exists; rerun with --force to overwrite",
            target.display()
        )
        .into());
    }

    fs::create_dir_all(&out_root)?;
    let sheet = export_sheet(&spec);
    fs::write(&target, sheet.to_csv())?;
    info!(rows = sheet.rows.len(), path = %target.display(), "sheet exported");
    println!("Exported {} to {}", sheet.name, target.display());
    Ok(())
}

fn resolve_output_root(out: Option<PathBuf>) -> CliResult<PathBuf> {
    let candidate = match out {
        Some(path) => path,
        None => env::var_os(OUTPUT_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    if candidate.as_os_str().is_empty() {
        return Err("output directory cannot be empty".into());
    }
    Ok(candidate)
}

fn run_schema() -> CliResult<()> {
    let schema = parse_component_result(&form_schema())?;
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_cmd::Command;
    use assert_fs::prelude::*;
    use serde_json::Value;
    use std::fs;

    const FORM: &str = include_str!("../../form-spec/tests/fixtures/underwriting_form.json");

    fn question(kind: QuestionKind, required: bool, options: &[&str]) -> WizardQuestion {
        WizardQuestion {
            id: "q".into(),
            wording: "Question".into(),
            attribute: "q".into(),
            kind,
            required,
            visible: true,
            answered: false,
            options: options.iter().map(|option| option.to_string()).collect(),
            outcome: None,
        }
    }

    #[test]
    fn parse_answer_requires_required_questions() {
        let required = question(QuestionKind::Text, true, &[]);
        assert!(parse_answer(&required, "  ").is_err());
        let optional = question(QuestionKind::Text, false, &[]);
        assert_eq!(parse_answer(&optional, "").unwrap(), None);
    }

    #[test]
    fn parse_answer_checks_integers_and_dates() {
        let integer = question(QuestionKind::Integer, true, &[]);
        assert_eq!(parse_answer(&integer, " 42 ").unwrap().as_deref(), Some("42"));
        assert!(parse_answer(&integer, "forty").is_err());

        let date = question(QuestionKind::Date, true, &[]);
        assert!(parse_answer(&date, "2024-02-30").is_err());
        assert!(parse_answer(&date, "2024-02-29").is_ok());
    }

    #[test]
    fn parse_answer_checks_picklist_options() {
        let picklist = question(QuestionKind::Picklist, true, &["Yes", "No"]);
        assert!(parse_answer(&picklist, "Maybe").is_err());
        assert_eq!(parse_answer(&picklist, "No").unwrap().as_deref(), Some("No"));
    }

    #[test]
    fn output_root_prefers_explicit_dir() {
        let root = resolve_output_root(Some(PathBuf::from("exports"))).unwrap();
        assert_eq!(root, PathBuf::from("exports"));
        assert!(resolve_output_root(Some(PathBuf::new())).is_err());
    }

    #[test]
    fn preview_walks_form_and_reports_decisions() -> Result<(), Box<dyn std::error::Error>> {
        let workspace = assert_fs::TempDir::new()?;
        let form = workspace.child("form.json");
        form.write_str(FORM)?;

        let stdin = ["", "120", "Yes", "10", "2024-06-01", "", ""].join("\n") + "\n";
        let output = Command::cargo_bin("decision-forms")?
            .arg("preview")
            .arg("--form")
            .arg(form.path())
            .arg("--today")
            .arg("2024-06-15")
            .arg("--answers-json")
            .write_stdin(stdin)
            .output()?;

        assert!(output.status.success());
        let stdout = String::from_utf8(output.stdout)?;
        let stderr = String::from_utf8(output.stderr)?;
        assert!(stderr.contains("This question requires an answer."));
        assert!(stdout.contains("Decision: REFER"));
        assert!(stdout.contains("Decision: DECLINE"));
        assert!(stdout.contains("Decision: POSTPONE"));
        assert!(stdout.contains("Done ✅"));
        assert!(stdout.contains("Answers (CBOR hex): "));
        assert!(stdout.contains("\"form_name\": \"Life Underwriting\""));
        Ok(())
    }

    #[test]
    fn preview_hides_questions_when_dependency_changes() -> Result<(), Box<dyn std::error::Error>>
    {
        let workspace = assert_fs::TempDir::new()?;
        let form = workspace.child("form.json");
        form.write_str(FORM)?;
        let answers = workspace.child("answers.json");
        answers.write_str(r#"{"age": 30, "smoker": "No", "cigarettes": 40}"#)?;

        let output = Command::cargo_bin("decision-forms")?
            .arg("preview")
            .arg("--form")
            .arg(form.path())
            .arg("--answers")
            .arg(answers.path())
            .arg("--today")
            .arg("2024-06-15")
            .write_stdin("\n")
            .output()?;

        assert!(output.status.success());
        let stdout = String::from_utf8(output.stdout)?;
        assert!(stdout.contains("Decisions: 2=ACCEPT"));
        assert!(!stdout.contains("3=REFER"));
        Ok(())
    }

    #[test]
    fn evaluate_prints_json_outcomes() -> Result<(), Box<dyn std::error::Error>> {
        let workspace = assert_fs::TempDir::new()?;
        let form = workspace.child("form.json");
        form.write_str(FORM)?;
        let answers = workspace.child("answers.json");
        answers.write_str(r#"{"age": 120, "smoker": "Yes"}"#)?;

        let output = Command::cargo_bin("decision-forms")?
            .arg("evaluate")
            .arg("--form")
            .arg(form.path())
            .arg("--answers")
            .arg(answers.path())
            .arg("--today")
            .arg("2024-06-15")
            .arg("--format")
            .arg("json")
            .output()?;

        assert!(output.status.success());
        let ui: Value = serde_json::from_slice(&output.stdout)?;
        assert_eq!(ui["questions"][0]["outcome"], "REFER");
        assert_eq!(ui["questions"][1]["outcome"], "DECLINE");
        assert_eq!(ui["questions"][2]["visible"], true);
        Ok(())
    }

    #[test]
    fn validate_fails_on_broken_form() -> Result<(), Box<dyn std::error::Error>> {
        let workspace = assert_fs::TempDir::new()?;
        let good = workspace.child("good.json");
        good.write_str(FORM)?;
        Command::cargo_bin("decision-forms")?
            .arg("validate")
            .arg("--form")
            .arg(good.path())
            .assert()
            .success();

        let broken = workspace.child("broken.json");
        broken.write_str(
            r#"{"name": "Broken", "questions": [
                {"id": "1", "wording": "Pick", "type": "picklist", "attribute": "pick"}
            ]}"#,
        )?;
        let output = Command::cargo_bin("decision-forms")?
            .arg("validate")
            .arg("--form")
            .arg(broken.path())
            .output()?;
        assert!(!output.status.success());
        let stdout = String::from_utf8(output.stdout)?;
        assert!(stdout.contains("Form validation: invalid"));
        assert!(stdout.contains("[missing_options]"));
        Ok(())
    }

    #[test]
    fn export_writes_csv_and_respects_force() -> Result<(), Box<dyn std::error::Error>> {
        let workspace = assert_fs::TempDir::new()?;
        let form = workspace.child("form.json");
        form.write_str(FORM)?;
        let out = workspace.path().join("exports");

        Command::cargo_bin("decision-forms")?
            .arg("export")
            .arg("--form")
            .arg(form.path())
            .arg("--out")
            .arg(&out)
            .assert()
            .success();

        let csv = fs::read_to_string(out.join("life-underwriting-questions.csv"))?;
        assert!(csv.starts_with("Form Name,Life Underwriting\r\n"));

        Command::cargo_bin("decision-forms")?
            .arg("export")
            .arg("--form")
            .arg(form.path())
            .arg("--out")
            .arg(&out)
            .assert()
            .failure();

        Command::cargo_bin("decision-forms")?
            .arg("export")
            .arg("--form")
            .arg(form.path())
            .arg("--out")
            .arg(&out)
            .arg("--force")
            .assert()
            .success();
        Ok(())
    }

    #[test]
    fn export_uses_output_dir_env() -> Result<(), Box<dyn std::error::Error>> {
        let workspace = assert_fs::TempDir::new()?;
        let form = workspace.child("form.json");
        form.write_str(FORM)?;
        let out = tempfile::TempDir::new()?;

        Command::cargo_bin("decision-forms")?
            .env(OUTPUT_DIR_ENV, out.path())
            .arg("export")
            .arg("--form")
            .arg(form.path())
            .assert()
            .success();

        assert!(out.path().join("life-underwriting-questions.csv").exists());
        Ok(())
    }

    #[test]
    fn schema_prints_definition_schema() -> Result<(), Box<dyn std::error::Error>> {
        let output = Command::cargo_bin("decision-forms")?.arg("schema").output()?;
        assert!(output.status.success());
        let schema: Value = serde_json::from_slice(&output.stdout)?;
        assert!(schema["properties"]["questions"].is_object());
        Ok(())
    }
}
