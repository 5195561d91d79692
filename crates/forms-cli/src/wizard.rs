use std::fmt::Write;

use form_spec::{AnswerSet, Outcome, OutcomeMap};
use serde_json::Value;

/// Controls which bits of state the preview prints.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Verbosity {
    /// Clean output: question prompts and decisions only.
    Clean,
    /// Verbose output: status, visible questions, parse expectations.
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

/// Prints prompts, decisions and the final answer set of a preview run.
pub struct WizardPresenter {
    verbosity: Verbosity,
    header_printed: bool,
    show_answers_json: bool,
}

impl WizardPresenter {
    pub fn new(verbosity: Verbosity, show_answers_json: bool) -> Self {
        Self {
            verbosity,
            header_printed: false,
            show_answers_json,
        }
    }

    pub fn show_header(&mut self, payload: &WizardPayload) {
        if self.header_printed {
            return;
        }
        println!("Form: {}", payload.form_name);
        self.header_printed = true;
    }

    pub fn show_status(&self, payload: &WizardPayload) {
        if self.verbosity.is_verbose() {
            println!(
                "Status: {} ({}/{})",
                payload.status,
                payload.progress.answered,
                payload.progress.total
            );
            self.print_visible_questions(payload);
        } else if payload.visible_count() == 0 {
            println!("No visible questions are available; check your conditions.");
        }
    }

    fn print_visible_questions(&self, payload: &WizardPayload) {
        println!("Visible questions:");
        for question in payload.questions.iter().filter(|question| question.visible) {
            let mut entry = format!(" - {} ({})", question.attribute, question.wording);
            if question.required {
                entry.push_str(" [required]");
            }
            if let Some(outcome) = question.outcome {
                entry.push_str(&format!(" -> {}", outcome));
            }
            println!("{}", entry);
        }
    }

    pub fn show_prompt(&self, prompt: &PromptContext) {
        let mut line = if prompt.total > 0 {
            format!("{}/{} {}", prompt.index, prompt.total, prompt.wording)
        } else {
            format!("{} {}", prompt.index, prompt.wording)
        };
        if prompt.required {
            line.push_str(" *");
        }
        if let Some(hint) = &prompt.hint {
            line.push(' ');
            line.push_str(hint);
        }
        println!("{}", line);
        if self.verbosity.is_verbose() {
            println!("Attribute: {}", prompt.attribute);
        }
    }

    pub fn show_parse_error(&self, error: &AnswerParseError) {
        eprintln!("Invalid answer: {}", error.user_message);
        if self.verbosity.is_verbose()
            && let Some(debug) = &error.debug_message
        {
            eprintln!("  Expected: {}", debug);
        }
    }

    pub fn show_outcome(&self, outcome: Option<Outcome>) {
        match outcome {
            Some(outcome) => println!("Decision: {}", outcome),
            None if self.verbosity.is_verbose() => println!("Decision: none"),
            None => {}
        }
    }

    pub fn show_completion(&self, answer_set: &AnswerSet) {
        println!("Done ✅");
        if !answer_set.outcomes.is_empty() {
            let decisions = answer_set
                .outcomes
                .iter()
                .map(|(question_id, outcome)| format!("{}={}", question_id, outcome))
                .collect::<Vec<_>>();
            println!("Decisions: {}", decisions.join(", "));
        }
        match answer_set.to_cbor() {
            Ok(bytes) => {
                println!("Answers (CBOR hex): {}", encode_hex(&bytes));
            }
            Err(err) => {
                eprintln!("Failed to serialize answers to CBOR: {}", err);
            }
        }
        if self.show_answers_json {
            match answer_set.to_json_pretty() {
                Ok(pretty) => println!("{}", pretty),
                Err(err) => {
                    eprintln!("Failed to serialize answers to JSON: {}", err);
                }
            }
        }
    }
}

/// Render payload read back from the component's JSON UI.
pub struct WizardPayload {
    pub form_name: String,
    pub status: String,
    pub progress: RenderProgress,
    pub questions: Vec<WizardQuestion>,
}

impl WizardPayload {
    pub fn from_json(json: &Value) -> Result<Self, String> {
        let form_name = json
            .get("form_name")
            .and_then(Value::as_str)
            .ok_or_else(|| "preview payload missing form_name".to_string())?
            .to_string();
        let status = json
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("need_input")
            .to_string();
        let progress = json
            .get("progress")
            .and_then(Value::as_object)
            .ok_or_else(|| "preview payload missing progress".to_string())?;
        let answered = progress
            .get("answered")
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize;
        let total = progress.get("total").and_then(Value::as_u64).unwrap_or(0) as usize;
        let questions = json
            .get("questions")
            .and_then(Value::as_array)
            .ok_or_else(|| "preview payload missing questions".to_string())?
            .iter()
            .map(WizardQuestion::from_json)
            .collect::<Result<_, _>>()?;
        Ok(Self {
            form_name,
            status,
            progress: RenderProgress { answered, total },
            questions,
        })
    }

    pub fn visible_count(&self) -> usize {
        self.questions
            .iter()
            .filter(|question| question.visible)
            .count()
    }

    /// Outcomes of the visible questions, keyed by question id.
    pub fn outcomes(&self) -> OutcomeMap {
        self.questions
            .iter()
            .filter(|question| question.visible)
            .filter_map(|question| question.outcome.map(|outcome| (question.id.clone(), outcome)))
            .collect()
    }
}

pub struct RenderProgress {
    pub answered: usize,
    pub total: usize,
}

/// Minimal view of a question used for prompting.
pub struct WizardQuestion {
    pub id: String,
    pub wording: String,
    pub attribute: String,
    pub kind: QuestionKind,
    pub required: bool,
    pub visible: bool,
    pub answered: bool,
    pub options: Vec<String>,
    pub outcome: Option<Outcome>,
}

impl WizardQuestion {
    fn from_json(value: &Value) -> Result<Self, String> {
        let id = value
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| "question missing id".to_string())?
            .to_string();
        let wording = value
            .get("wording")
            .and_then(Value::as_str)
            .ok_or_else(|| format!("question '{}' missing wording", id))?
            .to_string();
        let attribute = value
            .get("attribute")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let kind = QuestionKind::from_label(
            value.get("type").and_then(Value::as_str).unwrap_or("text"),
        );
        let required = value
            .get("required")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let visible = value
            .get("visible")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        let answered = value
            .get("current_value")
            .is_some_and(|current| !current.is_null());
        let options = value
            .get("options")
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        let outcome = value
            .get("outcome")
            .cloned()
            .map(serde_json::from_value::<Outcome>)
            .transpose()
            .map_err(|err| format!("question '{}' has an invalid outcome: {}", id, err))?;
        Ok(Self {
            id,
            wording,
            attribute,
            kind,
            required,
            visible,
            answered,
            options,
            outcome,
        })
    }
}

/// Context used to format a single prompt.
pub struct PromptContext {
    pub index: usize,
    pub total: usize,
    pub wording: String,
    pub attribute: String,
    pub required: bool,
    pub hint: Option<String>,
}

impl PromptContext {
    pub fn new(question: &WizardQuestion, progress: &RenderProgress) -> Self {
        Self {
            index: (progress.answered + 1).max(1),
            total: progress.total,
            wording: question.wording.clone(),
            attribute: question.attribute.clone(),
            required: question.required,
            hint: question.kind.hint(&question.options),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum QuestionKind {
    Text,
    Integer,
    Date,
    Picklist,
}

impl QuestionKind {
    fn from_label(label: &str) -> Self {
        match label {
            "integer" => QuestionKind::Integer,
            "date" => QuestionKind::Date,
            "picklist" => QuestionKind::Picklist,
            _ => QuestionKind::Text,
        }
    }

    fn hint(&self, options: &[String]) -> Option<String> {
        match self {
            QuestionKind::Integer => Some("(whole number)".to_string()),
            QuestionKind::Date => Some("(YYYY-MM-DD)".to_string()),
            QuestionKind::Picklist if !options.is_empty() => {
                Some(format!("({})", options.join("/")))
            }
            _ => None,
        }
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

fn encode_hex(bytes: &[u8]) -> String {
    let mut encoded = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(&mut encoded, "{:02x}", byte);
    }
    encoded
}
