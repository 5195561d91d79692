use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use form_spec::{
    Answers, EvalContext, FormDefinition, FormSpec, PreviewSession, RenderPayload, SessionError,
    TextDecisionPolicy, export_sheet, render_json_ui as forms_render_json_ui,
    render_text as forms_render_text, resolve_visibility,
    validate_answers as forms_validate_answers, validate_form as forms_validate_form,
};

const DEFAULT_FORM: &str = include_str!("../../form-spec/tests/fixtures/underwriting_form.json");

#[derive(Debug, Error)]
enum ComponentError {
    #[error("failed to parse config: {0}")]
    ConfigParse(#[source] serde_json::Error),
    #[error("failed to parse form definition: {0}")]
    FormParse(#[source] serde_json::Error),
    #[error("failed to parse answers: {0}")]
    AnswersParse(#[source] serde_json::Error),
    #[error("json encode error: {0}")]
    JsonEncode(#[source] serde_json::Error),
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Debug, Deserialize, Serialize, Default)]
struct ComponentConfig {
    #[serde(default)]
    form_json: Option<String>,
    #[serde(default)]
    today: Option<NaiveDate>,
    #[serde(default)]
    text_decisions: Option<TextDecisionPolicy>,
}

impl ComponentConfig {
    fn parse(config_json: &str) -> Result<Self, ComponentError> {
        if config_json.trim().is_empty() {
            Ok(Self::default())
        } else {
            serde_json::from_str(config_json).map_err(ComponentError::ConfigParse)
        }
    }

    fn context(&self) -> EvalContext {
        let ctx = match self.today {
            Some(today) => EvalContext::new(today),
            None => EvalContext::current(),
        };
        ctx.with_text_decisions(self.text_decisions.unwrap_or_default())
    }
}

/// Compiled form plus the evaluation context described by one config payload.
struct Loaded {
    spec: FormSpec,
    ctx: EvalContext,
}

fn load(config_json: &str) -> Result<Loaded, ComponentError> {
    let config = ComponentConfig::parse(config_json)?;
    let form_json = config.form_json.as_deref().unwrap_or(DEFAULT_FORM);
    let definition = FormDefinition::from_json(form_json).map_err(ComponentError::FormParse)?;
    let spec = definition.compile();
    debug!(form = %spec.name, questions = spec.questions.len(), "form loaded");
    Ok(Loaded {
        spec,
        ctx: config.context(),
    })
}

fn parse_answers(answers_json: &str) -> Result<Answers, ComponentError> {
    if answers_json.trim().is_empty() {
        return Ok(Answers::new());
    }
    serde_json::from_str(answers_json).map_err(ComponentError::AnswersParse)
}

fn respond(result: Result<Value, ComponentError>) -> String {
    match result {
        Ok(value) => serde_json::to_string(&value).unwrap_or_else(|error| {
            json!({"error": format!("json encode: {}", error)}).to_string()
        }),
        Err(err) => json!({ "error": err.to_string() }).to_string(),
    }
}

fn respond_string(result: Result<String, ComponentError>) -> String {
    match result {
        Ok(value) => value,
        Err(err) => json!({ "error": err.to_string() }).to_string(),
    }
}

fn to_value<T: Serialize>(value: T) -> Result<Value, ComponentError> {
    serde_json::to_value(value).map_err(ComponentError::JsonEncode)
}

/// Compiled form, with every expression in its typed shape.
pub fn describe(config_json: &str) -> String {
    respond(load(config_json).and_then(|loaded| to_value(loaded.spec)))
}

pub fn get_visibility(config_json: &str, answers_json: &str) -> String {
    respond(load(config_json).and_then(|loaded| {
        let answers = parse_answers(answers_json)?;
        let visibility = resolve_visibility(&loaded.spec, &answers, &loaded.ctx);
        let visible = loaded
            .spec
            .questions
            .iter()
            .filter(|question| visibility.get(&question.id).copied().unwrap_or(true))
            .map(|question| question.id.clone())
            .collect::<Vec<_>>();
        Ok(json!({
            "visibility": visibility,
            "visible": visible,
        }))
    }))
}

/// Applies one raw input on top of `answers_json` and reports the resulting preview state.
pub fn handle_answer(config_json: &str, answers_json: &str, question_id: &str, raw: &str) -> String {
    respond(load(config_json).and_then(|loaded| {
        let answers = parse_answers(answers_json)?;
        let mut session = PreviewSession::with_answers(&loaded.spec, loaded.ctx, answers);
        let outcome = session.handle_answer(question_id, raw)?;
        let answers = to_value(session.answers())?;
        let outcomes = to_value(session.outcomes())?;
        let visibility = to_value(session.visibility())?;
        Ok(json!({
            "question_id": question_id,
            "outcome": outcome,
            "answers": answers,
            "outcomes": outcomes,
            "visibility": visibility,
        }))
    }))
}

pub fn validate_form(config_json: &str) -> String {
    respond(load(config_json).and_then(|loaded| to_value(forms_validate_form(&loaded.spec))))
}

pub fn validate_answers(config_json: &str, answers_json: &str) -> String {
    respond(load(config_json).and_then(|loaded| {
        let answers = parse_answers(answers_json)?;
        to_value(forms_validate_answers(&loaded.spec, &answers, &loaded.ctx))
    }))
}

fn render_payload(config_json: &str, answers_json: &str) -> Result<RenderPayload, ComponentError> {
    let loaded = load(config_json)?;
    let answers = parse_answers(answers_json)?;
    let session = PreviewSession::with_answers(&loaded.spec, loaded.ctx, answers);
    Ok(session.render())
}

pub fn render_text(config_json: &str, answers_json: &str) -> String {
    respond_string(
        render_payload(config_json, answers_json).map(|payload| forms_render_text(&payload)),
    )
}

pub fn render_json_ui(config_json: &str, answers_json: &str) -> String {
    respond(render_payload(config_json, answers_json).map(|payload| forms_render_json_ui(&payload)))
}

/// CSV rendering of the spreadsheet export.
pub fn export_csv(config_json: &str) -> String {
    respond_string(load(config_json).map(|loaded| export_sheet(&loaded.spec).to_csv()))
}

/// JSON Schema of the form definition interchange format.
pub fn form_schema() -> String {
    respond(to_value(schemars::schema_for!(FormDefinition)))
}
