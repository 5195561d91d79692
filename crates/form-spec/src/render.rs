use std::collections::BTreeSet;

use serde_json::{Map, Value, json};

use crate::{
    answers::{AnswerValue, Answers, OutcomeMap},
    evaluate::EvalContext,
    spec::{
        form::FormSpec,
        question::{Outcome, QuestionType},
    },
    visibility::{VisibilityMap, resolve_visibility, visible_questions},
};

/// Status labels returned by the renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// A visible required question is still unanswered.
    NeedInput,
    /// All visible required questions are answered.
    Complete,
}

impl RenderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStatus::NeedInput => "need_input",
            RenderStatus::Complete => "complete",
        }
    }
}

/// Progress counters exposed to renderers.
#[derive(Debug, Clone)]
pub struct RenderProgress {
    pub answered: usize,
    pub total: usize,
}

/// Describes a single question for render outputs.
#[derive(Debug, Clone)]
pub struct RenderQuestion {
    pub id: String,
    pub wording: String,
    pub kind: QuestionType,
    pub attribute: String,
    pub required: bool,
    pub visible: bool,
    pub current_value: Option<AnswerValue>,
    pub options: Vec<String>,
    pub outcome: Option<Outcome>,
}

/// Collected payload used by both text and JSON renderers.
#[derive(Debug, Clone)]
pub struct RenderPayload {
    pub form_name: String,
    pub status: RenderStatus,
    pub next_question_id: Option<String>,
    pub progress: RenderProgress,
    pub questions: Vec<RenderQuestion>,
}

impl RenderPayload {
    pub fn question(&self, id: &str) -> Option<&RenderQuestion> {
        self.questions.iter().find(|question| question.id == id)
    }

    pub fn visible_count(&self) -> usize {
        self.questions
            .iter()
            .filter(|question| question.visible)
            .count()
    }
}

/// First visible question without an answer, ignoring the ids in `skipped`.
pub fn next_question(
    spec: &FormSpec,
    answers: &Answers,
    visibility: &VisibilityMap,
    skipped: &BTreeSet<String>,
) -> Option<String> {
    visible_questions(spec, visibility)
        .find(|question| {
            !answers.contains_key(&question.attribute) && !skipped.contains(&question.id)
        })
        .map(|question| question.id.clone())
}

/// Build the renderer payload from the form, answers and outcomes.
pub fn build_render_payload(
    spec: &FormSpec,
    answers: &Answers,
    outcomes: &OutcomeMap,
    ctx: &EvalContext,
) -> RenderPayload {
    let visibility = resolve_visibility(spec, answers, ctx);
    let next_question_id = next_question(spec, answers, &visibility, &BTreeSet::new());

    let visible = visible_questions(spec, &visibility).collect::<Vec<_>>();
    let answered = visible
        .iter()
        .filter(|question| answers.contains_key(&question.attribute))
        .count();
    let pending_required = visible
        .iter()
        .any(|question| question.required && !answers.contains_key(&question.attribute));

    let questions = spec
        .questions
        .iter()
        .map(|question| {
            let visible = visibility.get(&question.id).copied().unwrap_or(true);
            RenderQuestion {
                id: question.id.clone(),
                wording: question.wording.clone(),
                kind: question.kind,
                attribute: question.attribute.clone(),
                required: question.required,
                visible,
                current_value: answers.get(&question.attribute).cloned(),
                options: question.options.clone(),
                outcome: if visible {
                    outcomes.get(&question.id).copied()
                } else {
                    None
                },
            }
        })
        .collect::<Vec<_>>();

    RenderPayload {
        form_name: spec.name.clone(),
        status: if pending_required {
            RenderStatus::NeedInput
        } else {
            RenderStatus::Complete
        },
        next_question_id,
        progress: RenderProgress {
            answered,
            total: visible.len(),
        },
        questions,
    }
}

/// Render the payload as a structured JSON-friendly value.
pub fn render_json_ui(payload: &RenderPayload) -> Value {
    let questions = payload
        .questions
        .iter()
        .map(|question| {
            let mut map = Map::new();
            map.insert("id".into(), Value::String(question.id.clone()));
            map.insert("wording".into(), Value::String(question.wording.clone()));
            map.insert("type".into(), Value::String(question.kind.as_str().into()));
            map.insert(
                "attribute".into(),
                Value::String(question.attribute.clone()),
            );
            map.insert("required".into(), Value::Bool(question.required));
            map.insert("visible".into(), Value::Bool(question.visible));
            if let Some(current_value) = &question.current_value {
                map.insert("current_value".into(), answer_to_json(current_value));
            }
            if !question.options.is_empty() {
                map.insert(
                    "options".into(),
                    Value::Array(
                        question
                            .options
                            .iter()
                            .map(|option| Value::String(option.clone()))
                            .collect(),
                    ),
                );
            }
            if let Some(outcome) = question.outcome {
                map.insert("outcome".into(), Value::String(outcome.as_str().into()));
            }
            Value::Object(map)
        })
        .collect::<Vec<_>>();

    json!({
        "form_name": payload.form_name,
        "status": payload.status.as_str(),
        "next_question_id": payload.next_question_id,
        "progress": {
            "answered": payload.progress.answered,
            "total": payload.progress.total,
        },
        "questions": questions,
    })
}

/// Render the payload as human-friendly text.
pub fn render_text(payload: &RenderPayload) -> String {
    let mut lines = Vec::new();
    lines.push(format!("Form: {}", payload.form_name));
    lines.push(format!(
        "Status: {} ({}/{})",
        payload.status.as_str(),
        payload.progress.answered,
        payload.progress.total
    ));

    if let Some(next_question) = &payload.next_question_id {
        lines.push(format!("Next question: {}", next_question));
        if let Some(question) = payload.question(next_question) {
            lines.push(format!("  Wording: {}", question.wording));
            if question.required {
                lines.push("  Required: yes".to_string());
            }
            if !question.options.is_empty() {
                lines.push(format!("  Options: {}", question.options.join(", ")));
            }
        }
    } else {
        lines.push("All visible questions are answered.".to_string());
    }

    lines.push("Visible questions:".to_string());
    for question in payload.questions.iter().filter(|question| question.visible) {
        let mut entry = format!(" - {} ({})", question.attribute, question.wording);
        if question.required {
            entry.push_str(" [required]");
        }
        if let Some(current_value) = &question.current_value {
            entry.push_str(&format!(" = {}", current_value));
        }
        if let Some(outcome) = question.outcome {
            entry.push_str(&format!(" -> {}", outcome));
        }
        lines.push(entry);
    }

    lines.join("\n")
}

fn answer_to_json(value: &AnswerValue) -> Value {
    match value {
        AnswerValue::Integer(number) => Value::from(*number),
        AnswerValue::Text(text) => Value::String(text.clone()),
    }
}
