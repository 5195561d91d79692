use thiserror::Error;
use tracing::{debug, warn};

use crate::answers::{AnswerSet, AnswerValue, Answers, OutcomeMap};
use crate::decision::resolve_decision;
use crate::evaluate::EvalContext;
use crate::render::{RenderPayload, build_render_payload};
use crate::spec::form::FormSpec;
use crate::spec::question::{Outcome, QuestionSpec, QuestionType};
use crate::visibility::{VisibilityMap, resolve_visibility, visible_questions};

/// Result of applying one raw input to an answer set.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerUpdate {
    pub answers: Answers,
    pub outcome: Option<Outcome>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("question '{0}' is not part of the form")]
    UnknownQuestion(String),
}

/// Applies `raw` as the answer to `question` on top of `prior`.
///
/// Blank input clears the answer and the outcome. Integer questions store only whole numbers;
/// anything else leaves the attribute unanswered.
pub fn handle_answer(
    question: &QuestionSpec,
    raw: &str,
    prior: &Answers,
    ctx: &EvalContext,
) -> AnswerUpdate {
    let mut answers = prior.clone();
    match coerce_answer(question.kind, raw) {
        Some(value) => {
            answers.insert(question.attribute.clone(), value);
        }
        None => {
            answers.remove(&question.attribute);
        }
    }

    let outcome = if raw.trim().is_empty() {
        None
    } else {
        resolve_decision(question, raw, ctx)
    };

    AnswerUpdate { answers, outcome }
}

fn coerce_answer(kind: QuestionType, raw: &str) -> Option<AnswerValue> {
    if raw.trim().is_empty() {
        return None;
    }
    match kind {
        QuestionType::Integer => raw.trim().parse::<i64>().ok().map(AnswerValue::Integer),
        QuestionType::Text | QuestionType::Date | QuestionType::Picklist => {
            Some(AnswerValue::Text(raw.to_string()))
        }
    }
}

/// Live preview state: answers, outcomes and the derived visibility of one form.
#[derive(Debug, Clone)]
pub struct PreviewSession<'a> {
    spec: &'a FormSpec,
    ctx: EvalContext,
    answers: Answers,
    outcomes: OutcomeMap,
    visibility: VisibilityMap,
}

impl<'a> PreviewSession<'a> {
    pub fn new(spec: &'a FormSpec, ctx: EvalContext) -> Self {
        let visibility = resolve_visibility(spec, &Answers::new(), &ctx);
        Self {
            spec,
            ctx,
            answers: Answers::new(),
            outcomes: OutcomeMap::new(),
            visibility,
        }
    }

    /// Seeds the session with existing answers and derives outcomes for visible questions.
    pub fn with_answers(spec: &'a FormSpec, ctx: EvalContext, answers: Answers) -> Self {
        let mut session = Self::new(spec, ctx);
        session.answers = answers;
        session.refresh();
        session
    }

    /// Applies one input change and recomputes visibility for the whole form.
    pub fn handle_answer(
        &mut self,
        question_id: &str,
        raw: &str,
    ) -> Result<Option<Outcome>, SessionError> {
        let spec = self.spec;
        let question = spec.question(question_id).ok_or_else(|| {
            warn!(question = question_id, "answer for unknown question ignored");
            SessionError::UnknownQuestion(question_id.to_string())
        })?;

        let update = handle_answer(question, raw, &self.answers, &self.ctx);
        self.answers = update.answers;
        self.refresh();
        Ok(self.outcomes.get(&question.id).copied())
    }

    /// Discards all answers and outcomes.
    pub fn reset(&mut self) {
        self.answers.clear();
        self.outcomes.clear();
        self.refresh();
    }

    /// Recomputes visibility, then the outcome of every visible answered question.
    ///
    /// Hidden questions carry no outcome; showing them again restores the outcome of their
    /// stored answer.
    fn refresh(&mut self) {
        self.visibility = resolve_visibility(self.spec, &self.answers, &self.ctx);
        let mut outcomes = OutcomeMap::new();
        for question in visible_questions(self.spec, &self.visibility) {
            if let Some(value) = self.answers.get(&question.attribute)
                && let Some(outcome) = resolve_decision(question, &value.as_text(), &self.ctx)
            {
                outcomes.insert(question.id.clone(), outcome);
            }
        }
        for question_id in self.outcomes.keys() {
            if !outcomes.contains_key(question_id) && !self.is_visible(question_id) {
                debug!(question = %question_id, "dropping outcome of hidden question");
            }
        }
        self.outcomes = outcomes;
    }

    pub fn spec(&self) -> &'a FormSpec {
        self.spec
    }

    pub fn context(&self) -> &EvalContext {
        &self.ctx
    }

    pub fn answers(&self) -> &Answers {
        &self.answers
    }

    pub fn outcomes(&self) -> &OutcomeMap {
        &self.outcomes
    }

    pub fn visibility(&self) -> &VisibilityMap {
        &self.visibility
    }

    pub fn outcome(&self, question_id: &str) -> Option<Outcome> {
        self.outcomes.get(question_id).copied()
    }

    pub fn is_visible(&self, question_id: &str) -> bool {
        self.visibility.get(question_id).copied().unwrap_or(false)
    }

    pub fn visible_questions(&self) -> impl Iterator<Item = &'a QuestionSpec> {
        visible_questions(self.spec, &self.visibility)
    }

    pub fn render(&self) -> RenderPayload {
        build_render_payload(self.spec, &self.answers, &self.outcomes, &self.ctx)
    }

    pub fn snapshot(&self) -> AnswerSet {
        AnswerSet {
            form_name: self.spec.name.clone(),
            answers: self.answers.clone(),
            outcomes: self.outcomes.clone(),
        }
    }
}
