use std::fmt;
use std::str::FromStr;

use chrono::{Local, NaiveDate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::answers::{AnswerValue, Answers};
use crate::expr::Expr;
use crate::spec::form::FormSpec;
use crate::spec::question::{ConditionSpec, QuestionType};
use crate::window::within_window;

/// How decisions attached to text questions are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TextDecisionPolicy {
    /// Text decisions never match.
    #[default]
    Unreachable,
    /// A text decision matches when the raw answer equals its token.
    ExactMatch,
}

impl TextDecisionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextDecisionPolicy::Unreachable => "unreachable",
            TextDecisionPolicy::ExactMatch => "exact_match",
        }
    }
}

impl fmt::Display for TextDecisionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TextDecisionPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().replace('-', "_").as_str() {
            "unreachable" => Ok(TextDecisionPolicy::Unreachable),
            "exact_match" | "exact" => Ok(TextDecisionPolicy::ExactMatch),
            _ => Err(format!("unknown text decision policy '{}'", value)),
        }
    }
}

/// Inputs shared by every evaluation in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalContext {
    pub today: NaiveDate,
    pub text_decisions: TextDecisionPolicy,
}

impl EvalContext {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            text_decisions: TextDecisionPolicy::default(),
        }
    }

    /// Context anchored on the local calendar date.
    pub fn current() -> Self {
        Self::new(Local::now().date_naive())
    }

    pub fn with_text_decisions(mut self, policy: TextDecisionPolicy) -> Self {
        self.text_decisions = policy;
        self
    }
}

impl Default for EvalContext {
    fn default() -> Self {
        Self::current()
    }
}

/// Evaluates one visibility condition against the current answers.
///
/// Unanswered or unknown attributes never satisfy a condition.
pub fn evaluate_condition(
    spec: &FormSpec,
    condition: &ConditionSpec,
    answers: &Answers,
    ctx: &EvalContext,
) -> bool {
    let Some(value) = answers.get(&condition.attribute_name) else {
        return false;
    };
    let Some(referenced) = spec.question_by_attribute(&condition.attribute_name) else {
        return false;
    };
    condition_matches(referenced.kind, &condition.expression, value, ctx)
}

fn condition_matches(
    kind: QuestionType,
    expression: &Expr,
    value: &AnswerValue,
    ctx: &EvalContext,
) -> bool {
    match (kind, expression) {
        (
            QuestionType::Date,
            Expr::DateWindow {
                operator,
                amount,
                unit,
            },
        ) => within_window(*operator, *amount, *unit, &value.as_text(), ctx.today),
        (QuestionType::Date, _) => false,
        (_, Expr::PicklistEquals { option }) => value.as_text() == option.as_str(),
        (_, Expr::TextEquals { value: expected }) => value.as_text() == expected.as_str(),
        (_, Expr::IntegerCompare { operator, value: threshold }) => value
            .as_number()
            .is_some_and(|number| operator.compare(number, *threshold as f64)),
        (_, Expr::DateWindow { .. }) | (_, Expr::Malformed { .. }) => false,
    }
}
