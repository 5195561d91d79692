use std::collections::BTreeMap;

use tracing::debug;

use crate::answers::Answers;
use crate::evaluate::{EvalContext, evaluate_condition};
use crate::spec::form::FormSpec;
use crate::spec::question::{ConditionLogic, QuestionSpec};

/// Visibility flag per question id.
pub type VisibilityMap = BTreeMap<String, bool>;

/// Whether `question` is shown for the current answers.
pub fn is_visible(
    spec: &FormSpec,
    question: &QuestionSpec,
    answers: &Answers,
    ctx: &EvalContext,
) -> bool {
    let Some(group) = &question.condition_group else {
        return true;
    };
    if group.conditions.is_empty() {
        return true;
    }

    match group.logic {
        ConditionLogic::And => group
            .conditions
            .iter()
            .all(|condition| evaluate_condition(spec, condition, answers, ctx)),
        ConditionLogic::Or => group
            .conditions
            .iter()
            .any(|condition| evaluate_condition(spec, condition, answers, ctx)),
    }
}

/// Recomputes visibility for every question of the form.
pub fn resolve_visibility(spec: &FormSpec, answers: &Answers, ctx: &EvalContext) -> VisibilityMap {
    let mut map = VisibilityMap::new();
    for question in &spec.questions {
        map.insert(
            question.id.clone(),
            is_visible(spec, question, answers, ctx),
        );
    }
    debug!(
        form = %spec.name,
        visible = map.values().filter(|visible| **visible).count(),
        total = map.len(),
        "resolved visibility"
    );
    map
}

/// Questions flagged visible in `visibility`, in form order.
pub fn visible_questions<'a>(
    spec: &'a FormSpec,
    visibility: &VisibilityMap,
) -> impl Iterator<Item = &'a QuestionSpec> {
    spec.questions
        .iter()
        .filter(move |question| visibility.get(&question.id).copied().unwrap_or(true))
}
