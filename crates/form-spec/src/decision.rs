use tracing::debug;

use crate::evaluate::{EvalContext, TextDecisionPolicy};
use crate::expr::Expr;
use crate::spec::question::{Outcome, QuestionSpec, QuestionType};
use crate::window::within_window;

/// First outcome, in list order, whose trigger matches the raw answer.
pub fn resolve_decision(question: &QuestionSpec, raw: &str, ctx: &EvalContext) -> Option<Outcome> {
    let matched = question
        .decisions
        .iter()
        .find(|decision| decision_matches(question.kind, &decision.condition, raw, ctx));
    debug!(
        question = %question.id,
        decision = matched.map(|decision| decision.id.as_str()),
        outcome = matched.map(|decision| decision.outcome.as_str()),
        "resolved decision"
    );
    matched.map(|decision| decision.outcome)
}

/// Whether `trigger` is satisfied by an answer given to a question of type `kind`.
pub fn decision_matches(kind: QuestionType, trigger: &Expr, raw: &str, ctx: &EvalContext) -> bool {
    match (kind, trigger) {
        (
            QuestionType::Date,
            Expr::DateWindow {
                operator,
                amount,
                unit,
            },
        ) => within_window(*operator, *amount, *unit, raw, ctx.today),
        (QuestionType::Picklist, Expr::PicklistEquals { option }) => option == raw,
        (QuestionType::Integer, Expr::IntegerCompare { operator, value }) => raw
            .trim()
            .parse::<i64>()
            .is_ok_and(|answer| operator.compare(answer, *value)),
        (QuestionType::Text, Expr::TextEquals { value }) => match ctx.text_decisions {
            TextDecisionPolicy::Unreachable => false,
            TextDecisionPolicy::ExactMatch => value == raw,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::spec::question::DecisionSpec;

    fn ctx() -> EvalContext {
        EvalContext::new(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap())
    }

    fn question(kind: QuestionType, rules: &[(&str, Outcome)]) -> QuestionSpec {
        QuestionSpec {
            id: "q".into(),
            wording: "q".into(),
            kind,
            attribute: "q".into(),
            required: true,
            options: vec![],
            condition_group: None,
            decisions: rules
                .iter()
                .enumerate()
                .map(|(index, (token, outcome))| DecisionSpec {
                    id: format!("d{}", index),
                    condition: Expr::parse_lenient(kind, token),
                    outcome: *outcome,
                })
                .collect(),
        }
    }

    #[test]
    fn first_matching_rule_wins() {
        let q = question(
            QuestionType::Integer,
            &[("> 100", Outcome::Refer), ("> 50", Outcome::Decline)],
        );
        assert_eq!(resolve_decision(&q, "120", &ctx()), Some(Outcome::Refer));
        assert_eq!(resolve_decision(&q, "75", &ctx()), Some(Outcome::Decline));
        assert_eq!(resolve_decision(&q, "10", &ctx()), None);
    }

    #[test]
    fn non_numeric_integer_answer_matches_nothing() {
        let q = question(QuestionType::Integer, &[("<= 100", Outcome::Accept)]);
        assert_eq!(resolve_decision(&q, "lots", &ctx()), None);
        assert_eq!(resolve_decision(&q, "", &ctx()), None);
    }

    #[test]
    fn picklist_requires_exact_option() {
        let q = question(QuestionType::Picklist, &[("= Yes", Outcome::Accept)]);
        assert_eq!(resolve_decision(&q, "Yes", &ctx()), Some(Outcome::Accept));
        assert_eq!(resolve_decision(&q, "No", &ctx()), None);
        assert_eq!(resolve_decision(&q, "yes", &ctx()), None);
    }

    #[test]
    fn date_rules_use_window() {
        let q = question(
            QuestionType::Date,
            &[
                ("Within 30 DAYS", Outcome::Postpone),
                ("Not Within 30 DAYS", Outcome::Accept),
            ],
        );
        assert_eq!(resolve_decision(&q, "2024-06-01", &ctx()), Some(Outcome::Postpone));
        assert_eq!(resolve_decision(&q, "2024-04-01", &ctx()), Some(Outcome::Accept));
        assert_eq!(resolve_decision(&q, "soon", &ctx()), None);
    }

    #[test]
    fn text_rules_follow_policy() {
        let q = question(QuestionType::Text, &[("approved", Outcome::Accept)]);
        assert_eq!(resolve_decision(&q, "approved", &ctx()), None);
        let exact = ctx().with_text_decisions(TextDecisionPolicy::ExactMatch);
        assert_eq!(resolve_decision(&q, "approved", &exact), Some(Outcome::Accept));
        assert_eq!(resolve_decision(&q, "Approved", &exact), None);
    }

    #[test]
    fn malformed_rules_are_skipped() {
        let q = question(
            QuestionType::Integer,
            &[("about 5", Outcome::Decline), (">= 5", Outcome::Accept)],
        );
        assert!(q.decisions[0].condition.is_malformed());
        assert_eq!(resolve_decision(&q, "5", &ctx()), Some(Outcome::Accept));
    }
}
