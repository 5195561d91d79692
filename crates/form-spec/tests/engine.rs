use chrono::NaiveDate;

use form_spec::{
    AnswerValue, Answers, EvalContext, FormDefinition, FormSpec, Outcome, PreviewSession,
    TextDecisionPolicy, handle_answer, is_visible, resolve_decision, resolve_visibility,
};

fn fixture(name: &str) -> &'static str {
    match name {
        "underwriting_form" => include_str!("../tests/fixtures/underwriting_form.json"),
        _ => panic!("unknown fixture {}", name),
    }
}

fn spec() -> FormSpec {
    FormDefinition::from_json(fixture("underwriting_form"))
        .expect("deserialize")
        .compile()
}

fn ctx() -> EvalContext {
    EvalContext::new(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap())
}

fn answers(pairs: &[(&str, AnswerValue)]) -> Answers {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

#[test]
fn unconditioned_questions_are_always_visible() {
    let spec = spec();
    let samples = [
        Answers::new(),
        answers(&[("age", AnswerValue::Integer(30)), ("smoker", "No".into())]),
        answers(&[("age", "nonsense".into()), ("ghost", "x".into())]),
    ];
    for sample in &samples {
        for id in ["1", "2", "5"] {
            let question = spec.question(id).expect("question");
            assert!(is_visible(&spec, question, sample, &ctx()), "{} hidden", id);
        }
    }
}

#[test]
fn and_group_requires_every_condition() {
    let spec = spec();
    let notes = spec.question("6").expect("notes");

    let both = answers(&[("age", AnswerValue::Integer(40)), ("last_visit", "2024-01-10".into())]);
    assert!(is_visible(&spec, notes, &both, &ctx()));

    let minor = answers(&[("age", AnswerValue::Integer(12)), ("last_visit", "2024-01-10".into())]);
    assert!(!is_visible(&spec, notes, &minor, &ctx()));

    let old_visit = answers(&[("age", AnswerValue::Integer(40)), ("last_visit", "2020-01-10".into())]);
    assert!(!is_visible(&spec, notes, &old_visit, &ctx()));

    let partial = answers(&[("age", AnswerValue::Integer(40))]);
    assert!(!is_visible(&spec, notes, &partial, &ctx()));
}

#[test]
fn or_group_needs_one_condition() {
    let spec = spec();
    let visit = spec.question("4").expect("visit");

    assert!(is_visible(&spec, visit, &answers(&[("age", AnswerValue::Integer(65))]), &ctx()));
    assert!(is_visible(
        &spec,
        visit,
        &answers(&[("age", AnswerValue::Integer(30)), ("smoker", "Yes".into())]),
        &ctx()
    ));
    assert!(!is_visible(
        &spec,
        visit,
        &answers(&[("age", AnswerValue::Integer(30)), ("smoker", "No".into())]),
        &ctx()
    ));
    assert!(!is_visible(&spec, visit, &Answers::new(), &ctx()));
}

#[test]
fn visibility_map_covers_every_question() {
    let spec = spec();
    let map = resolve_visibility(&spec, &answers(&[("smoker", "Yes".into())]), &ctx());
    assert_eq!(map.len(), spec.questions.len());
    assert!(map["3"]);
    assert!(map["4"]);
    assert!(!map["6"]);
}

#[test]
fn first_matching_decision_wins() {
    let spec = spec();
    let age = spec.question("1").expect("age");
    assert_eq!(resolve_decision(age, "120", &ctx()), Some(Outcome::Refer));
    assert_eq!(resolve_decision(age, "60", &ctx()), Some(Outcome::Decline));
    assert_eq!(resolve_decision(age, "30", &ctx()), None);
}

#[test]
fn picklist_decision_without_match_is_none() {
    let spec = spec();
    let mut form = spec.clone();
    let smoker = form
        .questions
        .iter_mut()
        .find(|question| question.id == "2")
        .expect("smoker");
    smoker.decisions.retain(|decision| decision.id == "d3");
    let smoker = form.question("2").expect("smoker");
    assert_eq!(resolve_decision(smoker, "No", &ctx()), None);
    assert_eq!(resolve_decision(smoker, "Yes", &ctx()), Some(Outcome::Decline));
}

#[test]
fn handle_answer_is_idempotent_and_clears_on_blank() {
    let spec = spec();
    let age = spec.question("1").expect("age");
    let prior = answers(&[("smoker", "No".into())]);

    let first = handle_answer(age, "75", &prior, &ctx());
    let second = handle_answer(age, "75", &prior, &ctx());
    assert_eq!(first, second);
    assert_eq!(first.answers["age"], AnswerValue::Integer(75));
    assert_eq!(first.outcome, Some(Outcome::Decline));

    let cleared = handle_answer(age, "  ", &first.answers, &ctx());
    assert!(!cleared.answers.contains_key("age"));
    assert_eq!(cleared.outcome, None);
    assert_eq!(cleared.answers["smoker"], AnswerValue::from("No"));
}

#[test]
fn non_numeric_integer_input_leaves_question_unanswered() {
    let spec = spec();
    let age = spec.question("1").expect("age");
    let update = handle_answer(age, "old", &answers(&[("age", AnswerValue::Integer(40))]), &ctx());
    assert!(!update.answers.contains_key("age"));
    assert_eq!(update.outcome, None);
}

#[test]
fn hiding_a_question_drops_its_outcome() {
    let spec = spec();
    let mut session = PreviewSession::new(&spec, ctx());
    assert!(!session.is_visible("3"));

    assert_eq!(session.handle_answer("2", "Yes"), Ok(Some(Outcome::Decline)));
    assert!(session.is_visible("3"));
    assert_eq!(session.handle_answer("3", "25"), Ok(Some(Outcome::Refer)));
    assert_eq!(session.outcome("3"), Some(Outcome::Refer));

    assert_eq!(session.handle_answer("2", "No"), Ok(Some(Outcome::Accept)));
    assert!(!session.is_visible("3"));
    assert_eq!(session.outcome("3"), None);
    assert!(!session.snapshot().outcomes.contains_key("3"));

    let payload = session.render();
    let cigarettes = payload.question("3").expect("rendered");
    assert!(!cigarettes.visible);
    assert!(cigarettes.outcome.is_none());
}

#[test]
fn reshown_question_regains_outcome_of_stored_answer() {
    let spec = spec();
    let mut session = PreviewSession::new(&spec, ctx());
    session.handle_answer("2", "Yes").expect("smoker");
    session.handle_answer("3", "25").expect("cigarettes");
    session.handle_answer("2", "No").expect("smoker");
    assert_eq!(session.outcome("3"), None);

    session.handle_answer("2", "Yes").expect("smoker");
    assert_eq!(session.outcome("3"), Some(Outcome::Refer));

    let seeded = PreviewSession::with_answers(&spec, ctx(), session.answers().clone());
    assert_eq!(seeded.outcomes(), session.outcomes());
}

#[test]
fn clearing_an_answer_cascades_visibility() {
    let spec = spec();
    let mut session = PreviewSession::new(&spec, ctx());
    session.handle_answer("1", "65").expect("age");
    assert!(session.is_visible("4"));
    assert_eq!(
        session.handle_answer("4", "2024-06-01"),
        Ok(Some(Outcome::Postpone))
    );

    assert_eq!(session.handle_answer("1", ""), Ok(None));
    assert_eq!(session.outcome("1"), None);
    assert!(!session.is_visible("4"));
    assert_eq!(session.outcome("4"), None);
}

#[test]
fn date_decisions_follow_window() {
    let spec = spec();
    let mut session = PreviewSession::new(&spec, ctx());
    session.handle_answer("2", "Yes").expect("smoker");
    assert_eq!(
        session.handle_answer("4", "2024-04-01"),
        Ok(Some(Outcome::Accept))
    );
    assert_eq!(session.handle_answer("4", "not a date"), Ok(None));
}

#[test]
fn text_decisions_depend_on_policy() {
    let spec = spec();
    let mut default_session = PreviewSession::new(&spec, ctx());
    assert_eq!(default_session.handle_answer("5", "pilot"), Ok(None));

    let exact = ctx().with_text_decisions(TextDecisionPolicy::ExactMatch);
    let mut exact_session = PreviewSession::new(&spec, exact);
    assert_eq!(exact_session.handle_answer("5", "pilot"), Ok(Some(Outcome::Refer)));
}

#[test]
fn unknown_question_is_reported() {
    let spec = spec();
    let mut session = PreviewSession::new(&spec, ctx());
    assert!(session.handle_answer("404", "x").is_err());
}

#[test]
fn seeded_session_derives_outcomes_for_visible_answers() {
    let spec = spec();
    let seeded = answers(&[
        ("age", AnswerValue::Integer(120)),
        ("smoker", "No".into()),
        ("cigarettes", AnswerValue::Integer(30)),
    ]);
    let session = PreviewSession::with_answers(&spec, ctx(), seeded);
    assert_eq!(session.outcome("1"), Some(Outcome::Refer));
    assert_eq!(session.outcome("2"), Some(Outcome::Accept));
    assert_eq!(session.outcome("3"), None);

    let mut session = session;
    session.reset();
    assert!(session.answers().is_empty());
    assert!(session.outcomes().is_empty());
}
