use std::collections::BTreeSet;

use regex::Regex;

use crate::answers::{AnswerValue, Answers, ValidationError, ValidationResult};
use crate::evaluate::EvalContext;
use crate::expr::Expr;
use crate::spec::form::FormSpec;
use crate::spec::question::{QuestionSpec, QuestionType};
use crate::visibility::resolve_visibility;
use crate::window::parse_candidate_date;

const ATTRIBUTE_PATTERN: &str = r"^[A-Za-z0-9_.\-]+$";

/// Checks the authoring invariants of a compiled form.
pub fn validate_form(spec: &FormSpec) -> ValidationResult {
    let attribute_pattern = Regex::new(ATTRIBUTE_PATTERN).ok();
    let mut errors = Vec::new();
    let mut seen = BTreeSet::new();

    for (index, question) in spec.questions.iter().enumerate() {
        let base = format!("/questions/{}", index);

        if question.attribute.trim().is_empty() {
            errors.push(error(
                question,
                format!("{}/attribute", base),
                "attribute is empty",
                "empty_attribute",
            ));
        } else {
            if let Some(pattern) = &attribute_pattern
                && !pattern.is_match(&question.attribute)
            {
                errors.push(error(
                    question,
                    format!("{}/attribute", base),
                    "attribute may only contain letters, digits, '_', '.' and '-'",
                    "invalid_attribute",
                ));
            }
            if !seen.insert(question.attribute.as_str()) {
                errors.push(error(
                    question,
                    format!("{}/attribute", base),
                    "attribute is already used by another question",
                    "duplicate_attribute",
                ));
            }
        }

        if question.kind == QuestionType::Picklist && question.options.is_empty() {
            errors.push(error(
                question,
                format!("{}/options", base),
                "picklist questions require at least one option",
                "missing_options",
            ));
        }

        if let Some(group) = &question.condition_group {
            for (position, condition) in group.conditions.iter().enumerate() {
                let path = format!("{}/conditionGroup/conditions/{}", base, position);
                let Some(referenced) = spec.question_by_attribute(&condition.attribute_name)
                else {
                    errors.push(error(
                        question,
                        path,
                        &format!("unknown attribute '{}'", condition.attribute_name),
                        "unknown_attribute",
                    ));
                    continue;
                };
                if referenced.id == question.id {
                    errors.push(error(
                        question,
                        path,
                        "a question cannot depend on its own answer",
                        "self_reference",
                    ));
                    continue;
                }
                check_expression(&mut errors, question, referenced, &condition.expression, path);
            }
        }

        for (position, decision) in question.decisions.iter().enumerate() {
            let path = format!("{}/decisions/{}", base, position);
            check_expression(&mut errors, question, question, &decision.condition, path);
        }
    }

    ValidationResult {
        valid: errors.is_empty(),
        errors,
        missing_required: Vec::new(),
        unknown_fields: Vec::new(),
    }
}

fn check_expression(
    errors: &mut Vec<ValidationError>,
    owner: &QuestionSpec,
    subject: &QuestionSpec,
    expression: &Expr,
    path: String,
) {
    if let Expr::Malformed { raw } = expression {
        errors.push(error(
            owner,
            path,
            &format!("'{}' does not fit the {} grammar", raw, subject.kind),
            "malformed_expression",
        ));
        return;
    }
    if !expression.fits(subject.kind) {
        errors.push(error(
            owner,
            path,
            &format!("'{}' cannot be applied to a {} question", expression, subject.kind),
            "expression_mismatch",
        ));
        return;
    }
    if let Expr::PicklistEquals { option } = expression
        && !subject.options.contains(option)
    {
        errors.push(error(
            owner,
            path,
            &format!("'{}' is not an option of '{}'", option, subject.attribute),
            "unknown_option",
        ));
    }
}

/// Checks answers against the visible questions of the form.
pub fn validate_answers(spec: &FormSpec, answers: &Answers, ctx: &EvalContext) -> ValidationResult {
    let visibility = resolve_visibility(spec, answers, ctx);

    let mut errors = Vec::new();
    let mut missing_required = Vec::new();

    for question in &spec.questions {
        if !visibility.get(&question.id).copied().unwrap_or(true) {
            continue;
        }

        match answers.get(&question.attribute) {
            None => {
                if question.required {
                    missing_required.push(question.attribute.clone());
                }
            }
            Some(value) => {
                if let Some(error) = validate_value(question, value) {
                    errors.push(error);
                }
            }
        }
    }

    let attributes: BTreeSet<_> = spec
        .questions
        .iter()
        .map(|question| question.attribute.as_str())
        .collect();
    let unknown_fields: Vec<String> = answers
        .keys()
        .filter(|key| !attributes.contains(key.as_str()))
        .cloned()
        .collect();

    ValidationResult {
        valid: errors.is_empty() && missing_required.is_empty() && unknown_fields.is_empty(),
        errors,
        missing_required,
        unknown_fields,
    }
}

fn validate_value(question: &QuestionSpec, value: &AnswerValue) -> Option<ValidationError> {
    let path = format!("/{}", question.attribute);
    match question.kind {
        QuestionType::Integer if value.as_integer().is_none() => Some(error(
            question,
            path,
            "expected a whole number",
            "type_mismatch",
        )),
        QuestionType::Date if parse_candidate_date(&value.as_text()).is_none() => Some(error(
            question,
            path,
            "expected an ISO date (YYYY-MM-DD)",
            "invalid_date",
        )),
        QuestionType::Picklist
            if !question
                .options
                .iter()
                .any(|option| option.as_str() == value.as_text()) =>
        {
            Some(error(question, path, "invalid picklist option", "invalid_option"))
        }
        _ => None,
    }
}

fn error(question: &QuestionSpec, path: String, message: &str, code: &str) -> ValidationError {
    ValidationError {
        question_id: Some(question.id.clone()),
        path: Some(path),
        message: message.into(),
        code: Some(code.into()),
    }
}
