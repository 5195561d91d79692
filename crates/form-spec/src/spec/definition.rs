use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::expr::Expr;
use crate::spec::form::FormSpec;
use crate::spec::question::{
    ConditionGroup, ConditionLogic, ConditionSpec, DecisionSpec, Outcome, QuestionSpec,
    QuestionType,
};

/// Form as produced by the form builder, with string-encoded expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FormDefinition {
    #[serde(alias = "formName")]
    pub name: String,
    #[serde(default)]
    pub questions: Vec<QuestionDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDefinition {
    pub id: String,
    pub wording: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    #[serde(default)]
    pub attribute: String,
    /// Let the compiler assign a `DEV_<TYPE>_<n>` attribute when `attribute` is blank.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub developer_determined: bool,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition_group: Option<ConditionGroupDefinition>,
    #[serde(default)]
    pub decisions: Vec<DecisionDefinition>,
}

fn default_required() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConditionGroupDefinition {
    #[serde(default)]
    pub conditions: Vec<ConditionDefinition>,
    #[serde(default)]
    pub logic: ConditionLogic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConditionDefinition {
    pub attribute_name: String,
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DecisionDefinition {
    pub id: String,
    pub condition: String,
    pub outcome: Outcome,
}

impl FormDefinition {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Parses every expression once against the grammar of its subject question.
    ///
    /// Conditions use the type of the referenced question, decisions the type of their own
    /// question. Tokens that do not parse, and conditions on unknown attributes, compile to
    /// [`Expr::Malformed`].
    pub fn compile(&self) -> FormSpec {
        let attributes = self
            .questions
            .iter()
            .enumerate()
            .map(|(index, question)| resolve_attribute(question, index))
            .collect::<Vec<_>>();

        let mut kinds: HashMap<&str, QuestionType> = HashMap::new();
        for (question, attribute) in self.questions.iter().zip(&attributes) {
            kinds.entry(attribute.as_str()).or_insert(question.kind);
        }

        let questions = self
            .questions
            .iter()
            .zip(&attributes)
            .map(|(question, attribute)| QuestionSpec {
                id: question.id.clone(),
                wording: question.wording.clone(),
                kind: question.kind,
                attribute: attribute.clone(),
                required: question.required,
                options: match question.kind {
                    QuestionType::Picklist => question.options.clone().unwrap_or_default(),
                    _ => Vec::new(),
                },
                condition_group: question
                    .condition_group
                    .as_ref()
                    .map(|group| compile_group(&question.id, group, &kinds)),
                decisions: question
                    .decisions
                    .iter()
                    .map(|decision| DecisionSpec {
                        id: decision.id.clone(),
                        condition: compile_expression(
                            &question.id,
                            question.kind,
                            &decision.condition,
                        ),
                        outcome: decision.outcome,
                    })
                    .collect(),
            })
            .collect();

        FormSpec {
            name: self.name.clone(),
            questions,
        }
    }
}

fn resolve_attribute(question: &QuestionDefinition, index: usize) -> String {
    if question.developer_determined && question.attribute.trim().is_empty() {
        developer_attribute(question.kind, index + 1)
    } else {
        question.attribute.clone()
    }
}

/// Attribute name assigned to developer-determined questions.
pub fn developer_attribute(kind: QuestionType, position: usize) -> String {
    format!("DEV_{}_{}", kind.as_str().to_uppercase(), position)
}

fn compile_group(
    question_id: &str,
    group: &ConditionGroupDefinition,
    kinds: &HashMap<&str, QuestionType>,
) -> ConditionGroup {
    let conditions = group
        .conditions
        .iter()
        .map(|condition| {
            let expression = match kinds.get(condition.attribute_name.as_str()) {
                Some(kind) => compile_expression(question_id, *kind, &condition.expression),
                None => {
                    warn!(
                        question = question_id,
                        attribute = %condition.attribute_name,
                        "condition references an unknown attribute"
                    );
                    Expr::Malformed {
                        raw: condition.expression.clone(),
                    }
                }
            };
            ConditionSpec {
                attribute_name: condition.attribute_name.clone(),
                expression,
            }
        })
        .collect();

    ConditionGroup {
        conditions,
        logic: group.logic,
    }
}

fn compile_expression(question_id: &str, kind: QuestionType, token: &str) -> Expr {
    match Expr::parse(kind, token) {
        Ok(expr) => expr,
        Err(error) => {
            warn!(
                question = question_id,
                kind = %kind,
                expression = token,
                %error,
                "expression does not fit its grammar and will never match"
            );
            Expr::Malformed {
                raw: token.to_string(),
            }
        }
    }
}
