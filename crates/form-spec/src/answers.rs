use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::spec::question::Outcome;

/// Scalar answer stored for an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum AnswerValue {
    Integer(i64),
    Text(String),
}

impl AnswerValue {
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            AnswerValue::Integer(value) => Cow::Owned(value.to_string()),
            AnswerValue::Text(text) => Cow::Borrowed(text),
        }
    }

    /// Numeric view used by comparison conditions; non-numeric text yields `None`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AnswerValue::Integer(value) => Some(*value as f64),
            AnswerValue::Text(text) => text
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite()),
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            AnswerValue::Integer(value) => Some(*value),
            AnswerValue::Text(text) => text.trim().parse::<i64>().ok(),
        }
    }
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl From<i64> for AnswerValue {
    fn from(value: i64) -> Self {
        AnswerValue::Integer(value)
    }
}

impl From<&str> for AnswerValue {
    fn from(value: &str) -> Self {
        AnswerValue::Text(value.to_string())
    }
}

impl From<String> for AnswerValue {
    fn from(value: String) -> Self {
        AnswerValue::Text(value)
    }
}

/// Answers keyed by question attribute.
pub type Answers = BTreeMap<String, AnswerValue>;

/// Outcomes keyed by question id.
pub type OutcomeMap = BTreeMap<String, Outcome>;

/// Snapshot of a preview session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnswerSet {
    pub form_name: String,
    pub answers: Answers,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outcomes: OutcomeMap,
}

impl AnswerSet {
    pub fn to_cbor(&self) -> Result<Vec<u8>, serde_cbor::Error> {
        serde_cbor::to_vec(self)
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self, serde_cbor::Error> {
        serde_cbor::from_slice(bytes)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Single validation finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Aggregated result of form or answer validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(default)]
    pub errors: Vec<ValidationError>,
    #[serde(default)]
    pub missing_required: Vec<String>,
    #[serde(default)]
    pub unknown_fields: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_deserialize_as_integers() {
        let answers: Answers =
            serde_json::from_str(r#"{"age": 42, "name": "Ada"}"#).expect("answers");
        assert_eq!(answers["age"], AnswerValue::Integer(42));
        assert_eq!(answers["name"], AnswerValue::Text("Ada".into()));
    }

    #[test]
    fn numeric_view_rejects_words() {
        assert_eq!(AnswerValue::from("12.5").as_number(), Some(12.5));
        assert_eq!(AnswerValue::from("twelve").as_number(), None);
        assert_eq!(AnswerValue::from("12.5").as_integer(), None);
    }

    #[test]
    fn snapshot_survives_cbor() {
        let set = AnswerSet {
            form_name: "Motor".into(),
            answers: Answers::from([("age".into(), AnswerValue::Integer(30))]),
            outcomes: OutcomeMap::from([("q1".into(), Outcome::Refer)]),
        };
        let bytes = set.to_cbor().expect("cbor");
        assert_eq!(AnswerSet::from_cbor(&bytes).expect("decode"), set);
    }
}
