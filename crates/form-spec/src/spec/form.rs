use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::spec::question::QuestionSpec;

/// Top-level compiled form: an ordered list of questions with typed expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FormSpec {
    pub name: String,
    #[serde(default)]
    pub questions: Vec<QuestionSpec>,
}

impl FormSpec {
    pub fn question(&self, id: &str) -> Option<&QuestionSpec> {
        self.questions.iter().find(|question| question.id == id)
    }

    /// First question owning `attribute`; attributes are expected to be unique.
    pub fn question_by_attribute(&self, attribute: &str) -> Option<&QuestionSpec> {
        self.questions
            .iter()
            .find(|question| question.attribute == attribute)
    }
}
