pub mod definition;
pub mod form;
pub mod question;

pub use definition::{
    ConditionDefinition, ConditionGroupDefinition, DecisionDefinition, FormDefinition,
    QuestionDefinition,
};
pub use form::FormSpec;
pub use question::{
    ConditionGroup, ConditionLogic, ConditionSpec, DecisionSpec, Outcome, QuestionSpec,
    QuestionType,
};
