#![allow(missing_docs)]

pub mod answers;
pub mod decision;
pub mod evaluate;
pub mod export;
pub mod expr;
pub mod render;
pub mod session;
pub mod spec;
pub mod validate;
pub mod visibility;
pub mod window;

pub use answers::{
    AnswerSet, AnswerValue, Answers, OutcomeMap, ValidationError, ValidationResult,
};
pub use decision::{decision_matches, resolve_decision};
pub use evaluate::{EvalContext, TextDecisionPolicy, evaluate_condition};
pub use export::{Sheet, export_file_name, export_sheet};
pub use expr::{CompareOp, Expr, ExprError, WindowOp, WindowUnit};
pub use render::{
    RenderPayload, RenderProgress, RenderQuestion, RenderStatus, build_render_payload,
    next_question, render_json_ui, render_text,
};
pub use session::{AnswerUpdate, PreviewSession, SessionError, handle_answer};
pub use spec::{
    ConditionGroup, ConditionLogic, ConditionSpec, DecisionSpec, FormDefinition, FormSpec,
    Outcome, QuestionDefinition, QuestionSpec, QuestionType,
};
pub use validate::{validate_answers, validate_form};
pub use visibility::{VisibilityMap, is_visible, resolve_visibility, visible_questions};
pub use window::within_window;
