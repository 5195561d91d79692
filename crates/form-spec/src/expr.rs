use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::spec::question::QuestionType;

/// Comparison operators of the integer grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum CompareOp {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">=")]
    Ge,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
            CompareOp::Eq => "=",
            CompareOp::Le => "<=",
            CompareOp::Ge => ">=",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "<" => Some(CompareOp::Lt),
            ">" => Some(CompareOp::Gt),
            "=" => Some(CompareOp::Eq),
            "<=" => Some(CompareOp::Le),
            ">=" => Some(CompareOp::Ge),
            _ => None,
        }
    }

    /// Applies `left <op> right`.
    pub fn compare<T: PartialOrd>(&self, left: T, right: T) -> bool {
        match self {
            CompareOp::Lt => left < right,
            CompareOp::Gt => left > right,
            CompareOp::Eq => left == right,
            CompareOp::Le => left <= right,
            CompareOp::Ge => left >= right,
        }
    }
}

/// Whether a date must fall inside or outside the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum WindowOp {
    #[serde(rename = "Within")]
    Within,
    #[serde(rename = "Not Within")]
    NotWithin,
}

impl WindowOp {
    pub fn label(&self) -> &'static str {
        match self {
            WindowOp::Within => "Within",
            WindowOp::NotWithin => "Not Within",
        }
    }
}

/// Calendar unit of a relative date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum WindowUnit {
    Days,
    Months,
    Years,
}

impl WindowUnit {
    pub fn label(&self) -> &'static str {
        match self {
            WindowUnit::Days => "DAYS",
            WindowUnit::Months => "MONTHS",
            WindowUnit::Years => "YEARS",
        }
    }

    /// Case-insensitive lookup of a unit label.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_uppercase().as_str() {
            "DAYS" => Some(WindowUnit::Days),
            "MONTHS" => Some(WindowUnit::Months),
            "YEARS" => Some(WindowUnit::Years),
            _ => None,
        }
    }
}

/// Typed condition / decision trigger.
///
/// Each variant corresponds to one row of the string grammar; [`Expr::parse`] turns a token into a
/// variant for a given subject type and `Display` writes the canonical token back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Expr {
    TextEquals {
        value: String,
    },
    IntegerCompare {
        operator: CompareOp,
        value: i64,
    },
    DateWindow {
        operator: WindowOp,
        amount: u32,
        unit: WindowUnit,
    },
    PicklistEquals {
        option: String,
    },
    /// Token that did not parse for its subject type. Never matches.
    Malformed {
        raw: String,
    },
}

/// Reasons a token does not fit the grammar of its subject type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    #[error("expression is empty")]
    Empty,
    #[error("expected '= <option>', got '{0}'")]
    MissingEqualsPrefix(String),
    #[error("unknown comparison operator '{0}'")]
    UnknownOperator(String),
    #[error("'{0}' is not a whole number")]
    InvalidNumber(String),
    #[error("expected 'Within' or 'Not Within' in '{0}'")]
    UnknownWindowOperator(String),
    #[error("unknown window unit '{0}'")]
    UnknownUnit(String),
    #[error("expected {expected}, got '{raw}'")]
    Shape { expected: &'static str, raw: String },
}

const EQUALS_PREFIX: &str = "= ";

impl Expr {
    /// Parses `token` using the grammar of `kind`.
    pub fn parse(kind: QuestionType, token: &str) -> Result<Self, ExprError> {
        match kind {
            QuestionType::Text => parse_text(token),
            QuestionType::Integer => parse_integer(token),
            QuestionType::Date => parse_date_window(token),
            QuestionType::Picklist => parse_picklist(token),
        }
    }

    /// Like [`Expr::parse`] but keeps unparseable tokens as [`Expr::Malformed`].
    pub fn parse_lenient(kind: QuestionType, token: &str) -> Self {
        Self::parse(kind, token).unwrap_or_else(|_| Expr::Malformed {
            raw: token.to_string(),
        })
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Expr::Malformed { .. })
    }

    /// Whether the variant belongs to the grammar of `kind`.
    pub fn fits(&self, kind: QuestionType) -> bool {
        matches!(
            (kind, self),
            (QuestionType::Text, Expr::TextEquals { .. })
                | (QuestionType::Integer, Expr::IntegerCompare { .. })
                | (QuestionType::Date, Expr::DateWindow { .. })
                | (QuestionType::Picklist, Expr::PicklistEquals { .. })
        )
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::TextEquals { value } => {
                // A leading "= " is stripped on parse, so it has to be doubled here.
                if value.starts_with(EQUALS_PREFIX) {
                    write!(f, "{}{}", EQUALS_PREFIX, value)
                } else {
                    f.write_str(value)
                }
            }
            Expr::IntegerCompare { operator, value } => {
                write!(f, "{} {}", operator.symbol(), value)
            }
            Expr::DateWindow {
                operator,
                amount,
                unit,
            } => write!(f, "{} {} {}", operator.label(), amount, unit.label()),
            Expr::PicklistEquals { option } => write!(f, "{}{}", EQUALS_PREFIX, option),
            Expr::Malformed { raw } => f.write_str(raw),
        }
    }
}

fn parse_text(token: &str) -> Result<Expr, ExprError> {
    let value = token.strip_prefix(EQUALS_PREFIX).unwrap_or(token);
    if value.is_empty() {
        return Err(ExprError::Empty);
    }
    Ok(Expr::TextEquals {
        value: value.to_string(),
    })
}

fn parse_picklist(token: &str) -> Result<Expr, ExprError> {
    if token.trim().is_empty() {
        return Err(ExprError::Empty);
    }
    let option = token
        .strip_prefix(EQUALS_PREFIX)
        .ok_or_else(|| ExprError::MissingEqualsPrefix(token.to_string()))?;
    if option.is_empty() {
        return Err(ExprError::Empty);
    }
    Ok(Expr::PicklistEquals {
        option: option.to_string(),
    })
}

fn parse_integer(token: &str) -> Result<Expr, ExprError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(ExprError::Empty);
    }
    let (symbol, threshold) = token.split_once(' ').ok_or_else(|| ExprError::Shape {
        expected: "'<op> <int>'",
        raw: token.to_string(),
    })?;
    let operator =
        CompareOp::from_symbol(symbol).ok_or_else(|| ExprError::UnknownOperator(symbol.into()))?;
    let value = threshold
        .parse::<i64>()
        .map_err(|_| ExprError::InvalidNumber(threshold.to_string()))?;
    Ok(Expr::IntegerCompare { operator, value })
}

fn parse_date_window(token: &str) -> Result<Expr, ExprError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(ExprError::Empty);
    }
    let (operator, rest) = if let Some(rest) = token.strip_prefix("Not Within ") {
        (WindowOp::NotWithin, rest)
    } else if let Some(rest) = token.strip_prefix("Within ") {
        (WindowOp::Within, rest)
    } else {
        return Err(ExprError::UnknownWindowOperator(token.to_string()));
    };
    let (amount, unit) = rest.split_once(' ').ok_or_else(|| ExprError::Shape {
        expected: "'<Within|Not Within> <int> <DAYS|MONTHS|YEARS>'",
        raw: token.to_string(),
    })?;
    let amount = amount
        .parse::<u32>()
        .map_err(|_| ExprError::InvalidNumber(amount.to_string()))?;
    let unit = WindowUnit::from_label(unit).ok_or_else(|| ExprError::UnknownUnit(unit.into()))?;
    Ok(Expr::DateWindow {
        operator,
        amount,
        unit,
    })
}
