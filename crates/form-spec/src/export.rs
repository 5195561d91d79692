use crate::expr::Expr;
use crate::spec::form::FormSpec;
use crate::spec::question::{ConditionGroup, QuestionSpec, QuestionType};

/// Title of the single exported sheet.
pub const SHEET_NAME: &str = "Questions";

/// Column headers written on the second row.
pub const HEADERS: [&str; 7] = [
    "Question",
    "Type",
    "Attribute",
    "Condition",
    "Required",
    "Option/Value",
    "Decision",
];

/// Tabular export of a form definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

/// Lays out the form as rows: form name, header, then one row per decision or option.
///
/// Picklists with options get one row per option listing the outcomes bound to it; every other
/// question gets one row per decision. Questions with neither produce no rows.
pub fn export_sheet(spec: &FormSpec) -> Sheet {
    let mut rows = vec![
        vec!["Form Name".to_string(), spec.name.clone()],
        HEADERS.iter().map(|header| header.to_string()).collect(),
    ];

    for question in &spec.questions {
        let base = base_row(question);
        if question.kind == QuestionType::Picklist && !question.options.is_empty() {
            for option in &question.options {
                let outcomes = question
                    .decisions
                    .iter()
                    .filter(|decision| {
                        matches!(&decision.condition, Expr::PicklistEquals { option: bound } if bound == option)
                    })
                    .map(|decision| decision.outcome.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                rows.push(with_cells(&base, option.clone(), outcomes));
            }
        } else {
            for decision in &question.decisions {
                rows.push(with_cells(
                    &base,
                    decision.condition.to_string(),
                    decision.outcome.as_str().to_string(),
                ));
            }
        }
    }

    Sheet {
        name: SHEET_NAME.to_string(),
        rows,
    }
}

fn base_row(question: &QuestionSpec) -> Vec<String> {
    vec![
        question.wording.clone(),
        question.kind.as_str().to_string(),
        question.attribute.clone(),
        question
            .condition_group
            .as_ref()
            .map(describe_conditions)
            .unwrap_or_default(),
        if question.required { "Yes" } else { "No" }.to_string(),
    ]
}

fn with_cells(base: &[String], value: String, decision: String) -> Vec<String> {
    let mut row = base.to_vec();
    row.push(value);
    row.push(decision);
    row
}

/// `attr expr` pairs joined by the group's logic keyword.
pub fn describe_conditions(group: &ConditionGroup) -> String {
    group
        .conditions
        .iter()
        .map(|condition| format!("{} {}", condition.attribute_name, condition.expression))
        .collect::<Vec<_>>()
        .join(&format!(" {} ", group.logic.as_str()))
}

/// File name used for the export of `form_name`.
pub fn export_file_name(form_name: &str) -> String {
    let slug = form_name
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");
    format!("{}-questions.csv", slug)
}

impl Sheet {
    /// Renders the rows as RFC 4180 CSV.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        for row in &self.rows {
            let line = row
                .iter()
                .map(|cell| csv_cell(cell))
                .collect::<Vec<_>>()
                .join(",");
            out.push_str(&line);
            out.push_str("\r\n");
        }
        out
    }
}

fn csv_cell(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_is_slugged() {
        assert_eq!(
            export_file_name("Home  Insurance Form"),
            "home-insurance-form-questions.csv"
        );
    }

    #[test]
    fn cells_with_separators_are_quoted() {
        let sheet = Sheet {
            name: SHEET_NAME.into(),
            rows: vec![vec!["a,b".into(), "say \"hi\"".into(), "plain".into()]],
        };
        assert_eq!(sheet.to_csv(), "\"a,b\",\"say \"\"hi\"\"\",plain\r\n");
    }
}
