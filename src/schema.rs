//! Structural contract for analysis payloads.
//!
//! The contract is a table of named fields with their kinds. Validation walks
//! the table and reports every violation with the offending field path, then
//! converts the checked value into an [`AppAnalysis`]. Values are never
//! coerced: `"15"` is not a score.

use serde_json::Value;

use crate::model::{AppAnalysis, MAX_SCORE, MAX_SUMMARY_CHARS, MIN_SCORE, RiskLevel};

#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    Text { non_empty: bool, max_chars: Option<usize> },
    Integer { min: i64, max: i64 },
    OneOf(&'static [&'static str]),
    TextList,
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
}

pub const APP_ANALYSIS_FIELDS: &[Field] = &[
    Field { name: "appName", kind: FieldKind::Text { non_empty: true, max_chars: None } },
    Field { name: "score", kind: FieldKind::Integer { min: MIN_SCORE, max: MAX_SCORE } },
    Field { name: "riskLevel", kind: FieldKind::OneOf(RiskLevel::NAMES) },
    Field { name: "countryOfOrigin", kind: FieldKind::Text { non_empty: false, max_chars: None } },
    Field { name: "shareholders", kind: FieldKind::TextList },
    Field { name: "positivePoints", kind: FieldKind::TextList },
    Field { name: "negativePoints", kind: FieldKind::TextList },
    Field {
        name: "summary",
        kind: FieldKind::Text { non_empty: false, max_chars: Some(MAX_SUMMARY_CHARS) },
    },
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    #[error("expected an object, found {found}")]
    NotAnObject { found: &'static str },

    #[error("required field is missing")]
    Missing,

    #[error("expected {expected}, found {found}")]
    WrongType { expected: &'static str, found: &'static str },

    #[error("must not be empty")]
    Empty,

    #[error("{actual} is outside [{min}, {max}]")]
    OutOfRange { min: i64, max: i64, actual: String },

    #[error("'{actual}' is not one of {}", .allowed.join(", "))]
    NotAllowed { allowed: &'static [&'static str], actual: String },

    #[error("{actual} characters exceeds the maximum of {max}")]
    TooLong { max: usize, actual: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{path}: {violation}")]
pub struct FieldViolation {
    /// Dotted path of the offending value; `$` is the document root.
    pub path: String,
    pub violation: Violation,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", join_violations(.violations))]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

impl ValidationError {
    pub fn fields(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.path.as_str()).collect()
    }
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn check_field(field: &Field, value: &Value, out: &mut Vec<FieldViolation>) {
    let mut push = |path: String, violation: Violation| out.push(FieldViolation { path, violation });

    match field.kind {
        FieldKind::Text { non_empty, max_chars } => {
            let Some(text) = value.as_str() else {
                push(
                    field.name.to_string(),
                    Violation::WrongType { expected: "string", found: type_name(value) },
                );
                return;
            };
            if non_empty && text.trim().is_empty() {
                push(field.name.to_string(), Violation::Empty);
            }
            if let Some(max) = max_chars {
                let actual = text.chars().count();
                if actual > max {
                    push(field.name.to_string(), Violation::TooLong { max, actual });
                }
            }
        }
        FieldKind::Integer { min, max } => match value {
            Value::Number(n) => match n.as_i64() {
                Some(actual) if (min..=max).contains(&actual) => {}
                Some(actual) => push(
                    field.name.to_string(),
                    Violation::OutOfRange { min, max, actual: actual.to_string() },
                ),
                // u64 beyond i64 is out of range, fractions are not integers
                None if n.is_u64() => push(
                    field.name.to_string(),
                    Violation::OutOfRange { min, max, actual: n.to_string() },
                ),
                None => push(
                    field.name.to_string(),
                    Violation::WrongType { expected: "integer", found: "fractional number" },
                ),
            },
            other => push(
                field.name.to_string(),
                Violation::WrongType { expected: "integer", found: type_name(other) },
            ),
        },
        FieldKind::OneOf(allowed) => match value.as_str() {
            Some(text) if allowed.contains(&text) => {}
            Some(text) => push(
                field.name.to_string(),
                Violation::NotAllowed { allowed, actual: text.to_string() },
            ),
            None => push(
                field.name.to_string(),
                Violation::WrongType { expected: "string", found: type_name(value) },
            ),
        },
        FieldKind::TextList => {
            let Some(items) = value.as_array() else {
                push(
                    field.name.to_string(),
                    Violation::WrongType { expected: "array of strings", found: type_name(value) },
                );
                return;
            };
            for (index, item) in items.iter().enumerate() {
                if !item.is_string() {
                    push(
                        format!("{}[{index}]", field.name),
                        Violation::WrongType { expected: "string", found: type_name(item) },
                    );
                }
            }
        }
    }
}

/// Checks `value` against a field table, collecting every violation.
pub fn check(fields: &[Field], value: &Value) -> Result<(), ValidationError> {
    let Some(object) = value.as_object() else {
        return Err(ValidationError {
            violations: vec![FieldViolation {
                path: "$".to_string(),
                violation: Violation::NotAnObject { found: type_name(value) },
            }],
        });
    };

    let mut violations = Vec::new();
    for field in fields {
        match object.get(field.name) {
            Some(v) => check_field(field, v, &mut violations),
            None => violations.push(FieldViolation {
                path: field.name.to_string(),
                violation: Violation::Missing,
            }),
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { violations })
    }
}

/// Validates an untyped payload into an [`AppAnalysis`].
pub fn validate(value: &Value) -> Result<AppAnalysis, ValidationError> {
    check(APP_ANALYSIS_FIELDS, value)?;

    // Unknown keys are dropped by the typed conversion.
    serde_json::from_value(value.clone()).map_err(|e| ValidationError {
        violations: vec![FieldViolation {
            path: "$".to_string(),
            violation: Violation::WrongType {
                expected: "analysis object",
                found: if e.is_data() { "incompatible data" } else { "unreadable data" },
            },
        }],
    })
}
