// ABOUTME: Type coercion of raw user input against variable definitions
// ABOUTME: Turns form values into typed resolved values or field-level errors

use serde_json::Value as JsonValue;
use std::collections::HashMap;

use super::error::FieldError;
use crate::parser::model::{VariableDefinition, VariableKind};

/// Raw values keyed by variable name, as submitted by a form or the CLI.
pub type InputValues = HashMap<String, JsonValue>;

/// Build input values from plain `key=value` strings
pub fn input_values_from_strings(pairs: HashMap<String, String>) -> InputValues {
    pairs
        .into_iter()
        .map(|(k, v)| (k, JsonValue::String(v)))
        .collect()
}

/// A variable's value after coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedValue {
    Absent,
    Text(String),
    Switch(bool),
}

impl ResolvedValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, ResolvedValue::Absent)
    }
}

/// Coerce the raw value supplied for `definition`.
///
/// Missing keys, `null` and blank strings all count as absent; declared
/// defaults apply only then.
pub fn coerce(
    definition: &VariableDefinition,
    raw: Option<&JsonValue>,
) -> Result<ResolvedValue, FieldError> {
    let name = definition.name.as_str();
    let raw = raw.filter(|value| !is_empty(value));

    match &definition.kind {
        VariableKind::Boolean(options) => match raw {
            None => Ok(ResolvedValue::Switch(options.default.unwrap_or(false))),
            Some(value) => parse_bool(value)
                .map(ResolvedValue::Switch)
                .ok_or_else(|| FieldError::invalid(name, format!("'{}' is not a boolean", display(value)))),
        },

        VariableKind::String(options) => match raw {
            None => Ok(options
                .default
                .clone()
                .map(ResolvedValue::Text)
                .unwrap_or(ResolvedValue::Absent)),
            Some(value) => scalar_text(value)
                .map(ResolvedValue::Text)
                .ok_or_else(|| FieldError::invalid(name, "expected a text value")),
        },

        VariableKind::Number(options) => {
            let (number, text) = match raw {
                None => match options.default {
                    Some(default) => (default, format_number(default)),
                    None => return Ok(ResolvedValue::Absent),
                },
                Some(JsonValue::Number(n)) => {
                    let number = n
                        .as_f64()
                        .ok_or_else(|| FieldError::invalid(name, "number out of range"))?;
                    (number, n.to_string())
                }
                Some(JsonValue::String(s)) => {
                    let trimmed = s.trim();
                    let number = trimmed.parse::<f64>().map_err(|_| {
                        FieldError::invalid(name, format!("'{}' is not a number", trimmed))
                    })?;
                    (number, trimmed.to_string())
                }
                Some(other) => {
                    return Err(FieldError::invalid(
                        name,
                        format!("'{}' is not a number", display(other)),
                    ))
                }
            };

            if !number.is_finite() {
                return Err(FieldError::invalid(name, "number must be finite"));
            }
            if let Some(min) = options.min {
                if number < min {
                    return Err(FieldError::invalid(
                        name,
                        format!("{} is below the minimum {}", text, format_number(min)),
                    ));
                }
            }
            if let Some(max) = options.max {
                if number > max {
                    return Err(FieldError::invalid(
                        name,
                        format!("{} is above the maximum {}", text, format_number(max)),
                    ));
                }
            }
            Ok(ResolvedValue::Text(text))
        }

        VariableKind::Select(options) => {
            let value = match raw {
                None => match options.default {
                    Some(ref default) => default.clone(),
                    None => return Ok(ResolvedValue::Absent),
                },
                Some(value) => scalar_text(value)
                    .ok_or_else(|| FieldError::invalid(name, "expected one of the choices"))?,
            };
            if options.contains(&value) {
                Ok(ResolvedValue::Text(value))
            } else {
                Err(FieldError::invalid(
                    name,
                    format!(
                        "'{}' is not one of: {}",
                        value,
                        options.values().join(", ")
                    ),
                ))
            }
        }

        VariableKind::File(_) => match raw {
            None => Ok(ResolvedValue::Absent),
            Some(JsonValue::String(path)) => Ok(ResolvedValue::Text(path.clone())),
            Some(_) => Err(FieldError::invalid(name, "expected a file path")),
        },
    }
}

fn is_empty(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn parse_bool(value: &JsonValue) -> Option<bool> {
    match value {
        JsonValue::Bool(b) => Some(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        JsonValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn scalar_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn display(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Whole numbers print without a fractional part
pub fn format_number(number: f64) -> String {
    if number.fract() == 0.0 && number.abs() < 1e15 {
        format!("{}", number as i64)
    } else {
        number.to_string()
    }
}
