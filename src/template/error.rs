// ABOUTME: Error types for variable resolution and command rendering
// ABOUTME: Field-level errors are aggregated into one ValidationFailure per request

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// A single problem with one variable's value.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldError {
    #[error("placeholder '{{{{{name}}}}}' references an undeclared variable")]
    UnknownVariableReference { name: String },

    #[error("invalid value for '{name}': {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("missing required variable '{name}'")]
    MissingRequiredVariable { name: String },

    #[error("'{name}' is not a variable of this command")]
    UnknownInput { name: String },
}

impl FieldError {
    pub fn name(&self) -> &str {
        match self {
            FieldError::UnknownVariableReference { name }
            | FieldError::InvalidValue { name, .. }
            | FieldError::MissingRequiredVariable { name }
            | FieldError::UnknownInput { name } => name,
        }
    }

    pub fn invalid(name: &str, reason: impl Into<String>) -> Self {
        FieldError::InvalidValue {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Every field-level error found while resolving one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationFailure {
    pub command_id: String,
    pub errors: Vec<FieldError>,
}

impl ValidationFailure {
    pub fn new(command_id: impl Into<String>, errors: Vec<FieldError>) -> Self {
        Self {
            command_id: command_id.into(),
            errors,
        }
    }

    /// Names of variables that were required but empty
    pub fn missing_variables(&self) -> Vec<&str> {
        self.errors
            .iter()
            .filter(|e| matches!(e, FieldError::MissingRequiredVariable { .. }))
            .map(FieldError::name)
            .collect()
    }

    pub fn has_error_for(&self, name: &str) -> bool {
        self.errors.iter().any(|e| e.name() == name)
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} validation error(s) for command '{}'",
            self.errors.len(),
            self.command_id
        )?;
        for error in &self.errors {
            write!(f, "\n  - {}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationFailure {}

pub type Result<T> = std::result::Result<T, ValidationFailure>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_lists_every_error() {
        let failure = ValidationFailure::new(
            "ping",
            vec![
                FieldError::MissingRequiredVariable {
                    name: "target".to_string(),
                },
                FieldError::invalid("count", "not a number"),
            ],
        );

        let text = failure.to_string();
        assert!(text.starts_with("2 validation error(s) for command 'ping'"));
        assert!(text.contains("missing required variable 'target'"));
        assert!(text.contains("invalid value for 'count': not a number"));
        assert_eq!(failure.missing_variables(), vec!["target"]);
        assert!(failure.has_error_for("count"));
    }

    #[test]
    fn test_unknown_reference_message() {
        let error = FieldError::UnknownVariableReference {
            name: "x".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "placeholder '{{x}}' references an undeclared variable"
        );
    }
}
