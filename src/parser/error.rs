// ABOUTME: Error types for template file parsing, migration and validation
// ABOUTME: Defines load-time failures that reject a template file as a whole

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Failed to read template file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Malformed template: {field}: {reason}")]
    MalformedTemplate { field: String, reason: String },

    #[error("Unsupported cliq_template_version '{version}' (supported: {supported:?})")]
    UnsupportedSchemaVersion {
        version: String,
        supported: Vec<&'static str>,
    },
}

impl ParserError {
    pub fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ParserError::MalformedTemplate {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn missing(field: impl Into<String>) -> Self {
        Self::malformed(field, "missing required field")
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("missing required field")]
    MissingField { field: String },

    #[error("duplicate command id '{id}'")]
    DuplicateCommandId { field: String, id: String },

    #[error("duplicate variable name '{name}'")]
    DuplicateVariable { field: String, name: String },

    #[error("placeholder '{{{{{name}}}}}' references an undeclared variable")]
    UnknownPlaceholder { field: String, name: String },

    #[error("invalid options: {reason}")]
    InvalidOptions { field: String, reason: String },
}

impl ValidationError {
    pub fn field(&self) -> &str {
        match self {
            ValidationError::MissingField { field }
            | ValidationError::DuplicateCommandId { field, .. }
            | ValidationError::DuplicateVariable { field, .. }
            | ValidationError::UnknownPlaceholder { field, .. }
            | ValidationError::InvalidOptions { field, .. } => field,
        }
    }
}

impl From<ValidationError> for ParserError {
    fn from(error: ValidationError) -> Self {
        ParserError::malformed(error.field().to_string(), error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ParserError>;
