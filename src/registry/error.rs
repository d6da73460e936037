// ABOUTME: Error types surfaced by the template registry API
// ABOUTME: Wraps store, parser, validation and execution failures for callers

use thiserror::Error;

use crate::engine::ExecutionError;
use crate::parser::ParserError;
use crate::store::StoreError;
use crate::template::ValidationFailure;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Parser(#[from] ParserError),

    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("Command '{command_id}' not found in template '{template_id}'")]
    CommandNotFound {
        template_id: String,
        command_id: String,
    },
}

impl RegistryError {
    /// Field-level problems, when the error came from input validation
    pub fn validation_failure(&self) -> Option<&ValidationFailure> {
        match self {
            RegistryError::Validation(failure) => Some(failure),
            RegistryError::Execution(ExecutionError::Validation(failure)) => Some(failure),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
