// ABOUTME: Error types for the process execution manager
// ABOUTME: Covers spawn failures, run lookups and invalid run state transitions

use thiserror::Error;

use super::result::{RunId, RunStatus};
use crate::template::ValidationFailure;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    #[error("Failed to start command '{command_id}': {message}")]
    ExecutionStartError { command_id: String, message: String },

    #[error("Run not found: {run_id}")]
    RunNotFound { run_id: RunId },

    #[error("Run {run_id} is not active (status: {status})")]
    RunNotActive { run_id: RunId, status: RunStatus },

    #[error("Run {run_id} is still active")]
    RunStillActive { run_id: RunId },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExecutionError>;
