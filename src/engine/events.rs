// ABOUTME: Output chunks and engine-wide status events published by runs
// ABOUTME: Consumed by the registry's notification and live-output subscribers

use serde::Serialize;

use super::result::RunId;
use crate::template::ValidationFailure;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Process output as it arrives, decoded as UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputChunk {
    pub run_id: RunId,
    pub stream: OutputStream,
    pub data: String,
}

/// Run status transitions, for whoever presents notifications.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    RunStarted {
        run_id: RunId,
        template_id: String,
        command_id: String,
    },
    RunSucceeded {
        run_id: RunId,
    },
    RunFailed {
        run_id: RunId,
        exit_code: Option<i32>,
        error: String,
    },
    RunCancelled {
        run_id: RunId,
    },
    ValidationFailed {
        template_id: String,
        failure: ValidationFailure,
    },
}

impl EngineEvent {
    pub fn run_id(&self) -> Option<RunId> {
        match self {
            EngineEvent::RunStarted { run_id, .. }
            | EngineEvent::RunSucceeded { run_id }
            | EngineEvent::RunFailed { run_id, .. }
            | EngineEvent::RunCancelled { run_id } => Some(*run_id),
            EngineEvent::ValidationFailed { .. } => None,
        }
    }
}

/// Incremental UTF-8 decoder that holds back a multi-byte sequence split
/// across reads.
#[derive(Debug, Default)]
pub struct Utf8Chunker {
    pending: Vec<u8>,
}

impl Utf8Chunker {
    pub fn push(&mut self, bytes: &[u8]) -> Option<String> {
        self.pending.extend_from_slice(bytes);
        let valid = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            // Invalid bytes mid-stream: decode lossily and move on
            Err(_) => self.pending.len(),
        };
        if valid == 0 {
            return None;
        }
        let rest = self.pending.split_off(valid);
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending = rest;
        Some(text)
    }

    /// Whatever is left once the stream closes
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            let text = String::from_utf8_lossy(&self.pending).into_owned();
            self.pending.clear();
            Some(text)
        }
    }
}
