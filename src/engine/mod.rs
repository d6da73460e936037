// ABOUTME: Process execution manager for rendered command templates
// ABOUTME: Tracks runs, streams their output and handles cancellation

pub mod error;
pub mod events;
pub mod manager;
pub mod process;
pub mod result;

pub use error::{ExecutionError, Result};
pub use events::{EngineEvent, OutputChunk, OutputStream};
pub use manager::{ExecutionConfig, RunManager};
pub use result::{RunId, RunSnapshot, RunStatus};
