// ABOUTME: Main library module for cliq command templates
// ABOUTME: Exports all core modules and provides the public API

pub mod cli;
pub mod engine;
pub mod output;
pub mod parser;
pub mod registry;
pub mod store;
pub mod template;

// Re-export commonly used types
pub use cli::{App, Args, Config};
pub use engine::{RunId, RunManager, RunSnapshot, RunStatus};
pub use output::OutputHandler;
pub use parser::{TemplateFile, TemplateParser, TemplateValidator};
pub use registry::TemplateRegistry;
pub use template::TemplateEngine;

// Error handling
pub type Result<T> = anyhow::Result<T>;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
