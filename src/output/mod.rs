// ABOUTME: Output handler module for run result formatting
// ABOUTME: Selects a formatter by name and renders runs and validation failures

pub mod error;
pub mod formatter;

use std::collections::HashMap;

pub use self::error::{OutputError, Result};
pub use self::formatter::{
    JsonFormatter, OutputFormatter, OutputOptions, TextFormatter, YamlFormatter,
};
use crate::engine::RunSnapshot;
use crate::template::ValidationFailure;

pub struct OutputHandler {
    formatters: HashMap<String, Box<dyn OutputFormatter>>,
}

impl Default for OutputHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputHandler {
    pub fn new() -> Self {
        let mut handler = Self {
            formatters: HashMap::new(),
        };

        handler.register_formatter("json", Box::new(JsonFormatter));
        handler.register_formatter("yaml", Box::new(YamlFormatter));
        handler.register_formatter("text", Box::new(TextFormatter));

        handler
    }

    pub fn register_formatter(&mut self, name: &str, formatter: Box<dyn OutputFormatter>) {
        self.formatters.insert(name.to_string(), formatter);
    }

    pub fn formats(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.formatters.keys().map(String::as_str).collect();
        names.sort();
        names
    }

    fn formatter(&self, format: &str) -> Result<&dyn OutputFormatter> {
        self.formatters
            .get(format)
            .map(|f| f.as_ref())
            .ok_or_else(|| OutputError::FormatterNotFound {
                format: format.to_string(),
            })
    }

    pub fn format_run(&self, format: &str, run: &RunSnapshot, options: &OutputOptions) -> Result<String> {
        self.formatter(format)?.format_run(run, options)
    }

    pub fn format_failure(
        &self,
        format: &str,
        failure: &ValidationFailure,
        options: &OutputOptions,
    ) -> Result<String> {
        self.formatter(format)?.format_failure(failure, options)
    }
}
