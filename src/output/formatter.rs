// ABOUTME: Output formatters for run results (JSON, YAML, text)
// ABOUTME: Presents run snapshots and validation failures to the CLI user

use serde_json::{Map, Value as JsonValue};

use super::error::{OutputError, Result};
use crate::engine::{RunSnapshot, RunStatus};
use crate::template::ValidationFailure;

/// What to include when presenting a run.
#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub include_output: bool,
    pub include_timestamps: bool,
    pub pretty_print: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            include_output: true,
            include_timestamps: true,
            pretty_print: true,
        }
    }
}

pub trait OutputFormatter: Send + Sync {
    fn format_run(&self, run: &RunSnapshot, options: &OutputOptions) -> Result<String>;

    fn format_failure(&self, failure: &ValidationFailure, options: &OutputOptions) -> Result<String>;
}

pub struct JsonFormatter;

pub struct YamlFormatter;

pub struct TextFormatter;

/// Run fields shared by the structured formats
fn run_value(run: &RunSnapshot, options: &OutputOptions) -> Result<JsonValue> {
    let mut output = Map::new();
    output.insert("run_id".to_string(), JsonValue::String(run.run_id.to_string()));
    output.insert("template_id".to_string(), JsonValue::String(run.template_id.clone()));
    output.insert("command_id".to_string(), JsonValue::String(run.command_id.clone()));
    output.insert("command_line".to_string(), JsonValue::String(run.command_line.clone()));
    output.insert("status".to_string(), JsonValue::String(run.status.to_string()));
    output.insert("exit_code".to_string(), serde_json::to_value(run.exit_code)?);

    if options.include_timestamps {
        output.insert(
            "start_time".to_string(),
            JsonValue::String(run.start_time.to_rfc3339()),
        );
        if let Some(end_time) = run.end_time {
            output.insert("end_time".to_string(), JsonValue::String(end_time.to_rfc3339()));
        }
        if let Some(duration) = run.duration {
            if let Some(seconds) = serde_json::Number::from_f64(duration.as_secs_f64()) {
                output.insert("duration_seconds".to_string(), JsonValue::Number(seconds));
            }
        }
    }

    if options.include_output {
        output.insert("stdout".to_string(), JsonValue::String(run.stdout.clone()));
        output.insert("stderr".to_string(), JsonValue::String(run.stderr.clone()));
    }

    if let Some(ref error) = run.error {
        output.insert("error".to_string(), JsonValue::String(error.clone()));
    }

    Ok(JsonValue::Object(output))
}

impl OutputFormatter for JsonFormatter {
    fn format_run(&self, run: &RunSnapshot, options: &OutputOptions) -> Result<String> {
        let value = run_value(run, options)?;
        if options.pretty_print {
            serde_json::to_string_pretty(&value).map_err(OutputError::SerializationError)
        } else {
            serde_json::to_string(&value).map_err(OutputError::SerializationError)
        }
    }

    fn format_failure(&self, failure: &ValidationFailure, options: &OutputOptions) -> Result<String> {
        if options.pretty_print {
            Ok(serde_json::to_string_pretty(failure)?)
        } else {
            Ok(serde_json::to_string(failure)?)
        }
    }
}

impl OutputFormatter for YamlFormatter {
    fn format_run(&self, run: &RunSnapshot, options: &OutputOptions) -> Result<String> {
        Ok(serde_yaml::to_string(&run_value(run, options)?)?)
    }

    fn format_failure(&self, failure: &ValidationFailure, _options: &OutputOptions) -> Result<String> {
        Ok(serde_yaml::to_string(failure)?)
    }
}

impl OutputFormatter for TextFormatter {
    fn format_run(&self, run: &RunSnapshot, options: &OutputOptions) -> Result<String> {
        let mut output = String::new();

        let icon = match run.status {
            RunStatus::Succeeded => "✓",
            RunStatus::Failed => "✗",
            RunStatus::Cancelled => "⊘",
            RunStatus::Pending | RunStatus::Running => "…",
        };
        output.push_str(&format!(
            "{} {}/{} ({})\n",
            icon, run.template_id, run.command_id, run.run_id
        ));
        output.push_str(&format!("  Command: {}\n", run.command_line));
        output.push_str(&format!("  Status: {}\n", run.status));
        if let Some(code) = run.exit_code {
            output.push_str(&format!("  Exit code: {}\n", code));
        }

        if options.include_timestamps {
            output.push_str(&format!(
                "  Started: {}\n",
                run.start_time.format("%Y-%m-%d %H:%M:%S UTC")
            ));
            if let Some(duration) = run.duration {
                output.push_str(&format!("  Duration: {:.2}s\n", duration.as_secs_f64()));
            }
        }

        if let Some(ref error) = run.error {
            output.push_str(&format!("  Error: {}\n", error));
        }

        if options.include_output {
            for (label, text) in [("Stdout", &run.stdout), ("Stderr", &run.stderr)] {
                if text.trim().is_empty() {
                    continue;
                }
                output.push_str(&format!("  {}:\n", label));
                for line in text.lines() {
                    output.push_str(&format!("    {}\n", line));
                }
            }
        }

        Ok(output)
    }

    fn format_failure(&self, failure: &ValidationFailure, _options: &OutputOptions) -> Result<String> {
        Ok(format!("{}\n", failure))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RunId;
    use crate::template::FieldError;

    fn finished_run() -> RunSnapshot {
        let mut run = RunSnapshot::new(RunId::new(), "net", "ping", "ping -c 1 example.com");
        run.mark_started(Some(7));
        run.stdout = "PING example.com\n1 packets transmitted\n".to_string();
        run.mark_completed(RunStatus::Succeeded, Some(0), None);
        run
    }

    #[test]
    fn test_json_run_contains_status_and_output() {
        let text = JsonFormatter
            .format_run(&finished_run(), &OutputOptions::default())
            .unwrap();
        let value: JsonValue = serde_json::from_str(&text).unwrap();
        assert_eq!(value["status"], "succeeded");
        assert_eq!(value["exit_code"], 0);
        assert!(value["stdout"].as_str().unwrap().contains("PING"));
    }

    #[test]
    fn test_options_drop_output_and_timestamps() {
        let options = OutputOptions {
            include_output: false,
            include_timestamps: false,
            pretty_print: false,
        };
        let text = JsonFormatter.format_run(&finished_run(), &options).unwrap();
        let value: JsonValue = serde_json::from_str(&text).unwrap();
        assert!(value.get("stdout").is_none());
        assert!(value.get("start_time").is_none());
    }

    #[test]
    fn test_yaml_run() {
        let text = YamlFormatter
            .format_run(&finished_run(), &OutputOptions::default())
            .unwrap();
        assert!(text.contains("status: succeeded"));
    }

    #[test]
    fn test_text_run() {
        let text = TextFormatter
            .format_run(&finished_run(), &OutputOptions::default())
            .unwrap();
        assert!(text.starts_with("✓ net/ping"));
        assert!(text.contains("    1 packets transmitted"));
    }

    #[test]
    fn test_failure_formats() {
        let failure = ValidationFailure::new(
            "ping",
            vec![FieldError::MissingRequiredVariable {
                name: "target".to_string(),
            }],
        );
        let json = JsonFormatter
            .format_failure(&failure, &OutputOptions::default())
            .unwrap();
        let value: JsonValue = serde_json::from_str(&json).unwrap();
        assert_eq!(value["errors"][0]["kind"], "missing_required_variable");

        let text = TextFormatter
            .format_failure(&failure, &OutputOptions::default())
            .unwrap();
        assert!(text.contains("missing required variable 'target'"));
    }
}
