// ABOUTME: Renders a command template into a shell-safe command line
// ABOUTME: Validates and coerces inputs, substitutes placeholders and builds flag arguments

use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use super::error::{FieldError, Result, ValidationFailure};
use super::escape;
use super::placeholder::{self, Context, Segment};
use super::value::{coerce, InputValues, ResolvedValue};
use crate::parser::model::{Command, VariableDefinition};

/// Output of a successful render.
///
/// `command_line` is a complete POSIX shell command in which every
/// substituted value is escaped for where it sits: a bare placeholder
/// becomes one quoted word, a quoted one stays inside its quotes. `extra_args` are raw (unquoted)
/// words for variables rendered as flags only; they reach the shell as
/// positional parameters, never as script text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedCommand {
    pub command_id: String,
    pub command_line: String,
    pub extra_args: Vec<String>,
}

impl RenderedCommand {
    /// Copy-pasteable preview of what will run
    pub fn display(&self) -> String {
        if self.extra_args.is_empty() {
            self.command_line.clone()
        } else {
            format!("{} {}", self.command_line, escape::join(&self.extra_args))
        }
    }

    /// Script passed to `sh -c`; extra args are appended through `"$@"`.
    pub fn script(&self) -> String {
        if self.extra_args.is_empty() {
            self.command_line.clone()
        } else {
            format!("{} \"$@\"", self.command_line)
        }
    }

    /// Full argv for `shell`: `[shell, -c, script, cliq, extra_args...]`
    pub fn shell_argv(&self, shell: &str) -> Vec<String> {
        let mut argv = vec![shell.to_string(), "-c".to_string(), self.script()];
        if !self.extra_args.is_empty() {
            argv.push("cliq".to_string());
            argv.extend(self.extra_args.iter().cloned());
        }
        argv
    }
}

/// Stateless renderer for command templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateEngine;

impl TemplateEngine {
    pub fn new() -> Self {
        Self
    }

    /// Validate `values` against `command` and render it.
    ///
    /// Every problem found is reported at once in the returned
    /// `ValidationFailure`. Rendering is a single pass over the original
    /// template text, so a value containing `{{...}}` is never expanded.
    pub fn render(&self, command: &Command, values: &InputValues) -> Result<RenderedCommand> {
        let segments = placeholder::parse(&command.command);
        let referenced = placeholder::referenced_names(&command.command);
        let mut errors = Vec::new();

        for name in &referenced {
            if !command.has_variable(name) {
                errors.push(FieldError::UnknownVariableReference {
                    name: name.to_string(),
                });
            }
        }

        let mut unknown: Vec<&String> = values
            .keys()
            .filter(|key| !command.has_variable(key))
            .collect();
        unknown.sort();
        errors.extend(unknown.into_iter().map(|name| FieldError::UnknownInput {
            name: name.clone(),
        }));

        let mut resolved: HashMap<&str, ResolvedValue> = HashMap::new();
        for variable in &command.variables {
            match coerce(variable, values.get(&variable.name)) {
                Ok(value) => {
                    if variable.required && value.is_absent() {
                        errors.push(FieldError::MissingRequiredVariable {
                            name: variable.name.clone(),
                        });
                    }
                    resolved.insert(variable.name.as_str(), value);
                }
                Err(error) => errors.push(error),
            }
        }

        let mut command_line = String::with_capacity(command.command.len());
        for segment in segments {
            match segment {
                Segment::Literal(text) => command_line.push_str(text),
                Segment::Placeholder { name, context } => {
                    if let (Some(variable), Some(value)) =
                        (command.get_variable(name), resolved.get(name))
                    {
                        match render_inline(variable, value, context) {
                            Some(text) => command_line.push_str(&text),
                            None => errors.push(FieldError::invalid(
                                name,
                                "line breaks are not allowed in a comment or here-document",
                            )),
                        }
                    }
                }
            }
        }

        if !errors.is_empty() {
            debug!(
                "Rendering '{}' rejected with {} error(s)",
                command.id,
                errors.len()
            );
            return Err(ValidationFailure::new(command.id.clone(), errors));
        }

        let extra_args = command
            .variables
            .iter()
            .filter(|variable| !referenced.contains(&variable.name.as_str()))
            .flat_map(|variable| match resolved.get(variable.name.as_str()) {
                Some(value) => flag_args(variable, value),
                None => Vec::new(),
            })
            .collect();

        Ok(RenderedCommand {
            command_id: command.id.clone(),
            command_line,
            extra_args,
        })
    }
}

fn render_inline(
    variable: &VariableDefinition,
    value: &ResolvedValue,
    context: Context,
) -> Option<String> {
    match (variable.flag(), value) {
        (_, ResolvedValue::Absent) | (Some(_), ResolvedValue::Switch(false)) => Some(String::new()),
        (Some(flag), ResolvedValue::Switch(true)) => escape::quote_in(flag, context),
        (None, ResolvedValue::Switch(on)) => Some(on.to_string()),
        (Some(flag), ResolvedValue::Text(text)) => Some(format!(
            "{} {}",
            escape::quote_in(flag, context)?,
            escape::quote_in(text, context)?
        )),
        (None, ResolvedValue::Text(text)) => escape::quote_in(text, context),
    }
}

fn flag_args(variable: &VariableDefinition, value: &ResolvedValue) -> Vec<String> {
    let Some(flag) = variable.flag() else {
        return Vec::new();
    };
    match value {
        ResolvedValue::Switch(true) => vec![flag.to_string()],
        ResolvedValue::Text(text) => vec![flag.to_string(), text.clone()],
        ResolvedValue::Switch(false) | ResolvedValue::Absent => Vec::new(),
    }
}
