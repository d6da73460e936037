// ABOUTME: Structural validation of migrated template files
// ABOUTME: Checks ids, variable names, placeholder references and option consistency

use std::collections::HashSet;

use super::error::ValidationError;
use super::model::{Command, TemplateFile, VariableDefinition, VariableKind};
use crate::template::placeholder;

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<String>,
    pub is_valid: bool,
}

pub struct TemplateValidator {
    strict_mode: bool,
}

impl TemplateValidator {
    pub fn new() -> Self {
        Self { strict_mode: false }
    }

    /// In strict mode warnings are reported as errors
    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    /// Validate a complete template file
    pub fn validate(&self, template: &TemplateFile) -> ValidationReport {
        let mut report = ValidationReport::new();

        if template.name.trim().is_empty() {
            report.errors.push(ValidationError::MissingField {
                field: "name".to_string(),
            });
        }

        if template.cmds.is_empty() {
            report
                .warnings
                .push(format!("Template '{}' declares no commands", template.name));
        }

        let mut seen_ids = HashSet::new();
        for (index, command) in template.cmds.iter().enumerate() {
            let path = format!("cmds[{}]", index);
            if !seen_ids.insert(command.id.as_str()) {
                report.errors.push(ValidationError::DuplicateCommandId {
                    field: format!("{}.id", path),
                    id: command.id.clone(),
                });
            }
            self.validate_command(&path, command, &mut report);
        }

        if self.strict_mode && !report.warnings.is_empty() {
            for warning in report.warnings.drain(..) {
                report.errors.push(ValidationError::InvalidOptions {
                    field: "template".to_string(),
                    reason: warning,
                });
            }
        }

        report.is_valid = report.errors.is_empty();
        report
    }

    fn validate_command(&self, path: &str, command: &Command, report: &mut ValidationReport) {
        for (field, value) in [
            ("id", &command.id),
            ("name", &command.name),
            ("command", &command.command),
        ] {
            if value.trim().is_empty() {
                report.errors.push(ValidationError::MissingField {
                    field: format!("{}.{}", path, field),
                });
            }
        }

        let mut seen_names = HashSet::new();
        for (index, variable) in command.variables.iter().enumerate() {
            let var_path = format!("{}.variables[{}]", path, index);
            if variable.name.trim().is_empty() {
                report.errors.push(ValidationError::MissingField {
                    field: format!("{}.name", var_path),
                });
            } else if !seen_names.insert(variable.name.as_str()) {
                report.errors.push(ValidationError::DuplicateVariable {
                    field: format!("{}.name", var_path),
                    name: variable.name.clone(),
                });
            }
            if let Err(reason) = check_options(variable) {
                report.errors.push(ValidationError::InvalidOptions {
                    field: format!("{}.options", var_path),
                    reason,
                });
            }
        }

        let referenced = placeholder::referenced_names(&command.command);
        for name in &referenced {
            if !command.has_variable(name) {
                report.errors.push(ValidationError::UnknownPlaceholder {
                    field: format!("{}.command", path),
                    name: name.to_string(),
                });
            }
        }

        for variable in &command.variables {
            if variable.flag().is_none() && !referenced.contains(&variable.name.as_str()) {
                report.warnings.push(format!(
                    "Variable '{}' of command '{}' is never used",
                    variable.name, command.id
                ));
            }
        }
    }
}

fn check_options(variable: &VariableDefinition) -> Result<(), String> {
    match &variable.kind {
        VariableKind::Number(options) => {
            for (label, value) in [
                ("min", options.min),
                ("max", options.max),
                ("step", options.step),
                ("default", options.default),
            ] {
                if value.is_some_and(|v| !v.is_finite()) {
                    return Err(format!("{} must be a finite number", label));
                }
            }
            if let (Some(min), Some(max)) = (options.min, options.max) {
                if min > max {
                    return Err(format!("min {} is greater than max {}", min, max));
                }
            }
            if options.step.is_some_and(|step| step <= 0.0) {
                return Err("step must be positive".to_string());
            }
            if let Some(default) = options.default {
                let below = options.min.is_some_and(|min| default < min);
                let above = options.max.is_some_and(|max| default > max);
                if below || above {
                    return Err(format!("default {} is outside min/max", default));
                }
            }
            Ok(())
        }
        VariableKind::Select(options) => {
            if options.choices.is_empty() {
                return Err("select needs at least one choice".to_string());
            }
            let mut seen = HashSet::new();
            for value in options.values() {
                if !seen.insert(value) {
                    return Err(format!("duplicate choice '{}'", value));
                }
            }
            match options.default {
                Some(ref default) if !options.contains(default) => {
                    Err(format!("default '{}' is not one of the choices", default))
                }
                _ => Ok(()),
            }
        }
        VariableKind::File(options) => {
            if options.filters.iter().any(|f| f.pattern.trim().is_empty()) {
                return Err("file filter pattern cannot be empty".to_string());
            }
            Ok(())
        }
        VariableKind::String(_) | VariableKind::Boolean(_) => Ok(()),
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            is_valid: true,
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn first_error(&self) -> Option<&ValidationError> {
        self.errors.first()
    }
}

impl Default for TemplateValidator {
    fn default() -> Self {
        Self::new()
    }
}
