// ABOUTME: Schema migrator normalizing every supported cliq_template_version
// ABOUTME: Converts raw documents (legacy keyed or current list variables) into the canonical model

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::fmt;
use tracing::debug;

use super::document::{scalar_to_string, RawCommand, RawVariable, RawVariables, TemplateDocument};
use super::error::{ParserError, Result};
use super::model::{
    BooleanOptions, Command, FileFilter, FileMode, FileOptions, NumberOptions, SelectOptions,
    StringOptions, TemplateFile, VariableDefinition, VariableKind,
};

/// Structural version of a template file, distinct from the author's content version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SchemaVersion {
    /// Variables may be a name-keyed map, legacy type names are accepted.
    V1,
    /// Variables are an ordered list with canonical type names.
    V2,
}

impl SchemaVersion {
    pub const CURRENT: SchemaVersion = SchemaVersion::V2;

    pub const SUPPORTED: [&'static str; 2] = ["1.0", "2.0"];

    /// Parse a `cliq_template_version` value. Unknown versions fail closed.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim() {
            "1" | "1.0" | "1.0.0" => Ok(SchemaVersion::V1),
            "2" | "2.0" | "2.0.0" => Ok(SchemaVersion::V2),
            other => Err(ParserError::UnsupportedSchemaVersion {
                version: other.to_string(),
                supported: Self::SUPPORTED.to_vec(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaVersion::V1 => "1.0",
            SchemaVersion::V2 => "2.0",
        }
    }

    pub fn is_legacy(&self) -> bool {
        *self < Self::CURRENT
    }

    /// Map an authored type name onto a variable kind and, for legacy file
    /// aliases, the implied file mode.
    fn resolve_type(&self, type_name: &str) -> Option<(&'static str, Option<FileMode>)> {
        let canonical = match type_name {
            "string" => ("string", None),
            "boolean" => ("boolean", None),
            "select" => ("select", None),
            "file" => ("file", None),
            "number" => ("number", None),
            _ if *self == SchemaVersion::V2 => return None,
            "text" => ("string", None),
            "file_input" => ("file", Some(FileMode::Input)),
            "file_output" => ("file", Some(FileMode::Output)),
            _ => return None,
        };
        Some(canonical)
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Converts raw documents into `TemplateFile`s in the current schema shape.
///
/// Migration is pure: it never touches the filesystem and the same document
/// always migrates to the same template.
#[derive(Debug, Clone, Default)]
pub struct SchemaMigrator;

impl SchemaMigrator {
    pub fn new() -> Self {
        Self
    }

    pub fn migrate(&self, document: TemplateDocument) -> Result<TemplateFile> {
        let raw_version = document
            .cliq_template_version
            .as_ref()
            .ok_or_else(|| ParserError::missing("cliq_template_version"))?;
        let version_text = scalar_to_string(raw_version).ok_or_else(|| {
            ParserError::malformed("cliq_template_version", "must be a string")
        })?;
        let version = SchemaVersion::parse(&version_text)?;

        let name = document.name.ok_or_else(|| ParserError::missing("name"))?;
        let raw_cmds = document.cmds.ok_or_else(|| ParserError::missing("cmds"))?;

        let mut cmds = Vec::with_capacity(raw_cmds.len());
        for (index, value) in raw_cmds.into_iter().enumerate() {
            let field = format!("cmds[{}]", index);
            let raw: RawCommand = serde_json::from_value(value)
                .map_err(|e| ParserError::malformed(field.clone(), e.to_string()))?;
            cmds.push(self.migrate_command(version, index, &field, raw)?);
        }

        if version.is_legacy() {
            debug!(
                "Migrated template '{}' from schema {} to {}",
                name,
                version,
                SchemaVersion::CURRENT
            );
        }

        Ok(TemplateFile {
            name,
            description: document.description.unwrap_or_default(),
            version: document
                .version
                .as_ref()
                .and_then(scalar_to_string)
                .unwrap_or_default(),
            author: document.author.unwrap_or_default(),
            cliq_template_version: SchemaVersion::CURRENT.as_str().to_string(),
            cmds,
        })
    }

    fn migrate_command(
        &self,
        version: SchemaVersion,
        index: usize,
        field: &str,
        raw: RawCommand,
    ) -> Result<Command> {
        let id = match raw.id.map(|id| id.trim().to_string()) {
            Some(id) if !id.is_empty() => id,
            _ if version.is_legacy() => format!("cmd-{}", index + 1),
            _ => return Err(ParserError::missing(format!("{}.id", field))),
        };

        let command = raw
            .command
            .ok_or_else(|| ParserError::missing(format!("{}.command", field)))?;

        let variables_field = format!("{}.variables", field);
        let variables = match raw.variables {
            None => Vec::new(),
            Some(RawVariables::List(list)) => list
                .into_iter()
                .enumerate()
                .map(|(i, var)| {
                    let var_field = format!("{}[{}]", variables_field, i);
                    let name = var
                        .name
                        .clone()
                        .ok_or_else(|| ParserError::missing(format!("{}.name", var_field)))?;
                    self.migrate_variable(version, &var_field, name, var)
                })
                .collect::<Result<Vec<_>>>()?,
            Some(RawVariables::Keyed(_)) if !version.is_legacy() => {
                return Err(ParserError::malformed(
                    variables_field,
                    format!(
                        "name-keyed variables are only valid for cliq_template_version {}",
                        SchemaVersion::V1
                    ),
                ));
            }
            // BTreeMap iteration gives the lexicographic order legacy files lack
            Some(RawVariables::Keyed(map)) => map
                .into_iter()
                .map(|(key, var)| {
                    let var_field = format!("{}.{}", variables_field, key);
                    if let Some(ref declared) = var.name {
                        if declared != &key {
                            return Err(ParserError::malformed(
                                format!("{}.name", var_field),
                                format!("name '{}' does not match key '{}'", declared, key),
                            ));
                        }
                    }
                    self.migrate_variable(version, &var_field, key, var)
                })
                .collect::<Result<Vec<_>>>()?,
        };

        Ok(Command {
            name: raw.name.unwrap_or_else(|| id.clone()),
            id,
            description: raw.description.unwrap_or_default(),
            command,
            variables,
        })
    }

    fn migrate_variable(
        &self,
        version: SchemaVersion,
        field: &str,
        name: String,
        raw: RawVariable,
    ) -> Result<VariableDefinition> {
        let type_field = format!("{}.type", field);
        let type_name = raw
            .var_type
            .as_deref()
            .map(str::trim)
            .ok_or_else(|| ParserError::missing(type_field.clone()))?;
        let (canonical, implied_mode) = version.resolve_type(type_name).ok_or_else(|| {
            ParserError::malformed(
                type_field.clone(),
                format!("unknown variable type '{}'", type_name),
            )
        })?;

        let options_field = format!("{}.options", field);
        let options = raw.options.unwrap_or(JsonValue::Null);
        let kind = match canonical {
            "string" => VariableKind::String(parse_options::<StringOptions>(&options_field, options)?),
            "boolean" => {
                VariableKind::Boolean(parse_options::<BooleanOptions>(&options_field, options)?)
            }
            "number" => {
                VariableKind::Number(parse_options::<NumberOptions>(&options_field, options)?)
            }
            "select" => VariableKind::Select(self.select_options(version, &options_field, options)?),
            _ => {
                let mut file = self.file_options(version, &options_field, options)?;
                if let Some(mode) = implied_mode {
                    file.mode = mode;
                }
                VariableKind::File(file)
            }
        };

        Ok(VariableDefinition {
            label: raw
                .label
                .filter(|label| !label.trim().is_empty())
                .unwrap_or_else(|| name.clone()),
            name,
            kind,
            arg_name: raw.arg_name.filter(|arg| !arg.trim().is_empty()),
            description: raw.description.unwrap_or_default(),
            required: raw.required,
        })
    }

    fn select_options(
        &self,
        version: SchemaVersion,
        field: &str,
        options: JsonValue,
    ) -> Result<SelectOptions> {
        // Legacy files sometimes list the choices directly as the options value
        if version.is_legacy() && options.is_array() {
            let choices = serde_json::from_value(options)
                .map_err(|e| ParserError::malformed(field, e.to_string()))?;
            return Ok(SelectOptions {
                choices,
                default: None,
            });
        }
        parse_options(field, options)
    }

    fn file_options(
        &self,
        version: SchemaVersion,
        field: &str,
        mut options: JsonValue,
    ) -> Result<FileOptions> {
        let legacy_patterns = if version.is_legacy() {
            options
                .as_object_mut()
                .and_then(|map| map.remove("file_types"))
        } else {
            None
        };

        let mut file: FileOptions = parse_options(field, options)?;

        if let Some(patterns) = legacy_patterns {
            let patterns: Vec<String> = serde_json::from_value(patterns).map_err(|e| {
                ParserError::malformed(format!("{}.file_types", field), e.to_string())
            })?;
            if file.filters.is_empty() {
                file.filters = patterns
                    .into_iter()
                    .map(|pattern| FileFilter {
                        name: pattern.clone(),
                        pattern,
                    })
                    .collect();
            }
        }

        Ok(file)
    }
}

fn parse_options<T>(field: &str, options: JsonValue) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match options {
        JsonValue::Null => Ok(T::default()),
        JsonValue::Object(_) => {
            serde_json::from_value(options).map_err(|e| ParserError::malformed(field, e.to_string()))
        }
        _ => Err(ParserError::malformed(field, "options must be an object")),
    }
}
