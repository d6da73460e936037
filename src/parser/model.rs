// ABOUTME: Canonical in-memory template data structures
// ABOUTME: Defines TemplateFile, Command and typed VariableDefinition after migration

use serde::{Deserialize, Serialize};
use std::fmt;

use super::migrate::SchemaVersion;

/// A named, versioned collection of command templates.
///
/// Always holds the current schema shape: whatever version the source file
/// was authored against, `variables` is an ordered list and every variable
/// carries a typed option payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateFile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub author: String,
    pub cliq_template_version: String,
    pub cmds: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub command: String,
    #[serde(default)]
    pub variables: Vec<VariableDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDefinition {
    pub name: String,
    #[serde(flatten)]
    pub kind: VariableKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arg_name: Option<String>,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
}

/// Variable type together with its type-specific options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "options", rename_all = "lowercase")]
pub enum VariableKind {
    String(StringOptions),
    Boolean(BooleanOptions),
    Select(SelectOptions),
    File(FileOptions),
    Number(NumberOptions),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StringOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BooleanOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectOptions {
    #[serde(default, alias = "options", alias = "values")]
    pub choices: Vec<SelectChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectChoice {
    Plain(String),
    Labeled {
        value: String,
        #[serde(default)]
        label: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileOptions {
    #[serde(default)]
    pub mode: FileMode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FileFilter>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileMode {
    #[default]
    Input,
    Output,
}

/// File-picker filter, e.g. `{ name: "PNG images", pattern: "*.png" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFilter {
    #[serde(alias = "display_name")]
    pub name: String,
    pub pattern: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumberOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<f64>,
}

impl TemplateFile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            version: "1.0".to_string(),
            author: String::new(),
            cliq_template_version: SchemaVersion::CURRENT.as_str().to_string(),
            cmds: Vec::new(),
        }
    }

    /// Get a command by its id
    pub fn get_command(&self, command_id: &str) -> Option<&Command> {
        self.cmds.iter().find(|cmd| cmd.id == command_id)
    }

    pub fn command_ids(&self) -> Vec<String> {
        self.cmds.iter().map(|cmd| cmd.id.clone()).collect()
    }
}

impl Command {
    pub fn get_variable(&self, name: &str) -> Option<&VariableDefinition> {
        self.variables.iter().find(|var| var.name == name)
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.get_variable(name).is_some()
    }
}

impl VariableDefinition {
    pub fn new(name: impl Into<String>, kind: VariableKind) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            kind,
            arg_name: None,
            description: String::new(),
            required: false,
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_arg_name(mut self, arg_name: impl Into<String>) -> Self {
        self.arg_name = Some(arg_name.into());
        self
    }

    /// The flag token, ignoring blank `arg_name` values
    pub fn flag(&self) -> Option<&str> {
        self.arg_name
            .as_deref()
            .map(str::trim)
            .filter(|flag| !flag.is_empty())
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }
}

impl VariableKind {
    pub fn string() -> Self {
        VariableKind::String(StringOptions::default())
    }

    pub fn boolean() -> Self {
        VariableKind::Boolean(BooleanOptions::default())
    }

    pub fn number() -> Self {
        VariableKind::Number(NumberOptions::default())
    }

    pub fn file() -> Self {
        VariableKind::File(FileOptions::default())
    }

    pub fn select<I, S>(choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        VariableKind::Select(SelectOptions {
            choices: choices
                .into_iter()
                .map(|c| SelectChoice::Plain(c.into()))
                .collect(),
            default: None,
        })
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            VariableKind::String(_) => "string",
            VariableKind::Boolean(_) => "boolean",
            VariableKind::Select(_) => "select",
            VariableKind::File(_) => "file",
            VariableKind::Number(_) => "number",
        }
    }
}

impl SelectOptions {
    pub fn contains(&self, value: &str) -> bool {
        self.choices.iter().any(|choice| choice.value() == value)
    }

    pub fn values(&self) -> Vec<&str> {
        self.choices.iter().map(SelectChoice::value).collect()
    }
}

impl SelectChoice {
    pub fn value(&self) -> &str {
        match self {
            SelectChoice::Plain(value) => value,
            SelectChoice::Labeled { value, .. } => value,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            SelectChoice::Plain(value) => value,
            SelectChoice::Labeled { value, label } if label.is_empty() => value,
            SelectChoice::Labeled { label, .. } => label,
        }
    }
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileMode::Input => write!(f, "input"),
            FileMode::Output => write!(f, "output"),
        }
    }
}
