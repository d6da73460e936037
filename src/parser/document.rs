// ABOUTME: Raw wire representation of template files as authored on disk
// ABOUTME: Accepts every supported schema shape before migration into the canonical model

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::Path;

use super::error::{ParserError, Result};

/// Serialization format of a template document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    #[default]
    Json,
    Yaml,
}

impl DocumentFormat {
    /// Pick the format from a file extension.
    ///
    /// Only `.json` selects JSON. Anything else is read as YAML, which also
    /// accepts JSON documents.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => DocumentFormat::Json,
            _ => DocumentFormat::Yaml,
        }
    }

    pub fn file_extension(&self) -> &'static str {
        match self {
            DocumentFormat::Json => "json",
            DocumentFormat::Yaml => "yaml",
        }
    }
}

/// Top-level fields are optional here so that a missing one can be reported
/// by name instead of as an opaque deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateDocument {
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version: Option<JsonValue>,
    #[serde(default)]
    pub author: Option<String>,
    pub cliq_template_version: Option<JsonValue>,
    pub cmds: Option<Vec<JsonValue>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawCommand {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub variables: Option<RawVariables>,
}

/// `variables` is a list in the current schema and a name-keyed map in the
/// legacy one.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawVariables {
    List(Vec<RawVariable>),
    Keyed(BTreeMap<String, RawVariable>),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawVariable {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub var_type: Option<String>,
    #[serde(default)]
    pub arg_name: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Option<JsonValue>,
}

impl TemplateDocument {
    /// Parse document text in the given format
    pub fn parse(content: &str, format: DocumentFormat) -> Result<Self> {
        let value: JsonValue = match format {
            DocumentFormat::Json => serde_json::from_str(content)?,
            DocumentFormat::Yaml => serde_yaml::from_str(content)?,
        };

        if !value.is_object() {
            return Err(ParserError::malformed(
                "document",
                "top level must be an object",
            ));
        }

        serde_json::from_value(value).map_err(|e| ParserError::malformed("document", e.to_string()))
    }

    /// Parse a file, choosing the format by extension
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content, DocumentFormat::from_path(path))
    }
}

/// Render a scalar field (string or number) as text; YAML writes `1.0` unquoted.
pub fn scalar_to_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.trim().to_string()),
        JsonValue::Number(n) => n.as_f64().map(|f| {
            if f.fract() == 0.0 {
                format!("{:.1}", f)
            } else {
                f.to_string()
            }
        }),
        _ => None,
    }
}
