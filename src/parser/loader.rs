// ABOUTME: Template file parser combining decoding, schema migration and validation
// ABOUTME: Loads are all-or-nothing: any structural error rejects the whole file

use std::path::Path;
use tokio::fs;
use tracing::warn;

use super::document::{DocumentFormat, TemplateDocument};
use super::error::{ParserError, Result};
use super::migrate::SchemaMigrator;
use super::model::TemplateFile;
use super::validation::{TemplateValidator, ValidationReport};

pub struct TemplateParser {
    migrator: SchemaMigrator,
    validator: TemplateValidator,
}

impl TemplateParser {
    pub fn new() -> Self {
        Self {
            migrator: SchemaMigrator::new(),
            validator: TemplateValidator::new(),
        }
    }

    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.validator = TemplateValidator::new().with_strict_mode(strict);
        self
    }

    pub async fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<TemplateFile> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .map_err(ParserError::IoError)?;
        self.parse_string(&content, DocumentFormat::from_path(path))
    }

    /// Decode, migrate and validate `content`.
    pub fn parse_string(&self, content: &str, format: DocumentFormat) -> Result<TemplateFile> {
        let template = self.decode(content, format)?;
        let report = self.validator.validate(&template);

        if let Some(error) = report.first_error() {
            return Err(error.clone().into());
        }
        for warning in &report.warnings {
            warn!("{}", warning);
        }
        Ok(template)
    }

    /// Validate without registering: decoding and migration failures are
    /// errors, structural problems come back in the report.
    pub fn check_string(&self, content: &str, format: DocumentFormat) -> Result<ValidationReport> {
        let template = self.decode(content, format)?;
        Ok(self.validator.validate(&template))
    }

    /// Serialize in the current schema
    pub fn to_string(&self, template: &TemplateFile, format: DocumentFormat) -> Result<String> {
        match format {
            DocumentFormat::Json => Ok(serde_json::to_string_pretty(template)?),
            DocumentFormat::Yaml => Ok(serde_yaml::to_string(template)?),
        }
    }

    fn decode(&self, content: &str, format: DocumentFormat) -> Result<TemplateFile> {
        let document = TemplateDocument::parse(content, format)?;
        self.migrator.migrate(document)
    }
}

impl Default for TemplateParser {
    fn default() -> Self {
        Self::new()
    }
}
