// ABOUTME: Parser module for cliq template files
// ABOUTME: Exports the template model, schema migration, validation and generation

pub mod document;
pub mod error;
pub mod generate;
pub mod loader;
pub mod migrate;
pub mod model;
pub mod validation;

pub use document::DocumentFormat;
pub use error::{ParserError, Result, ValidationError};
pub use generate::template_from_command;
pub use loader::TemplateParser;
pub use migrate::{SchemaMigrator, SchemaVersion};
pub use model::{
    Command, FileMode, SelectChoice, TemplateFile, VariableDefinition, VariableKind,
};
pub use validation::{TemplateValidator, ValidationReport};
