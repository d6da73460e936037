// ABOUTME: Error types for the template store
// ABOUTME: Covers file IO, parsing failures, lookups and remote template fetches

use thiserror::Error;

use crate::parser::ParserError;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Parser(#[from] ParserError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to persist template file: {0}")]
    PersistError(#[from] tempfile::PersistError),

    #[error("Template not found: {template_id}")]
    TemplateNotFound { template_id: String },

    #[error("Favorite template not found: {name}")]
    FavoriteNotFound { name: String },

    #[error("Favorites directory unavailable: {reason}")]
    FavoritesDirUnavailable { reason: String },

    #[error("Invalid template source '{source_name}': {reason}")]
    InvalidSource { source_name: String, reason: String },

    #[error("HTTP request to {url} failed: {message}")]
    FetchFailed { url: String, message: String },

    #[error("HTTP request to {url} returned status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Template at {url} exceeds the {limit} byte limit")]
    TooLarge { url: String, limit: usize },
}

pub type Result<T> = std::result::Result<T, StoreError>;
