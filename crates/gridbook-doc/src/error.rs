//! Document error types

use thiserror::Error;

/// Result type for document operations
pub type DocResult<T> = std::result::Result<T, DocError>;

/// Errors that can occur while reading or writing documents
#[derive(Debug, Error)]
pub enum DocError {
    /// The first non-blank line is not a `GRIDBOOK` header
    #[error("Missing GRIDBOOK header")]
    MissingHeader,

    /// The header names a format version this crate cannot read
    #[error("Unsupported document version: {0}")]
    UnsupportedVersion(String),

    /// JSON input that is neither a grid nor a document
    #[error("Unrecognized grid JSON: {0}")]
    Legacy(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed TOML body
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// Malformed JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Core error
    #[error("Core error: {0}")]
    Core(#[from] gridbook_core::Error),
}
