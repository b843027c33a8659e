//! Error types for gridbook-core

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in gridbook-core
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid cell address format
    #[error("Invalid cell address: {0}")]
    InvalidAddress(String),

    /// A batch edit was rejected
    #[error("{0}")]
    Validation(String),

    /// Grid JSON could not be read or written
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
