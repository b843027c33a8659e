//! Persisted document reader

use std::fs;
use std::path::Path;

use crate::document::{Document, FORMAT_MAGIC};
use crate::error::{DocError, DocResult};
use tracing::debug;

/// Version tag this reader understands
const SUPPORTED_VERSION: &str = "v1";

/// Persisted document reader
pub struct DocumentReader;

impl DocumentReader {
    /// Read a persisted document from a file
    pub fn read_file<P: AsRef<Path>>(path: P) -> DocResult<Document> {
        let text = fs::read_to_string(path)?;
        Self::read_str(&text)
    }

    /// Read a persisted document from text
    ///
    /// The first non-blank line must be `GRIDBOOK v1`; the rest is the TOML
    /// body. Sheets come back sorted by `(order, name)`.
    pub fn read_str(text: &str) -> DocResult<Document> {
        let body = Self::strip_header(text)?;
        let mut document: Document = toml::from_str(body)?;
        document.sort_sheets();
        debug!(sheets = document.sheets.len(), "read document");
        Ok(document)
    }

    /// Whether `text` starts with the document magic
    pub fn has_header(text: &str) -> bool {
        first_line(text)
            .and_then(|(line, _)| line.split_whitespace().next())
            .is_some_and(|magic| magic == FORMAT_MAGIC)
    }

    /// Validate the header line and return the body after it
    fn strip_header(text: &str) -> DocResult<&str> {
        let (line, rest) = first_line(text).ok_or(DocError::MissingHeader)?;
        let mut parts = line.split_whitespace();
        if parts.next() != Some(FORMAT_MAGIC) {
            return Err(DocError::MissingHeader);
        }
        match (parts.next(), parts.next()) {
            (Some(SUPPORTED_VERSION), None) => Ok(rest),
            (version, _) => Err(DocError::UnsupportedVersion(
                version.unwrap_or_default().to_string(),
            )),
        }
    }
}

/// First non-blank line (trimmed) and everything after it
fn first_line(text: &str) -> Option<(&str, &str)> {
    let mut rest = text;
    while !rest.is_empty() {
        let (line, next) = match rest.find('\n') {
            Some(i) => (&rest[..i], &rest[i + 1..]),
            None => (rest, ""),
        };
        let line = line.trim();
        if !line.is_empty() {
            return Some((line, next));
        }
        rest = next;
    }
    None
}
