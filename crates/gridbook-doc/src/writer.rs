//! Persisted document writer

use std::fs;
use std::path::Path;

use crate::document::{Document, FORMAT_HEADER};
use crate::error::DocResult;

/// Persisted document writer
pub struct DocumentWriter;

impl DocumentWriter {
    /// Write a document to a file
    pub fn write_file<P: AsRef<Path>>(document: &Document, path: P) -> DocResult<()> {
        let text = Self::write_string(document)?;
        fs::write(path, text)?;
        Ok(())
    }

    /// Render a document as canonical text: the header line, then the TOML
    /// body with sheets in `(order, name)` order
    pub fn write_string(document: &Document) -> DocResult<String> {
        let body = if Self::is_sorted(document) {
            toml::to_string(document)?
        } else {
            let mut sorted = document.clone();
            sorted.sort_sheets();
            toml::to_string(&sorted)?
        };

        let mut out = String::with_capacity(FORMAT_HEADER.len() + 1 + body.len());
        out.push_str(FORMAT_HEADER);
        out.push('\n');
        out.push_str(&body);
        Ok(out)
    }

    fn is_sorted(document: &Document) -> bool {
        document
            .sheets
            .windows(2)
            .all(|w| (w[0].order, &w[0].name) <= (w[1].order, &w[1].name))
    }
}
