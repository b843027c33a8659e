//! # gridbook-doc
//!
//! The persisted document model and its text codec.
//!
//! A persisted document is the header line `GRIDBOOK v1` followed by a TOML
//! body holding one or more sheets with their cells, evaluated values,
//! errors and dependency edges. Legacy JSON grids are read by [`legacy`].

pub mod document;
pub mod error;
pub mod legacy;
mod reader;
mod writer;

pub use document::{
    CellErrorRecord, DependencyRecord, Document, DocumentCell, ErrorRecordKind, PersistedValue,
    Sheet, SheetMeta, DEFAULT_SHEET_NAME, FORMAT_HEADER, FORMAT_MAGIC, FORMAT_VERSION,
};
pub use error::{DocError, DocResult};
pub use legacy::{grid_from_json, grid_from_json_str};
pub use reader::DocumentReader;
pub use writer::DocumentWriter;
