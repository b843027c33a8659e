//! # gridbook
//!
//! A spreadsheet-document engine: formulas, dependency tracking and a
//! diff-friendly text format.
//!
//! ## Features
//!
//! - A compact grid model (address → raw text) with batch edits
//! - Formula parsing and evaluation with a built-in function library
//! - Dependency edges and circular reference detection
//! - References into other pages (`@[Label](id):A1`) through a caller
//!   supplied resolver
//! - A canonical persisted format (`GRIDBOOK v1` + TOML) that round-trips
//!
//! ## Example
//!
//! ```rust
//! use gridbook::prelude::*;
//!
//! let grid = update_cells(
//!     create_empty_grid(5, 5),
//!     &[CellUpdate::new("A1", "5"), CellUpdate::new("B1", "=A1+3")],
//! )
//! .unwrap();
//!
//! let text = serialize_grid_content(&grid, &SerializeOptions::default()).unwrap();
//! assert!(text.starts_with("GRIDBOOK v1\n"));
//!
//! let loaded = parse_grid_content(text.as_str());
//! assert_eq!(loaded.get("B1"), Some("=A1+3"));
//! ```

pub mod calculation;
pub mod content;
pub mod prelude;
pub mod projection;

pub use calculation::{evaluate_sheet, CellEvaluation, Evaluation, EvaluationOptions};
pub use content::GridContent;
pub use projection::{to_document, SerializeOptions};

// Re-export core types
pub use gridbook_core::{
    is_valid_address, CellAddress, CellRange, CellUpdate, CellValue, Error, Grid, MetaValue,
    Result, SheetAnnotations, ValueType, DEFAULT_COLUMN_COUNT, DEFAULT_ROW_COUNT,
};

// Re-export formula types
pub use gridbook_formula::{
    parse_formula, CellFailure, ErrorKind, EvaluationLimits, ExternalReference, ExternalResolver,
    FormulaError, FormulaExpr, ResolvedPage,
};

// Re-export document types
pub use gridbook_doc::{DocError, DocResult, Document, DocumentReader, DocumentWriter};

use gridbook_formula::{tokenize, Token};
use std::collections::BTreeMap;

/// An empty grid; counts are clamped to at least 1
pub fn create_empty_grid(row_count: u32, column_count: u32) -> Grid {
    Grid::new(row_count, column_count)
}

/// Load a grid from persisted text, JSON text, a JSON value or a grid
///
/// Never fails: unreadable content yields the default empty grid (20 × 10)
/// and logs the reason.
pub fn parse_grid_content(content: impl Into<GridContent>) -> Grid {
    content.into().into_grid()
}

/// Evaluate `grid` and render it in the canonical persisted format
pub fn serialize_grid_content(grid: &Grid, options: &SerializeOptions) -> DocResult<String> {
    let grid = grid.clone().sanitize();
    let evaluation = evaluate_sheet(
        &grid,
        EvaluationOptions {
            page_id: options.page_id.clone(),
            ..Default::default()
        },
    );
    let document = to_document(&grid, &evaluation, options);
    DocumentWriter::write_string(&document)
}

/// Every external reference mentioned by a formula, deduplicated by raw text
/// and sorted
///
/// This is a token scan, so references in formulas that fail to parse are
/// still reported.
pub fn collect_external_references(grid: &Grid) -> Vec<ExternalReference> {
    let mut found = BTreeMap::new();
    for raw in grid.cells.values() {
        let Some(source) = raw.trim().strip_prefix('=') else {
            continue;
        };
        let Ok(tokens) = tokenize(source) else {
            continue;
        };
        for token in tokens {
            if let Token::Page(reference) = token {
                found.entry(reference.raw.clone()).or_insert(reference);
            }
        }
    }
    found.into_values().collect()
}

/// Normalize a grid: invalid keys dropped, case normalized, counts clamped
pub fn sanitize_grid(grid: Grid) -> Grid {
    grid.sanitize()
}

/// Apply a batch of edits, widening the bounds to fit
///
/// An empty value clears the cell. Any invalid address rejects the whole
/// batch with [`Error::Validation`].
pub fn update_cells(mut grid: Grid, updates: &[CellUpdate]) -> Result<Grid> {
    grid.apply_updates(updates)?;
    Ok(grid)
}
