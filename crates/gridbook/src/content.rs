//! Loading grids from whatever a caller has on hand

use gridbook_core::Grid;
use gridbook_doc::{grid_from_json, grid_from_json_str, DocResult, DocumentReader};
use serde_json::Value;
use tracing::{debug, warn};

/// Input accepted by [`parse_grid_content`](crate::parse_grid_content)
#[derive(Debug, Clone, PartialEq)]
pub enum GridContent {
    /// Persisted text or a raw JSON string
    Text(String),
    /// Parsed JSON in either legacy shape
    Json(Value),
    /// An existing grid
    Grid(Grid),
}

impl From<&str> for GridContent {
    fn from(text: &str) -> Self {
        GridContent::Text(text.to_string())
    }
}

impl From<String> for GridContent {
    fn from(text: String) -> Self {
        GridContent::Text(text)
    }
}

impl From<Value> for GridContent {
    fn from(value: Value) -> Self {
        GridContent::Json(value)
    }
}

impl From<Grid> for GridContent {
    fn from(grid: Grid) -> Self {
        GridContent::Grid(grid)
    }
}

impl GridContent {
    /// Load the grid, or explain why it cannot be loaded
    pub fn try_into_grid(self) -> DocResult<Grid> {
        match self {
            GridContent::Grid(grid) => Ok(grid.sanitize()),
            GridContent::Json(value) => grid_from_json(&value),
            GridContent::Text(text) => text_grid(&text),
        }
    }

    /// Load the grid, falling back to the default empty grid
    pub fn into_grid(self) -> Grid {
        match self.try_into_grid() {
            Ok(grid) => grid,
            Err(e) => {
                warn!(error = %e, "unreadable grid content, using an empty grid");
                Grid::default()
            }
        }
    }
}

fn text_grid(text: &str) -> DocResult<Grid> {
    let trimmed = text.trim_start();
    if trimmed.is_empty() {
        debug!("empty grid content");
        return Ok(Grid::default());
    }
    if trimmed.starts_with('{') {
        return grid_from_json_str(trimmed);
    }
    Ok(DocumentReader::read_str(text)?.to_grid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridbook_doc::DocError;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_persisted_text() {
        let grid = GridContent::from(
            "GRIDBOOK v1\n[[sheets]]\nname = \"Sheet1\"\norder = 0\n\n[sheets.meta]\nrow_count = 3\ncolumn_count = 2\n\n[sheets.cells.B3]\nformula = \"=1+1\"\nvalue = 2.0\n",
        )
        .into_grid();
        assert_eq!((grid.row_count, grid.column_count), (3, 2));
        assert_eq!(grid.get("B3"), Some("=1+1"));
    }

    #[test]
    fn test_json_text_and_value() {
        let from_text = GridContent::from(r#"{"rowCount": 2, "columnCount": 2, "cells": {"A1": "x"}}"#)
            .into_grid();
        let from_value =
            GridContent::from(json!({"rowCount": 2, "columnCount": 2, "cells": {"A1": "x"}}))
                .into_grid();
        assert_eq!(from_text, from_value);
        assert_eq!(from_text.get("A1"), Some("x"));
    }

    #[test]
    fn test_grid_is_sanitized() {
        let mut grid = Grid::new(0, 0);
        grid.cells.insert("b2".into(), "1".into());
        let loaded = GridContent::from(grid).into_grid();
        assert_eq!(loaded.get("B2"), Some("1"));
        assert_eq!((loaded.row_count, loaded.column_count), (2, 2));
    }

    #[test]
    fn test_malformed_falls_back() {
        assert_eq!(GridContent::from("not a document").into_grid(), Grid::default());
        assert_eq!(GridContent::from("GRIDBOOK v9\n").into_grid(), Grid::default());
        assert_eq!(GridContent::from("{broken").into_grid(), Grid::default());
        assert_eq!(GridContent::from("").into_grid(), Grid::default());
        assert!(matches!(
            GridContent::from("plain words").try_into_grid(),
            Err(DocError::MissingHeader)
        ));
    }
}
