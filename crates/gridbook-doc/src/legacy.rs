//! JSON inputs predating the text format
//!
//! Two shapes are accepted: the raw grid (`{version, rowCount, columnCount,
//! cells: {A1: "raw"}}`, with `rows`/`columns` aliases and non-string cell
//! values stringified) and the document shape
//! (`{sheets: [{cells: {A1: {formula, value}}}]}`).

use crate::error::{DocError, DocResult};
use gridbook_core::{
    format_number_positional, Grid, MetaValue, DEFAULT_COLUMN_COUNT, DEFAULT_ROW_COUNT,
};
use serde_json::{Map, Value};
use tracing::debug;

const ROW_KEYS: &[&str] = &["rowCount", "row_count", "rows"];
const COLUMN_KEYS: &[&str] = &["columnCount", "column_count", "columns", "cols"];

/// Parse JSON text in either legacy shape
pub fn grid_from_json_str(text: &str) -> DocResult<Grid> {
    let value: Value = serde_json::from_str(text)?;
    grid_from_json(&value)
}

/// Build a grid from a JSON value in either legacy shape
pub fn grid_from_json(value: &Value) -> DocResult<Grid> {
    let object = value
        .as_object()
        .ok_or_else(|| DocError::Legacy("expected a JSON object".to_string()))?;

    if let Some(sheets) = object.get("sheets") {
        let sheets = sheets
            .as_array()
            .ok_or_else(|| DocError::Legacy("\"sheets\" must be an array".to_string()))?;
        return Ok(match first_sheet(sheets) {
            Some(sheet) => sheet_grid(sheet),
            None => Grid::default(),
        });
    }

    if object.contains_key("cells") || has_any(object, ROW_KEYS) || has_any(object, COLUMN_KEYS) {
        return Ok(raw_grid(object));
    }

    Err(DocError::Legacy("expected \"cells\" or \"sheets\"".to_string()))
}

fn has_any(object: &Map<String, Value>, keys: &[&str]) -> bool {
    keys.iter().any(|k| object.contains_key(*k))
}

/// Lowest `(order, name)` sheet; sheets without an order keep their position
fn first_sheet(sheets: &[Value]) -> Option<&Map<String, Value>> {
    sheets
        .iter()
        .enumerate()
        .filter_map(|(index, sheet)| {
            let sheet = sheet.as_object()?;
            let order = sheet
                .get("order")
                .and_then(Value::as_u64)
                .unwrap_or(index as u64);
            let name = sheet.get("name").and_then(Value::as_str).unwrap_or_default();
            Some(((order, name), sheet))
        })
        .min_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, sheet)| sheet)
}

fn raw_grid(object: &Map<String, Value>) -> Grid {
    let mut grid = Grid::new(
        count(object, ROW_KEYS).unwrap_or(DEFAULT_ROW_COUNT),
        count(object, COLUMN_KEYS).unwrap_or(DEFAULT_COLUMN_COUNT),
    );
    if let Some(cells) = object.get("cells").and_then(Value::as_object) {
        read_cells(&mut grid, cells);
    }
    grid.sanitize()
}

fn sheet_grid(sheet: &Map<String, Value>) -> Grid {
    let meta = sheet.get("meta").and_then(Value::as_object);
    let bound = |keys: &[&str], default: u32| {
        meta.and_then(|m| count(m, keys))
            .or_else(|| count(sheet, keys))
            .unwrap_or(default)
    };
    let mut grid = Grid::new(
        bound(ROW_KEYS, DEFAULT_ROW_COUNT),
        bound(COLUMN_KEYS, DEFAULT_COLUMN_COUNT),
    );

    if let Some(meta) = meta {
        grid.annotations.frozen_rows = count(meta, &["frozenRows", "frozen_rows"]);
        grid.annotations.frozen_columns = count(meta, &["frozenColumns", "frozen_columns"]);
        for (key, value) in meta {
            let key = gridbook_core::to_snake_case(key);
            if matches!(
                key.as_str(),
                "row_count" | "column_count" | "rows" | "columns" | "cols"
            ) || key.starts_with("frozen_")
            {
                continue;
            }
            if let Some(value) = meta_value(value).filter(MetaValue::is_scalar) {
                grid.annotations.meta.insert(key, value);
            }
        }
    }

    if let Some(cells) = sheet.get("cells").and_then(Value::as_object) {
        read_cells(&mut grid, cells);
    }
    grid.sanitize()
}

fn count(object: &Map<String, Value>, keys: &[&str]) -> Option<u32> {
    keys.iter()
        .filter_map(|k| object.get(*k))
        .find_map(Value::as_u64)
        .map(|n| n.min(u32::MAX as u64) as u32)
}

fn read_cells(grid: &mut Grid, cells: &Map<String, Value>) {
    for (address, value) in cells {
        if let Value::Object(cell) = value {
            let notes: Vec<String> = cell
                .get("notes")
                .and_then(Value::as_array)
                .map(|notes| {
                    notes
                        .iter()
                        .filter_map(Value::as_str)
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default();
            if !notes.is_empty() {
                grid.annotations.notes.insert(address.clone(), notes);
            }
        }

        match cell_raw(value) {
            Some(raw) if !raw.is_empty() => {
                grid.cells.insert(address.clone(), raw);
            }
            _ => debug!(%address, "skipping legacy cell without content"),
        }
    }
}

/// Raw text of a legacy cell: a formula wins over a value
fn cell_raw(value: &Value) -> Option<String> {
    match value {
        Value::Object(cell) => {
            let formula = cell
                .get("formula")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|f| !f.is_empty());
            match formula {
                Some(f) if f.starts_with('=') => Some(f.to_string()),
                Some(f) => Some(format!("={}", f)),
                None => cell.get("value").and_then(scalar_raw),
            }
        }
        other => scalar_raw(other),
    }
}

fn scalar_raw(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => n.as_f64().map(format_number_positional),
        Value::Bool(true) => Some("TRUE".to_string()),
        Value::Bool(false) => Some("FALSE".to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn meta_value(value: &Value) -> Option<MetaValue> {
    serde_json::from_value(value.clone()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_raw_grid_json() {
        let grid = grid_from_json_str(
            r#"{"version": 1, "rowCount": 4, "columnCount": 3,
                "cells": {"a1": "5", "B1": "=A1+3", "C1": 2.5, "A2": true, "B2": null, "C2": ""}}"#,
        )
        .unwrap();
        assert_eq!((grid.row_count, grid.column_count), (4, 3));
        assert_eq!(grid.get("A1"), Some("5"));
        assert_eq!(grid.get("B1"), Some("=A1+3"));
        assert_eq!(grid.get("C1"), Some("2.5"));
        assert_eq!(grid.get("A2"), Some("TRUE"));
        assert_eq!(grid.get("B2"), None);
        assert_eq!(grid.get("C2"), None);
    }

    #[test]
    fn test_raw_grid_aliases() {
        let grid = grid_from_json(&json!({"rows": 2, "cols": 2, "cells": {"D5": 7}})).unwrap();
        // Widened to fit D5
        assert_eq!((grid.row_count, grid.column_count), (5, 4));
        assert_eq!(grid.get("D5"), Some("7"));
    }

    #[test]
    fn test_document_shaped_json() {
        let grid = grid_from_json(&json!({
            "sheets": [
                {"name": "Second", "order": 1, "cells": {"A1": "ignored"}},
                {
                    "name": "First",
                    "order": 0,
                    "meta": {"rowCount": 8, "columnCount": 4, "frozenRows": 1, "tabColor": "blue"},
                    "cells": {
                        "A1": {"value": 5, "type": "number"},
                        "B1": {"formula": "=A1*2", "value": 10},
                        "C1": {"formula": "SUM(A1:B1)"},
                        "D1": {"value": "", "notes": ["empty on purpose"]}
                    }
                }
            ]
        }))
        .unwrap();

        assert_eq!((grid.row_count, grid.column_count), (8, 4));
        assert_eq!(grid.get("A1"), Some("5"));
        assert_eq!(grid.get("B1"), Some("=A1*2"));
        assert_eq!(grid.get("C1"), Some("=SUM(A1:B1)"));
        assert_eq!(grid.get("D1"), None);
        assert_eq!(grid.annotations.frozen_rows, Some(1));
        assert_eq!(
            grid.annotations.meta.get("tab_color"),
            Some(&MetaValue::from("blue"))
        );
        assert_eq!(
            grid.annotations.notes_for("D1"),
            Some(&["empty on purpose".to_string()][..])
        );
    }

    #[test]
    fn test_empty_sheets_array() {
        assert_eq!(grid_from_json(&json!({"sheets": []})).unwrap(), Grid::default());
    }

    #[test]
    fn test_unrecognized_json() {
        assert!(matches!(grid_from_json(&json!([1, 2])), Err(DocError::Legacy(_))));
        assert!(matches!(
            grid_from_json(&json!({"hello": "world"})),
            Err(DocError::Legacy(_))
        ));
        assert!(matches!(grid_from_json_str("{not json"), Err(DocError::Json(_))));
    }
}
