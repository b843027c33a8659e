//! The canonical persisted document
//!
//! Every map is a `BTreeMap`, so iteration order is serialization order and
//! the written text is deterministic.

use gridbook_core::{
    format_number_positional, is_reserved_meta_key, CellValue, Grid, MetaValue, SheetAnnotations,
    ValueType,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Magic word opening every persisted document
pub const FORMAT_MAGIC: &str = "GRIDBOOK";

/// Format version written into the header
pub const FORMAT_VERSION: u32 = 1;

/// Full header line
pub const FORMAT_HEADER: &str = "GRIDBOOK v1";

/// Name given to the sheet of a single-grid document
pub const DEFAULT_SHEET_NAME: &str = "Sheet1";

/// A persisted document: one or more sheets, each with evaluated cells
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Format tag; lives in the header line, never in the body
    #[serde(skip, default = "format_version")]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_id: Option<String>,
    #[serde(default)]
    pub sheets: Vec<Sheet>,
}

fn format_version() -> u32 {
    FORMAT_VERSION
}

impl Default for Document {
    fn default() -> Self {
        Self {
            version: FORMAT_VERSION,
            page_id: None,
            sheets: Vec::new(),
        }
    }
}

impl Document {
    /// Sort sheets by `(order, name)`
    pub fn sort_sheets(&mut self) {
        self.sheets
            .sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.name.cmp(&b.name)));
    }

    /// The first sheet in `(order, name)` order
    pub fn first_sheet(&self) -> Option<&Sheet> {
        self.sheets
            .iter()
            .min_by(|a, b| a.order.cmp(&b.order).then_with(|| a.name.cmp(&b.name)))
    }

    /// Grid of the first sheet, or the default empty grid
    pub fn to_grid(&self) -> Grid {
        self.first_sheet().map(Sheet::to_grid).unwrap_or_default()
    }
}

/// One sheet of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    #[serde(default = "default_sheet_name")]
    pub name: String,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub meta: SheetMeta,
    /// Column settings keyed by column letters
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub columns: BTreeMap<String, BTreeMap<String, MetaValue>>,
    #[serde(default)]
    pub cells: BTreeMap<String, DocumentCell>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ranges: BTreeMap<String, BTreeMap<String, MetaValue>>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, DependencyRecord>,
}

fn default_sheet_name() -> String {
    DEFAULT_SHEET_NAME.to_string()
}

impl Sheet {
    /// An empty sheet with the given bounds
    pub fn new(name: impl Into<String>, row_count: u32, column_count: u32) -> Self {
        Self {
            name: name.into(),
            order: 0,
            meta: SheetMeta {
                row_count,
                column_count,
                ..Default::default()
            },
            columns: BTreeMap::new(),
            cells: BTreeMap::new(),
            ranges: BTreeMap::new(),
            dependencies: BTreeMap::new(),
        }
    }

    /// Rebuild the compact grid: formulas are kept verbatim, values become
    /// their raw text, and the optional sections become annotations
    pub fn to_grid(&self) -> Grid {
        let mut grid = Grid::new(self.meta.row_count, self.meta.column_count);

        for (address, cell) in &self.cells {
            if let Some(raw) = cell.raw() {
                grid.cells.insert(address.clone(), raw);
            }
            if !cell.notes.is_empty() {
                grid.annotations
                    .notes
                    .insert(address.clone(), cell.notes.clone());
            }
        }

        grid.annotations = SheetAnnotations {
            frozen_rows: self.meta.frozen_rows,
            frozen_columns: self.meta.frozen_columns,
            meta: self
                .meta
                .extra
                .iter()
                .filter(|(key, _)| !is_reserved_meta_key(key))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            columns: self.columns.clone(),
            ranges: self.ranges.clone(),
            notes: std::mem::take(&mut grid.annotations.notes),
        };

        grid.sanitize()
    }
}

/// Sheet bounds plus free-form scalar metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetMeta {
    #[serde(default = "default_row_count")]
    pub row_count: u32,
    #[serde(default = "default_column_count")]
    pub column_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frozen_rows: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frozen_columns: Option<u32>,
    /// Anything else, keyed in snake_case
    #[serde(flatten)]
    pub extra: BTreeMap<String, MetaValue>,
}

fn default_row_count() -> u32 {
    gridbook_core::DEFAULT_ROW_COUNT
}

fn default_column_count() -> u32 {
    gridbook_core::DEFAULT_COLUMN_COUNT
}

impl Default for SheetMeta {
    fn default() -> Self {
        Self {
            row_count: default_row_count(),
            column_count: default_column_count(),
            frozen_rows: None,
            frozen_columns: None,
            extra: BTreeMap::new(),
        }
    }
}

/// One persisted cell
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentCell {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<PersistedValue>,
    #[serde(
        rename = "type",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub value_type: Option<ValueType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CellErrorRecord>,
}

impl DocumentCell {
    /// Raw text this cell stands for, if any
    pub fn raw(&self) -> Option<String> {
        if let Some(formula) = self.formula.as_deref().map(str::trim) {
            if !formula.is_empty() {
                return Some(if formula.starts_with('=') {
                    formula.to_string()
                } else {
                    format!("={}", formula)
                });
            }
        }
        self.value
            .as_ref()
            .map(PersistedValue::to_raw)
            .filter(|raw| !raw.is_empty())
    }
}

/// A persisted cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PersistedValue {
    Boolean(bool),
    Number(f64),
    String(String),
}

impl PersistedValue {
    /// Raw grid text for this value
    pub fn to_raw(&self) -> String {
        match self {
            PersistedValue::Boolean(true) => "TRUE".to_string(),
            PersistedValue::Boolean(false) => "FALSE".to_string(),
            PersistedValue::Number(n) => format_number_positional(*n),
            PersistedValue::String(s) => s.clone(),
        }
    }
}

impl From<&CellValue> for PersistedValue {
    fn from(value: &CellValue) -> Self {
        match value {
            CellValue::Empty => PersistedValue::String(String::new()),
            // -0 would otherwise persist as `-0.0` but reload as `0`
            CellValue::Number(n) if *n == 0.0 => PersistedValue::Number(0.0),
            CellValue::Number(n) => PersistedValue::Number(*n),
            CellValue::String(s) => PersistedValue::String(s.clone()),
            CellValue::Boolean(b) => PersistedValue::Boolean(*b),
        }
    }
}

/// Persisted error kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorRecordKind {
    #[serde(rename = "CIRCULAR_REF")]
    CircularReference,
    #[serde(rename = "EVAL_ERROR")]
    Evaluation,
}

/// An error stored on a persisted cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellErrorRecord {
    #[serde(rename = "type")]
    pub kind: ErrorRecordKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

/// Dependency edges of one cell
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DependencyRecord {
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub dependents: Vec<String>,
}

impl DependencyRecord {
    pub fn is_empty(&self) -> bool {
        self.depends_on.is_empty() && self.dependents.is_empty()
    }
}
