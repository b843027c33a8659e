//! The compact, mutable grid representation of a sheet

use crate::address::{normalize_address, CellAddress, CellRange};
use crate::annotations::SheetAnnotations;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Version tag written into grid JSON
pub const GRID_VERSION: u32 = 1;

/// Row count of the fallback empty grid
pub const DEFAULT_ROW_COUNT: u32 = 20;

/// Column count of the fallback empty grid
pub const DEFAULT_COLUMN_COUNT: u32 = 10;

/// Address → raw text for one sheet
///
/// Raw text is whatever the user typed: a formula (leading `=`), a number
/// literal, or plain text. Unset cells are absent from `cells`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grid {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(alias = "rows", default = "default_row_count")]
    pub row_count: u32,
    #[serde(alias = "columns", alias = "cols", default = "default_column_count")]
    pub column_count: u32,
    #[serde(default)]
    pub cells: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "SheetAnnotations::is_empty")]
    pub annotations: SheetAnnotations,
}

fn default_version() -> u32 {
    GRID_VERSION
}

fn default_row_count() -> u32 {
    DEFAULT_ROW_COUNT
}

fn default_column_count() -> u32 {
    DEFAULT_COLUMN_COUNT
}

/// One entry of a batch edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellUpdate {
    pub address: String,
    pub value: String,
}

impl CellUpdate {
    pub fn new(address: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            value: value.into(),
        }
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::new(DEFAULT_ROW_COUNT, DEFAULT_COLUMN_COUNT)
    }
}

impl Grid {
    /// Create an empty grid; counts are clamped to at least 1
    pub fn new(row_count: u32, column_count: u32) -> Self {
        Self {
            version: GRID_VERSION,
            row_count: row_count.max(1),
            column_count: column_count.max(1),
            cells: BTreeMap::new(),
            annotations: SheetAnnotations::default(),
        }
    }

    /// Raw text of a cell, if set
    pub fn get(&self, address: &str) -> Option<&str> {
        self.cells.get(address).map(String::as_str)
    }

    /// Whether `address` lies inside the grid bounds
    pub fn contains(&self, address: &CellAddress) -> bool {
        address.row < self.row_count && address.col < self.column_count
    }

    /// The range covering the whole grid
    pub fn extent(&self) -> CellRange {
        CellRange::new(
            CellAddress::new(0, 0),
            CellAddress::new(
                self.row_count.saturating_sub(1),
                self.column_count.saturating_sub(1),
            ),
        )
    }

    /// Every address in the grid, row-major
    pub fn addresses(&self) -> impl Iterator<Item = CellAddress> {
        let cols = self.column_count;
        (0..self.row_count).flat_map(move |row| (0..cols).map(move |col| CellAddress::new(row, col)))
    }

    /// Grow the bounds so that `address` is inside; never shrinks
    pub fn widen_to(&mut self, address: &CellAddress) {
        self.row_count = self.row_count.max(address.row.saturating_add(1));
        self.column_count = self.column_count.max(address.col.saturating_add(1));
    }

    /// Normalize the grid
    ///
    /// Keys are trimmed and uppercased; keys that are not valid addresses are
    /// dropped, as are cells holding the empty string. Bounds are clamped to
    /// at least 1 and widened to cover every remaining cell.
    pub fn sanitize(mut self) -> Self {
        self.version = GRID_VERSION;
        self.row_count = self.row_count.max(1);
        self.column_count = self.column_count.max(1);

        let cells = std::mem::take(&mut self.cells);
        for (key, raw) in cells {
            let normalized = normalize_address(&key);
            match CellAddress::parse(&normalized) {
                Ok(address) => {
                    if raw.is_empty() {
                        continue;
                    }
                    self.widen_to(&address);
                    self.cells.insert(normalized, raw);
                }
                Err(e) => debug!(key = %key, error = %e, "dropping invalid cell key"),
            }
        }

        let notes = std::mem::take(&mut self.annotations.notes);
        self.annotations.notes = notes
            .into_iter()
            .filter(|(_, notes)| !notes.is_empty())
            .filter_map(|(key, notes)| {
                let normalized = normalize_address(&key);
                CellAddress::parse(&normalized)
                    .ok()
                    .map(|_| (normalized, notes))
            })
            .collect();

        self
    }

    /// Apply a batch of edits
    ///
    /// Every address is validated before anything changes, so a bad address
    /// leaves the grid untouched. An empty (or whitespace-only) value clears
    /// the cell. Bounds widen to cover every touched address.
    pub fn apply_updates(&mut self, updates: &[CellUpdate]) -> Result<()> {
        let mut parsed = Vec::with_capacity(updates.len());
        for update in updates {
            let normalized = normalize_address(&update.address);
            let address = CellAddress::parse(&normalized).map_err(|_| {
                Error::Validation(format!("Invalid cell address: {}", update.address))
            })?;
            parsed.push((normalized, address, update));
        }

        for (key, address, update) in parsed {
            self.widen_to(&address);
            if update.value.is_empty() {
                self.cells.remove(&key);
            } else {
                self.cells.insert(key, update.value.clone());
            }
        }

        Ok(())
    }

    /// Parse grid JSON (`{"version":1,"rowCount":..,"columnCount":..,"cells":{..}}`)
    pub fn from_json(json: &str) -> Result<Self> {
        let grid: Grid = serde_json::from_str(json)?;
        Ok(grid.sanitize())
    }

    /// Serialize as grid JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
