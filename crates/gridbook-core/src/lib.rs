//! # gridbook-core
//!
//! Core data structures for the gridbook spreadsheet engine.
//!
//! This crate provides the fundamental types used throughout gridbook:
//! - [`CellAddress`] and [`CellRange`] - A1-style addressing and ranges
//! - [`Grid`] - The compact, mutable address → raw text representation of a sheet
//! - [`CellValue`] - Evaluated primitive values and their [`ValueType`] tags
//! - [`SheetAnnotations`] - Sheet metadata carried through the persisted format
//!
//! ## Example
//!
//! ```rust
//! use gridbook_core::{CellUpdate, Grid};
//!
//! let mut grid = Grid::new(5, 5);
//! grid.apply_updates(&[
//!     CellUpdate::new("A1", "5"),
//!     CellUpdate::new("b1", "=A1+3"),
//! ])
//! .unwrap();
//!
//! assert_eq!(grid.get("B1"), Some("=A1+3"));
//! ```

pub mod address;
pub mod annotations;
pub mod error;
pub mod grid;
pub mod value;

pub use address::{decode, encode, is_valid_address, normalize_address, CellAddress, CellRange};
pub use annotations::{is_reserved_meta_key, to_snake_case, MetaValue, SheetAnnotations};
pub use error::{Error, Result};
pub use grid::{CellUpdate, Grid, DEFAULT_COLUMN_COUNT, DEFAULT_ROW_COUNT, GRID_VERSION};
pub use value::{format_number, format_number_positional, CellValue, ValueType};
