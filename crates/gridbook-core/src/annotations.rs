//! Sheet metadata that rides along with a grid
//!
//! None of this affects evaluation. It exists so that the optional sections
//! of the persisted document (frozen panes, column settings, named ranges,
//! notes, arbitrary scalar metadata) survive a load/save cycle.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A metadata value: a scalar, or a nested list/table for range payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<MetaValue>),
    Table(BTreeMap<String, MetaValue>),
}

impl MetaValue {
    /// Scalars are the only values allowed in sheet meta and column settings
    pub fn is_scalar(&self) -> bool {
        !matches!(self, MetaValue::List(_) | MetaValue::Table(_))
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        MetaValue::String(s.to_string())
    }
}

impl From<i64> for MetaValue {
    fn from(n: i64) -> Self {
        MetaValue::Integer(n)
    }
}

impl From<bool> for MetaValue {
    fn from(b: bool) -> Self {
        MetaValue::Boolean(b)
    }
}

/// Per-sheet annotations carried by a [`Grid`](crate::Grid)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SheetAnnotations {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frozen_rows: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frozen_columns: Option<u32>,
    /// Extra scalar sheet metadata
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, MetaValue>,
    /// Column settings keyed by column letters
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub columns: BTreeMap<String, BTreeMap<String, MetaValue>>,
    /// Named ranges and other range-scoped payloads
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub ranges: BTreeMap<String, BTreeMap<String, MetaValue>>,
    /// Cell notes keyed by address
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub notes: BTreeMap<String, Vec<String>>,
}

impl SheetAnnotations {
    pub fn is_empty(&self) -> bool {
        self.frozen_rows.is_none()
            && self.frozen_columns.is_none()
            && self.meta.is_empty()
            && self.columns.is_empty()
            && self.ranges.is_empty()
            && self.notes.is_empty()
    }

    /// Notes attached to `address`, if any
    pub fn notes_for(&self, address: &str) -> Option<&[String]> {
        self.notes
            .get(address)
            .map(Vec::as_slice)
            .filter(|notes| !notes.is_empty())
    }
}

/// Convert a metadata key to snake_case (`rowHeight` → `row_height`)
pub fn to_snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut prev_lower_or_digit = false;
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            if prev_lower_or_digit {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower_or_digit = false;
        } else if c == '-' || c == ' ' {
            out.push('_');
            prev_lower_or_digit = false;
        } else {
            out.push(c);
            prev_lower_or_digit = c.is_ascii_lowercase() || c.is_ascii_digit();
        }
    }
    out
}

/// Sheet meta keys that name the sheet's own bounds and panes
const RESERVED_META_KEYS: [&str; 4] = ["row_count", "column_count", "frozen_rows", "frozen_columns"];

/// Whether a metadata key, once snake_cased, collides with a bounds field
pub fn is_reserved_meta_key(key: &str) -> bool {
    RESERVED_META_KEYS.contains(&to_snake_case(key).as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snake_case() {
        assert_eq!(to_snake_case("rowHeight"), "row_height");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
        assert_eq!(to_snake_case("showGridLines2"), "show_grid_lines2");
        assert_eq!(to_snake_case("tab-color"), "tab_color");
        assert_eq!(to_snake_case(&to_snake_case("defaultColWidth")), "default_col_width");
    }

    #[test]
    fn test_reserved_meta_keys() {
        assert!(is_reserved_meta_key("rowCount"));
        assert!(is_reserved_meta_key("column_count"));
        assert!(is_reserved_meta_key("frozenRows"));
        assert!(!is_reserved_meta_key("tabColor"));
        assert!(!is_reserved_meta_key("rows"));
    }

    #[test]
    fn test_meta_value_untagged() {
        let v: MetaValue = serde_json::from_str("12").unwrap();
        assert_eq!(v, MetaValue::Integer(12));
        let v: MetaValue = serde_json::from_str("1.5").unwrap();
        assert_eq!(v, MetaValue::Float(1.5));
        let v: MetaValue = serde_json::from_str("{\"a\": [true]}").unwrap();
        assert!(!v.is_scalar());
    }

    #[test]
    fn test_empty_annotations() {
        let mut annotations = SheetAnnotations::default();
        assert!(annotations.is_empty());
        annotations.notes.insert("A1".into(), vec![]);
        assert!(annotations.notes_for("A1").is_none());
    }
}
