//! Evaluated cell values

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// A primitive value produced by evaluating a cell
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    /// No value (blank cell)
    #[default]
    Empty,
    /// Numeric value
    Number(f64),
    /// Text value
    String(String),
    /// Boolean value
    Boolean(bool),
}

/// Type tag of a [`CellValue`], as persisted in documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Empty,
    Number,
    String,
    Boolean,
}

impl ValueType {
    /// Persisted name of the tag
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Empty => "empty",
            ValueType::Number => "number",
            ValueType::String => "string",
            ValueType::Boolean => "boolean",
        }
    }
}

impl CellValue {
    /// Type tag of this value
    pub fn value_type(&self) -> ValueType {
        match self {
            CellValue::Empty => ValueType::Empty,
            CellValue::Number(_) => ValueType::Number,
            CellValue::String(_) => ValueType::String,
            CellValue::Boolean(_) => ValueType::Boolean,
        }
    }

    /// Blank means empty or the empty string
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Display form used for concatenation, string comparison and rendering
    pub fn display(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Number(n) => format_number(*n),
            CellValue::String(s) => s.clone(),
            CellValue::Boolean(true) => "TRUE".to_string(),
            CellValue::Boolean(false) => "FALSE".to_string(),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Boolean(b)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(s)
    }
}

/// Empty serializes as `""`, matching the persisted document form
impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Empty => serializer.serialize_str(""),
            CellValue::Number(n) => serializer.serialize_f64(*n),
            CellValue::String(s) => serializer.serialize_str(s),
            CellValue::Boolean(b) => serializer.serialize_bool(*b),
        }
    }
}

/// Format a number for display without trailing zeros
///
/// Integral values print without a fractional part. Magnitudes of `1e21` and
/// above, or below `1e-6`, switch to exponent form (`1e+21`, `1.5e-7`);
/// everything else uses the shortest round-trip positional form.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let magnitude = n.abs();
    if n != 0.0 && !(1e-6..1e21).contains(&magnitude) {
        let formatted = format!("{:e}", n);
        return match formatted.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{}e+{}", mantissa, exponent)
            }
            _ => formatted,
        };
    }
    format_number_positional(n)
}

/// Format a number positionally, never in exponent form
///
/// This is the raw-text form of a number: it always reads back as a number
/// literal.
pub fn format_number_positional(n: f64) -> String {
    if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
