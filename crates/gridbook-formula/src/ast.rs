//! Formula Abstract Syntax Tree types

use gridbook_core::{CellAddress, CellRange};
use std::collections::BTreeSet;

/// Formula expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaExpr {
    // === Literals ===
    /// Numeric literal
    Number(f64),
    /// String literal
    String(String),
    /// Boolean literal
    Boolean(bool),

    // === References ===
    /// Single cell reference on the current page
    CellRef(CellAddress),
    /// Range reference on the current page
    RangeRef(CellRange),
    /// Single cell on another page
    ExternalCellRef {
        reference: ExternalReference,
        address: CellAddress,
    },
    /// Range on another page
    ExternalRangeRef {
        reference: ExternalReference,
        range: CellRange,
    },

    // === Operators ===
    /// Binary operation
    BinaryOp {
        op: BinaryOperator,
        left: Box<FormulaExpr>,
        right: Box<FormulaExpr>,
    },
    /// Unary operation
    UnaryOp {
        op: UnaryOperator,
        operand: Box<FormulaExpr>,
    },

    // === Function call ===
    Function { name: String, args: Vec<FormulaExpr> },
}

/// A link to another page: `@[Label](identifier:type)`
///
/// The identifier group is optional; `@[Label]` alone resolves by label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExternalReference {
    /// Text exactly as written, e.g. `@[Budget](page-7:page)`
    pub raw: String,
    /// Label between the brackets
    pub label: String,
    /// Part of the parenthesized group before the first `:`
    pub identifier: Option<String>,
    /// Part of the parenthesized group after the first `:`
    pub mention_type: Option<String>,
}

impl ExternalReference {
    /// Label trimmed, inner whitespace collapsed and lowercased
    pub fn normalized_label(&self) -> String {
        self.label
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    /// Key used to memoize resolution: the identifier if present, else the
    /// normalized label
    pub fn resolution_key(&self) -> String {
        match &self.identifier {
            Some(id) => format!("id:{}", id),
            None => format!("label:{}", self.normalized_label()),
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    // Text
    Concat,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Plus,
}

impl FormulaExpr {
    /// Every reference the expression mentions, sorted and deduplicated
    ///
    /// Local ranges expand to their individual addresses unless they hold more
    /// than `max_range_cells` cells, in which case the range text is recorded
    /// instead. External references are recorded as `<raw>:<address>` (or
    /// `<raw>:<start>:<end>` for ranges).
    pub fn references(&self, max_range_cells: Option<u64>) -> Vec<String> {
        self.references_within(max_range_cells, None)
    }

    /// Like [`references`](Self::references), but local ranges only expand to
    /// the addresses inside `extent`
    pub fn references_within(
        &self,
        max_range_cells: Option<u64>,
        extent: Option<&CellRange>,
    ) -> Vec<String> {
        let mut refs = BTreeSet::new();
        self.collect_references(max_range_cells, extent, &mut refs);
        refs.into_iter().collect()
    }

    fn collect_references(
        &self,
        max_range_cells: Option<u64>,
        extent: Option<&CellRange>,
        refs: &mut BTreeSet<String>,
    ) {
        match self {
            FormulaExpr::Number(_) | FormulaExpr::String(_) | FormulaExpr::Boolean(_) => {}
            FormulaExpr::CellRef(address) => {
                refs.insert(address.to_a1_string());
            }
            FormulaExpr::RangeRef(range) => {
                if max_range_cells.map_or(false, |max| range.cell_count() > max) {
                    refs.insert(range.to_a1_string());
                } else {
                    let inside = match extent {
                        Some(extent) => range.intersection(extent),
                        None => Some(*range),
                    };
                    if let Some(inside) = inside {
                        refs.extend(inside.cells().map(|a| a.to_a1_string()));
                    }
                }
            }
            FormulaExpr::ExternalCellRef { reference, address } => {
                refs.insert(format!("{}:{}", reference.raw, address));
            }
            FormulaExpr::ExternalRangeRef { reference, range } => {
                refs.insert(format!("{}:{}", reference.raw, range));
            }
            FormulaExpr::BinaryOp { left, right, .. } => {
                left.collect_references(max_range_cells, extent, refs);
                right.collect_references(max_range_cells, extent, refs);
            }
            FormulaExpr::UnaryOp { operand, .. } => {
                operand.collect_references(max_range_cells, extent, refs);
            }
            FormulaExpr::Function { args, .. } => {
                for arg in args {
                    arg.collect_references(max_range_cells, extent, refs);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(label: &str, identifier: Option<&str>) -> ExternalReference {
        ExternalReference {
            raw: format!("@[{}]", label),
            label: label.to_string(),
            identifier: identifier.map(str::to_string),
            mention_type: None,
        }
    }

    #[test]
    fn test_normalized_label() {
        assert_eq!(
            reference("  Quarterly   Budget ", None).normalized_label(),
            "quarterly budget"
        );
    }

    #[test]
    fn test_resolution_key_prefers_identifier() {
        assert_eq!(reference("Budget", Some("p7")).resolution_key(), "id:p7");
        assert_eq!(reference("Budget", None).resolution_key(), "label:budget");
    }

    #[test]
    fn test_references_expand_ranges() {
        let expr = FormulaExpr::Function {
            name: "SUM".into(),
            args: vec![
                FormulaExpr::RangeRef(CellRange::parse("A1:A3").unwrap()),
                FormulaExpr::CellRef(CellAddress::parse("A2").unwrap()),
            ],
        };
        assert_eq!(expr.references(None), vec!["A1", "A2", "A3"]);
        assert_eq!(expr.references(Some(2)), vec!["A1:A3", "A2"]);

        let extent = CellRange::parse("A1:B2").unwrap();
        assert_eq!(expr.references_within(None, Some(&extent)), vec!["A1", "A2"]);
        let huge = FormulaExpr::RangeRef(CellRange::parse("B2:XFD1048576").unwrap());
        assert_eq!(huge.references_within(None, Some(&extent)), vec!["B2"]);
    }
}
