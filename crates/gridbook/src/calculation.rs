//! Sheet evaluation
//!
//! Evaluates every cell of a grid once through a fresh [`Environment`], then
//! derives the reverse (dependents) edges and the row-major rendering grids.
//!
//! # Example
//!
//! ```rust
//! use gridbook::{evaluate_sheet, update_cells, create_empty_grid, CellUpdate, EvaluationOptions};
//!
//! let grid = update_cells(
//!     create_empty_grid(5, 5),
//!     &[CellUpdate::new("A1", "5"), CellUpdate::new("B1", "=A1+3")],
//! )
//! .unwrap();
//!
//! let evaluation = evaluate_sheet(&grid, EvaluationOptions::default());
//! assert_eq!(evaluation.cells["B1"].display, "8");
//! assert_eq!(evaluation.cells["A1"].dependents, vec!["B1"]);
//! ```

use gridbook_core::{CellAddress, CellValue, Grid, ValueType};
use gridbook_doc::DependencyRecord;
use gridbook_formula::{
    CellFailure, DependencyGraph, EvaluatedCell, EvaluationLimits, Environment, ExternalResolver,
};
use std::collections::BTreeMap;
use tracing::debug;

/// Options for one sheet evaluation
#[derive(Default)]
pub struct EvaluationOptions<'a> {
    /// Id of the page being evaluated; references back to it use the local cache
    pub page_id: Option<String>,
    pub page_title: Option<String>,
    /// Supplies pages for `@[Label](id)` references
    pub resolver: Option<&'a mut dyn ExternalResolver>,
    pub limits: EvaluationLimits,
}

impl<'a> EvaluationOptions<'a> {
    pub fn with_resolver(mut self, resolver: &'a mut dyn ExternalResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }
}

/// Evaluation result of one cell
#[derive(Debug, Clone, PartialEq)]
pub struct CellEvaluation {
    pub address: String,
    pub raw: String,
    pub value: CellValue,
    pub display: String,
    pub value_type: ValueType,
    pub error: Option<CellFailure>,
    /// Sorted, deduplicated references read by the formula
    pub depends_on: Vec<String>,
    /// Sorted, deduplicated cells of this sheet reading this cell
    pub dependents: Vec<String>,
}

impl CellEvaluation {
    fn from_evaluated(cell: EvaluatedCell, dependents: Vec<String>) -> Self {
        Self {
            value_type: cell.value_type(),
            address: cell.address,
            raw: cell.raw,
            value: cell.value,
            display: cell.display,
            error: cell.error,
            depends_on: cell.depends_on,
            dependents,
        }
    }

    /// Whether this cell holds a formula
    pub fn is_formula(&self) -> bool {
        self.raw.trim_start().starts_with('=')
    }
}

/// Result of [`evaluate_sheet`]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Evaluation {
    /// Cells with content or at least one dependency edge
    pub cells: BTreeMap<String, CellEvaluation>,
    /// Display text, row-major
    pub display: Vec<Vec<String>>,
    /// Error message per cell, row-major
    pub errors: Vec<Vec<Option<String>>>,
    /// Edges of every cell that has any
    pub dependencies: BTreeMap<String, DependencyRecord>,
}

impl Evaluation {
    /// Evaluation of one cell, if it has content or edges
    pub fn cell(&self, address: &str) -> Option<&CellEvaluation> {
        self.cells.get(address)
    }

    /// Number of errored cells
    pub fn error_count(&self) -> usize {
        self.cells.values().filter(|c| c.error.is_some()).count()
    }
}

/// Evaluate every cell of `grid`
pub fn evaluate_sheet(grid: &Grid, options: EvaluationOptions<'_>) -> Evaluation {
    let grid = grid.clone().sanitize();
    let mut env = Environment::new(&grid)
        .with_page(options.page_id, options.page_title)
        .with_limits(options.limits);
    if let Some(resolver) = options.resolver {
        env = env.with_resolver(resolver);
    }

    let mut evaluated = Vec::with_capacity(grid.cells.len());
    let mut display = Vec::with_capacity(grid.row_count as usize);
    let mut errors = Vec::with_capacity(grid.row_count as usize);
    for row in 0..grid.row_count {
        let mut display_row = Vec::with_capacity(grid.column_count as usize);
        let mut error_row = Vec::with_capacity(grid.column_count as usize);
        for col in 0..grid.column_count {
            let cell = env.evaluate_local(&CellAddress::new(row, col));
            display_row.push(cell.display.clone());
            error_row.push(cell.error.as_ref().map(|e| e.message.clone()));
            evaluated.push(cell);
        }
        display.push(display_row);
        errors.push(error_row);
    }

    // Reverse pass
    let mut graph = DependencyGraph::new();
    for cell in &evaluated {
        graph.add_precedents(&cell.address, &cell.depends_on);
    }

    let mut cells = BTreeMap::new();
    let mut dependencies = BTreeMap::new();
    for cell in evaluated {
        let dependents = graph.dependents(&cell.address);
        let has_edges = !cell.depends_on.is_empty() || !dependents.is_empty();
        if cell.raw.trim().is_empty() && !has_edges {
            continue;
        }
        if has_edges {
            dependencies.insert(
                cell.address.clone(),
                DependencyRecord {
                    depends_on: cell.depends_on.clone(),
                    dependents: dependents.clone(),
                },
            );
        }
        cells.insert(
            cell.address.clone(),
            CellEvaluation::from_evaluated(cell, dependents),
        );
    }

    debug!(
        cells = cells.len(),
        pages = env.page_count(),
        "evaluated sheet"
    );

    Evaluation {
        cells,
        display,
        errors,
        dependencies,
    }
}
