//! # gridbook-formula
//!
//! Formula language and evaluation for gridbook.
//!
//! This crate provides:
//! - Tokenizing and parsing formulas (text → AST)
//! - Formula evaluation (AST → value)
//! - The built-in function library
//! - An evaluation [`Environment`] with per-page caches, cycle detection
//!   and external page references
//! - Dependency tracking between cells
//!
//! ## Example
//!
//! ```rust
//! use gridbook_core::{CellAddress, CellUpdate, CellValue, Grid};
//! use gridbook_formula::Environment;
//!
//! let mut grid = Grid::new(5, 5);
//! grid.apply_updates(&[CellUpdate::new("A1", "5"), CellUpdate::new("B1", "=A1+3")])
//!     .unwrap();
//!
//! let mut env = Environment::new(&grid);
//! let b1 = env.evaluate_local(&CellAddress::parse("B1").unwrap());
//! assert_eq!(b1.value, CellValue::Number(8.0));
//! ```

pub mod ast;
pub mod dependency;
pub mod environment;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod parser;
pub mod tokenizer;

pub use ast::{BinaryOperator, ExternalReference, FormulaExpr, UnaryOperator};
pub use dependency::DependencyGraph;
pub use environment::{
    is_number_literal, EvaluatedCell, EvaluationLimits, Environment, ExternalResolver, PageKey,
    ResolvedPage, LOCAL_PAGE,
};
pub use error::{CellFailure, ErrorKind, FormulaError, FormulaResult};
pub use evaluator::{evaluate, to_bool, to_number, EvaluationContext, FormulaValue};
pub use parser::{parse_formula, parse_formula_with_depth};
pub use tokenizer::{tokenize, Token};
