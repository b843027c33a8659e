//! Formula error types

use std::fmt;
use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur during formula tokenizing, parsing or evaluation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    /// Malformed token (bad character, unterminated literal or reference)
    #[error("{0}")]
    Tokenize(String),

    /// Formula grammar error
    #[error("{0}")]
    Parse(String),

    /// A value could not be used as a number
    #[error("Cannot convert \"{0}\" to a number")]
    Coercion(String),

    /// A value could not be used as a boolean
    #[error("Cannot convert \"{0}\" to a boolean")]
    BooleanCoercion(String),

    /// Division (or MOD) by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// Unknown function
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Wrong number of arguments
    #[error("{function} expects {expected}")]
    ArgumentCount { function: String, expected: String },

    /// Invalid argument
    #[error("{0}")]
    Argument(String),

    /// FIND / SEARCH did not locate the needle
    #[error("{function}: \"{needle}\" not found")]
    NotFound { function: String, needle: String },

    /// A reference could not be resolved (e.g. an external page)
    #[error("{0}")]
    Reference(String),

    /// A referenced cell holds an error; it propagates unchanged
    #[error("{}", .0.message)]
    Cell(CellFailure),

    /// A configured evaluation limit was exceeded
    #[error("{0}")]
    LimitExceeded(String),
}

impl FormulaError {
    /// The cell-level failure this error turns into when it escapes a formula
    pub fn failure(&self) -> CellFailure {
        match self {
            FormulaError::Cell(failure) => failure.clone(),
            other => CellFailure::evaluation(other.to_string()),
        }
    }

    pub(crate) fn argument_count(function: &str, expected: String) -> Self {
        FormulaError::ArgumentCount {
            function: function.to_string(),
            expected,
        }
    }
}

/// Kind of a cell-level failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The cell (transitively) references itself
    CircularReference,
    /// Any other evaluation, parse or reference failure
    Evaluation,
}

impl ErrorKind {
    /// Marker shown in place of the value
    pub fn display(&self) -> &'static str {
        match self {
            ErrorKind::CircularReference => "#CYCLE",
            ErrorKind::Evaluation => "#ERROR",
        }
    }
}

/// An error stored on an evaluated cell
#[derive(Debug, Clone, PartialEq)]
pub struct CellFailure {
    pub kind: ErrorKind,
    pub message: String,
    /// Addresses involved (the cycle members for circular references)
    pub details: Vec<String>,
}

impl CellFailure {
    pub fn evaluation(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Evaluation,
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn circular(details: Vec<String>) -> Self {
        Self {
            kind: ErrorKind::CircularReference,
            message: "Circular reference detected".to_string(),
            details,
        }
    }
}

impl fmt::Display for CellFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
