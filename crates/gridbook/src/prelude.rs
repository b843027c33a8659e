//! Prelude module - common imports for gridbook users
//!
//! ```rust
//! use gridbook::prelude::*;
//! ```

pub use crate::{
    // Public operations
    collect_external_references,
    create_empty_grid,
    evaluate_sheet,
    is_valid_address,
    parse_grid_content,
    sanitize_grid,
    serialize_grid_content,
    update_cells,

    // Grid types
    CellAddress,
    CellUpdate,
    CellValue,
    Grid,
    ValueType,

    // Evaluation types
    CellEvaluation,
    CellFailure,
    ErrorKind,
    Evaluation,
    EvaluationLimits,
    EvaluationOptions,
    ExternalReference,
    ExternalResolver,
    ResolvedPage,

    // Serialization types
    GridContent,
    SerializeOptions,

    // Error types
    DocError,
    Error,
    Result,
};
