//! Formula evaluator
//!
//! Evaluates formula ASTs to produce values. Cell lookups go through an
//! [`EvaluationContext`], which is where caching and cycle detection live.

use crate::ast::{BinaryOperator, ExternalReference, FormulaExpr, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::functions::{logical, FunctionRegistry};
use gridbook_core::{CellAddress, CellRange, CellValue};
use std::sync::OnceLock;

/// Global function registry (lazily initialized)
static FUNCTION_REGISTRY: OnceLock<FunctionRegistry> = OnceLock::new();

/// The built-in function library
pub fn function_registry() -> &'static FunctionRegistry {
    FUNCTION_REGISTRY.get_or_init(FunctionRegistry::new)
}

/// Source of cell values for an evaluation
pub trait EvaluationContext {
    /// Value of a cell on the current page; an errored cell yields its error
    fn cell(&mut self, address: &CellAddress) -> FormulaResult<CellValue>;

    /// Value of a cell on an external page
    fn external_cell(
        &mut self,
        reference: &ExternalReference,
        address: &CellAddress,
    ) -> FormulaResult<CellValue>;

    /// Largest range a formula may read, if limited
    fn max_range_cells(&self) -> Option<u64> {
        None
    }

    /// Bounds of the page a range reads from (the current page when
    /// `reference` is `None`); cells outside them are blank and are skipped
    fn page_extent(
        &mut self,
        _reference: Option<&ExternalReference>,
    ) -> FormulaResult<Option<CellRange>> {
        Ok(None)
    }
}

/// Intermediate value: a single value or a flattened range
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaValue {
    Single(CellValue),
    List(Vec<CellValue>),
}

impl FormulaValue {
    /// Collapse to one value for operators; a one-cell range is allowed
    pub fn into_scalar(self) -> FormulaResult<CellValue> {
        match self {
            FormulaValue::Single(value) => Ok(value),
            FormulaValue::List(mut values) if values.len() == 1 => Ok(values.remove(0)),
            FormulaValue::List(values) if values.is_empty() => Ok(CellValue::Empty),
            FormulaValue::List(values) => Err(FormulaError::Argument(format!(
                "Expected a single value but got a range of {} cells",
                values.len()
            ))),
        }
    }

    fn flatten_into(self, out: &mut Vec<CellValue>) {
        match self {
            FormulaValue::Single(value) => out.push(value),
            FormulaValue::List(values) => out.extend(values),
        }
    }
}

/// Evaluate a formula expression to the value stored in its cell
///
/// A formula whose result is a multi-cell range yields the display forms of
/// the range joined with `", "`.
pub fn evaluate<C: EvaluationContext + ?Sized>(
    expr: &FormulaExpr,
    ctx: &mut C,
) -> FormulaResult<CellValue> {
    match evaluate_value(expr, ctx)? {
        FormulaValue::Single(value) => Ok(value),
        FormulaValue::List(mut values) if values.len() == 1 => Ok(values.remove(0)),
        FormulaValue::List(values) if values.is_empty() => Ok(CellValue::Empty),
        FormulaValue::List(values) => Ok(CellValue::String(
            values
                .iter()
                .map(CellValue::display)
                .collect::<Vec<_>>()
                .join(", "),
        )),
    }
}

/// Evaluate an expression without collapsing ranges
pub fn evaluate_value<C: EvaluationContext + ?Sized>(
    expr: &FormulaExpr,
    ctx: &mut C,
) -> FormulaResult<FormulaValue> {
    match expr {
        // === Literals ===
        FormulaExpr::Number(n) => Ok(FormulaValue::Single(CellValue::Number(*n))),
        FormulaExpr::String(s) => Ok(FormulaValue::Single(CellValue::String(s.clone()))),
        FormulaExpr::Boolean(b) => Ok(FormulaValue::Single(CellValue::Boolean(*b))),

        // === References ===
        FormulaExpr::CellRef(address) => ctx.cell(address).map(FormulaValue::Single),

        FormulaExpr::RangeRef(range) => {
            let mut values = Vec::new();
            if let Some(range) = readable_range(range, None, ctx)? {
                values.reserve(range.cell_count() as usize);
                for address in range.cells() {
                    values.push(ctx.cell(&address)?);
                }
            }
            Ok(FormulaValue::List(values))
        }

        FormulaExpr::ExternalCellRef { reference, address } => {
            ctx.external_cell(reference, address).map(FormulaValue::Single)
        }

        FormulaExpr::ExternalRangeRef { reference, range } => {
            let mut values = Vec::new();
            if let Some(range) = readable_range(range, Some(reference), ctx)? {
                values.reserve(range.cell_count() as usize);
                for address in range.cells() {
                    values.push(ctx.external_cell(reference, &address)?);
                }
            }
            Ok(FormulaValue::List(values))
        }

        // === Operators ===
        FormulaExpr::BinaryOp { op, left, right } => {
            evaluate_binary_op(*op, left, right, ctx).map(FormulaValue::Single)
        }

        FormulaExpr::UnaryOp { op, operand } => {
            evaluate_unary_op(*op, operand, ctx).map(FormulaValue::Single)
        }

        // === Functions ===
        FormulaExpr::Function { name, args } => evaluate_function(name, args, ctx),
    }
}

/// The part of `range` that holds cells, after the range limit check
fn readable_range<C: EvaluationContext + ?Sized>(
    range: &CellRange,
    reference: Option<&ExternalReference>,
    ctx: &mut C,
) -> FormulaResult<Option<CellRange>> {
    check_range(range, ctx)?;
    Ok(match ctx.page_extent(reference)? {
        Some(extent) => range.intersection(&extent),
        None => Some(*range),
    })
}

fn check_range<C: EvaluationContext + ?Sized>(range: &CellRange, ctx: &C) -> FormulaResult<()> {
    if let Some(max) = ctx.max_range_cells() {
        if range.cell_count() > max {
            return Err(FormulaError::LimitExceeded(format!(
                "Range {} has {} cells, more than the limit of {}",
                range,
                range.cell_count(),
                max
            )));
        }
    }
    Ok(())
}

/// Evaluate an expression in a scalar position
pub(crate) fn evaluate_scalar<C: EvaluationContext + ?Sized>(
    expr: &FormulaExpr,
    ctx: &mut C,
) -> FormulaResult<CellValue> {
    evaluate_value(expr, ctx)?.into_scalar()
}

/// Numeric coercion
///
/// Empty and `""` are 0, booleans are 0/1, numeric strings parse; any other
/// string is an error.
pub fn to_number(value: &CellValue) -> FormulaResult<f64> {
    match value {
        CellValue::Empty => Ok(0.0),
        CellValue::Number(n) => Ok(*n),
        CellValue::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
        CellValue::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(0.0);
            }
            trimmed
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .ok_or_else(|| FormulaError::Coercion(s.clone()))
        }
    }
}

/// Boolean coercion
///
/// Numbers are true when non-zero; strings accept TRUE/FALSE (any case) or a
/// number; blanks are false.
pub fn to_bool(value: &CellValue) -> FormulaResult<bool> {
    match value {
        CellValue::Empty => Ok(false),
        CellValue::Boolean(b) => Ok(*b),
        CellValue::Number(n) => Ok(*n != 0.0),
        CellValue::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(false);
            }
            if trimmed.eq_ignore_ascii_case("TRUE") {
                return Ok(true);
            }
            if trimmed.eq_ignore_ascii_case("FALSE") {
                return Ok(false);
            }
            to_number(value)
                .map(|n| n != 0.0)
                .map_err(|_| FormulaError::BooleanCoercion(s.clone()))
        }
    }
}

/// Evaluate a binary operation
fn evaluate_binary_op<C: EvaluationContext + ?Sized>(
    op: BinaryOperator,
    left: &FormulaExpr,
    right: &FormulaExpr,
    ctx: &mut C,
) -> FormulaResult<CellValue> {
    // Evaluate operands first
    let left_val = evaluate_scalar(left, ctx)?;
    let right_val = evaluate_scalar(right, ctx)?;

    match op {
        BinaryOperator::Add => match (to_number(&left_val), to_number(&right_val)) {
            (Ok(l), Ok(r)) => Ok(CellValue::Number(l + r)),
            // Falls back to concatenation
            _ => Ok(CellValue::String(left_val.display() + &right_val.display())),
        },
        BinaryOperator::Subtract => {
            Ok(CellValue::Number(to_number(&left_val)? - to_number(&right_val)?))
        }
        BinaryOperator::Multiply => {
            Ok(CellValue::Number(to_number(&left_val)? * to_number(&right_val)?))
        }
        BinaryOperator::Divide => {
            let l = to_number(&left_val)?;
            let r = to_number(&right_val)?;
            if r == 0.0 {
                return Err(FormulaError::DivisionByZero);
            }
            Ok(CellValue::Number(l / r))
        }
        BinaryOperator::Power => {
            let l = to_number(&left_val)?;
            let r = to_number(&right_val)?;
            power(l, r).map(CellValue::Number)
        }

        BinaryOperator::Concat => {
            Ok(CellValue::String(left_val.display() + &right_val.display()))
        }

        BinaryOperator::Equal => Ok(CellValue::Boolean(values_equal(&left_val, &right_val))),
        BinaryOperator::NotEqual => Ok(CellValue::Boolean(!values_equal(&left_val, &right_val))),
        BinaryOperator::LessThan
        | BinaryOperator::LessEqual
        | BinaryOperator::GreaterThan
        | BinaryOperator::GreaterEqual => {
            let l = to_number(&left_val)?;
            let r = to_number(&right_val)?;
            let result = match op {
                BinaryOperator::LessThan => l < r,
                BinaryOperator::LessEqual => l <= r,
                BinaryOperator::GreaterThan => l > r,
                _ => l >= r,
            };
            Ok(CellValue::Boolean(result))
        }
    }
}

/// `l ^ r`, rejecting results that are not finite numbers
pub(crate) fn power(l: f64, r: f64) -> FormulaResult<f64> {
    let result = l.powf(r);
    if result.is_finite() {
        Ok(result)
    } else {
        Err(FormulaError::Argument(format!(
            "{} ^ {} is not a finite number",
            l, r
        )))
    }
}

/// Numeric equality, falling back to display-string equality
fn values_equal(left: &CellValue, right: &CellValue) -> bool {
    match (to_number(left), to_number(right)) {
        (Ok(l), Ok(r)) => l == r,
        _ => left.display() == right.display(),
    }
}

/// Evaluate a unary operation
fn evaluate_unary_op<C: EvaluationContext + ?Sized>(
    op: UnaryOperator,
    operand: &FormulaExpr,
    ctx: &mut C,
) -> FormulaResult<CellValue> {
    let n = to_number(&evaluate_scalar(operand, ctx)?)?;
    match op {
        UnaryOperator::Negate => Ok(CellValue::Number(-n)),
        UnaryOperator::Plus => Ok(CellValue::Number(n)),
    }
}

/// Evaluate a function call
fn evaluate_function<C: EvaluationContext + ?Sized>(
    name: &str,
    args: &[FormulaExpr],
    ctx: &mut C,
) -> FormulaResult<FormulaValue> {
    // Lazy forms evaluate only the arguments they need
    match name {
        "IF" => return logical::evaluate_if(args, ctx),
        "IFERROR" => return logical::evaluate_iferror(args, ctx),
        _ => {}
    }

    let func = function_registry()
        .get(name)
        .ok_or_else(|| FormulaError::UnknownFunction(name.to_string()))?;

    // Evaluate arguments, flattening ranges
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        evaluate_value(arg, ctx)?.flatten_into(&mut values);
    }

    func.check_arity(values.len())?;
    (func.implementation)(&values).map(FormulaValue::Single)
}
