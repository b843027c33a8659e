//! Logical functions
//!
//! `IF` and `IFERROR` are special forms: they receive unevaluated arguments
//! so that only the branch actually taken gets evaluated.

use crate::ast::FormulaExpr;
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::{evaluate_scalar, evaluate_value, to_bool, EvaluationContext, FormulaValue};
use gridbook_core::CellValue;

/// IF(condition, value_if_true, [value_if_false])
///
/// A false condition without a third argument yields `""`.
pub fn evaluate_if<C: EvaluationContext + ?Sized>(
    args: &[FormulaExpr],
    ctx: &mut C,
) -> FormulaResult<FormulaValue> {
    if !(2..=3).contains(&args.len()) {
        let expected = if args.len() < 2 {
            "at least two arguments"
        } else {
            "at most three arguments"
        };
        return Err(FormulaError::argument_count("IF", expected.to_string()));
    }

    let condition = to_bool(&evaluate_scalar(&args[0], ctx)?)?;
    if condition {
        evaluate_value(&args[1], ctx)
    } else {
        match args.get(2) {
            Some(otherwise) => evaluate_value(otherwise, ctx),
            None => Ok(FormulaValue::Single(CellValue::String(String::new()))),
        }
    }
}

/// IFERROR(value, value_if_error)
///
/// The first argument's error never escapes; the fallback is only evaluated
/// when it is needed.
pub fn evaluate_iferror<C: EvaluationContext + ?Sized>(
    args: &[FormulaExpr],
    ctx: &mut C,
) -> FormulaResult<FormulaValue> {
    if args.len() != 2 {
        return Err(FormulaError::argument_count(
            "IFERROR",
            "exactly two arguments".to_string(),
        ));
    }

    match evaluate_value(&args[0], ctx) {
        Ok(value) => Ok(value),
        Err(_) => evaluate_value(&args[1], ctx),
    }
}

/// AND(values...) - blanks are ignored
pub fn fn_and(args: &[CellValue]) -> FormulaResult<CellValue> {
    for arg in args.iter().filter(|v| !v.is_blank()) {
        if !to_bool(arg)? {
            return Ok(CellValue::Boolean(false));
        }
    }
    Ok(CellValue::Boolean(true))
}

/// OR(values...) - blanks are ignored
pub fn fn_or(args: &[CellValue]) -> FormulaResult<CellValue> {
    for arg in args.iter().filter(|v| !v.is_blank()) {
        if to_bool(arg)? {
            return Ok(CellValue::Boolean(true));
        }
    }
    Ok(CellValue::Boolean(false))
}

/// NOT(value)
pub fn fn_not(args: &[CellValue]) -> FormulaResult<CellValue> {
    let value = args.first().cloned().unwrap_or_default();
    Ok(CellValue::Boolean(!to_bool(&value)?))
}

#[cfg(test)]
mod tests {
    use crate::error::FormulaError;
    use crate::evaluator::tests::{eval, eval_with, MapContext};
    use gridbook_core::CellValue;

    #[test]
    fn test_if() {
        assert_eq!(eval("=IF(1>0, \"yes\", \"no\")").unwrap(), CellValue::from("yes"));
        assert_eq!(eval("=IF(0, \"yes\", \"no\")").unwrap(), CellValue::from("no"));
        assert_eq!(eval("=IF(FALSE, 1)").unwrap(), CellValue::from(""));
        assert_eq!(
            eval("=IF(TRUE)").unwrap_err().to_string(),
            "IF expects at least two arguments"
        );
    }

    #[test]
    fn test_if_is_lazy() {
        // The untaken branch would fail
        assert_eq!(eval("=IF(TRUE, 1, 1/0)").unwrap(), CellValue::Number(1.0));
        assert_eq!(eval("=IF(FALSE, NOPE(), 2)").unwrap(), CellValue::Number(2.0));
    }

    #[test]
    fn test_if_passes_ranges_through() {
        let mut ctx = MapContext::with(&[
            ("A1", CellValue::Number(1.0)),
            ("A2", CellValue::Number(2.0)),
        ]);
        assert_eq!(
            eval_with("=SUM(IF(TRUE, A1:A2, 0))", &mut ctx).unwrap(),
            CellValue::Number(3.0)
        );
    }

    #[test]
    fn test_iferror() {
        assert_eq!(eval("=IFERROR(1/0, \"oops\")").unwrap(), CellValue::from("oops"));
        assert_eq!(eval("=IFERROR(4, NOPE())").unwrap(), CellValue::Number(4.0));
        assert_eq!(
            eval("=IFERROR(1/0, 2/0)").unwrap_err(),
            FormulaError::DivisionByZero
        );
    }

    #[test]
    fn test_and_or_not() {
        assert_eq!(eval("=AND(TRUE, 1)").unwrap(), CellValue::Boolean(true));
        assert_eq!(eval("=AND(TRUE, 0)").unwrap(), CellValue::Boolean(false));
        assert_eq!(eval("=OR(FALSE, \"true\")").unwrap(), CellValue::Boolean(true));
        assert_eq!(eval("=OR(FALSE, 0)").unwrap(), CellValue::Boolean(false));
        assert_eq!(eval("=NOT(0)").unwrap(), CellValue::Boolean(true));
        assert!(matches!(
            eval("=NOT(\"maybe\")"),
            Err(FormulaError::BooleanCoercion(_))
        ));
    }
}
