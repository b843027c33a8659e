//! Statistical functions

use crate::error::FormulaResult;
use crate::evaluator::to_number;
use gridbook_core::CellValue;

/// AVERAGE(values...) - blanks are left out; 0 when nothing remains
pub fn fn_average(args: &[CellValue]) -> FormulaResult<CellValue> {
    let mut sum = 0.0;
    let mut count = 0usize;

    for arg in args.iter().filter(|v| !v.is_blank()) {
        sum += to_number(arg)?;
        count += 1;
    }

    if count == 0 {
        return Ok(CellValue::Number(0.0));
    }
    Ok(CellValue::Number(sum / count as f64))
}

/// MIN(values...) - 0 when given nothing
pub fn fn_min(args: &[CellValue]) -> FormulaResult<CellValue> {
    fold_numbers(args, f64::min)
}

/// MAX(values...) - 0 when given nothing
pub fn fn_max(args: &[CellValue]) -> FormulaResult<CellValue> {
    fold_numbers(args, f64::max)
}

fn fold_numbers(args: &[CellValue], pick: fn(f64, f64) -> f64) -> FormulaResult<CellValue> {
    let mut result: Option<f64> = None;
    for arg in args {
        let n = to_number(arg)?;
        result = Some(result.map_or(n, |r| pick(r, n)));
    }
    Ok(CellValue::Number(result.unwrap_or(0.0)))
}

/// COUNT(values...) - numbers, booleans and numeric strings
pub fn fn_count(args: &[CellValue]) -> FormulaResult<CellValue> {
    let count = args
        .iter()
        .filter(|v| !v.is_blank() && to_number(v).is_ok())
        .count();
    Ok(CellValue::Number(count as f64))
}

/// COUNTA(values...) - every non-blank value
pub fn fn_counta(args: &[CellValue]) -> FormulaResult<CellValue> {
    let count = args.iter().filter(|v| !v.is_blank()).count();
    Ok(CellValue::Number(count as f64))
}

#[cfg(test)]
mod tests {
    use crate::evaluator::tests::{eval, eval_with, MapContext};
    use gridbook_core::CellValue;

    #[test]
    fn test_average_skips_blanks() {
        let mut ctx = MapContext::with(&[
            ("A1", CellValue::Number(5.0)),
            ("A2", CellValue::from("")),
            ("A3", CellValue::Number(7.0)),
        ]);
        assert_eq!(
            eval_with("=AVERAGE(A1:A3)", &mut ctx).unwrap(),
            CellValue::Number(6.0)
        );
        assert_eq!(
            eval_with("=AVG(A1:A4)", &mut ctx).unwrap(),
            CellValue::Number(6.0)
        );
        assert_eq!(
            eval_with("=AVERAGE(B1:B3)", &mut ctx).unwrap(),
            CellValue::Number(0.0)
        );
    }

    #[test]
    fn test_min_max() {
        assert_eq!(eval("=MIN(3, 1, 2)").unwrap(), CellValue::Number(1.0));
        assert_eq!(eval("=MAX(3, \"7\", 2)").unwrap(), CellValue::Number(7.0));
        let mut ctx = MapContext::default();
        // Blank cells coerce to 0
        assert_eq!(
            eval_with("=MAX(A1:A3)", &mut ctx).unwrap(),
            CellValue::Number(0.0)
        );
    }

    #[test]
    fn test_count_and_counta() {
        let mut ctx = MapContext::with(&[
            ("A1", CellValue::Number(1.0)),
            ("A2", CellValue::from("2")),
            ("A3", CellValue::from("x")),
            ("A4", CellValue::Boolean(true)),
        ]);
        assert_eq!(
            eval_with("=COUNT(A1:A5)", &mut ctx).unwrap(),
            CellValue::Number(3.0)
        );
        assert_eq!(
            eval_with("=COUNTA(A1:A5)", &mut ctx).unwrap(),
            CellValue::Number(4.0)
        );
    }
}
