//! Information functions

use crate::error::FormulaResult;
use gridbook_core::CellValue;

/// ISBLANK(value) - empty or the empty string
pub fn fn_isblank(args: &[CellValue]) -> FormulaResult<CellValue> {
    Ok(CellValue::Boolean(args.first().map_or(true, CellValue::is_blank)))
}

/// ISNUMBER(value)
pub fn fn_isnumber(args: &[CellValue]) -> FormulaResult<CellValue> {
    Ok(CellValue::Boolean(matches!(
        args.first(),
        Some(CellValue::Number(_))
    )))
}

/// ISTEXT(value) - a non-empty string
pub fn fn_istext(args: &[CellValue]) -> FormulaResult<CellValue> {
    Ok(CellValue::Boolean(matches!(
        args.first(),
        Some(CellValue::String(s)) if !s.is_empty()
    )))
}

#[cfg(test)]
mod tests {
    use crate::evaluator::tests::{eval_with, MapContext};
    use gridbook_core::CellValue;

    #[test]
    fn test_info_functions() {
        let mut ctx = MapContext::with(&[
            ("A1", CellValue::Number(1.0)),
            ("A2", CellValue::from("")),
            ("A3", CellValue::from("text")),
        ]);
        let mut check = |formula: &str, expected: bool| {
            assert_eq!(
                eval_with(formula, &mut ctx).unwrap(),
                CellValue::Boolean(expected),
                "{}",
                formula
            );
        };
        check("=ISBLANK(A2)", true);
        check("=ISBLANK(A4)", true);
        check("=ISBLANK(A1)", false);
        check("=ISNUMBER(A1)", true);
        check("=ISNUMBER(A3)", false);
        check("=ISTEXT(A3)", true);
        check("=ISTEXT(A2)", false);
        check("=ISTEXT(A1)", false);
    }
}
