//! Math functions

use super::{number_arg, optional_number_arg};
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::{power, to_number};
use gridbook_core::CellValue;
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// SUM(values...) - every value coerced to a number; blanks count as 0
pub fn fn_sum(args: &[CellValue]) -> FormulaResult<CellValue> {
    let mut sum = 0.0;
    for arg in args {
        sum += to_number(arg)?;
    }
    Ok(CellValue::Number(sum))
}

/// ABS(number)
pub fn fn_abs(args: &[CellValue]) -> FormulaResult<CellValue> {
    Ok(CellValue::Number(number_arg(args, 0)?.abs()))
}

/// ROUND(number, [num_digits]) - rounds half away from zero
///
/// Rounding happens on the decimal representation, so `ROUND(2.675, 2)` is
/// 2.68 rather than the 2.67 binary floating point would give.
pub fn fn_round(args: &[CellValue]) -> FormulaResult<CellValue> {
    let number = number_arg(args, 0)?;
    let digits = optional_number_arg(args, 1, 0.0)?.trunc();
    let digits = digits.clamp(i32::MIN as f64, i32::MAX as f64) as i32;
    Ok(CellValue::Number(round_half_away(number, digits)))
}

pub(crate) fn round_half_away(number: f64, digits: i32) -> f64 {
    let rounded = Decimal::from_str(&number.to_string())
        .ok()
        .and_then(|d| round_decimal(d, digits))
        .and_then(|d| d.to_f64());

    rounded.unwrap_or_else(|| {
        let multiplier = 10_f64.powi(digits);
        let scaled = number * multiplier;
        if !scaled.is_finite() || multiplier == 0.0 {
            return number;
        }
        scaled.round() / multiplier
    })
}

fn round_decimal(d: Decimal, digits: i32) -> Option<Decimal> {
    if digits >= 0 {
        return Some(d.round_dp_with_strategy(
            digits.min(28) as u32,
            RoundingStrategy::MidpointAwayFromZero,
        ));
    }

    let exponent = digits.unsigned_abs();
    if exponent > 28 {
        return Some(Decimal::ZERO);
    }
    let factor = Decimal::from_i128_with_scale(10_i128.pow(exponent), 0);
    d.checked_div(factor)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .checked_mul(factor)
}

/// FLOOR(number, [significance]) - rounds down to a multiple of significance
pub fn fn_floor(args: &[CellValue]) -> FormulaResult<CellValue> {
    let number = number_arg(args, 0)?;
    let significance = significance_arg(args, "FLOOR")?;
    Ok(CellValue::Number((number / significance).floor() * significance))
}

/// CEILING(number, [significance]) - rounds up to a multiple of significance
pub fn fn_ceiling(args: &[CellValue]) -> FormulaResult<CellValue> {
    let number = number_arg(args, 0)?;
    let significance = significance_arg(args, "CEILING")?;
    Ok(CellValue::Number((number / significance).ceil() * significance))
}

fn significance_arg(args: &[CellValue], name: &str) -> FormulaResult<f64> {
    let significance = optional_number_arg(args, 1, 1.0)?;
    if significance == 0.0 {
        return Err(FormulaError::Argument(format!(
            "{} significance must not be zero",
            name
        )));
    }
    Ok(significance)
}

/// SQRT(number)
pub fn fn_sqrt(args: &[CellValue]) -> FormulaResult<CellValue> {
    let number = number_arg(args, 0)?;
    if number < 0.0 {
        return Err(FormulaError::Argument(
            "SQRT of a negative number".to_string(),
        ));
    }
    Ok(CellValue::Number(number.sqrt()))
}

/// POWER(base, exponent), also POW
pub fn fn_power(args: &[CellValue]) -> FormulaResult<CellValue> {
    power(number_arg(args, 0)?, number_arg(args, 1)?).map(CellValue::Number)
}

/// MOD(number, divisor) - the result has the sign of the divisor
pub fn fn_mod(args: &[CellValue]) -> FormulaResult<CellValue> {
    let number = number_arg(args, 0)?;
    let divisor = number_arg(args, 1)?;
    if divisor == 0.0 {
        return Err(FormulaError::DivisionByZero);
    }
    Ok(CellValue::Number(number - divisor * (number / divisor).floor()))
}

/// INT(number) - rounds down to the nearest integer
pub fn fn_int(args: &[CellValue]) -> FormulaResult<CellValue> {
    Ok(CellValue::Number(number_arg(args, 0)?.floor()))
}

/// SIGN(number) - -1, 0 or 1
pub fn fn_sign(args: &[CellValue]) -> FormulaResult<CellValue> {
    let number = number_arg(args, 0)?;
    let sign = if number > 0.0 {
        1.0
    } else if number < 0.0 {
        -1.0
    } else {
        0.0
    };
    Ok(CellValue::Number(sign))
}

/// PI()
pub fn fn_pi(_args: &[CellValue]) -> FormulaResult<CellValue> {
    Ok(CellValue::Number(std::f64::consts::PI))
}

/// RAND() - uniform in [0, 1)
pub fn fn_rand(_args: &[CellValue]) -> FormulaResult<CellValue> {
    let mut rng = rand::thread_rng();
    Ok(CellValue::Number(rng.gen::<f64>()))
}

/// RANDBETWEEN(bottom, top) - random integer, both ends inclusive
pub fn fn_randbetween(args: &[CellValue]) -> FormulaResult<CellValue> {
    let bottom = number_arg(args, 0)?.ceil();
    let top = number_arg(args, 1)?.floor();

    if bottom > top {
        return Err(FormulaError::Argument(
            "RANDBETWEEN bottom must not exceed top".to_string(),
        ));
    }

    let mut rng = rand::thread_rng();
    let result = rng.gen_range(bottom as i64..=top as i64);
    Ok(CellValue::Number(result as f64))
}
