//! Text functions
//!
//! Positions and lengths count characters, not bytes, and are one-based.

use super::{number_arg, optional_number_arg, text_arg};
use crate::error::{FormulaError, FormulaResult};
use gridbook_core::CellValue;

/// Longest string REPT will build
const MAX_TEXT_LENGTH: usize = 32_767;

/// CONCAT(values...), also CONCATENATE
pub fn fn_concat(args: &[CellValue]) -> FormulaResult<CellValue> {
    let joined: String = args.iter().map(CellValue::display).collect();
    Ok(CellValue::String(joined))
}

/// UPPER(text)
pub fn fn_upper(args: &[CellValue]) -> FormulaResult<CellValue> {
    Ok(CellValue::String(text_arg(args, 0).to_uppercase()))
}

/// LOWER(text)
pub fn fn_lower(args: &[CellValue]) -> FormulaResult<CellValue> {
    Ok(CellValue::String(text_arg(args, 0).to_lowercase()))
}

/// TRIM(text) - strips the ends and collapses inner runs of spaces
pub fn fn_trim(args: &[CellValue]) -> FormulaResult<CellValue> {
    let text = text_arg(args, 0);
    let trimmed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    Ok(CellValue::String(trimmed))
}

/// LEN(text)
pub fn fn_len(args: &[CellValue]) -> FormulaResult<CellValue> {
    Ok(CellValue::Number(text_arg(args, 0).chars().count() as f64))
}

/// LEFT(text, [count])
pub fn fn_left(args: &[CellValue]) -> FormulaResult<CellValue> {
    let text = text_arg(args, 0);
    let count = count_arg(args, 1, 1.0, "LEFT count")?;
    Ok(CellValue::String(text.chars().take(count).collect()))
}

/// RIGHT(text, [count])
pub fn fn_right(args: &[CellValue]) -> FormulaResult<CellValue> {
    let text = text_arg(args, 0);
    let count = count_arg(args, 1, 1.0, "RIGHT count")?;
    let len = text.chars().count();
    Ok(CellValue::String(
        text.chars().skip(len.saturating_sub(count)).collect(),
    ))
}

/// MID(text, start, count)
pub fn fn_mid(args: &[CellValue]) -> FormulaResult<CellValue> {
    let text = text_arg(args, 0);
    let start = number_arg(args, 1)?.trunc();
    if start < 1.0 {
        return Err(FormulaError::Argument(
            "MID start must be at least 1".to_string(),
        ));
    }
    let count = count_arg(args, 2, 0.0, "MID count")?;
    Ok(CellValue::String(
        text.chars().skip(start as usize - 1).take(count).collect(),
    ))
}

/// SUBSTITUTE(text, old, new, [instance])
///
/// Without `instance` every occurrence is replaced; with it only that
/// (one-based) occurrence.
pub fn fn_substitute(args: &[CellValue]) -> FormulaResult<CellValue> {
    let text = text_arg(args, 0);
    let old = text_arg(args, 1);
    let new = text_arg(args, 2);

    if old.is_empty() {
        return Ok(CellValue::String(text));
    }

    let Some(instance) = args.get(3) else {
        return Ok(CellValue::String(text.replace(&old, &new)));
    };

    let instance = crate::evaluator::to_number(instance)?.trunc();
    if instance < 1.0 {
        return Err(FormulaError::Argument(
            "SUBSTITUTE instance must be at least 1".to_string(),
        ));
    }

    match text.match_indices(&old).nth(instance as usize - 1) {
        Some((index, _)) => {
            let mut result = String::with_capacity(text.len());
            result.push_str(&text[..index]);
            result.push_str(&new);
            result.push_str(&text[index + old.len()..]);
            Ok(CellValue::String(result))
        }
        None => Ok(CellValue::String(text)),
    }
}

/// REPT(text, times)
pub fn fn_rept(args: &[CellValue]) -> FormulaResult<CellValue> {
    let text = text_arg(args, 0);
    let times = count_arg(args, 1, 0.0, "REPT count")?;
    if text.chars().count().saturating_mul(times) > MAX_TEXT_LENGTH {
        return Err(FormulaError::Argument(format!(
            "REPT result is longer than {} characters",
            MAX_TEXT_LENGTH
        )));
    }
    Ok(CellValue::String(text.repeat(times)))
}

/// FIND(needle, haystack, [start]) - case-sensitive
pub fn fn_find(args: &[CellValue]) -> FormulaResult<CellValue> {
    locate(args, "FIND", false)
}

/// SEARCH(needle, haystack, [start]) - case-insensitive
pub fn fn_search(args: &[CellValue]) -> FormulaResult<CellValue> {
    locate(args, "SEARCH", true)
}

fn locate(args: &[CellValue], name: &str, ignore_case: bool) -> FormulaResult<CellValue> {
    let mut needle = text_arg(args, 0);
    let mut haystack = text_arg(args, 1);
    if ignore_case {
        needle = needle.to_lowercase();
        haystack = haystack.to_lowercase();
    }

    let start = optional_number_arg(args, 2, 1.0)?.trunc();
    let len = haystack.chars().count();
    if start < 1.0 || start > (len + 1) as f64 {
        return Err(FormulaError::Argument(format!(
            "{} start must be between 1 and {}",
            name,
            len + 1
        )));
    }
    let skip = start as usize - 1;

    // Search from the start character (not byte)
    let tail: String = haystack.chars().skip(skip).collect();
    match tail.find(&needle) {
        Some(byte_pos) => {
            let char_pos = tail[..byte_pos].chars().count();
            Ok(CellValue::Number((skip + char_pos + 1) as f64))
        }
        None => Err(FormulaError::NotFound {
            function: name.to_string(),
            needle: text_arg(args, 0),
        }),
    }
}

/// Non-negative whole-number argument
fn count_arg(args: &[CellValue], index: usize, default: f64, what: &str) -> FormulaResult<usize> {
    let count = optional_number_arg(args, index, default)?.trunc();
    if count < 0.0 {
        return Err(FormulaError::Argument(format!(
            "{} must not be negative",
            what
        )));
    }
    Ok(count.min(usize::MAX as f64) as usize)
}
