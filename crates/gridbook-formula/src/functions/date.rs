//! Date functions
//!
//! Dates are ISO strings: `TODAY()` yields `YYYY-MM-DD` and `NOW()` yields
//! `YYYY-MM-DDTHH:MM:SS` in local time. `YEAR`, `MONTH` and `DAY` accept
//! those strings (RFC 3339 timestamps too) or a serial day number counted
//! from 1899-12-30.

use crate::error::{FormulaError, FormulaResult};
use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime};
use gridbook_core::CellValue;

/// TODAY() - current local date
pub fn fn_today(_args: &[CellValue]) -> FormulaResult<CellValue> {
    let today = Local::now().date_naive();
    Ok(CellValue::String(today.format("%Y-%m-%d").to_string()))
}

/// NOW() - current local date and time
pub fn fn_now(_args: &[CellValue]) -> FormulaResult<CellValue> {
    let now = Local::now().naive_local();
    Ok(CellValue::String(now.format("%Y-%m-%dT%H:%M:%S").to_string()))
}

/// YEAR(date)
pub fn fn_year(args: &[CellValue]) -> FormulaResult<CellValue> {
    let date = date_arg(args, "YEAR")?;
    Ok(CellValue::Number(date.year() as f64))
}

/// MONTH(date)
pub fn fn_month(args: &[CellValue]) -> FormulaResult<CellValue> {
    let date = date_arg(args, "MONTH")?;
    Ok(CellValue::Number(date.month() as f64))
}

/// DAY(date)
pub fn fn_day(args: &[CellValue]) -> FormulaResult<CellValue> {
    let date = date_arg(args, "DAY")?;
    Ok(CellValue::Number(date.day() as f64))
}

fn date_arg(args: &[CellValue], name: &str) -> FormulaResult<NaiveDate> {
    let value = args.first().cloned().unwrap_or_default();
    let parsed = match &value {
        CellValue::Number(serial) => date_from_serial(*serial),
        CellValue::String(s) => parse_date(s.trim()),
        CellValue::Empty | CellValue::Boolean(_) => None,
    };
    parsed.ok_or_else(|| {
        FormulaError::Argument(format!("{} expects a date, got \"{}\"", name, value.display()))
    })
}

fn date_from_serial(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let days = Duration::try_days(serial.floor() as i64)?;
    epoch.checked_add_signed(days)
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(s, format) {
            return Some(datetime.date());
        }
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(s) {
        return Some(datetime.date_naive());
    }
    // A numeric string is a serial
    s.parse::<f64>().ok().and_then(date_from_serial)
}

#[cfg(test)]
mod tests {
    use crate::evaluator::tests::eval;
    use chrono::{NaiveDate, NaiveDateTime};
    use gridbook_core::CellValue;

    #[test]
    fn test_today_and_now_are_iso_strings() {
        match eval("=TODAY()").unwrap() {
            CellValue::String(s) => assert!(NaiveDate::parse_from_str(&s, "%Y-%m-%d").is_ok()),
            other => panic!("unexpected {:?}", other),
        }
        match eval("=NOW()").unwrap() {
            CellValue::String(s) => {
                assert!(NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S").is_ok())
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_date_parts() {
        assert_eq!(eval("=YEAR(\"2024-03-15\")").unwrap(), CellValue::Number(2024.0));
        assert_eq!(eval("=MONTH(\"2024-03-15\")").unwrap(), CellValue::Number(3.0));
        assert_eq!(
            eval("=DAY(\"2024-03-15T10:30:00\")").unwrap(),
            CellValue::Number(15.0)
        );
        assert_eq!(
            eval("=DAY(\"2024-03-15T10:30:00+02:00\")").unwrap(),
            CellValue::Number(15.0)
        );
        // Serial 45366 is 2024-03-15
        assert_eq!(eval("=YEAR(45366)").unwrap(), CellValue::Number(2024.0));
        assert_eq!(eval("=DAY(45366.75)").unwrap(), CellValue::Number(15.0));
        assert_eq!(eval("=YEAR(TODAY())").unwrap(), eval("=YEAR(NOW())").unwrap());
    }

    #[test]
    fn test_invalid_dates() {
        assert_eq!(
            eval("=YEAR(\"soon\")").unwrap_err().to_string(),
            "YEAR expects a date, got \"soon\""
        );
        assert!(eval("=MONTH(TRUE)").is_err());
    }
}
