//! Exact-decimal handling for JSON numbers.
//!
//! The workspace builds `serde_json` with `arbitrary_precision`, so a
//! `serde_json::Number` keeps the digits it was parsed from; exponent forms
//! come back in serde_json's own spelling (`1e40` prints as `1e+40`). These
//! helpers move between that text and `rust_decimal::Decimal` without ever
//! going through a float, and refuse any text a `Decimal` cannot hold
//! exactly.

use std::cmp::Ordering;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Number, Value};

/// Parse decimal text, accepting exponent notation (`1.5e2`).
///
/// Returns `None` when the text is not a number or when `Decimal` would
/// have to round it (more than 28 significant digits, or out of range).
pub fn parse_decimal(text: &str) -> Option<Decimal> {
    let text = text.trim();
    let d = if text.contains(['e', 'E']) {
        Decimal::from_scientific(text).ok()?
    } else {
        Decimal::from_str(text).ok()?
    };
    (significand(text)? == significand(&d.to_string())?).then_some(d)
}

/// Sign, significant digits and power-of-ten exponent of a number literal,
/// with leading and trailing zeros stripped. Zero is `(false, "0", 0)`.
fn significand(text: &str) -> Option<(bool, String, i64)> {
    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (mantissa, exponent) = match unsigned.split_once(['e', 'E']) {
        Some((m, e)) => (m, e.parse::<i64>().ok()?),
        None => (unsigned, 0),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }

    let digits = format!("{int_part}{frac_part}");
    let digits = digits.trim_start_matches('0');
    let trimmed = digits.trim_end_matches('0');
    if trimmed.is_empty() {
        return Some((false, "0".to_string(), 0));
    }
    let frac_len = i64::try_from(frac_part.len()).ok()?;
    let trailing = i64::try_from(digits.len() - trimmed.len()).ok()?;
    Some((negative, trimmed.to_string(), exponent - frac_len + trailing))
}

/// Read a JSON number as an exact decimal.
pub fn number_to_decimal(n: &Number) -> Option<Decimal> {
    parse_decimal(&n.to_string())
}

/// Read a JSON value as an exact decimal. Non-numbers yield `None`.
pub fn value_to_decimal(v: &Value) -> Option<Decimal> {
    match v {
        Value::Number(n) => number_to_decimal(n),
        _ => None,
    }
}

/// Build a JSON number carrying the decimal's exact text.
pub fn decimal_to_number(d: Decimal) -> Result<Number, serde_json::Error> {
    serde_json::from_str(&d.to_string())
}

pub fn decimal_to_value(d: Decimal) -> Result<Value, serde_json::Error> {
    decimal_to_number(d).map(Value::Number)
}

/// Compare two JSON numbers numerically.
pub fn compare_numbers(a: &Number, b: &Number) -> Option<Ordering> {
    Some(number_to_decimal(a)?.cmp(&number_to_decimal(b)?))
}

/// Rewrite every number inside `value` as a canonical exact decimal.
///
/// Returns the text of the first number a 96-bit decimal cannot hold
/// exactly. Nothing is rounded.
pub fn normalize_numbers(value: &mut Value) -> Result<(), String> {
    match value {
        Value::Number(n) => {
            let d = number_to_decimal(n).ok_or_else(|| n.to_string())?;
            *n = decimal_to_number(d).map_err(|_| n.to_string())?;
            Ok(())
        }
        Value::Array(items) => items.iter_mut().try_for_each(normalize_numbers),
        Value::Object(map) => map.values_mut().try_for_each(normalize_numbers),
        Value::Null | Value::Bool(_) | Value::String(_) => Ok(()),
    }
}
