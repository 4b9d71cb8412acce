//! Lenient conversions from loosely typed document fields.
//!
//! Strings are read the way a browser reads form input: the longest numeric
//! prefix wins ("12.5kg" is `12.5`) and anything without one is `0`.

use serde_json::Value;

use super::UNKNOWN_LABEL;

/// Reads a decimal number, defaulting to `0` for missing or malformed values.
pub(super) fn parse_float(value: Option<&Value>) -> f64 {
    let number = match value {
        Some(Value::Number(number)) => number.as_f64().unwrap_or(0.0),
        Some(Value::String(text)) => float_prefix(text.trim_start())
            .parse::<f64>()
            .unwrap_or(0.0),
        _ => 0.0,
    };

    if number.is_finite() { number } else { 0.0 }
}

/// Reads an integer, truncating decimals and defaulting to `0`.
pub(super) fn parse_int(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(number)) => number.as_i64().unwrap_or_else(|| {
            number
                .as_f64()
                .filter(|float| float.is_finite())
                .map_or(0, |float| float.trunc() as i64)
        }),
        Some(Value::String(text)) => int_prefix(text.trim_start()).parse().unwrap_or(0),
        _ => 0,
    }
}

/// Reads an identifier, defaulting to [UNKNOWN_LABEL].
pub(super) fn identifier(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) if !text.is_empty() => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        _ => UNKNOWN_LABEL.to_owned(),
    }
}

fn int_prefix(text: &str) -> &str {
    let bytes = text.as_bytes();
    let sign = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let digits = count_digits(&bytes[sign..]);

    if digits == 0 { "" } else { &text[..sign + digits] }
}

fn float_prefix(text: &str) -> &str {
    let bytes = text.as_bytes();
    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));

    let integer_digits = count_digits(&bytes[end..]);
    end += integer_digits;

    let mut fraction_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        fraction_digits = count_digits(&bytes[end + 1..]);
        if integer_digits + fraction_digits > 0 {
            end += 1 + fraction_digits;
        }
    }

    if integer_digits + fraction_digits == 0 {
        return "";
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exponent_end = end + 1;
        if matches!(bytes.get(exponent_end), Some(b'+' | b'-')) {
            exponent_end += 1;
        }
        let exponent_digits = count_digits(&bytes[exponent_end..]);
        if exponent_digits > 0 {
            end = exponent_end + exponent_digits;
        }
    }

    &text[..end]
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|byte| byte.is_ascii_digit()).count()
}
