//! Integer resource quantities such as `4`, `2k` or `16Gi`.

use crate::error::{Error, Result};

const DECIMAL_SUFFIXES: [(&str, u32); 6] =
    [("k", 1), ("M", 2), ("G", 3), ("T", 4), ("P", 5), ("E", 6)];
const BINARY_SUFFIXES: [(&str, u32); 6] = [
    ("Ki", 1),
    ("Mi", 2),
    ("Gi", 3),
    ("Ti", 4),
    ("Pi", 5),
    ("Ei", 6),
];

/// Bytes in one mebibyte.
pub const MIB: i64 = 1 << 20;

/// Parse a whole-number quantity with an optional SI or binary suffix.
///
/// # Errors
///
/// Returns `InvalidQuantity` for fractional values, unknown suffixes or
/// values that overflow `i64`.
pub fn parse_integer_quantity(value: &str) -> Result<i64> {
    let invalid = |reason: &str| Error::invalid_quantity(value, reason);
    let trimmed = value.trim();

    let digits_end = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '-' || c == '+'))
        .unwrap_or(trimmed.len());
    let (number, suffix) = trimmed.split_at(digits_end);
    if number.is_empty() {
        return Err(invalid("missing number"));
    }
    let base: i64 = number.parse().map_err(|_| invalid("not an integer"))?;

    let multiplier: i64 = if suffix.is_empty() {
        1
    } else if let Some((_, power)) = BINARY_SUFFIXES.iter().find(|(s, _)| *s == suffix) {
        1024_i64
            .checked_pow(*power)
            .ok_or_else(|| invalid("out of range"))?
    } else if let Some((_, power)) = DECIMAL_SUFFIXES.iter().find(|(s, _)| *s == suffix) {
        1000_i64
            .checked_pow(*power)
            .ok_or_else(|| invalid("out of range"))?
    } else {
        return Err(invalid(&format!("unknown suffix \"{suffix}\"")));
    };

    base.checked_mul(multiplier)
        .ok_or_else(|| invalid("out of range"))
}

/// Canonical decimal-SI form of an integer: the largest suffix that keeps
/// the mantissa whole.
pub fn format_decimal_si(value: i64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut mantissa = value;
    let mut suffix = "";
    for (candidate, _) in DECIMAL_SUFFIXES {
        if mantissa % 1000 != 0 {
            break;
        }
        mantissa /= 1000;
        suffix = candidate;
    }
    format!("{mantissa}{suffix}")
}
