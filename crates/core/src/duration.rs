//! Duration strings in the `1h30m`, `300ms`, `-1.5s` form the autoscaler
//! binary accepts.

use chrono::TimeDelta;

use crate::error::{Error, Result};

const NANOS_PER_MICRO: i128 = 1_000;
const NANOS_PER_MILLI: i128 = 1_000_000;
const NANOS_PER_SECOND: i128 = 1_000_000_000;

fn unit_nanos(unit: &str) -> Option<i128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(NANOS_PER_MICRO),
        "ms" => Some(NANOS_PER_MILLI),
        "s" => Some(NANOS_PER_SECOND),
        "m" => Some(60 * NANOS_PER_SECOND),
        "h" => Some(3_600 * NANOS_PER_SECOND),
        _ => None,
    }
}

fn leading_digits(input: &str) -> (&str, &str) {
    let end = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    input.split_at(end)
}

/// Parse a duration string.
///
/// A duration is an optionally signed sequence of decimal numbers, each
/// with an optional fraction and a mandatory unit. `"0"` is accepted
/// without a unit.
///
/// # Errors
///
/// Returns `InvalidDuration` for empty input, a missing or unknown unit,
/// a missing number, or a value outside the nanosecond `i64` range.
pub fn parse_duration(input: &str) -> Result<TimeDelta> {
    let invalid = |reason: &str| Error::invalid_duration(input, reason);

    let (negative, mut rest) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input.strip_prefix('+').unwrap_or(input)),
    };

    if rest == "0" {
        return Ok(TimeDelta::zero());
    }
    if rest.is_empty() {
        return Err(invalid("empty duration"));
    }

    let mut total: i128 = 0;
    while !rest.is_empty() {
        let (whole, after) = leading_digits(rest);
        let (fraction, after) = match after.strip_prefix('.') {
            Some(after_dot) => leading_digits(after_dot),
            None => ("", after),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid("missing number"));
        }

        let unit_end = after
            .find(|c: char| c == '.' || c.is_ascii_digit())
            .unwrap_or(after.len());
        let (unit, remaining) = after.split_at(unit_end);
        if unit.is_empty() {
            return Err(invalid("missing unit"));
        }
        let scale = unit_nanos(unit).ok_or_else(|| invalid(&format!("unknown unit \"{unit}\"")))?;

        let whole_value: i128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid("number out of range"))?
        };
        let mut value = whole_value
            .checked_mul(scale)
            .ok_or_else(|| invalid("number out of range"))?;

        if !fraction.is_empty() {
            // Nanosecond precision needs at most 18 fractional digits.
            let digits: String = fraction.chars().take(18).collect();
            let numerator: i128 = digits.parse().map_err(|_| invalid("bad fraction"))?;
            let exponent = u32::try_from(digits.len()).map_err(|_| invalid("bad fraction"))?;
            let denominator = 10_i128.pow(exponent);
            value = value
                .checked_add(numerator.saturating_mul(scale) / denominator)
                .ok_or_else(|| invalid("number out of range"))?;
        }

        total = total
            .checked_add(value)
            .ok_or_else(|| invalid("number out of range"))?;
        if total > i128::from(i64::MAX) {
            return Err(invalid("number out of range"));
        }
        rest = remaining;
    }

    let nanos = i64::try_from(total).map_err(|_| invalid("number out of range"))?;
    Ok(TimeDelta::nanoseconds(if negative { -nanos } else { nanos }))
}

/// Whether the string parses as a duration.
pub fn is_valid_duration(input: &str) -> bool {
    parse_duration(input).is_ok()
}
