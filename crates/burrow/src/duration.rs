//! Duration literals.
//!
//! The accepted grammar is a sequence of decimal numbers, each with an
//! optional fraction and a mandatory unit: `300ms`, `1.5h`, `2h45m`. Valid
//! units are `ns`, `us` (or `µs`), `ms`, `s`, `m`, `h`. A bare `0` is zero.
//!
//! [`format_duration`] produces the canonical form that [`parse_duration`]
//! accepts back.

use std::fmt::Write;
use std::time::Duration;

use thiserror::Error;

/// A malformed duration literal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid duration \"{input}\": {reason}")]
pub struct DurationError {
    pub input: String,
    pub reason: &'static str,
}

impl DurationError {
    fn new(input: &str, reason: &'static str) -> Self {
        Self {
            input: input.to_string(),
            reason,
        }
    }
}

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SEC: u128 = 1_000_000_000;

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(NANOS_PER_MICRO),
        "ms" => Some(NANOS_PER_MILLI),
        "s" => Some(NANOS_PER_SEC),
        "m" => Some(60 * NANOS_PER_SEC),
        "h" => Some(3600 * NANOS_PER_SEC),
        _ => None,
    }
}

/// Parses a duration literal such as `1500ms` or `1h30m`.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let mut rest = input;
    if let Some(stripped) = rest.strip_prefix('+') {
        rest = stripped;
    } else if rest.starts_with('-') {
        return Err(DurationError::new(input, "negative durations are not supported"));
    }

    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(DurationError::new(input, "empty duration"));
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let int_len = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let (int_part, after_int) = rest.split_at(int_len);

        let (frac_part, after_num) = match after_int.strip_prefix('.') {
            Some(after_dot) => {
                let frac_len = after_dot
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(after_dot.len());
                after_dot.split_at(frac_len)
            }
            None => ("", after_int),
        };

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(DurationError::new(input, "expected a number"));
        }

        let unit_len = after_num
            .find(|c: char| c == '.' || c.is_ascii_digit())
            .unwrap_or(after_num.len());
        let (unit, remaining) = after_num.split_at(unit_len);
        if unit.is_empty() {
            return Err(DurationError::new(input, "missing unit"));
        }
        let scale = unit_nanos(unit).ok_or_else(|| DurationError::new(input, "unknown unit"))?;

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part
                .parse()
                .map_err(|_| DurationError::new(input, "number out of range"))?
        };
        let mut value = whole
            .checked_mul(scale)
            .ok_or_else(|| DurationError::new(input, "duration out of range"))?;

        // Digits past nanosecond precision are dropped.
        let mut place = scale;
        for digit in frac_part.bytes() {
            place /= 10;
            if place == 0 {
                break;
            }
            value += u128::from(digit - b'0') * place;
        }

        total = total
            .checked_add(value)
            .ok_or_else(|| DurationError::new(input, "duration out of range"))?;
        rest = remaining;
    }

    let secs = u64::try_from(total / NANOS_PER_SEC)
        .map_err(|_| DurationError::new(input, "duration out of range"))?;
    Ok(Duration::new(secs, (total % NANOS_PER_SEC) as u32))
}

/// Formats a duration in its canonical literal form: `1h30m0s`, `1.5s`,
/// `250ms`, `0s`.
pub fn format_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }
    if nanos < NANOS_PER_MICRO {
        return format!("{}ns", nanos);
    }
    if nanos < NANOS_PER_MILLI {
        return fractional(nanos, NANOS_PER_MICRO, 3, "µs");
    }
    if nanos < NANOS_PER_SEC {
        return fractional(nanos, NANOS_PER_MILLI, 6, "ms");
    }

    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = u128::from(total_secs % 60) * NANOS_PER_SEC + u128::from(duration.subsec_nanos());

    let mut out = String::new();
    if hours > 0 {
        let _ = write!(out, "{}h", hours);
    }
    if hours > 0 || minutes > 0 {
        let _ = write!(out, "{}m", minutes);
    }
    out.push_str(&fractional(seconds, NANOS_PER_SEC, 9, "s"));
    out
}

fn fractional(value: u128, unit: u128, digits: usize, suffix: &str) -> String {
    let whole = value / unit;
    let rem = value % unit;
    if rem == 0 {
        return format!("{}{}", whole, suffix);
    }
    let frac = format!("{:0width$}", rem, width = digits);
    format!("{}.{}{}", whole, frac.trim_end_matches('0'), suffix)
}
