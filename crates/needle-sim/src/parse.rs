//! Parsers for declarative tier properties.
//!
//! Sizes and bandwidths use 1024-based units. Durations use the compact
//! `1h2m3.5s` form.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::hash::BuildHasher;
use std::time::Duration;

/// Error parsing a property value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseValueError {
    #[error("invalid {kind} value {input:?}")]
    Invalid { kind: &'static str, input: String },

    #[error("{kind} value {input:?} out of range")]
    Overflow { kind: &'static str, input: String },
}

impl ParseValueError {
    fn invalid(kind: &'static str, input: &str) -> Self {
        Self::Invalid {
            kind,
            input: input.to_string(),
        }
    }

    fn overflow(kind: &'static str, input: &str) -> Self {
        Self::Overflow {
            kind,
            input: input.to_string(),
        }
    }
}

/// String-keyed property source for building a storage tier.
pub trait Properties {
    /// Returns the value for `key`, or `None` if absent.
    fn get_string(&self, key: &str) -> Option<&str>;
}

impl<S: BuildHasher> Properties for HashMap<String, String, S> {
    fn get_string(&self, key: &str) -> Option<&str> {
        self.get(key).map(String::as_str)
    }
}

impl Properties for BTreeMap<String, String> {
    fn get_string(&self, key: &str) -> Option<&str> {
        self.get(key).map(String::as_str)
    }
}

const KIB: u64 = 1024;
const MIB: u64 = KIB * 1024;
const GIB: u64 = MIB * 1024;
const TIB: u64 = GIB * 1024;

// Longest suffix first: "B/S" is a suffix of "KB/S"
const BANDWIDTH_UNITS: [(&str, u64); 4] = [("GB/S", GIB), ("MB/S", MIB), ("KB/S", KIB), ("B/S", 1)];
const SIZE_UNITS: [(&str, u64); 5] = [("TB", TIB), ("GB", GIB), ("MB", MIB), ("KB", KIB), ("B", 1)];

/// Parses a bandwidth like `10MB/s` into bytes per second.
///
/// A bare number is bytes per second. Units are case-insensitive.
pub fn parse_bandwidth(input: &str) -> Result<u64, ParseValueError> {
    parse_scaled("bandwidth", input, &BANDWIDTH_UNITS)
}

/// Parses a size like `100GB` into bytes. A bare number is bytes.
pub fn parse_size(input: &str) -> Result<u64, ParseValueError> {
    parse_scaled("size", input, &SIZE_UNITS)
}

fn parse_scaled(
    kind: &'static str,
    input: &str,
    units: &[(&str, u64)],
) -> Result<u64, ParseValueError> {
    let upper = input.trim().to_ascii_uppercase();
    let (digits, scale) = units
        .iter()
        .find_map(|(suffix, scale)| upper.strip_suffix(suffix).map(|rest| (rest, *scale)))
        .unwrap_or((upper.as_str(), 1));

    let value: u64 = digits
        .trim()
        .parse()
        .map_err(|_| ParseValueError::invalid(kind, input))?;
    value
        .checked_mul(scale)
        .ok_or_else(|| ParseValueError::overflow(kind, input))
}

/// Parses `true`/`false` and their short forms (`1`, `t`, `T`, `0`, `f`, `F`, `TRUE`, `False`, ...).
pub fn parse_bool(input: &str) -> Result<bool, ParseValueError> {
    match input.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        _ => Err(ParseValueError::invalid("bool", input)),
    }
}

/// Parses a duration such as `5ms`, `1.5s` or `1h30m`.
///
/// Valid units are `ns`, `us` (or `µs`), `ms`, `s`, `m`, `h`. A bare `0` is
/// accepted. Negative durations are rejected.
pub fn parse_duration(input: &str) -> Result<Duration, ParseValueError> {
    const KIND: &str = "duration";

    let mut rest = input.trim();
    rest = rest.strip_prefix('+').unwrap_or(rest);
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() || rest.starts_with('-') {
        return Err(ParseValueError::invalid(KIND, input));
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_len);
        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);

        let unit_nanos = unit_nanos(unit).ok_or_else(|| ParseValueError::invalid(KIND, input))?;
        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(ParseValueError::invalid(KIND, input));
        }

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| ParseValueError::overflow(KIND, input))?
        };
        total = whole
            .checked_mul(unit_nanos)
            .and_then(|n| n.checked_add(total))
            .ok_or_else(|| ParseValueError::overflow(KIND, input))?;

        // Digits beyond nanosecond precision are dropped
        let mut scale = unit_nanos;
        for digit in fraction.chars() {
            let digit = u128::from(
                digit
                    .to_digit(10)
                    .ok_or_else(|| ParseValueError::invalid(KIND, input))?,
            );
            scale /= 10;
            total += digit * scale;
        }

        rest = tail;
    }

    let nanos = u64::try_from(total).map_err(|_| ParseValueError::overflow(KIND, input))?;
    Ok(Duration::from_nanos(nanos))
}

fn unit_nanos(unit: &str) -> Option<u128> {
    Some(match unit {
        "ns" => 1,
        "us" | "µs" | "μs" => 1_000,
        "ms" => 1_000_000,
        "s" => 1_000_000_000,
        "m" => 60 * 1_000_000_000,
        "h" => 3_600 * 1_000_000_000,
        _ => return None,
    })
}

/// Formats a duration the way [`parse_duration`] reads it: `0s`, `750µs`,
/// `5ms`, `1.5s`, `1m30s`, `2h0m0s`.
pub fn format_duration(duration: Duration) -> String {
    const SECOND: u128 = 1_000_000_000;
    const MINUTE: u128 = 60 * SECOND;
    const HOUR: u128 = 60 * MINUTE;

    let nanos = duration.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }
    if nanos < 1_000 {
        return format!("{nanos}ns");
    }
    if nanos < 1_000_000 {
        return format!("{}µs", decimal(nanos, 1_000, 3));
    }
    if nanos < SECOND {
        return format!("{}ms", decimal(nanos, 1_000_000, 6));
    }

    let hours = nanos / HOUR;
    let minutes = (nanos % HOUR) / MINUTE;
    let seconds = nanos % MINUTE;

    let mut out = String::new();
    if hours > 0 {
        let _ = write!(out, "{hours}h");
    }
    if hours > 0 || minutes > 0 {
        let _ = write!(out, "{minutes}m");
    }
    let _ = write!(out, "{}s", decimal(seconds, SECOND, 9));
    out
}

/// `value / unit` with trailing fractional zeros removed.
fn decimal(value: u128, unit: u128, places: usize) -> String {
    let whole = value / unit;
    let fraction = value % unit;
    if fraction == 0 {
        return whole.to_string();
    }
    let digits = format!("{fraction:0places$}");
    format!("{whole}.{}", digits.trim_end_matches('0'))
}
