//! Prometheus-style durations (`30s`, `5m`, `1h30m`).

use std::fmt::Write;
use std::time::Duration;

use crate::error::{AlertError, Result};

const UNITS: &[(&str, u64)] = &[
    ("ms", 1),
    ("s", 1_000),
    ("m", 60 * 1_000),
    ("h", 60 * 60 * 1_000),
    ("d", 24 * 60 * 60 * 1_000),
    ("w", 7 * 24 * 60 * 60 * 1_000),
    ("y", 365 * 24 * 60 * 60 * 1_000),
];

/// Parses a duration such as `1h30m` or `500ms`.
///
/// Units must appear from largest to smallest, each at most once.
///
/// # Errors
///
/// Returns `AlertError::InvalidDuration` if the text is empty or malformed.
pub fn parse_duration(text: &str) -> Result<Duration> {
    let invalid = |reason: &str| AlertError::InvalidDuration {
        reason: format!("{text:?}: {reason}"),
    };
    if text.is_empty() {
        return Err(invalid("empty duration"));
    }
    if text == "0" {
        return Ok(Duration::ZERO);
    }

    let mut rest = text;
    let mut total_ms: u64 = 0;
    let mut last_rank = usize::MAX;

    while !rest.is_empty() {
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            return Err(invalid("expected a number"));
        }
        let value: u64 = rest[..digits]
            .parse()
            .map_err(|_| invalid("number out of range"))?;
        rest = &rest[digits..];

        // "ms" sorts before "m"
        let (rank, (unit, factor)) = UNITS
            .iter()
            .enumerate()
            .find(|(_, (unit, _))| rest.starts_with(unit))
            .ok_or_else(|| invalid("unknown unit"))?;
        if rank >= last_rank {
            return Err(invalid("units out of order"));
        }
        last_rank = rank;
        rest = &rest[unit.len()..];

        total_ms = value
            .checked_mul(*factor)
            .and_then(|ms| total_ms.checked_add(ms))
            .ok_or_else(|| invalid("duration out of range"))?;
    }

    Ok(Duration::from_millis(total_ms))
}

/// Formats a duration with the largest units that divide it.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let mut ms = duration.as_millis() as u64;
    if ms == 0 {
        return "0s".to_string();
    }
    let mut out = String::new();
    for (unit, factor) in UNITS.iter().rev() {
        if ms >= *factor {
            let _ = write!(out, "{}{unit}", ms / factor);
            ms %= factor;
        }
    }
    out
}

/// Serde adapter storing a [`Duration`] as a Prometheus duration string.
pub mod serde_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes a duration as text.
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_duration(*duration))
    }

    /// Deserializes a duration from text.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}
