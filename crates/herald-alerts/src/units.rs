//! Unit scaling for generated queries.
//!
//! Templates produce values in a base unit (bytes, seconds, cores). A user who
//! picks another unit gets the query rescaled so thresholds are entered in
//! that unit, and messages show the matching suffix.
//!
//! Two spellings are accepted: short names (`mb`, `ms`, `percent`) and typed
//! names of the form `<kind>-<suffix>` (`bytes-MB`, `duration-ms`,
//! `percent-0-100`, `bytes/sec-KB/s`). `short` and the empty string mean
//! no scaling.

use crate::error::{AlertError, Result};

// name, scale, display suffix
const SHORT_UNITS: &[(&str, &str, &str)] = &[
    ("percent", "", "%"),
    ("core", "", "core"),
    ("mcore", "*1000", "mcore"),
    ("b", "", "B"),
    ("kb", "/1024", "KB"),
    ("mb", "/(1024 * 1024)", "MB"),
    ("gb", "/(1024 * 1024 * 1024)", "GB"),
    ("tb", "/(1024 * 1024 * 1024 * 1024)", "TB"),
    ("bps", "", "B/s"),
    ("kbps", "/1024", "KB/s"),
    ("mbps", "/(1024 * 1024)", "MB/s"),
    ("gbps", "/(1024 * 1024 * 1024)", "GB/s"),
    ("ops", "", "ops"),
    ("count", "", ""),
    ("times", "", "times"),
    ("us", "*(1000 * 1000)", "us"),
    ("ms", "*1000", "ms"),
    ("s", "", "s"),
    ("m", "/60", "m"),
    ("h", "/(60 * 60)", "h"),
    ("d", "/(24 * 60 * 60)", "d"),
    ("w", "/(7 * 24 * 60 * 60)", "w"),
];

/// Resolved scaling for one unit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UnitValue {
    /// Arithmetic appended to the parenthesized query; empty means none.
    pub scale: String,
    /// Suffix shown after values in messages.
    pub show: String,
}

impl UnitValue {
    /// Returns true if the unit leaves the query untouched.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.scale.is_empty()
    }

    /// Applies the scaling to `query`.
    #[must_use]
    pub fn apply(&self, query: &str) -> String {
        if self.is_identity() {
            query.to_string()
        } else {
            format!("({query}){}", self.scale)
        }
    }
}

/// Parses a unit name.
///
/// # Errors
///
/// Returns `AlertError::InvalidGenerator` for unknown units.
pub fn parse_unit(unit: &str) -> Result<UnitValue> {
    if unit.is_empty() || unit == "short" {
        return Ok(UnitValue::default());
    }
    if let Some(found) = short_unit(unit) {
        return Ok(found);
    }

    let invalid = || AlertError::invalid_generator(format!("unit {unit} not valid"));
    let (kind, suffix) = unit.split_once('-').ok_or_else(invalid)?;
    let short = match kind {
        "percent" => match suffix {
            "0-100" => "percent",
            "0.0-1.0" => {
                return Ok(UnitValue {
                    scale: "*100".to_string(),
                    show: "%".to_string(),
                });
            }
            _ => return Err(invalid()),
        },
        "bytes" => match suffix {
            "B" => "b",
            "KB" => "kb",
            "MB" => "mb",
            "GB" => "gb",
            "TB" => "tb",
            _ => return Err(invalid()),
        },
        "bytes/sec" => match suffix {
            "B/s" => "bps",
            "KB/s" => "kbps",
            "MB/s" => "mbps",
            "GB/s" => "gbps",
            _ => return Err(invalid()),
        },
        "duration" => match suffix {
            "us" | "ms" | "s" | "m" | "h" | "d" | "w" => suffix,
            _ => return Err(invalid()),
        },
        _ => return Err(invalid()),
    };

    short_unit(short).ok_or_else(invalid)
}

fn short_unit(name: &str) -> Option<UnitValue> {
    SHORT_UNITS
        .iter()
        .find(|(n, _, _)| *n == name)
        .map(|(_, scale, show)| UnitValue {
            scale: (*scale).to_string(),
            show: (*show).to_string(),
        })
}
