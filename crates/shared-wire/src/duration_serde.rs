//! Human-readable `Duration` (de)serialization for config files.
//!
//! Accepts `"250ms"`, `"30s"`, `"0.5s"`, `"5m"`, `"1h"` or a bare number of
//! seconds. Serializes to the largest unit that represents the value exactly.
//!
//! ```ignore
//! #[serde(with = "shared_wire::duration_serde")]
//! pub call: Duration,
//! ```

use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

/// Why a duration string was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid duration {input:?}: {reason}")]
pub struct DurationParseError {
    pub input: String,
    pub reason: &'static str,
}

pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_duration(*duration))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(serde::de::Error::custom)
}

pub fn format_duration(duration: Duration) -> String {
    let ms = duration.as_millis();
    if ms == 0 {
        "0s".to_string()
    } else if ms % 3_600_000 == 0 {
        format!("{}h", ms / 3_600_000)
    } else if ms % 60_000 == 0 {
        format!("{}m", ms / 60_000)
    } else if ms % 1_000 == 0 {
        format!("{}s", ms / 1_000)
    } else {
        format!("{ms}ms")
    }
}

pub fn parse_duration(s: &str) -> Result<Duration, DurationParseError> {
    let trimmed = s.trim();
    let fail = |reason| DurationParseError {
        input: s.to_string(),
        reason,
    };

    // "ms" before "s" and "m", both of which it ends with.
    let (number, unit_nanos) = if let Some(n) = trimmed.strip_suffix("ms") {
        (n, 1e6)
    } else if let Some(n) = trimmed.strip_suffix('s') {
        (n, 1e9)
    } else if let Some(n) = trimmed.strip_suffix('m') {
        (n, 60e9)
    } else if let Some(n) = trimmed.strip_suffix('h') {
        (n, 3600e9)
    } else {
        (trimmed, 1e9)
    };

    let value: f64 = number
        .trim()
        .parse()
        .map_err(|_| fail("expected a number with an optional ms/s/m/h unit"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(fail("must be a non-negative finite number"));
    }
    let nanos = (value * unit_nanos).round();
    if nanos >= u64::MAX as f64 {
        return Err(fail("out of range"));
    }
    Ok(Duration::from_nanos(nanos as u64))
}
