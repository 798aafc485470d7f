use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{LocatorError, Result};

pub fn parse_time_or_relative(input: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Ok(ts.with_timezone(&Utc));
    }

    if let Ok(duration) = humantime::parse_duration(input) {
        return Ok(Utc::now()
            - chrono::Duration::from_std(duration).map_err(|e| {
                LocatorError::Parse(format!("failed to parse duration to chrono: {e}"))
            })?);
    }

    Err(LocatorError::Parse(format!(
        "expected RFC3339 time or duration, got {input}"
    )))
}

pub fn parse_duration_str(input: &str) -> Result<Duration> {
    humantime::parse_duration(input)
        .map_err(|e| LocatorError::Parse(format!("invalid duration {input}: {e}")))
}

/// Converts a microsecond epoch timestamp as reported by the tracing store.
/// Out-of-range values clamp to the epoch rather than failing.
pub fn from_epoch_micros(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap_or(DateTime::UNIX_EPOCH)
}

pub fn to_epoch_micros(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_micros()
}
