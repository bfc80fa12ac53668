//! Timestamp encoding for persisted records.
//!
//! Timestamps are stored as RFC 3339 TEXT in UTC. Reading is more lenient
//! than writing because provisioned rows are often hand-entered:
//! - full RFC 3339 (`2025-06-01T12:00:00Z`, with any offset)
//! - naive ISO-8601 date-time (`2025-06-01T12:00:00`, `2025-06-01 12:00:00`),
//!   interpreted as UTC
//! - a bare date (`2025-12-31`), interpreted as the last second of that UTC day

use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Formats a timestamp for storage.
#[must_use]
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parses a stored timestamp.
///
/// # Errors
///
/// Returns [`Error::InvalidTimestamp`] if the value matches none of the
/// accepted encodings.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let end_of_day = NaiveTime::from_hms_opt(23, 59, 59)
            .ok_or_else(|| Error::InvalidTimestamp(raw.to_string()))?;
        return Ok(date.and_time(end_of_day).and_utc());
    }

    Err(Error::InvalidTimestamp(raw.to_string()))
}
