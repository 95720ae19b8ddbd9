//! Timestamp parsing shared by the format parsers.
//!
//! Every parser falls back to "now" when a line carries no usable stamp, so
//! the functions here return `Option` and leave the fallback to callers.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};

use crate::value::Value;

/// Field names probed, in order, by the structured-object parser.
pub const TIMESTAMP_FIELDS: [&str; 10] = [
    "timestamp",
    "time",
    "@timestamp",
    "ts",
    "datetime",
    "date",
    "created_at",
    "createdAt",
    "logged_at",
    "loggedAt",
];

/// Epoch values above this are taken to be milliseconds.
const MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

/// Current time as epoch seconds.
pub fn now_epoch() -> i64 {
    Utc::now().timestamp()
}

/// Normalize an integer epoch that may be expressed in milliseconds.
pub fn from_epoch_scalar(n: i64) -> i64 {
    if n >= MILLIS_THRESHOLD { n / 1000 } else { n }
}

/// Parse an ISO8601 / RFC3339 stamp, tolerating the common naive variants
/// (`2025-12-04T10:00:00`, `2025-12-04 10:00:00`), which are read as UTC.
pub fn parse_iso(s: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).timestamp());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc().timestamp());
        }
    }
    None
}

/// Parse a combined-log bracket stamp: `04/Dec/2025:10:00:00 +0000`.
pub fn parse_combined(s: &str) -> Option<i64> {
    DateTime::parse_from_str(s, "%d/%b/%Y:%H:%M:%S %z")
        .ok()
        .map(|dt| dt.timestamp())
}

/// Parse an error-log stamp: `2025/12/04 10:00:00`, read as UTC.
pub fn parse_error_log(s: &str) -> Option<i64> {
    NaiveDateTime::parse_from_str(s, "%Y/%m/%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc().timestamp())
}

/// Parse a BSD syslog stamp (`Dec  4 10:00:00`), assuming the current year.
/// Wrong across year boundaries; the format simply does not carry a year.
pub fn parse_bsd(s: &str) -> Option<i64> {
    let collapsed: Vec<&str> = s.split_whitespace().collect();
    if collapsed.len() != 3 {
        return None;
    }
    let with_year = format!(
        "{} {} {} {}",
        Utc::now().year(),
        collapsed[0],
        collapsed[1],
        collapsed[2]
    );
    NaiveDateTime::parse_from_str(&with_year, "%Y %b %d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc().timestamp())
}

/// Probe the well-known timestamp fields in order: integer-like scalars are
/// epoch values (seconds or milliseconds), strings are tried as ISO8601 then
/// as a numeric epoch.
pub fn resolve_from_fields(fields: &BTreeMap<String, Value>) -> Option<i64> {
    for name in TIMESTAMP_FIELDS {
        let Some(value) = fields.get(name) else {
            continue;
        };
        let resolved = match value {
            Value::Int(n) => Some(from_epoch_scalar(*n)),
            Value::Float(f) => Some(from_epoch_scalar(*f as i64)),
            Value::Str(s) => {
                parse_iso(s).or_else(|| s.parse::<i64>().ok().map(from_epoch_scalar))
            }
            _ => None,
        };
        if resolved.is_some() {
            return resolved;
        }
    }
    None
}

/// Parse a stamp with a caller-supplied chrono format string, trying
/// zone-aware then naive interpretation.
pub fn parse_with_format(s: &str, fmt: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
        return Some(dt.timestamp());
    }
    NaiveDateTime::parse_from_str(s, fmt)
        .ok()
        .map(|naive| naive.and_utc().timestamp())
}
