//! Date/time utilities for Gator.

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::{GatorError, Result};

/// Storage format for timestamps. Fixed width, so text order is time order.
const DB_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Display format matching RFC 1123 with a UTC zone name.
const RFC1123_FORMAT: &str = "%a, %d %b %Y %H:%M:%S UTC";

/// Format a timestamp for storage.
pub fn to_db(dt: &DateTime<Utc>) -> String {
    dt.format(DB_FORMAT).to_string()
}

/// Current time, formatted for storage.
pub fn now_db() -> String {
    to_db(&Utc::now())
}

/// Parse a stored timestamp.
///
/// Accepts the storage format, plain SQLite `datetime('now')` output and RFC 3339.
pub fn parse_db(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, DB_FORMAT) {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse an RSS `pubDate` (RFC 1123, e.g. `Mon, 02 Jan 2006 15:04:05 GMT`).
///
/// Numeric offsets (`+0100`) and the common US zone names are accepted.
pub fn parse_rfc1123(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(s.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| GatorError::Parse(format!("invalid publish date {s:?}: {e}")))
}

/// Format a timestamp the way `browse` shows it.
pub fn format_rfc1123(dt: &DateTime<Utc>) -> String {
    dt.format(RFC1123_FORMAT).to_string()
}

/// Parse a duration string such as `1m`, `30s`, `1h30m` or `250ms`.
///
/// The result must be positive.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let invalid = || GatorError::Parse(format!("invalid duration {s:?}"));
    let input = s.trim();
    if input.is_empty() {
        return Err(invalid());
    }
    if input == "0" {
        return Err(GatorError::Parse("duration must be positive".to_string()));
    }

    let mut total = Duration::ZERO;
    let mut rest = input;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(invalid)?;
        if num_len == 0 {
            return Err(invalid());
        }
        let value: f64 = rest[..num_len].parse().map_err(|_| invalid())?;
        rest = &rest[num_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit: f64 = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60.0 * 1e9,
            "h" => 3600.0 * 1e9,
            _ => return Err(invalid()),
        };
        rest = &rest[unit_len..];

        total += Duration::from_nanos((value * nanos_per_unit) as u64);
    }

    if total.is_zero() {
        return Err(GatorError::Parse("duration must be positive".to_string()));
    }
    Ok(total)
}
