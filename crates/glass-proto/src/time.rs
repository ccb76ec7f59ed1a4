//! ISO8601 time conversion for the wire format (spec.md §6:
//! `Time|T:<ISO8601>`). The core only ever sees `f64` seconds since the
//! epoch; this module is the sole place that parses or formats calendar
//! time.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{ProtoError, Result};

/// Parses an ISO8601/RFC3339 timestamp into fractional seconds since the
/// Unix epoch.
pub fn parse_iso8601(s: &str) -> Result<f64> {
    let parsed: DateTime<Utc> =
        DateTime::parse_from_rfc3339(s).map_err(|e| ProtoError::BadTimestamp(format!("{s}: {e}")))?.with_timezone(&Utc);
    let secs = parsed.timestamp() as f64;
    let nanos = parsed.timestamp_subsec_nanos() as f64 / 1e9;
    Ok(secs + nanos)
}

/// Formats fractional epoch seconds as an RFC3339 timestamp with
/// millisecond precision, matching the wire format's `Time` field.
pub fn format_iso8601(epoch_sec: f64) -> String {
    let secs = epoch_sec.floor() as i64;
    let millis = ((epoch_sec - secs as f64) * 1000.0).round() as u32;
    let dt = DateTime::<Utc>::from_timestamp(secs, millis * 1_000_000).unwrap_or_else(|| DateTime::<Utc>::from_timestamp(0, 0).unwrap());
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_formatting() {
        let t = parse_iso8601("2024-03-05T12:00:00.500Z").unwrap();
        let formatted = format_iso8601(t);
        let back = parse_iso8601(&formatted).unwrap();
        assert!((t - back).abs() < 1e-3);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_iso8601("not-a-time").is_err());
    }
}
