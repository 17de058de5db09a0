//! Timestamp helpers
//!
//! Every timestamp in the pipeline is Unix nanoseconds in an `i64`, so
//! ordering and window arithmetic are plain integer operations.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::errors::TypesError;

/// Unix timestamp in nanoseconds.
pub type UnixNanos = i64;

pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Convert a duration to nanoseconds, saturating at `i64::MAX`.
pub fn duration_to_nanos(duration: Duration) -> i64 {
    i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX)
}

/// Current wall-clock time.
pub fn now_nanos() -> UnixNanos {
    Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}

/// Parse an RFC 3339 timestamp such as `2019-08-14T20:42:27.265Z`.
pub fn parse_rfc3339_nanos(s: &str) -> Result<UnixNanos, TypesError> {
    let parsed = DateTime::parse_from_rfc3339(s)
        .map_err(|_| TypesError::InvalidTimestamp(s.to_string()))?;
    parsed
        .timestamp_nanos_opt()
        .ok_or_else(|| TypesError::InvalidTimestamp(s.to_string()))
}

/// Render nanoseconds as an RFC 3339 UTC string.
pub fn format_nanos(nanos: UnixNanos) -> String {
    DateTime::<Utc>::from_timestamp_nanos(nanos).to_rfc3339()
}
