//! Timestamp formatting for info files
//!
//! Every recorded time is stored twice: as an ISO-8601 string with seven
//! fractional digits and a `Z` suffix (`2023-10-26T08:15:42.1234567Z`), and
//! as an integer tick count of 100 ns intervals since `0001-01-01T00:00:00Z`.
//!
//! Comparisons during reconciliation are done on the string form. Because the
//! string keeps 100 ns precision, a live time is first truncated the same way
//! the recorder truncated it, so an untouched entry always compares equal.

use crate::error::{Result, TreestampError};
use chrono::{DateTime, Utc};
use std::time::{SystemTime, UNIX_EPOCH};

/// Ticks between `0001-01-01T00:00:00Z` and the Unix epoch
pub const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

/// Number of ticks in one second
pub const TICKS_PER_SECOND: i64 = 10_000_000;

const NANOS_PER_TICK: u32 = 100;

/// Format a UTC time as a round-trip ISO-8601 string
///
/// # Example
///
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use treestamp::timestamp::format;
///
/// let time = Utc.with_ymd_and_hms(2023, 10, 26, 8, 15, 42).unwrap();
/// assert_eq!(format(&time), "2023-10-26T08:15:42.0000000Z");
/// ```
pub fn format(time: &DateTime<Utc>) -> String {
    format!(
        "{}.{:07}Z",
        time.format("%Y-%m-%dT%H:%M:%S"),
        time.timestamp_subsec_nanos() / NANOS_PER_TICK
    )
}

/// Convert a system time to UTC
///
/// Returns `None` for times chrono or the tick encoding cannot represent,
/// which some filesystems report for corrupt or far-future timestamps.
pub fn from_system_time(time: SystemTime) -> Option<DateTime<Utc>> {
    let (seconds, nanos) = match time.duration_since(UNIX_EPOCH) {
        Ok(after) => (i64::try_from(after.as_secs()).ok()?, after.subsec_nanos()),
        Err(e) => {
            let before = e.duration();
            let seconds = i64::try_from(before.as_secs()).ok()?;
            match before.subsec_nanos() {
                0 => (seconds.checked_neg()?, 0),
                nanos => (seconds.checked_neg()?.checked_sub(1)?, 1_000_000_000 - nanos),
            }
        }
    };
    let time = DateTime::from_timestamp(seconds, nanos)?;
    to_ticks(&time).map(|_| time)
}

/// Format a system time as a round-trip ISO-8601 string
pub fn format_system_time(time: SystemTime) -> Option<String> {
    from_system_time(time).map(|time| format(&time))
}

/// Parse an ISO-8601 string written by [`format`]
///
/// Any RFC 3339 string is accepted; offsets are converted to UTC.
///
/// # Errors
///
/// - [`TreestampError::InvalidTimestamp`] if the string is not RFC 3339
pub fn parse(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|e| TreestampError::InvalidTimestamp(format!("{}: {}", value, e)))
}

/// Convert a UTC time to 100 ns ticks since `0001-01-01T00:00:00Z`
///
/// Returns `None` when the tick count does not fit in an `i64`.
pub fn to_ticks(time: &DateTime<Utc>) -> Option<i64> {
    time.timestamp()
        .checked_mul(TICKS_PER_SECOND)?
        .checked_add(UNIX_EPOCH_TICKS)?
        .checked_add(i64::from(time.timestamp_subsec_nanos() / NANOS_PER_TICK))
}

/// Convert 100 ns ticks back to a UTC time
///
/// Returns `None` when the tick count is outside the range chrono can represent.
pub fn from_ticks(ticks: i64) -> Option<DateTime<Utc>> {
    let since_epoch = ticks.checked_sub(UNIX_EPOCH_TICKS)?;
    let seconds = since_epoch.div_euclid(TICKS_PER_SECOND);
    let nanos = since_epoch.rem_euclid(TICKS_PER_SECOND) as u32 * NANOS_PER_TICK;
    DateTime::from_timestamp(seconds, nanos)
}

/// Current time, truncated to tick precision
pub fn now() -> DateTime<Utc> {
    let now = Utc::now();
    to_ticks(&now).and_then(from_ticks).unwrap_or(now)
}
