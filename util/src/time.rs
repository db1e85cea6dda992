//! General time utility functions

use chrono::{DateTime, Utc};

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

/// Convert a UTC datetime into fractional seconds since the unix epoch.
pub fn datetime_to_unix_s(datetime: &DateTime<Utc>) -> f64 {
    datetime.timestamp() as f64 
        + datetime.timestamp_subsec_nanos() as f64 / NANOS_PER_SECOND as f64
}

/// Current wall-clock time in seconds since the unix epoch.
///
/// All bus message timestamps use this time base.
pub fn now_unix_s() -> f64 {
    datetime_to_unix_s(&Utc::now())
}
