//! Timestamp helpers.

use chrono::Utc;

/// Returns the current UTC time as an ISO 8601 formatted string.
///
/// The format is `YYYY-MM-DDTHH:MM:SS.ffffff+00:00`.
///
/// # Examples
///
/// ```
/// use contextflow::utils::iso_timestamp;
///
/// let ts = iso_timestamp();
/// assert!(ts.contains('T'));
/// ```
#[must_use]
pub fn iso_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

/// Returns the current Unix time in milliseconds.
///
/// Message `createdAt`/`updatedAt` fields carry this precision.
#[must_use]
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
