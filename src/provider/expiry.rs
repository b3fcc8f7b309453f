//! Timestamp-based replay window.
//!
//! This is a coarse control: it does not remember signatures it has already
//! seen, so a captured request can be replayed until it ages out.

use chrono::{DateTime, Duration, Utc};

/// Default maximum age of a signed request.
pub const DEFAULT_MAX_AGE_SECS: u64 = 60;

/// Returns true if `timestamp` (Unix seconds) is older than `max_age` at `now`.
///
/// Timestamps in the future are never considered expired, including ones too
/// far ahead to represent. Timestamps too far in the past to represent are
/// expired. If `now - max_age` falls outside the representable range, nothing
/// is old enough to expire.
#[must_use]
pub fn is_expired(timestamp: i64, now: DateTime<Utc>, max_age: Duration) -> bool {
    let Some(oldest) = now.checked_sub_signed(max_age) else {
        return false;
    };
    match DateTime::<Utc>::from_timestamp(timestamp, 0) {
        Some(signed_at) => signed_at < oldest,
        None => timestamp < 0,
    }
}
