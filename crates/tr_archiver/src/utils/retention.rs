//! Age math shared by all retention sweeps

use chrono::{DateTime, Utc};

const SECONDS_PER_DAY: i64 = 86_400;

/// Whole days elapsed between an entry's modification time and `now`.
/// Entries with timestamps in the future report a non-positive age.
pub fn age_in_days(now: DateTime<Utc>, modified: DateTime<Utc>) -> i64 {
    (now - modified).num_seconds() / SECONDS_PER_DAY
}

/// Inclusive age boundary: an entry exactly `max_age_days` old is expired.
pub fn is_expired(now: DateTime<Utc>, modified: DateTime<Utc>, max_age_days: u32) -> bool {
    age_in_days(now, modified) >= i64::from(max_age_days)
}
