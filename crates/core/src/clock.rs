//! UTC wall-clock helpers shared by the policy engines and the config layer.

use chrono::{DateTime, Timelike, Utc};

/// Number of seconds in one UTC day.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Seconds elapsed since UTC midnight for the given instant.
pub fn seconds_since_midnight(at: DateTime<Utc>) -> i64 {
    i64::from(at.num_seconds_from_midnight())
}
