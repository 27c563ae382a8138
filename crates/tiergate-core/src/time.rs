//! UTC time helpers shared by the scheduler, the quota enforcer and storage.
//!
//! All persisted timestamps are UTC unix milliseconds. Inputs are truncated to
//! millisecond precision before use so that values computed in memory compare
//! equal to their stored counterparts.

use chrono::{DateTime, SubsecRound, TimeDelta, Timelike, Utc};

/// Length of one quota window.
pub const WINDOW_SECONDS: i64 = 3600;

/// Truncate to millisecond precision.
pub fn normalize(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(3)
}

/// Start of the hour containing `ts`.
pub fn floor_to_hour(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}

/// Whole seconds until the next hour boundary, at least 1.
pub fn seconds_until_next_hour(ts: DateTime<Utc>) -> u64 {
    let next = floor_to_hour(ts) + TimeDelta::seconds(WINDOW_SECONDS);
    let millis = (next - ts).num_milliseconds().max(1);
    // Round up so a caller sleeping this long always lands in the next window.
    ((millis + 999) / 1000) as u64
}

pub fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub fn from_millis(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

/// `days` whole days as a duration, `None` when out of range. Callers validate positivity.
pub fn days(days: i64) -> Option<TimeDelta> {
    TimeDelta::try_days(days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn floor_drops_minutes_and_below() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 14, 15, 9, 26).unwrap() + TimeDelta::milliseconds(535);
        assert_eq!(floor_to_hour(ts), Utc.with_ymd_and_hms(2025, 3, 14, 15, 0, 0).unwrap());
    }

    #[test]
    fn retry_after_counts_to_next_boundary() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 14, 15, 59, 30).unwrap();
        assert_eq!(seconds_until_next_hour(ts), 30);

        let on_boundary = Utc.with_ymd_and_hms(2025, 3, 14, 15, 0, 0).unwrap();
        assert_eq!(seconds_until_next_hour(on_boundary), 3600);
    }

    #[test]
    fn retry_after_rounds_partial_seconds_up() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 14, 15, 59, 59).unwrap() + TimeDelta::milliseconds(900);
        assert_eq!(seconds_until_next_hour(ts), 1);
    }

    #[test]
    fn millis_roundtrip_after_normalize() {
        let ts = normalize(Utc::now());
        assert_eq!(from_millis(to_millis(ts)), Some(ts));
    }
}
