//! Effective-plan resolution. Pure: reads a subscription set, never mutates it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Plan, Subscription};

/// Where the effective plan came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum PlanSource {
    Subscription { subscription_id: i64 },
    /// Synthesised default coverage; never stored.
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectivePlan {
    pub plan: Plan,
    pub source: PlanSource,
    /// When the governing subscription lapses. `None` for the default plan.
    pub until: Option<DateTime<Utc>>,
}

impl EffectivePlan {
    pub fn hourly_limit(&self) -> u32 {
        self.plan.hourly_message_limit
    }
}

/// The subscription governing `now`: live status, `starts_at <= now < expires_at`,
/// highest priority, then earliest start, then lowest id.
///
/// Timestamps decide; a lapsed subscription still marked `active` is ignored.
pub fn effective_subscription(subs: &[Subscription], now: DateTime<Utc>) -> Option<&Subscription> {
    subs.iter()
        .filter(|s| s.status.is_live() && s.covers(now))
        .min_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.starts_at.cmp(&b.starts_at))
                .then(a.id.cmp(&b.id))
        })
}

/// One stretch of time during which the same subscription (or the default) governs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub subscription_id: Option<i64>,
}

/// Piecewise view of who governs between `from` and `to`.
///
/// Effectiveness can only change at an interval boundary, so evaluating the
/// resolver at each boundary inside the range is exact.
pub fn timeline(subs: &[Subscription], from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<Segment> {
    if to <= from {
        return Vec::new();
    }
    let mut cuts: Vec<DateTime<Utc>> = subs
        .iter()
        .filter(|s| s.status.is_live())
        .flat_map(|s| [s.starts_at, s.expires_at])
        .filter(|t| *t > from && *t < to)
        .collect();
    cuts.push(from);
    cuts.push(to);
    cuts.sort();
    cuts.dedup();

    let mut segments: Vec<Segment> = Vec::new();
    for pair in cuts.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        let owner = effective_subscription(subs, start).map(|s| s.id);
        match segments.last_mut() {
            Some(last) if last.subscription_id == owner => last.ends_at = end,
            _ => segments.push(Segment {
                starts_at: start,
                ends_at: end,
                subscription_id: owner,
            }),
        }
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubscriptionStatus;
    use chrono::{TimeDelta, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
    }

    fn sub(id: i64, priority: i32, start_h: i64, end_h: i64) -> Subscription {
        Subscription {
            id,
            user_id: 1,
            plan_id: id,
            source_card_id: Some(id),
            status: SubscriptionStatus::Active,
            priority,
            redeemed_at: t0(),
            starts_at: t0() + TimeDelta::hours(start_h),
            expires_at: t0() + TimeDelta::hours(end_h),
            activated_at: None,
            cancelled_at: None,
            created_at: t0(),
        }
    }

    #[test]
    fn nothing_covers_means_none() {
        assert!(effective_subscription(&[], t0()).is_none());
        let later = sub(1, 50, 5, 10);
        assert!(effective_subscription(&[later], t0()).is_none());
    }

    #[test]
    fn highest_priority_wins() {
        let subs = vec![sub(1, 25, -5, 5), sub(2, 100, -1, 1), sub(3, 50, -2, 2)];
        assert_eq!(effective_subscription(&subs, t0()).unwrap().id, 2);
    }

    #[test]
    fn equal_priority_prefers_longest_running() {
        let subs = vec![sub(1, 50, -1, 5), sub(2, 50, -3, 5)];
        assert_eq!(effective_subscription(&subs, t0()).unwrap().id, 2);
    }

    #[test]
    fn lapsed_active_row_is_ignored_without_sweep() {
        let stale = sub(1, 100, -10, -1);
        assert_eq!(stale.status, SubscriptionStatus::Active);
        assert!(effective_subscription(&[stale], t0()).is_none());
    }

    #[test]
    fn expiry_bound_is_exclusive() {
        let s = sub(1, 50, -1, 0);
        assert!(effective_subscription(&[s], t0()).is_none());
    }

    #[test]
    fn cancelled_never_effective() {
        let mut s = sub(1, 100, -1, 5);
        s.status = SubscriptionStatus::Cancelled;
        assert!(effective_subscription(&[s], t0()).is_none());
    }

    #[test]
    fn timeline_hands_over_to_lower_priority() {
        let subs = vec![sub(1, 100, 0, 2), sub(2, 25, 0, 5)];
        let segs = timeline(&subs, t0(), t0() + TimeDelta::hours(6));
        assert_eq!(segs.len(), 3);
        assert_eq!(segs[0].subscription_id, Some(1));
        assert_eq!(segs[1].subscription_id, Some(2));
        assert_eq!(segs[1].starts_at, t0() + TimeDelta::hours(2));
        assert_eq!(segs[2].subscription_id, None);
        assert_eq!(segs[2].ends_at, t0() + TimeDelta::hours(6));
    }

    #[test]
    fn empty_range_has_no_segments() {
        assert!(timeline(&[], t0(), t0()).is_empty());
    }
}
