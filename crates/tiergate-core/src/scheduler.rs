//! Priority stacking for redeemed subscriptions.
//!
//! Subscriptions that have already started are fixed. Every subscription that
//! has not started yet (plus the new one) is placed in queue order
//! `(priority desc, redeemed_at, source_card_id, id)` at the first instant, at or
//! after its current start, that no earlier-placed subscription of greater or
//! equal priority covers. Starts only ever move forward, and a redemption that
//! was already scheduled for the same card is returned untouched, so replaying
//! a redemption never defers anything twice.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Subscription, SubscriptionStatus};

/// A newly redeemed card waiting to be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleRequest {
    pub card_id: i64,
    pub priority: i32,
    pub duration: TimeDelta,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A pending subscription pushed later to make room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deferral {
    pub subscription_id: i64,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub interval: Interval,
    pub status: SubscriptionStatus,
    pub deferrals: Vec<Deferral>,
    /// Set when the card already has a subscription; nothing must be written.
    pub replay_of: Option<i64>,
}

struct Slot {
    subscription_id: Option<i64>,
    priority: i32,
    queue: (DateTime<Utc>, i64, i64),
    starts_at: DateTime<Utc>,
    duration: TimeDelta,
}

struct Placed {
    priority: i32,
    starts_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// Place `request` among the user's existing subscriptions.
///
/// Returns `None` when an interval would end past the representable calendar.
pub fn schedule(existing: &[Subscription], request: &ScheduleRequest) -> Option<Schedule> {
    let now = request.now;

    if let Some(prior) = existing
        .iter()
        .find(|s| s.source_card_id == Some(request.card_id))
    {
        return Some(Schedule {
            interval: Interval {
                starts_at: prior.starts_at,
                expires_at: prior.expires_at,
            },
            status: prior.status,
            deferrals: Vec::new(),
            replay_of: Some(prior.id),
        });
    }

    // Exhausted, expired and cancelled subscriptions never block anything.
    let live: Vec<&Subscription> = existing.iter().filter(|s| s.is_live_at(now)).collect();

    let mut placed: Vec<Placed> = live
        .iter()
        .filter(|s| s.starts_at <= now)
        .map(|s| Placed {
            priority: s.priority,
            starts_at: s.starts_at,
            expires_at: s.expires_at,
        })
        .collect();

    let mut floating: Vec<Slot> = live
        .iter()
        .filter(|s| s.starts_at > now)
        .map(|s| Slot {
            subscription_id: Some(s.id),
            priority: s.priority,
            queue: s.queue_key(),
            starts_at: s.starts_at,
            duration: s.duration(),
        })
        .collect();
    floating.push(Slot {
        subscription_id: None,
        priority: request.priority,
        queue: (now, request.card_id, i64::MAX),
        starts_at: now,
        duration: request.duration,
    });
    floating.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.queue.cmp(&b.queue)));

    let mut interval = Interval {
        starts_at: now,
        expires_at: now.checked_add_signed(request.duration)?,
    };
    let mut deferrals = Vec::new();

    for slot in floating {
        let starts_at = first_free_instant(slot.starts_at, slot.priority, &placed);
        let expires_at = starts_at.checked_add_signed(slot.duration)?;
        match slot.subscription_id {
            None => interval = Interval { starts_at, expires_at },
            Some(id) if starts_at != slot.starts_at => deferrals.push(Deferral {
                subscription_id: id,
                starts_at,
                expires_at,
            }),
            Some(_) => {}
        }
        placed.push(Placed {
            priority: slot.priority,
            starts_at,
            expires_at,
        });
    }

    let status = if interval.starts_at <= now {
        SubscriptionStatus::Active
    } else {
        SubscriptionStatus::Pending
    };
    Some(Schedule {
        interval,
        status,
        deferrals,
        replay_of: None,
    })
}

/// Walk forward through the chain of blocking coverage starting at `candidate`.
fn first_free_instant(candidate: DateTime<Utc>, priority: i32, placed: &[Placed]) -> DateTime<Utc> {
    let mut start = candidate;
    loop {
        let blocked_until = placed
            .iter()
            .filter(|p| p.priority >= priority && p.starts_at <= start && start < p.expires_at)
            .map(|p| p.expires_at)
            .max();
        match blocked_until {
            Some(end) => start = end,
            None => return start,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    fn sub(id: i64, priority: i32, start_days: i64, end_days: i64) -> Subscription {
        Subscription {
            id,
            user_id: 7,
            plan_id: 1,
            source_card_id: Some(id * 10),
            status: if start_days <= 0 {
                SubscriptionStatus::Active
            } else {
                SubscriptionStatus::Pending
            },
            priority,
            redeemed_at: t0() - TimeDelta::seconds(100 - id),
            starts_at: t0() + TimeDelta::days(start_days),
            expires_at: t0() + TimeDelta::days(end_days),
            activated_at: None,
            cancelled_at: None,
            created_at: t0(),
        }
    }

    fn request(card_id: i64, priority: i32, days: i64) -> ScheduleRequest {
        ScheduleRequest {
            card_id,
            priority,
            duration: TimeDelta::days(days),
            now: t0(),
        }
    }

    #[test]
    fn empty_set_starts_now() {
        let s = schedule(&[], &request(1, 50, 30)).unwrap();
        assert_eq!(s.interval.starts_at, t0());
        assert_eq!(s.interval.expires_at, t0() + TimeDelta::days(30));
        assert_eq!(s.status, SubscriptionStatus::Active);
        assert!(s.deferrals.is_empty());
    }

    #[test]
    fn equal_priority_queues_behind_active() {
        let a = sub(1, 10, -2, 3);
        let s = schedule(&[a.clone()], &request(99, 10, 5)).unwrap();
        assert_eq!(s.interval.starts_at, a.expires_at);
        assert_eq!(s.interval.expires_at - s.interval.starts_at, TimeDelta::days(5));
        assert_eq!(s.status, SubscriptionStatus::Pending);
    }

    #[test]
    fn lower_priority_waits_for_higher_chain() {
        let max = sub(1, 100, -1, 2);
        let pro = sub(2, 50, 2, 6);
        let s = schedule(&[max, pro.clone()], &request(99, 25, 4)).unwrap();
        assert_eq!(s.interval.starts_at, pro.expires_at);
    }

    #[test]
    fn higher_priority_starts_immediately_without_touching_active() {
        let plus = sub(1, 25, -1, 10);
        let s = schedule(&[plus], &request(99, 100, 3)).unwrap();
        assert_eq!(s.interval.starts_at, t0());
        assert!(s.deferrals.is_empty());
    }

    #[test]
    fn higher_priority_defers_pending_lower() {
        let pro = sub(1, 50, -1, 2);
        let plus = sub(2, 25, 2, 7);
        let s = schedule(&[pro, plus.clone()], &request(99, 100, 4)).unwrap();
        assert_eq!(s.interval.starts_at, t0());
        assert_eq!(s.deferrals.len(), 1);
        let d = s.deferrals[0];
        assert_eq!(d.subscription_id, plus.id);
        assert_eq!(d.starts_at, t0() + TimeDelta::days(4));
        assert_eq!(d.expires_at - d.starts_at, plus.duration());
    }

    #[test]
    fn exhausted_subscription_never_defers() {
        let old_max = sub(1, 100, -30, 0);
        let s = schedule(&[old_max], &request(99, 25, 4)).unwrap();
        assert_eq!(s.interval.starts_at, t0());
    }

    #[test]
    fn cancelled_subscription_never_defers() {
        let mut max = sub(1, 100, -1, 5);
        max.status = SubscriptionStatus::Cancelled;
        let s = schedule(&[max], &request(99, 25, 4)).unwrap();
        assert_eq!(s.interval.starts_at, t0());
    }

    #[test]
    fn replayed_card_is_a_no_op() {
        let a = sub(1, 10, -2, 3);
        let mut replay = request(a.source_card_id.unwrap(), 10, 5);
        replay.now = t0() + TimeDelta::hours(1);
        let s = schedule(&[a.clone()], &replay).unwrap();
        assert_eq!(s.replay_of, Some(a.id));
        assert_eq!(s.interval.starts_at, a.starts_at);
        assert!(s.deferrals.is_empty());
    }

    #[test]
    fn interval_past_calendar_end_is_rejected() {
        let mut r = request(99, 50, 30);
        r.duration = TimeDelta::MAX;
        assert!(schedule(&[], &r).is_none());

        // A queued slot pushed to the edge of the calendar overflows too.
        let mut edge = sub(1, 50, -1, 0);
        edge.expires_at = DateTime::<Utc>::MAX_UTC - TimeDelta::days(1);
        assert!(schedule(&[edge], &request(99, 50, 30)).is_none());
    }

    #[test]
    fn same_instant_equal_priority_orders_by_card_id() {
        let mut queued = sub(1, 10, 3, 8);
        queued.redeemed_at = t0();
        queued.source_card_id = Some(500);
        let active = sub(2, 10, -1, 3);
        // Card 400 sorts ahead of card 500 redeemed at the same instant.
        let s = schedule(&[active.clone(), queued.clone()], &request(400, 10, 2)).unwrap();
        assert_eq!(s.interval.starts_at, active.expires_at);
        assert_eq!(s.deferrals.len(), 1);
        assert_eq!(s.deferrals[0].starts_at, s.interval.expires_at);
    }
}
