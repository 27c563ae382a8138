//! Property tests for priority stacking and effective-plan resolution.
//!
//! Invariants checked over random redemption sequences:
//! 1. Paid duration is never shortened by scheduling or deferral.
//! 2. Started subscriptions are never moved; pending starts only move forward.
//! 3. Replaying a redemption is a no-op; scheduling is deterministic.
//! 4. A new subscription never starts inside a higher-or-equal priority interval.
//! 5. The resolver picks exactly one maximal-priority covering subscription.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use proptest::prelude::*;

use tiergate_core::models::{Subscription, SubscriptionStatus};
use tiergate_core::resolver::{effective_subscription, timeline};
use tiergate_core::scheduler::{schedule, ScheduleRequest};

const PRIORITIES: [i32; 4] = [0, 25, 50, 100];

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

#[derive(Debug, Clone)]
struct Step {
    priority: i32,
    days: i64,
    advance_hours: i64,
}

fn step_strategy() -> impl Strategy<Value = Step> {
    (0..PRIORITIES.len(), 1i64..=30, 0i64..=96).prop_map(|(p, days, advance_hours)| Step {
        priority: PRIORITIES[p],
        days,
        advance_hours,
    })
}

/// Apply a sequence of redemptions the way storage does: insert the new row,
/// rewrite deferred rows. Returns the final set plus the paid duration per id.
fn replay(steps: &[Step]) -> (Vec<Subscription>, Vec<(i64, TimeDelta)>, DateTime<Utc>) {
    let mut subs: Vec<Subscription> = Vec::new();
    let mut paid = Vec::new();
    let mut now = epoch();

    for (i, step) in steps.iter().enumerate() {
        now += TimeDelta::hours(step.advance_hours);
        let card_id = 1000 + i as i64;
        let request = ScheduleRequest {
            card_id,
            priority: step.priority,
            duration: TimeDelta::days(step.days),
            now,
        };
        let before = subs.clone();
        let plan = schedule(&subs, &request).unwrap();
        assert!(plan.replay_of.is_none());

        // 4: the chosen start is not inside any >= priority interval placed so far.
        for s in &subs {
            if s.is_live_at(now) && s.priority >= step.priority && plan.deferrals.iter().all(|d| d.subscription_id != s.id) {
                assert!(
                    !(s.starts_at <= plan.interval.starts_at && plan.interval.starts_at < s.expires_at),
                    "new start {} lies inside #{} [{}, {})",
                    plan.interval.starts_at,
                    s.id,
                    s.starts_at,
                    s.expires_at
                );
            }
        }

        for d in &plan.deferrals {
            let row = subs.iter_mut().find(|s| s.id == d.subscription_id).unwrap();
            // 2: only not-yet-started rows move, and only forward.
            assert!(row.starts_at > now, "started row #{} was moved", row.id);
            assert!(d.starts_at > row.starts_at);
            row.starts_at = d.starts_at;
            row.expires_at = d.expires_at;
        }

        let id = i as i64 + 1;
        subs.push(Subscription {
            id,
            user_id: 1,
            plan_id: step.priority as i64,
            source_card_id: Some(card_id),
            status: plan.status,
            priority: step.priority,
            redeemed_at: now,
            starts_at: plan.interval.starts_at,
            expires_at: plan.interval.expires_at,
            activated_at: None,
            cancelled_at: None,
            created_at: now,
        });
        paid.push((id, TimeDelta::days(step.days)));

        // Started rows in `before` are untouched.
        for old in before.iter().filter(|s| s.starts_at <= now) {
            let new = subs.iter().find(|s| s.id == old.id).unwrap();
            assert_eq!(old.starts_at, new.starts_at);
            assert_eq!(old.expires_at, new.expires_at);
        }
    }
    (subs, paid, now)
}

proptest! {
    #[test]
    fn paid_duration_is_preserved(steps in prop::collection::vec(step_strategy(), 1..12)) {
        let (subs, paid, _) = replay(&steps);
        for (id, duration) in paid {
            let s = subs.iter().find(|s| s.id == id).unwrap();
            prop_assert_eq!(s.duration(), duration);
        }
    }

    #[test]
    fn new_subscription_never_starts_before_redemption(steps in prop::collection::vec(step_strategy(), 1..12)) {
        let (subs, _, _) = replay(&steps);
        for s in &subs {
            prop_assert!(s.starts_at >= s.redeemed_at);
        }
    }

    #[test]
    fn replaying_last_redemption_is_a_no_op(steps in prop::collection::vec(step_strategy(), 1..10)) {
        let (subs, _, now) = replay(&steps);
        let last = subs.last().unwrap();
        let again = schedule(&subs, &ScheduleRequest {
            card_id: last.source_card_id.unwrap(),
            priority: last.priority,
            duration: last.duration(),
            now,
        }).unwrap();
        prop_assert_eq!(again.replay_of, Some(last.id));
        prop_assert!(again.deferrals.is_empty());
        prop_assert_eq!(again.interval.starts_at, last.starts_at);
        prop_assert_eq!(again.interval.expires_at, last.expires_at);
    }

    #[test]
    fn scheduling_is_deterministic(
        steps in prop::collection::vec(step_strategy(), 0..10),
        extra in step_strategy(),
    ) {
        let (subs, _, now) = replay(&steps);
        let request = ScheduleRequest {
            card_id: 9_999,
            priority: extra.priority,
            duration: TimeDelta::days(extra.days),
            now,
        };
        prop_assert_eq!(schedule(&subs, &request), schedule(&subs, &request));
    }

    #[test]
    fn resolver_picks_a_maximal_covering_subscription(
        steps in prop::collection::vec(step_strategy(), 1..10),
        probe_hours in 0i64..2000,
    ) {
        let (subs, _, _) = replay(&steps);
        let at = epoch() + TimeDelta::hours(probe_hours);
        let covering: Vec<&Subscription> = subs.iter().filter(|s| s.covers(at)).collect();
        match effective_subscription(&subs, at) {
            None => prop_assert!(covering.is_empty()),
            Some(chosen) => {
                prop_assert!(chosen.covers(at));
                let best = covering.iter().map(|s| s.priority).max().unwrap();
                prop_assert_eq!(chosen.priority, best);
            }
        }
    }

    #[test]
    fn timeline_segments_tile_the_range(steps in prop::collection::vec(step_strategy(), 0..10)) {
        let (subs, _, now) = replay(&steps);
        let to = now + TimeDelta::days(120);
        let segs = timeline(&subs, epoch(), to);
        prop_assert_eq!(segs.first().unwrap().starts_at, epoch());
        prop_assert_eq!(segs.last().unwrap().ends_at, to);
        for pair in segs.windows(2) {
            prop_assert_eq!(pair[0].ends_at, pair[1].starts_at);
            prop_assert_ne!(pair[0].subscription_id, pair[1].subscription_id);
        }
    }
}

#[test]
fn equal_priority_second_card_starts_when_first_ends() {
    let steps = vec![
        Step { priority: 50, days: 10, advance_hours: 0 },
        Step { priority: 50, days: 5, advance_hours: 24 },
    ];
    let (subs, _, _) = replay(&steps);
    assert_eq!(subs[1].starts_at, subs[0].expires_at);
    assert_eq!(subs[1].duration(), TimeDelta::days(5));
    assert_eq!(subs[1].status, SubscriptionStatus::Pending);
}

#[test]
fn lower_priority_resumes_after_higher_lapses() {
    let steps = vec![
        Step { priority: 100, days: 3, advance_hours: 0 },
        Step { priority: 25, days: 5, advance_hours: 1 },
    ];
    let (subs, _, now) = replay(&steps);
    let max = &subs[0];
    let plus = &subs[1];
    assert_eq!(effective_subscription(&subs, now).unwrap().id, max.id);
    assert_eq!(plus.starts_at, max.expires_at);
    assert_eq!(effective_subscription(&subs, max.expires_at).unwrap().id, plus.id);
    assert!(effective_subscription(&subs, plus.expires_at).is_none());
}
