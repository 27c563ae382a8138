//! `StorageEngine`: the SQLite `IEntitlementStorage`.
//!
//! Owns the `ConnectionPool`. Every mutating call is one `BEGIN IMMEDIATE`
//! transaction; reads go through the reader pool.

use std::path::Path;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info};

use tiergate_core::config::StorageConfig;
use tiergate_core::errors::{TierGateError, TierGateResult};
use tiergate_core::models::card::normalize_code;
use tiergate_core::models::{
    Card, NewCard, NewSubscription, Plan, PlanSeed, QuotaDecision, QuotaIncrement, QuotaWindow,
    Redemption, Subscription, SweepStats, UserId,
};
use tiergate_core::resolver::effective_subscription;
use tiergate_core::scheduler::{schedule, ScheduleRequest};
use tiergate_core::time::{self, to_millis};
use tiergate_core::traits::{IEntitlementStorage, StorageHealth};

use crate::migrations;
use crate::pool::ConnectionPool;
use crate::queries::{card_ops, plan_ops, quota_ops, subscription_ops};

pub struct StorageEngine {
    pool: ConnectionPool,
}

impl StorageEngine {
    /// Open (or create) a database file and bring its schema up to date.
    pub fn open(path: &Path, config: &StorageConfig) -> TierGateResult<Self> {
        let pool = ConnectionPool::open(path, config)?;
        pool.with_writer(migrations::run_migrations)?;
        info!(path = %path.display(), readers = pool.reader_count(), "storage opened");
        Ok(Self { pool })
    }

    /// Private in-memory database, migrated.
    pub fn open_in_memory() -> TierGateResult<Self> {
        Self::open_in_memory_with(&StorageConfig::default())
    }

    pub fn open_in_memory_with(config: &StorageConfig) -> TierGateResult<Self> {
        let pool = ConnectionPool::open_in_memory(config)?;
        pool.with_writer(migrations::run_migrations)?;
        Ok(Self { pool })
    }

    /// File-backed when `db_path` is set, in-memory otherwise.
    pub fn from_config(config: &StorageConfig) -> TierGateResult<Self> {
        match &config.db_path {
            Some(path) => Self::open(Path::new(path), config),
            None => Self::open_in_memory_with(config),
        }
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn quota_window_count(&self) -> TierGateResult<u64> {
        self.pool.with_reader(quota_ops::count_windows)
    }
}

/// Limit that governs `user_id` at `now`: the effective subscription's plan,
/// else the default plan. Must run inside the caller's transaction.
fn resolve_limit(conn: &rusqlite::Connection, user_id: UserId, now: DateTime<Utc>) -> TierGateResult<Plan> {
    let live = subscription_ops::live_for_user(conn, user_id, now)?;
    if let Some(sub) = effective_subscription(&live, now) {
        if let Some(plan) = plan_ops::get_plan_by_id(conn, sub.plan_id)? {
            return Ok(plan);
        }
    }
    plan_ops::get_default_plan(conn)?.ok_or(TierGateError::DefaultPlanMissing)
}

fn consume_in_tx(
    conn: &rusqlite::Connection,
    user_id: UserId,
    now: DateTime<Utc>,
    limit: u32,
    increment: QuotaIncrement,
) -> TierGateResult<QuotaDecision> {
    let window_start = time::floor_to_hour(now);
    let now_ms = to_millis(now);
    quota_ops::ensure_window(conn, user_id, window_start, now_ms)?;

    match quota_ops::try_increment(conn, user_id, window_start, increment, limit, now_ms)? {
        Some(count) => Ok(QuotaDecision::Allowed {
            remaining: limit.saturating_sub(count),
            limit,
            window_start,
        }),
        None => {
            let used = quota_ops::get_window(conn, user_id, window_start)?
                .map(|w| w.message_count)
                .unwrap_or(0);
            let retry_after_seconds = time::seconds_until_next_hour(now);
            debug!(user_id, limit, used, retry_after_seconds, "quota denied");
            Ok(QuotaDecision::Denied {
                retry_after_seconds,
                limit,
                used,
                window_start,
            })
        }
    }
}

impl IEntitlementStorage for StorageEngine {
    fn seed_plans(&self, seeds: &[PlanSeed]) -> TierGateResult<Vec<Plan>> {
        let now_ms = to_millis(Utc::now());
        self.pool.with_write_tx(|conn| {
            plan_ops::retire_all(conn, now_ms)?;
            for seed in seeds {
                plan_ops::upsert_plan(conn, seed, now_ms)?;
            }
            plan_ops::list_plans(conn)
        })
    }

    fn list_plans(&self) -> TierGateResult<Vec<Plan>> {
        self.pool.with_reader(plan_ops::list_plans)
    }

    fn get_plan(&self, code: &str) -> TierGateResult<Option<Plan>> {
        let code = code.trim().to_ascii_uppercase();
        self.pool.with_reader(|conn| plan_ops::get_plan_by_code(conn, &code))
    }

    fn get_plan_by_id(&self, id: i64) -> TierGateResult<Option<Plan>> {
        self.pool.with_reader(|conn| plan_ops::get_plan_by_id(conn, id))
    }

    fn default_plan(&self) -> TierGateResult<Plan> {
        self.pool
            .with_reader(plan_ops::get_default_plan)?
            .ok_or(TierGateError::DefaultPlanMissing)
    }

    fn insert_card(&self, card: &NewCard) -> TierGateResult<Card> {
        let now_ms = to_millis(Utc::now());
        self.pool.with_write_tx(|conn| {
            let id = card_ops::insert_card(conn, card, now_ms)?;
            card_ops::get_card_by_id(conn, id)?.ok_or_else(|| TierGateError::CardNotFound {
                code: card.code.clone(),
            })
        })
    }

    fn get_card(&self, code: &str) -> TierGateResult<Option<Card>> {
        let code = normalize_code(code)?;
        self.pool.with_reader(|conn| card_ops::get_card_by_code(conn, &code))
    }

    fn disable_card(&self, code: &str) -> TierGateResult<Card> {
        let code = normalize_code(code)?;
        let now_ms = to_millis(Utc::now());
        self.pool.with_write_tx(|conn| {
            let card = card_ops::get_card_by_code(conn, &code)?
                .ok_or_else(|| TierGateError::CardNotFound { code: code.clone() })?;
            if !card_ops::mark_disabled(conn, card.id, now_ms)? {
                return Err(TierGateError::CardNotDisableable {
                    code: code.clone(),
                    status: card.status.to_string(),
                });
            }
            card_ops::get_card_by_id(conn, card.id)?
                .ok_or_else(|| TierGateError::CardNotFound { code: code.clone() })
        })
    }

    fn redeem_card(&self, code: &str, user_id: UserId, now: DateTime<Utc>) -> TierGateResult<Redemption> {
        let code = normalize_code(code)?;
        let now = time::normalize(now);
        let now_ms = to_millis(now);

        self.pool.with_write_tx(|conn| {
            let card = card_ops::get_card_by_code(conn, &code)?
                .ok_or_else(|| TierGateError::CardNotFound { code: code.clone() })?;
            let duration: TimeDelta = card.redemption_grant(now)?;
            let plan = plan_ops::get_plan_by_id(conn, card.plan_id)?.ok_or_else(|| {
                TierGateError::PlanNotFound {
                    code: format!("#{}", card.plan_id),
                }
            })?;

            let live = subscription_ops::live_for_user(conn, user_id, now)?;
            let plan_out = schedule(
                &live,
                &ScheduleRequest {
                    card_id: card.id,
                    priority: plan.priority,
                    duration,
                    now,
                },
            )
            .ok_or_else(|| TierGateError::CardExpired {
                code: code.clone(),
                reason: "subscription would end past the supported calendar range".to_string(),
            })?;
            if plan_out.replay_of.is_some() {
                return Err(TierGateError::CardAlreadyRedeemed { code: code.clone() });
            }

            // Conditional flip: exactly one concurrent redeemer gets here.
            if !card_ops::mark_redeemed(conn, card.id, user_id, now_ms)? {
                return Err(TierGateError::CardAlreadyRedeemed { code: code.clone() });
            }

            let mut deferred = Vec::with_capacity(plan_out.deferrals.len());
            for d in &plan_out.deferrals {
                if subscription_ops::reschedule(conn, d.subscription_id, d.starts_at, d.expires_at, now_ms)? {
                    debug!(
                        subscription_id = d.subscription_id,
                        starts_at = %d.starts_at,
                        "pending subscription deferred"
                    );
                    deferred.push(d.subscription_id);
                }
            }

            let id = subscription_ops::insert_subscription(
                conn,
                &NewSubscription {
                    user_id,
                    plan_id: plan.id,
                    source_card_id: Some(card.id),
                    status: plan_out.status,
                    priority: plan.priority,
                    redeemed_at: now,
                    starts_at: plan_out.interval.starts_at,
                    expires_at: plan_out.interval.expires_at,
                },
                now_ms,
            )?;
            let subscription = subscription_ops::get_subscription(conn, id)?
                .ok_or(TierGateError::SubscriptionNotFound { id })?;

            info!(
                user_id,
                plan = %plan.code,
                subscription_id = id,
                status = %subscription.status,
                starts_at = %subscription.starts_at,
                expires_at = %subscription.expires_at,
                deferred = deferred.len(),
                "card redeemed"
            );
            Ok(Redemption {
                subscription,
                plan_code: plan.code,
                deferred,
            })
        })
    }

    fn list_subscriptions(&self, user_id: UserId) -> TierGateResult<Vec<Subscription>> {
        self.pool.with_reader(|conn| subscription_ops::list_for_user(conn, user_id))
    }

    fn live_subscriptions(&self, user_id: UserId, now: DateTime<Utc>) -> TierGateResult<Vec<Subscription>> {
        let now = time::normalize(now);
        self.pool.with_reader(|conn| subscription_ops::live_for_user(conn, user_id, now))
    }

    fn cancel_subscription(&self, id: i64, now: DateTime<Utc>) -> TierGateResult<Subscription> {
        let now = time::normalize(now);
        self.pool.with_write_tx(|conn| {
            let sub = subscription_ops::get_subscription(conn, id)?
                .ok_or(TierGateError::SubscriptionNotFound { id })?;
            if !sub.is_live_at(now) || !subscription_ops::mark_cancelled(conn, id, to_millis(now))? {
                return Err(TierGateError::SubscriptionNotLive {
                    id,
                    status: sub.status.to_string(),
                });
            }
            info!(subscription_id = id, user_id = sub.user_id, "subscription cancelled");
            subscription_ops::get_subscription(conn, id)?.ok_or(TierGateError::SubscriptionNotFound { id })
        })
    }

    fn sweep(&self, now: DateTime<Utc>) -> TierGateResult<SweepStats> {
        let now_ms = to_millis(time::normalize(now));
        let stats = self.pool.with_write_tx(|conn| {
            Ok(SweepStats {
                expired_subscriptions: subscription_ops::expire_lapsed(conn, now_ms)?,
                activated_subscriptions: subscription_ops::activate_started(conn, now_ms)?,
                expired_cards: card_ops::expire_overdue(conn, now_ms)?,
            })
        })?;
        if stats != SweepStats::default() {
            info!(
                expired_subscriptions = stats.expired_subscriptions,
                activated_subscriptions = stats.activated_subscriptions,
                expired_cards = stats.expired_cards,
                "sweep applied"
            );
        }
        Ok(stats)
    }

    fn consume_quota(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
        increment: QuotaIncrement,
    ) -> TierGateResult<QuotaDecision> {
        let now = time::normalize(now);
        self.pool.with_write_tx(|conn| {
            let plan = resolve_limit(conn, user_id, now)?;
            consume_in_tx(conn, user_id, now, plan.hourly_message_limit, increment)
        })
    }

    fn consume_with_limit(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
        limit: u32,
        increment: QuotaIncrement,
    ) -> TierGateResult<QuotaDecision> {
        let now = time::normalize(now);
        self.pool
            .with_write_tx(|conn| consume_in_tx(conn, user_id, now, limit, increment))
    }

    fn get_quota_window(&self, user_id: UserId, now: DateTime<Utc>) -> TierGateResult<Option<QuotaWindow>> {
        let window_start = time::floor_to_hour(time::normalize(now));
        self.pool
            .with_reader(|conn| quota_ops::get_window(conn, user_id, window_start))
    }

    fn reclaim_quota_windows(&self, now: DateTime<Utc>, older_than_hours: u32) -> TierGateResult<usize> {
        let hours = i64::from(older_than_hours.max(1));
        // A horizon reaching before the calendar start covers no stored window.
        let Some(cutoff) = time::floor_to_hour(time::normalize(now))
            .checked_sub_signed(TimeDelta::hours(hours))
        else {
            return Ok(0);
        };
        let deleted = self.pool.with_writer(|conn| quota_ops::delete_before(conn, cutoff))?;
        if deleted > 0 {
            info!(deleted, cutoff = %cutoff, "reclaimed quota windows");
        }
        Ok(deleted)
    }

    fn health_check(&self) -> TierGateResult<StorageHealth> {
        let schema_version = self.pool.with_reader(migrations::current_version)?;
        Ok(StorageHealth {
            connected: true,
            wal_mode: self.pool.is_wal_mode(),
            schema_version,
        })
    }
}
