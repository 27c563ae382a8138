//! `IEntitlementStorage` — the persistence seam.
//!
//! Every method is a single transaction. The two write paths that carry the
//! correctness burden are `redeem_card` (card flip + scheduling as one unit)
//! and `consume_quota` (limit resolution + conditional increment as one unit).

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::errors::TierGateResult;
use crate::models::{
    Card, NewCard, Plan, PlanSeed, QuotaDecision, QuotaIncrement, QuotaWindow, Redemption,
    Subscription, SweepStats, UserId,
};

/// Health status of the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageHealth {
    pub connected: bool,
    pub wal_mode: bool,
    pub schema_version: u32,
}

pub trait IEntitlementStorage: Send + Sync {
    // ── Plan catalog ──

    /// Upsert plans by code. Returns the stored catalog.
    fn seed_plans(&self, seeds: &[PlanSeed]) -> TierGateResult<Vec<Plan>>;

    fn list_plans(&self) -> TierGateResult<Vec<Plan>>;

    fn get_plan(&self, code: &str) -> TierGateResult<Option<Plan>>;

    fn get_plan_by_id(&self, id: i64) -> TierGateResult<Option<Plan>>;

    fn default_plan(&self) -> TierGateResult<Plan>;

    // ── Card ledger ──

    /// Unique insert; a taken code is `CardCodeTaken`.
    fn insert_card(&self, card: &NewCard) -> TierGateResult<Card>;

    fn get_card(&self, code: &str) -> TierGateResult<Option<Card>>;

    fn disable_card(&self, code: &str) -> TierGateResult<Card>;

    /// Validate, flip to `redeemed`, schedule and persist the subscription atomically.
    fn redeem_card(&self, code: &str, user_id: UserId, now: DateTime<Utc>) -> TierGateResult<Redemption>;

    // ── Subscriptions ──

    /// Full history, oldest start first.
    fn list_subscriptions(&self, user_id: UserId) -> TierGateResult<Vec<Subscription>>;

    /// `active`/`pending` rows not yet lapsed at `now`.
    fn live_subscriptions(&self, user_id: UserId, now: DateTime<Utc>) -> TierGateResult<Vec<Subscription>>;

    fn cancel_subscription(&self, id: i64, now: DateTime<Utc>) -> TierGateResult<Subscription>;

    /// Status bookkeeping for lapsed/started subscriptions and overdue cards.
    fn sweep(&self, now: DateTime<Utc>) -> TierGateResult<SweepStats>;

    // ── Quota windows ──

    /// Resolve the user's limit and apply `increment` if it fits, atomically.
    fn consume_quota(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
        increment: QuotaIncrement,
    ) -> TierGateResult<QuotaDecision>;

    /// Apply `increment` against a caller-supplied hourly `limit`.
    fn consume_with_limit(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
        limit: u32,
        increment: QuotaIncrement,
    ) -> TierGateResult<QuotaDecision>;

    fn get_quota_window(&self, user_id: UserId, now: DateTime<Utc>) -> TierGateResult<Option<QuotaWindow>>;

    /// Delete windows older than the horizon. Never touches the current or
    /// immediately-preceding window.
    fn reclaim_quota_windows(&self, now: DateTime<Utc>, older_than_hours: u32) -> TierGateResult<usize>;

    // ── Lifecycle ──

    fn health_check(&self) -> TierGateResult<StorageHealth>;
}

// ── Arc<T> blanket impl ──

impl<T: IEntitlementStorage + ?Sized> IEntitlementStorage for Arc<T> {
    fn seed_plans(&self, seeds: &[PlanSeed]) -> TierGateResult<Vec<Plan>> {
        (**self).seed_plans(seeds)
    }
    fn list_plans(&self) -> TierGateResult<Vec<Plan>> {
        (**self).list_plans()
    }
    fn get_plan(&self, code: &str) -> TierGateResult<Option<Plan>> {
        (**self).get_plan(code)
    }
    fn get_plan_by_id(&self, id: i64) -> TierGateResult<Option<Plan>> {
        (**self).get_plan_by_id(id)
    }
    fn default_plan(&self) -> TierGateResult<Plan> {
        (**self).default_plan()
    }
    fn insert_card(&self, card: &NewCard) -> TierGateResult<Card> {
        (**self).insert_card(card)
    }
    fn get_card(&self, code: &str) -> TierGateResult<Option<Card>> {
        (**self).get_card(code)
    }
    fn disable_card(&self, code: &str) -> TierGateResult<Card> {
        (**self).disable_card(code)
    }
    fn redeem_card(&self, code: &str, user_id: UserId, now: DateTime<Utc>) -> TierGateResult<Redemption> {
        (**self).redeem_card(code, user_id, now)
    }
    fn list_subscriptions(&self, user_id: UserId) -> TierGateResult<Vec<Subscription>> {
        (**self).list_subscriptions(user_id)
    }
    fn live_subscriptions(&self, user_id: UserId, now: DateTime<Utc>) -> TierGateResult<Vec<Subscription>> {
        (**self).live_subscriptions(user_id, now)
    }
    fn cancel_subscription(&self, id: i64, now: DateTime<Utc>) -> TierGateResult<Subscription> {
        (**self).cancel_subscription(id, now)
    }
    fn sweep(&self, now: DateTime<Utc>) -> TierGateResult<SweepStats> {
        (**self).sweep(now)
    }
    fn consume_quota(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
        increment: QuotaIncrement,
    ) -> TierGateResult<QuotaDecision> {
        (**self).consume_quota(user_id, now, increment)
    }
    fn consume_with_limit(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
        limit: u32,
        increment: QuotaIncrement,
    ) -> TierGateResult<QuotaDecision> {
        (**self).consume_with_limit(user_id, now, limit, increment)
    }
    fn get_quota_window(&self, user_id: UserId, now: DateTime<Utc>) -> TierGateResult<Option<QuotaWindow>> {
        (**self).get_quota_window(user_id, now)
    }
    fn reclaim_quota_windows(&self, now: DateTime<Utc>, older_than_hours: u32) -> TierGateResult<usize> {
        (**self).reclaim_quota_windows(now, older_than_hours)
    }
    fn health_check(&self) -> TierGateResult<StorageHealth> {
        (**self).health_check()
    }
}
