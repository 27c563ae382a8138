//! `TierGate`: the operations collaborators call.
//!
//! Holds the storage seam, a clock, and validated configuration. All
//! correctness-bearing work (redeem-and-schedule, check-and-consume) happens
//! inside single storage transactions; this layer adds input validation,
//! logging, and bounded retry for reads.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use tiergate_core::config::TierGateConfig;
use tiergate_core::errors::{TierGateError, TierGateResult};
use tiergate_core::models::card::{generate_code, normalize_code};
use tiergate_core::models::{
    Card, IssueCardRequest, NewCard, Plan, QuotaDecision, QuotaIncrement, QuotaWindow, Redemption,
    Subscription, SweepStats, UserId, MAX_VALID_DAYS,
};
use tiergate_core::resolver::{effective_subscription, timeline, EffectivePlan, PlanSource, Segment};
use tiergate_core::time;
use tiergate_core::traits::{Clock, IEntitlementStorage, StorageHealth, SystemClock};
use tiergate_storage::StorageEngine;

use crate::retry::with_retry;

pub struct TierGate {
    storage: Arc<dyn IEntitlementStorage>,
    clock: Arc<dyn Clock>,
    config: TierGateConfig,
}

impl TierGate {
    /// Validate `config` and seed its plan catalog into `storage`.
    pub fn new(
        storage: Arc<dyn IEntitlementStorage>,
        clock: Arc<dyn Clock>,
        config: TierGateConfig,
    ) -> TierGateResult<Self> {
        config.validate()?;
        let plans = storage.seed_plans(&config.subscriptions.plans)?;
        info!(plans = plans.len(), "plan catalog seeded");
        Ok(Self {
            storage,
            clock,
            config,
        })
    }

    /// Open the SQLite store described by `config.storage` with the system clock.
    pub fn open(config: TierGateConfig) -> TierGateResult<Self> {
        config.validate()?;
        let engine = StorageEngine::from_config(&config.storage)?;
        Self::new(Arc::new(engine), Arc::new(SystemClock), config)
    }

    pub fn config(&self) -> &TierGateConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn storage(&self) -> &Arc<dyn IEntitlementStorage> {
        &self.storage
    }

    // ── Redemption ──

    /// Redeem `code` for `user_id`. Not retried on failure.
    pub fn redeem_card(&self, code: &str, user_id: UserId, now: DateTime<Utc>) -> TierGateResult<Redemption> {
        match self.storage.redeem_card(code, user_id, now) {
            Ok(redemption) => Ok(redemption),
            Err(e) => {
                info!(user_id, code, kind = ?e.kind(), error = %e, "redemption rejected");
                Err(e)
            }
        }
    }

    // ── Effective plan ──

    /// The plan governing `user_id` at `now`. Retries on `StorageUnavailable`.
    pub fn effective_plan(&self, user_id: UserId, now: DateTime<Utc>) -> TierGateResult<EffectivePlan> {
        with_retry(&self.config.retry, "effective_plan", || self.resolve(user_id, now))
    }

    fn resolve(&self, user_id: UserId, now: DateTime<Utc>) -> TierGateResult<EffectivePlan> {
        let live = self.storage.live_subscriptions(user_id, now)?;
        if let Some(sub) = effective_subscription(&live, now) {
            let plan = self
                .storage
                .get_plan_by_id(sub.plan_id)?
                .ok_or_else(|| TierGateError::PlanNotFound {
                    code: format!("#{}", sub.plan_id),
                })?;
            return Ok(EffectivePlan {
                plan,
                source: PlanSource::Subscription {
                    subscription_id: sub.id,
                },
                until: Some(sub.expires_at),
            });
        }
        Ok(EffectivePlan {
            plan: self.storage.default_plan()?,
            source: PlanSource::Default,
            until: None,
        })
    }

    /// Who governs between `from` and `to`, as contiguous segments.
    pub fn timeline(&self, user_id: UserId, from: DateTime<Utc>, to: DateTime<Utc>) -> TierGateResult<Vec<Segment>> {
        let subs = with_retry(&self.config.retry, "timeline", || {
            self.storage.live_subscriptions(user_id, from)
        })?;
        Ok(timeline(&subs, from, to))
    }

    // ── Quota ──

    /// Admit one message against the user's effective hourly limit.
    pub fn check_and_consume(&self, user_id: UserId, now: DateTime<Utc>) -> TierGateResult<QuotaDecision> {
        self.consume(user_id, now, QuotaIncrement::ONE_MESSAGE)
    }

    pub fn consume(&self, user_id: UserId, now: DateTime<Utc>, increment: QuotaIncrement) -> TierGateResult<QuotaDecision> {
        let decision = self.storage.consume_quota(user_id, now, increment)?;
        if let QuotaDecision::Denied { retry_after_seconds, limit, .. } = &decision {
            info!(user_id, limit, retry_after_seconds, "quota exhausted");
        }
        Ok(decision)
    }

    /// Admit `increment` against an explicit `limit` instead of the resolved plan.
    pub fn consume_with_limit(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
        limit: u32,
        increment: QuotaIncrement,
    ) -> TierGateResult<QuotaDecision> {
        self.storage.consume_with_limit(user_id, now, limit, increment)
    }

    pub fn quota_window(&self, user_id: UserId, now: DateTime<Utc>) -> TierGateResult<Option<QuotaWindow>> {
        with_retry(&self.config.retry, "quota_window", || {
            self.storage.get_quota_window(user_id, now)
        })
    }

    /// Delete quota windows older than `older_than_hours` (clamped to >= 1).
    pub fn reclaim(&self, older_than_hours: u32) -> TierGateResult<usize> {
        self.storage.reclaim_quota_windows(self.clock.now(), older_than_hours)
    }

    /// `reclaim` with the configured retention.
    pub fn reclaim_expired_windows(&self) -> TierGateResult<usize> {
        self.reclaim(self.config.quota.retention_hours)
    }

    // ── Card administration ──

    pub fn issue_card(&self, request: IssueCardRequest) -> TierGateResult<Card> {
        if request.valid_days <= 0 || request.valid_days > MAX_VALID_DAYS {
            return Err(TierGateError::InvalidValidity {
                valid_days: request.valid_days,
            });
        }
        let code = match &request.code {
            Some(raw) => normalize_code(raw)?,
            None => generate_code(),
        };
        let plan_code = request.plan_code.trim().to_ascii_uppercase();
        let plan = self
            .storage
            .get_plan(&plan_code)?
            .filter(|p| p.is_active)
            .ok_or(TierGateError::PlanNotFound { code: plan_code })?;

        let card = self.storage.insert_card(&NewCard {
            code,
            plan_id: plan.id,
            valid_days: request.valid_days,
            expires_at: request.expires_at.map(time::normalize),
            created_by_admin: request.created_by_admin,
            metadata: request.metadata,
        })?;
        info!(
            code = %card.code,
            plan = %plan.code,
            valid_days = card.valid_days,
            admin = ?card.created_by_admin,
            "card issued"
        );
        Ok(card)
    }

    pub fn card(&self, code: &str) -> TierGateResult<Card> {
        with_retry(&self.config.retry, "card", || self.storage.get_card(code))?.ok_or_else(|| {
            TierGateError::CardNotFound {
                code: code.to_string(),
            }
        })
    }

    pub fn disable_card(&self, code: &str) -> TierGateResult<Card> {
        let card = self.storage.disable_card(code)?;
        info!(code = %card.code, "card disabled");
        Ok(card)
    }

    // ── Subscription administration ──

    pub fn subscriptions(&self, user_id: UserId) -> TierGateResult<Vec<Subscription>> {
        with_retry(&self.config.retry, "subscriptions", || {
            self.storage.list_subscriptions(user_id)
        })
    }

    pub fn cancel_subscription(&self, subscription_id: i64, now: DateTime<Utc>) -> TierGateResult<Subscription> {
        self.storage.cancel_subscription(subscription_id, now)
    }

    /// Status bookkeeping; resolution is correct whether or not this has run.
    pub fn sweep(&self, now: DateTime<Utc>) -> TierGateResult<SweepStats> {
        self.storage.sweep(now)
    }

    // ── Catalog ──

    pub fn plans(&self) -> TierGateResult<Vec<Plan>> {
        with_retry(&self.config.retry, "plans", || self.storage.list_plans())
    }

    pub fn plan(&self, code: &str) -> TierGateResult<Plan> {
        with_retry(&self.config.retry, "plan", || self.storage.get_plan(code))?.ok_or_else(|| {
            TierGateError::PlanNotFound {
                code: code.to_string(),
            }
        })
    }

    pub fn default_plan(&self) -> TierGateResult<Plan> {
        with_retry(&self.config.retry, "default_plan", || self.storage.default_plan())
    }

    pub fn health_check(&self) -> TierGateResult<StorageHealth> {
        let health = with_retry(&self.config.retry, "health_check", || self.storage.health_check())?;
        debug!(wal = health.wal_mode, schema = health.schema_version, "health check");
        Ok(health)
    }
}
