//! Subscription and catalog configuration.

use serde::{Deserialize, Serialize};

use crate::errors::{TierGateError, TierGateResult};
use crate::models::plan::{default_catalog, validate_catalog};
use crate::models::{PlanSeed, MAX_VALID_DAYS};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionConfig {
    /// Validity used by admin tooling when no explicit duration is given.
    pub default_valid_days: i64,
    pub expiry_sweep_interval_secs: u64,
    /// Catalog seeded at startup.
    pub plans: Vec<PlanSeed>,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            default_valid_days: 30,
            expiry_sweep_interval_secs: 300,
            plans: default_catalog(),
        }
    }
}

impl SubscriptionConfig {
    pub fn validate(&self) -> TierGateResult<()> {
        if self.default_valid_days <= 0 {
            return Err(TierGateError::Config(
                "subscriptions.default_valid_days must be positive".into(),
            ));
        }
        if self.default_valid_days > MAX_VALID_DAYS {
            return Err(TierGateError::Config(format!(
                "subscriptions.default_valid_days must be <= {MAX_VALID_DAYS}"
            )));
        }
        if self.expiry_sweep_interval_secs == 0 {
            return Err(TierGateError::Config(
                "subscriptions.expiry_sweep_interval_secs must be > 0".into(),
            ));
        }
        validate_catalog(&self.plans)
    }
}
