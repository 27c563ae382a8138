//! Hourly quota configuration.

use serde::{Deserialize, Serialize};

use crate::errors::{TierGateError, TierGateResult};

/// Upper bound on `retention_hours`: one hundred years.
pub const MAX_RETENTION_HOURS: u32 = 876_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    /// Windows older than this many hours are reclaimed.
    pub retention_hours: u32,
    pub reclaim_interval_secs: u64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            retention_hours: 24,
            reclaim_interval_secs: 900, // 15 min
        }
    }
}

impl QuotaConfig {
    pub fn validate(&self) -> TierGateResult<()> {
        if self.retention_hours < 1 {
            return Err(TierGateError::Config("quota.retention_hours must be >= 1".into()));
        }
        if self.retention_hours > MAX_RETENTION_HOURS {
            return Err(TierGateError::Config(format!(
                "quota.retention_hours must be <= {MAX_RETENTION_HOURS}"
            )));
        }
        if self.reclaim_interval_secs == 0 {
            return Err(TierGateError::Config("quota.reclaim_interval_secs must be > 0".into()));
        }
        Ok(())
    }
}
