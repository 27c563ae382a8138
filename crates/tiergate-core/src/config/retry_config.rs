//! Bounded retry for idempotent reads.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{TierGateError, TierGateResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first.
    pub max_attempts: u32,
    /// Delay before attempt `n + 1` is `base_delay_ms * n`.
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 50,
        }
    }
}

impl RetryConfig {
    pub fn delay_after(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_delay_ms.saturating_mul(u64::from(attempt)))
    }

    pub fn validate(&self) -> TierGateResult<()> {
        if self.max_attempts == 0 {
            return Err(TierGateError::Config("retry.max_attempts must be >= 1".into()));
        }
        Ok(())
    }
}
