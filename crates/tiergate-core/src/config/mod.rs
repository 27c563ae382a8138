pub mod observability_config;
pub mod quota_config;
pub mod retry_config;
pub mod storage_config;
pub mod subscription_config;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{TierGateError, TierGateResult};

pub use observability_config::ObservabilityConfig;
pub use quota_config::QuotaConfig;
pub use retry_config::RetryConfig;
pub use storage_config::StorageConfig;
pub use subscription_config::SubscriptionConfig;

/// Top-level configuration aggregating all subsystem configs.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TierGateConfig {
    pub storage: StorageConfig,
    pub quota: QuotaConfig,
    pub subscriptions: SubscriptionConfig,
    pub retry: RetryConfig,
    pub observability: ObservabilityConfig,
}

impl TierGateConfig {
    /// Load config from a TOML string, falling back to defaults for missing fields.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> TierGateResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            TierGateError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml(&raw)
            .map_err(|e| TierGateError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> TierGateResult<()> {
        self.storage.validate()?;
        self.quota.validate()?;
        self.subscriptions.validate()?;
        self.retry.validate()?;
        Ok(())
    }
}
