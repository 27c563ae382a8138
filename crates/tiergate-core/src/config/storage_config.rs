//! Storage subsystem configuration.

use serde::{Deserialize, Serialize};

use crate::errors::{TierGateError, TierGateResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file. `None` opens an in-memory database.
    pub db_path: Option<String>,
    pub read_pool_size: usize,
    /// Upper bound on waiting for a write lock; exceeding it is a retryable failure.
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            read_pool_size: 2,
            busy_timeout_ms: 5000,
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> TierGateResult<()> {
        if self.read_pool_size == 0 {
            return Err(TierGateError::Config("storage.read_pool_size must be > 0".into()));
        }
        if self.busy_timeout_ms == 0 {
            return Err(TierGateError::Config("storage.busy_timeout_ms must be > 0".into()));
        }
        Ok(())
    }
}
