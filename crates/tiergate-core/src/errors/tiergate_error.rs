use chrono::{DateTime, Utc};

use super::StorageError;

/// Top-level error type for tiergate.
/// Card errors name the exact condition so callers can tell the user which one failed.
#[derive(Debug, thiserror::Error)]
pub enum TierGateError {
    #[error("card not found: {code}")]
    CardNotFound { code: String },

    #[error("plan not found: {code}")]
    PlanNotFound { code: String },

    #[error("subscription not found: {id}")]
    SubscriptionNotFound { id: i64 },

    #[error("no default plan in catalog")]
    DefaultPlanMissing,

    #[error("card already used: {code}")]
    CardAlreadyRedeemed { code: String },

    #[error("card code already issued: {code}")]
    CardCodeTaken { code: String },

    #[error("card {code} cannot be disabled in status {status}")]
    CardNotDisableable { code: String, status: String },

    #[error("subscription {id} is not live (status {status})")]
    SubscriptionNotLive { id: i64, status: String },

    #[error("card expired: {code} ({reason})")]
    CardExpired { code: String, reason: String },

    #[error("invalid validity duration: {valid_days} days")]
    InvalidValidity { valid_days: i64 },

    #[error("malformed card code: {code:?}")]
    MalformedCode { code: String },

    #[error("hourly limit reached: {used}/{limit}, retry in {retry_after_seconds}s")]
    QuotaExceeded {
        limit: u32,
        used: u32,
        retry_after_seconds: u64,
        window_start: DateTime<Utc>,
    },

    #[error("storage unavailable: {reason}")]
    StorageUnavailable { reason: String },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("config error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse outcome taxonomy shared with collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Invalid,
    QuotaExceeded,
    StorageUnavailable,
    Internal,
}

impl TierGateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CardNotFound { .. }
            | Self::PlanNotFound { .. }
            | Self::SubscriptionNotFound { .. } => ErrorKind::NotFound,
            Self::CardAlreadyRedeemed { .. }
            | Self::CardCodeTaken { .. }
            | Self::CardNotDisableable { .. }
            | Self::SubscriptionNotLive { .. } => ErrorKind::Conflict,
            Self::CardExpired { .. } | Self::InvalidValidity { .. } | Self::MalformedCode { .. } => {
                ErrorKind::Invalid
            }
            Self::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            Self::StorageUnavailable { .. } => ErrorKind::StorageUnavailable,
            Self::DefaultPlanMissing
            | Self::Storage(_)
            | Self::Config(_)
            | Self::Serialization(_) => ErrorKind::Internal,
        }
    }

    /// Transient failures only. Expected outcomes are never retryable.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::StorageUnavailable
    }
}

/// Convenience type alias.
pub type TierGateResult<T> = Result<T, TierGateError>;
