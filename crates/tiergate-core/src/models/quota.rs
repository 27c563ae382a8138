//! Per-user, per-hour quota windows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::TierGateError;
use crate::models::UserId;

/// One counter row per `(user_id, window_start)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaWindow {
    pub user_id: UserId,
    /// Hour-aligned.
    pub window_start: DateTime<Utc>,
    pub message_count: u32,
    pub tool_call_count: u32,
    pub last_reset_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What one admission consumes. Only `messages` counts against the limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaIncrement {
    pub messages: u32,
    pub tool_calls: u32,
}

impl QuotaIncrement {
    pub const ONE_MESSAGE: Self = Self { messages: 1, tool_calls: 0 };

    pub fn messages(messages: u32) -> Self {
        Self { messages, tool_calls: 0 }
    }

    pub fn with_tool_calls(mut self, tool_calls: u32) -> Self {
        self.tool_calls = tool_calls;
        self
    }
}

impl Default for QuotaIncrement {
    fn default() -> Self {
        Self::ONE_MESSAGE
    }
}

/// Outcome of an atomic check-and-consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum QuotaDecision {
    Allowed {
        remaining: u32,
        limit: u32,
        window_start: DateTime<Utc>,
    },
    Denied {
        retry_after_seconds: u64,
        limit: u32,
        used: u32,
        window_start: DateTime<Utc>,
    },
}

impl QuotaDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }

    /// Convert a denial into `QuotaExceeded` for callers that prefer `?`.
    pub fn into_result(self) -> Result<u32, TierGateError> {
        match self {
            Self::Allowed { remaining, .. } => Ok(remaining),
            Self::Denied {
                retry_after_seconds,
                limit,
                used,
                window_start,
            } => Err(TierGateError::QuotaExceeded {
                limit,
                used,
                retry_after_seconds,
                window_start,
            }),
        }
    }
}
