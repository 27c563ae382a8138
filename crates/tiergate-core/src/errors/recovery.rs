//! RecoveryAction: what a caller should do when an operation fails.

use std::fmt;

use super::{ErrorKind, TierGateError};

/// Recommended recovery action for a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Transient lock or transport failure. Idempotent reads may be retried;
    /// destructive calls must re-derive intent first.
    Retry,
    /// Expected outcome, shown to the user as-is (unknown card, quota denial, ...).
    Surface,
    /// Operator must fix something (config, schema, corrupt data).
    Escalate,
}

impl RecoveryAction {
    /// Determine the recommended recovery action for a TierGateError.
    pub fn for_error(error: &TierGateError) -> Self {
        match error.kind() {
            ErrorKind::StorageUnavailable => Self::Retry,
            ErrorKind::NotFound
            | ErrorKind::Conflict
            | ErrorKind::Invalid
            | ErrorKind::QuotaExceeded => Self::Surface,
            ErrorKind::Internal => Self::Escalate,
        }
    }
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retry => write!(f, "Retry"),
            Self::Surface => write!(f, "Surface"),
            Self::Escalate => write!(f, "Escalate"),
        }
    }
}
