//! # tiergate-storage
//!
//! SQLite persistence for the entitlement ledger.
//! Implements `IEntitlementStorage`.
//! Single write connection + read pool (WAL mode); every write is a
//! `BEGIN IMMEDIATE` transaction so same-user operations are linearizable even
//! across processes sharing the database file.

pub mod engine;
pub mod migrations;
pub mod pool;
pub mod pragmas;
pub mod queries;

pub use engine::StorageEngine;

use rusqlite::ffi::ErrorCode;
use tiergate_core::errors::{StorageError, TierGateError};

/// Convert a rusqlite error into a TierGateError.
///
/// Lock contention that outlived the busy timeout is `StorageUnavailable`
/// (retryable); everything else is a storage fault.
pub fn to_storage_err(err: rusqlite::Error) -> TierGateError {
    if is_busy_error(&err) {
        TierGateError::StorageUnavailable {
            reason: err.to_string(),
        }
    } else {
        TierGateError::Storage(StorageError::Sqlite {
            message: err.to_string(),
        })
    }
}

/// Check if a rusqlite error is SQLITE_BUSY / SQLITE_LOCKED.
pub fn is_busy_error(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked,
                ..
            },
            _,
        )
    )
}

/// Check if a rusqlite error is a UNIQUE/CHECK/FK constraint violation.
pub fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: ErrorCode::ConstraintViolation,
                ..
            },
            _,
        )
    )
}
