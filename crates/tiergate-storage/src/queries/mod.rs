//! Raw SQL per table. Functions take a `&Connection` and never open their own
//! transaction; the engine decides the transaction boundary.

pub mod card_ops;
pub mod plan_ops;
pub mod quota_ops;
pub mod subscription_ops;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Row;

use tiergate_core::errors::StorageError;
use tiergate_core::time;

pub(crate) fn ts_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let millis: i64 = row.get(idx)?;
    time::from_millis(millis).ok_or_else(|| corrupt(idx, Type::Integer, format!("timestamp {millis} out of range")))
}

pub(crate) fn opt_ts_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<i64>>(idx)? {
        None => Ok(None),
        Some(millis) => time::from_millis(millis)
            .map(Some)
            .ok_or_else(|| corrupt(idx, Type::Integer, format!("timestamp {millis} out of range"))),
    }
}

pub(crate) fn json_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<serde_json::Value>> {
    match row.get::<_, Option<String>>(idx)? {
        None => Ok(None),
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
    }
}

pub(crate) fn json_param(value: &Option<serde_json::Value>) -> Option<String> {
    value.as_ref().map(|v| v.to_string())
}

pub(crate) fn corrupt(idx: usize, ty: Type, details: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        ty,
        Box::new(StorageError::CorruptRow {
            column: idx,
            details,
        }),
    )
}
