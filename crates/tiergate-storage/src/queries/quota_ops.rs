//! Raw SQL operations for the quota_windows table.
//!
//! The increment is a single conditional UPDATE: the row only changes when the
//! new count still fits the limit, so two racing writers can never both take
//! the last slot.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use tiergate_core::errors::TierGateResult;
use tiergate_core::models::{QuotaIncrement, QuotaWindow, UserId};
use tiergate_core::time::to_millis;

use super::ts_column;
use crate::to_storage_err;

fn map_window(row: &Row<'_>) -> rusqlite::Result<QuotaWindow> {
    Ok(QuotaWindow {
        user_id: row.get(0)?,
        window_start: ts_column(row, 1)?,
        message_count: row.get(2)?,
        tool_call_count: row.get(3)?,
        last_reset_at: ts_column(row, 4)?,
        updated_at: ts_column(row, 5)?,
    })
}

/// Create the zeroed window row if absent.
pub fn ensure_window(conn: &Connection, user_id: UserId, window_start: DateTime<Utc>, now_ms: i64) -> TierGateResult<()> {
    let start = to_millis(window_start);
    conn.execute(
        "INSERT INTO quota_windows
            (user_id, window_start, message_count, tool_call_count, last_reset_at, created_at, updated_at)
         VALUES (?1, ?2, 0, 0, ?2, ?3, ?3)
         ON CONFLICT(user_id, window_start) DO NOTHING",
        params![user_id, start, now_ms],
    )
    .map_err(to_storage_err)?;
    Ok(())
}

/// Apply `increment` if `message_count + messages <= limit`.
/// Returns the new message count, or `None` when it would not fit.
pub fn try_increment(
    conn: &Connection,
    user_id: UserId,
    window_start: DateTime<Utc>,
    increment: QuotaIncrement,
    limit: u32,
    now_ms: i64,
) -> TierGateResult<Option<u32>> {
    conn.query_row(
        "UPDATE quota_windows
         SET message_count = message_count + ?3,
             tool_call_count = tool_call_count + ?4,
             updated_at = ?6
         WHERE user_id = ?1 AND window_start = ?2 AND message_count + ?3 <= ?5
         RETURNING message_count",
        params![
            user_id,
            to_millis(window_start),
            increment.messages,
            increment.tool_calls,
            limit,
            now_ms,
        ],
        |row| row.get(0),
    )
    .optional()
    .map_err(to_storage_err)
}

pub fn get_window(conn: &Connection, user_id: UserId, window_start: DateTime<Utc>) -> TierGateResult<Option<QuotaWindow>> {
    conn.query_row(
        "SELECT user_id, window_start, message_count, tool_call_count, last_reset_at, updated_at
         FROM quota_windows WHERE user_id = ?1 AND window_start = ?2",
        params![user_id, to_millis(window_start)],
        map_window,
    )
    .optional()
    .map_err(to_storage_err)
}

/// Delete every window that starts before `cutoff`.
pub fn delete_before(conn: &Connection, cutoff: DateTime<Utc>) -> TierGateResult<usize> {
    conn.execute(
        "DELETE FROM quota_windows WHERE window_start < ?1",
        params![to_millis(cutoff)],
    )
    .map_err(to_storage_err)
}

pub fn count_windows(conn: &Connection) -> TierGateResult<u64> {
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM quota_windows", [], |row| row.get(0))
        .map_err(to_storage_err)?;
    Ok(count as u64)
}
