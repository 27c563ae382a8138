//! Raw SQL operations for the subscriptions table.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use tiergate_core::errors::TierGateResult;
use tiergate_core::models::{NewSubscription, Subscription, SubscriptionStatus, UserId};
use tiergate_core::time::to_millis;

use super::{corrupt, opt_ts_column, ts_column};
use crate::to_storage_err;

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, plan_id, source_card_id, status, priority,
     redeemed_at, starts_at, expires_at, activated_at, cancelled_at, created_at";

fn map_subscription(row: &Row<'_>) -> rusqlite::Result<Subscription> {
    let status: String = row.get(4)?;
    Ok(Subscription {
        id: row.get(0)?,
        user_id: row.get(1)?,
        plan_id: row.get(2)?,
        source_card_id: row.get(3)?,
        status: SubscriptionStatus::parse(&status)
            .ok_or_else(|| corrupt(4, Type::Text, format!("subscription status {status:?}")))?,
        priority: row.get(5)?,
        redeemed_at: ts_column(row, 6)?,
        starts_at: ts_column(row, 7)?,
        expires_at: ts_column(row, 8)?,
        activated_at: opt_ts_column(row, 9)?,
        cancelled_at: opt_ts_column(row, 10)?,
        created_at: ts_column(row, 11)?,
    })
}

fn query_many(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> TierGateResult<Vec<Subscription>> {
    let mut stmt = conn.prepare(sql).map_err(to_storage_err)?;
    let rows = stmt.query_map(params, map_subscription).map_err(to_storage_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(to_storage_err)
}

/// Insert a scheduled subscription. Returns the assigned id.
pub fn insert_subscription(conn: &Connection, sub: &NewSubscription, now_ms: i64) -> TierGateResult<i64> {
    let activated_at = (sub.status == SubscriptionStatus::Active).then_some(now_ms);
    conn.execute(
        "INSERT INTO subscriptions
            (user_id, plan_id, source_card_id, status, priority, redeemed_at, starts_at,
             expires_at, activated_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
        params![
            sub.user_id,
            sub.plan_id,
            sub.source_card_id,
            sub.status.as_str(),
            sub.priority,
            to_millis(sub.redeemed_at),
            to_millis(sub.starts_at),
            to_millis(sub.expires_at),
            activated_at,
            now_ms,
        ],
    )
    .map_err(to_storage_err)?;
    Ok(conn.last_insert_rowid())
}

pub fn get_subscription(conn: &Connection, id: i64) -> TierGateResult<Option<Subscription>> {
    conn.query_row(
        &format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = ?1"),
        params![id],
        map_subscription,
    )
    .optional()
    .map_err(to_storage_err)
}

/// Full history for a user, oldest start first.
pub fn list_for_user(conn: &Connection, user_id: UserId) -> TierGateResult<Vec<Subscription>> {
    query_many(
        conn,
        &format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
             WHERE user_id = ?1 ORDER BY starts_at ASC, id ASC"
        ),
        params![user_id],
    )
}

/// `active`/`pending` rows that have not lapsed at `now`.
pub fn live_for_user(conn: &Connection, user_id: UserId, now: DateTime<Utc>) -> TierGateResult<Vec<Subscription>> {
    query_many(
        conn,
        &format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
             WHERE user_id = ?1 AND status IN ('active', 'pending') AND expires_at > ?2
             ORDER BY priority DESC, starts_at ASC, id ASC"
        ),
        params![user_id, to_millis(now)],
    )
}

/// Move a pending subscription to a new interval. Only touches `pending` rows.
pub fn reschedule(
    conn: &Connection,
    id: i64,
    starts_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    now_ms: i64,
) -> TierGateResult<bool> {
    let changed = conn
        .execute(
            "UPDATE subscriptions SET starts_at = ?2, expires_at = ?3, updated_at = ?4
             WHERE id = ?1 AND status = 'pending'",
            params![id, to_millis(starts_at), to_millis(expires_at), now_ms],
        )
        .map_err(to_storage_err)?;
    Ok(changed == 1)
}

pub fn mark_cancelled(conn: &Connection, id: i64, now_ms: i64) -> TierGateResult<bool> {
    let changed = conn
        .execute(
            "UPDATE subscriptions SET status = 'cancelled', cancelled_at = ?2, updated_at = ?2
             WHERE id = ?1 AND status IN ('active', 'pending')",
            params![id, now_ms],
        )
        .map_err(to_storage_err)?;
    Ok(changed == 1)
}

/// Live rows whose interval has ended become `expired`.
pub fn expire_lapsed(conn: &Connection, now_ms: i64) -> TierGateResult<usize> {
    conn.execute(
        "UPDATE subscriptions SET status = 'expired', updated_at = ?1
         WHERE status IN ('active', 'pending') AND expires_at <= ?1",
        params![now_ms],
    )
    .map_err(to_storage_err)
}

/// Pending rows whose interval has begun become `active`.
pub fn activate_started(conn: &Connection, now_ms: i64) -> TierGateResult<usize> {
    conn.execute(
        "UPDATE subscriptions
         SET status = 'active', activated_at = COALESCE(activated_at, ?1), updated_at = ?1
         WHERE status = 'pending' AND starts_at <= ?1 AND expires_at > ?1",
        params![now_ms],
    )
    .map_err(to_storage_err)
}
