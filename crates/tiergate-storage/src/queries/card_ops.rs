//! Raw SQL operations for the cards table.

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use tiergate_core::errors::{TierGateError, TierGateResult};
use tiergate_core::models::{Card, CardStatus, NewCard, UserId};
use tiergate_core::time::to_millis;

use super::{corrupt, json_column, json_param, opt_ts_column, ts_column};
use crate::{is_constraint_violation, to_storage_err};

const CARD_COLUMNS: &str = "id, code, plan_id, status, valid_days, expires_at, redeemed_by,
     redeemed_at, created_by_admin, metadata, created_at";

fn map_card(row: &Row<'_>) -> rusqlite::Result<Card> {
    let status: String = row.get(3)?;
    Ok(Card {
        id: row.get(0)?,
        code: row.get(1)?,
        plan_id: row.get(2)?,
        status: CardStatus::parse(&status)
            .ok_or_else(|| corrupt(3, Type::Text, format!("card status {status:?}")))?,
        valid_days: row.get(4)?,
        expires_at: opt_ts_column(row, 5)?,
        redeemed_by: row.get(6)?,
        redeemed_at: opt_ts_column(row, 7)?,
        created_by_admin: row.get(8)?,
        metadata: json_column(row, 9)?,
        created_at: ts_column(row, 10)?,
    })
}

/// Insert a `new` card. A duplicate code is `CardCodeTaken`.
pub fn insert_card(conn: &Connection, card: &NewCard, now_ms: i64) -> TierGateResult<i64> {
    conn.execute(
        "INSERT INTO cards
            (code, plan_id, status, valid_days, expires_at, created_by_admin, metadata,
             created_at, updated_at)
         VALUES (?1, ?2, 'new', ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            card.code,
            card.plan_id,
            card.valid_days,
            card.expires_at.map(to_millis),
            card.created_by_admin,
            json_param(&card.metadata),
            now_ms,
        ],
    )
    .map_err(|e| {
        if is_constraint_violation(&e) {
            TierGateError::CardCodeTaken {
                code: card.code.clone(),
            }
        } else {
            to_storage_err(e)
        }
    })?;
    Ok(conn.last_insert_rowid())
}

pub fn get_card_by_code(conn: &Connection, code: &str) -> TierGateResult<Option<Card>> {
    conn.query_row(
        &format!("SELECT {CARD_COLUMNS} FROM cards WHERE code = ?1"),
        params![code],
        map_card,
    )
    .optional()
    .map_err(to_storage_err)
}

pub fn get_card_by_id(conn: &Connection, id: i64) -> TierGateResult<Option<Card>> {
    conn.query_row(
        &format!("SELECT {CARD_COLUMNS} FROM cards WHERE id = ?1"),
        params![id],
        map_card,
    )
    .optional()
    .map_err(to_storage_err)
}

/// Flip `new` → `redeemed`. Returns false if the card was no longer `new`.
pub fn mark_redeemed(conn: &Connection, id: i64, user_id: UserId, now_ms: i64) -> TierGateResult<bool> {
    let changed = conn
        .execute(
            "UPDATE cards
             SET status = 'redeemed', redeemed_by = ?2, redeemed_at = ?3, updated_at = ?3
             WHERE id = ?1 AND status = 'new'",
            params![id, user_id, now_ms],
        )
        .map_err(to_storage_err)?;
    Ok(changed == 1)
}

/// Flip `new` → `disabled`. Returns false if the card was no longer `new`.
pub fn mark_disabled(conn: &Connection, id: i64, now_ms: i64) -> TierGateResult<bool> {
    let changed = conn
        .execute(
            "UPDATE cards SET status = 'disabled', updated_at = ?2 WHERE id = ?1 AND status = 'new'",
            params![id, now_ms],
        )
        .map_err(to_storage_err)?;
    Ok(changed == 1)
}

/// Unredeemed cards past their redemption deadline become `expired`.
pub fn expire_overdue(conn: &Connection, now_ms: i64) -> TierGateResult<usize> {
    conn.execute(
        "UPDATE cards SET status = 'expired', updated_at = ?1
         WHERE status = 'new' AND expires_at IS NOT NULL AND expires_at <= ?1",
        params![now_ms],
    )
    .map_err(to_storage_err)
}
