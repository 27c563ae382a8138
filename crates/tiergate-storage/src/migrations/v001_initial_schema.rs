//! v001: plan catalog, card ledger, subscriptions.
//!
//! Timestamps are INTEGER unix milliseconds (UTC).

use rusqlite::Connection;

use tiergate_core::errors::TierGateResult;

use crate::to_storage_err;

pub fn migrate(conn: &Connection) -> TierGateResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS plans (
            id                   INTEGER PRIMARY KEY AUTOINCREMENT,
            code                 TEXT NOT NULL UNIQUE,
            name                 TEXT NOT NULL,
            description          TEXT,
            hourly_message_limit INTEGER NOT NULL CHECK (hourly_message_limit > 0),
            priority             INTEGER NOT NULL DEFAULT 0,
            monthly_price        REAL NOT NULL DEFAULT 0.0,
            is_default           INTEGER NOT NULL DEFAULT 0,
            is_active            INTEGER NOT NULL DEFAULT 1,
            features             TEXT,
            created_at           INTEGER NOT NULL,
            updated_at           INTEGER NOT NULL
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_plans_single_default
            ON plans(is_default) WHERE is_default = 1;

        CREATE TABLE IF NOT EXISTS cards (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            code             TEXT NOT NULL UNIQUE,
            plan_id          INTEGER NOT NULL REFERENCES plans(id),
            status           TEXT NOT NULL DEFAULT 'new'
                             CHECK (status IN ('new', 'redeemed', 'expired', 'disabled')),
            valid_days       INTEGER NOT NULL,
            expires_at       INTEGER,
            redeemed_by      INTEGER,
            redeemed_at      INTEGER,
            created_by_admin INTEGER,
            metadata         TEXT,
            created_at       INTEGER NOT NULL,
            updated_at       INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_cards_status_expiry ON cards(status, expires_at);

        CREATE TABLE IF NOT EXISTS subscriptions (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id        INTEGER NOT NULL,
            plan_id        INTEGER NOT NULL REFERENCES plans(id),
            source_card_id INTEGER UNIQUE REFERENCES cards(id),
            status         TEXT NOT NULL
                           CHECK (status IN ('pending', 'active', 'expired', 'cancelled')),
            priority       INTEGER NOT NULL,
            redeemed_at    INTEGER NOT NULL,
            starts_at      INTEGER NOT NULL,
            expires_at     INTEGER NOT NULL,
            activated_at   INTEGER,
            cancelled_at   INTEGER,
            created_at     INTEGER NOT NULL,
            updated_at     INTEGER NOT NULL,
            CHECK (expires_at > starts_at)
        );

        CREATE INDEX IF NOT EXISTS idx_subscriptions_user_live
            ON subscriptions(user_id, status, expires_at);
        CREATE INDEX IF NOT EXISTS idx_subscriptions_status_expiry
            ON subscriptions(status, expires_at);
        ",
    )
    .map_err(to_storage_err)?;
    Ok(())
}
