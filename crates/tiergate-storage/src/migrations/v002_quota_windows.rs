//! v002: hourly quota counters, one row per (user, window).

use rusqlite::Connection;

use tiergate_core::errors::TierGateResult;

use crate::to_storage_err;

pub fn migrate(conn: &Connection) -> TierGateResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS quota_windows (
            user_id         INTEGER NOT NULL,
            window_start    INTEGER NOT NULL,
            message_count   INTEGER NOT NULL DEFAULT 0 CHECK (message_count >= 0),
            tool_call_count INTEGER NOT NULL DEFAULT 0 CHECK (tool_call_count >= 0),
            last_reset_at   INTEGER NOT NULL,
            created_at      INTEGER NOT NULL,
            updated_at      INTEGER NOT NULL,
            PRIMARY KEY (user_id, window_start)
        ) WITHOUT ROWID;

        CREATE INDEX IF NOT EXISTS idx_quota_windows_start ON quota_windows(window_start);
        ",
    )
    .map_err(to_storage_err)?;
    Ok(())
}
