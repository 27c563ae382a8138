//! SQLite PRAGMA configuration.
//! Must be called on every connection immediately after opening.

use std::time::Duration;

use rusqlite::Connection;

use tiergate_core::errors::TierGateResult;

use crate::to_storage_err;

/// Configure a read-write connection.
///
/// - WAL for concurrent readers during writes
/// - busy_timeout bounds how long a writer waits for the lock; past it the
///   call fails with `StorageUnavailable` instead of hanging
/// - foreign keys on so subscriptions and cards cannot reference missing plans
pub fn configure_connection(conn: &Connection, busy_timeout_ms: u64) -> TierGateResult<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA cache_size = -8000;
        PRAGMA temp_store = MEMORY;
        ",
    )
    .map_err(to_storage_err)?;
    conn.busy_timeout(Duration::from_millis(busy_timeout_ms))
        .map_err(to_storage_err)?;
    Ok(())
}

/// Same as `configure_connection` plus `query_only = ON` to prevent
/// accidental writes through a reader.
pub fn configure_readonly_connection(conn: &Connection, busy_timeout_ms: u64) -> TierGateResult<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA cache_size = -8000;
        PRAGMA temp_store = MEMORY;
        PRAGMA query_only = ON;
        ",
    )
    .map_err(to_storage_err)?;
    conn.busy_timeout(Duration::from_millis(busy_timeout_ms))
        .map_err(to_storage_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configure_connection_sets_wal() {
        let conn = Connection::open_in_memory().unwrap();
        configure_connection(&conn, 5000).unwrap();

        let journal_mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .unwrap();
        // In-memory databases report "memory" instead of "wal"
        assert!(
            journal_mode == "wal" || journal_mode == "memory",
            "Expected wal or memory, got: {}",
            journal_mode
        );
    }

    #[test]
    fn test_configure_connection_sets_busy_timeout() {
        let conn = Connection::open_in_memory().unwrap();
        configure_connection(&conn, 1234).unwrap();

        let timeout: i64 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .unwrap();
        assert_eq!(timeout, 1234);
    }

    #[test]
    fn test_configure_connection_sets_foreign_keys() {
        let conn = Connection::open_in_memory().unwrap();
        configure_connection(&conn, 5000).unwrap();

        let fk: i64 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn test_readonly_connection_rejects_writes() {
        let conn = Connection::open_in_memory().unwrap();
        configure_readonly_connection(&conn, 5000).unwrap();
        assert!(conn.execute_batch("CREATE TABLE t (x INTEGER)").is_err());
    }
}
