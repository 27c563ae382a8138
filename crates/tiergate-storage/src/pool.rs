//! ConnectionPool: one writer plus round-robin readers.
//!
//! The only place in this crate that holds `Mutex<Connection>`.
//! Everything above it goes through `with_reader` / `with_write_tx`.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::warn;

use tiergate_core::config::StorageConfig;
use tiergate_core::errors::{StorageError, TierGateError, TierGateResult};

use crate::pragmas::{configure_connection, configure_readonly_connection};
use crate::to_storage_err;

pub struct ConnectionPool {
    writer: Mutex<Connection>,
    readers: Vec<Mutex<Connection>>,
    read_index: AtomicUsize,
}

impl ConnectionPool {
    /// Open a file-backed pool: 1 writer + `read_pool_size` read-only connections.
    pub fn open(path: &Path, config: &StorageConfig) -> TierGateResult<Self> {
        let writer = Connection::open(path).map_err(|e| {
            TierGateError::Config(format!("failed to open {} for writing: {}", path.display(), e))
        })?;
        configure_connection(&writer, config.busy_timeout_ms)?;

        let mut readers = Vec::with_capacity(config.read_pool_size);
        for i in 0..config.read_pool_size {
            let reader = Connection::open_with_flags(
                path,
                rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .map_err(|e| TierGateError::Config(format!("failed to open reader {}: {}", i, e)))?;
            configure_readonly_connection(&reader, config.busy_timeout_ms)?;
            readers.push(Mutex::new(reader));
        }

        Ok(Self {
            writer: Mutex::new(writer),
            readers,
            read_index: AtomicUsize::new(0),
        })
    }

    /// Open a private in-memory database. Reads fall back to the writer.
    pub fn open_in_memory(config: &StorageConfig) -> TierGateResult<Self> {
        let writer = Connection::open_in_memory()
            .map_err(|e| TierGateError::Config(format!("failed to open in-memory db: {}", e)))?;
        configure_connection(&writer, config.busy_timeout_ms)?;

        Ok(Self {
            writer: Mutex::new(writer),
            readers: Vec::new(),
            read_index: AtomicUsize::new(0),
        })
    }

    /// Execute a closure with the writer connection, outside any transaction.
    pub fn with_writer<F, T>(&self, f: F) -> TierGateResult<T>
    where
        F: FnOnce(&Connection) -> TierGateResult<T>,
    {
        let conn = self
            .writer
            .lock()
            .map_err(|e| StorageError::PoolPoisoned(format!("writer: {}", e)))?;
        f(&conn)
    }

    /// Run `f` inside `BEGIN IMMEDIATE ... COMMIT` on the writer.
    ///
    /// The write lock is taken up front, so everything `f` reads is current for
    /// the whole transaction even when other processes share the file. Any
    /// error from `f` rolls back.
    pub fn with_write_tx<F, T>(&self, f: F) -> TierGateResult<T>
    where
        F: FnOnce(&Connection) -> TierGateResult<T>,
    {
        self.with_writer(|conn| {
            conn.execute_batch("BEGIN IMMEDIATE").map_err(to_storage_err)?;
            match f(conn) {
                Ok(value) => match conn.execute_batch("COMMIT") {
                    Ok(()) => Ok(value),
                    Err(e) => {
                        rollback(conn);
                        Err(to_storage_err(e))
                    }
                },
                Err(e) => {
                    rollback(conn);
                    Err(e)
                }
            }
        })
    }

    /// Execute a closure with a reader connection (round-robin).
    ///
    /// Falls back to the writer in in-memory mode.
    pub fn with_reader<F, T>(&self, f: F) -> TierGateResult<T>
    where
        F: FnOnce(&Connection) -> TierGateResult<T>,
    {
        if self.readers.is_empty() {
            return self.with_writer(f);
        }

        let index = self.read_index.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        let conn = self.readers[index]
            .lock()
            .map_err(|e| StorageError::PoolPoisoned(format!("reader {}: {}", index, e)))?;
        f(&conn)
    }

    pub fn reader_count(&self) -> usize {
        self.readers.len()
    }

    /// Check WAL mode on the writer connection.
    pub fn is_wal_mode(&self) -> bool {
        self.with_writer(|conn| {
            let mode: String = conn
                .query_row("PRAGMA journal_mode", [], |row| row.get(0))
                .unwrap_or_default();
            Ok(mode.eq_ignore_ascii_case("wal"))
        })
        .unwrap_or(false)
    }
}

fn rollback(conn: &Connection) {
    if let Err(e) = conn.execute_batch("ROLLBACK") {
        // Already rolled back by SQLite on some failures.
        if !conn.is_autocommit() {
            warn!(error = %e, "rollback failed");
        }
    }
}
