/// Persistence-layer failures.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("sqlite error: {message}")]
    Sqlite { message: String },

    #[error("migration v{version:03} failed: {reason}")]
    MigrationFailed { version: u32, reason: String },

    #[error("connection lock poisoned: {0}")]
    PoolPoisoned(String),

    #[error("corrupt value in column {column}: {details}")]
    CorruptRow { column: usize, details: String },
}
