use thiserror::Error;

/// Errors that can occur when interacting with the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The store could not be reached (pool exhausted or closed, I/O failure).
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// A uniqueness, foreign-key or check constraint rejected a write.
    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),

    /// A concurrent writer invalidated this transaction.
    /// The whole transaction may be retried from scratch.
    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    /// An update targeted a row that does not exist.
    #[error("{entity} not found: {id}")]
    RowNotFound { entity: &'static str, id: String },

    /// A stored row could not be decoded into a record.
    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Any other database error.
    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl StorageError {
    /// Returns true if re-running the whole transaction may succeed.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, StorageError::ConcurrencyConflict(_))
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        let code = match &err {
            sqlx::Error::Database(db_err) => db_err.code().map(|c| c.into_owned()),
            _ => None,
        };

        match code.as_deref() {
            // serialization_failure, deadlock_detected
            Some("40001") | Some("40P01") => StorageError::ConcurrencyConflict(err.to_string()),
            // integrity_constraint_violation class
            Some(code) if code.starts_with("23") => {
                StorageError::IntegrityViolation(err.to_string())
            }
            Some(_) => StorageError::Database(err),
            None => match err {
                sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed
                | sqlx::Error::Io(_)
                | sqlx::Error::Tls(_) => StorageError::Unavailable(err.to_string()),
                other => StorageError::Database(other),
            },
        }
    }
}

impl From<common::UnknownStatus> for StorageError {
    fn from(err: common::UnknownStatus) -> Self {
        StorageError::CorruptRow(err.to_string())
    }
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
