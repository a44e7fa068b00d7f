use thiserror::Error;

/// Error kinds surfaced by the storage layer (spec §7).
///
/// Upper layers match on kind, not on string content: a missing table
/// triggers a migration-and-retry, a corrupt store degrades to a
/// read-only/in-memory fallback, everything else is a recoverable I/O
/// hiccup that the caller can choose to retry.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage corrupt: {0}")]
    Corrupt(String),

    #[error("schema migration failed for pair: {0}")]
    SchemaMigrationFailed(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::DatabaseCorrupt =>
            {
                StorageError::Corrupt(err.to_string())
            }
            rusqlite::Error::QueryReturnedNoRows => StorageError::NotFound(err.to_string()),
            _ => StorageError::Unavailable(err.to_string()),
        }
    }
}

impl From<r2d2::Error> for StorageError {
    fn from(err: r2d2::Error) -> Self {
        StorageError::Unavailable(err.to_string())
    }
}
