//! # Storage Errors
//!
//! ```text
//! sqlx::Error ─────┐
//! MigrateError ────┼──► DbError ──► CoreError
//! serde_json ──────┘        │
//!                           ├── ConcurrentModification ──► ConcurrentModification
//!                           ├── NotFound               ──► NotFound
//!                           └── the rest               ──► Storage(text)
//! ```
//!
//! Only the variants a caller can act on survive the trip into the core
//! taxonomy; everything else becomes an opaque storage failure.

use thiserror::Error;
use tripdesk_core::CoreError;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} '{id}' does not exist")]
    NotFound { entity: &'static str, id: String },

    /// The stored `record_version` did not match the caller's.
    #[error("{entity} '{id}' changed underneath the caller: expected version {expected}, stored {actual}")]
    ConcurrentModification {
        entity: &'static str,
        id: String,
        expected: u64,
        actual: u64,
    },

    /// A UNIQUE index rejected the row. `columns` is what SQLite reports,
    /// e.g. `quotes.unique_ref_no, quotes.version`.
    #[error("Row already exists for {columns}")]
    UniqueViolation { columns: String },

    /// A booking referenced a quote that is not stored.
    #[error("Referenced row is missing: {0}")]
    MissingReference(String),

    /// The database file could not be opened or the pool is closed.
    #[error("Cannot reach database: {0}")]
    Unavailable(String),

    #[error("Schema migration failed: {0}")]
    Migration(String),

    /// A JSON payload column could not be encoded or decoded.
    #[error("Payload could not be (de)serialized: {0}")]
    Serialization(String),

    #[error("Timed out waiting for a pooled connection")]
    PoolTimeout,

    #[error("SQLite error: {0}")]
    Sqlite(String),
}

impl DbError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn conflict(entity: &'static str, id: impl Into<String>, expected: u64, actual: u64) -> Self {
        DbError::ConcurrentModification {
            entity,
            id: id.into(),
            expected,
            actual,
        }
    }
}

/// Sorts a constraint failure by the text SQLite puts in the message.
fn from_constraint(message: &str) -> DbError {
    const UNIQUE: &str = "UNIQUE constraint failed: ";

    if let Some(columns) = message.strip_prefix(UNIQUE) {
        DbError::UniqueViolation {
            columns: columns.to_string(),
        }
    } else if message.starts_with("FOREIGN KEY constraint failed") {
        DbError::MissingReference(message.to_string())
    } else {
        DbError::Sqlite(message.to_string())
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => from_constraint(db_err.message()),
            sqlx::Error::PoolTimedOut => DbError::PoolTimeout,
            sqlx::Error::PoolClosed => DbError::Unavailable("connection pool closed".to_string()),
            sqlx::Error::Io(io) => DbError::Unavailable(io.to_string()),
            other => DbError::Sqlite(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::Migration(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Serialization(err.to_string())
    }
}

impl From<DbError> for CoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::ConcurrentModification {
                entity,
                id,
                expected,
                actual,
            } => CoreError::ConcurrentModification {
                entity,
                id,
                expected,
                actual,
            },
            DbError::NotFound { entity, id } => CoreError::NotFound { entity, id },
            other => CoreError::Storage(other.to_string()),
        }
    }
}
