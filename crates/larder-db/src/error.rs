//! # Storage Errors
//!
//! [`DbError`] classifies what went wrong below the ledger so the service
//! layer can decide between retrying, reporting a conflict and failing.
//!
//! ## Classification
//! ```text
//! sqlx::Error
//!   ├── Database(e), e.kind() == UniqueViolation     ──► UniqueViolation { columns }
//!   ├── Database(e), e.kind() == ForeignKeyViolation ──► ForeignKeyViolation
//!   ├── Database(e), e.kind() == CheckViolation      ──► CheckViolation
//!   ├── Database(e), primary code SQLITE_BUSY/LOCKED ──► Busy          (retryable)
//!   ├── Database(e), anything else                   ──► QueryFailed
//!   ├── PoolTimedOut                                 ──► PoolExhausted (retryable)
//!   └── everything else                              ──► QueryFailed / ConnectionFailed
//!
//! repository version guard matched no row            ──► Conflict      (retryable)
//! ```

use sqlx::error::ErrorKind;
use thiserror::Error;

/// SQLite primary result codes for lock contention.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} {id} does not exist")]
    NotFound { entity: &'static str, id: String },

    /// `columns` is SQLite's column list, e.g. `inventories.name`.
    #[error("Unique constraint failed on {columns}")]
    UniqueViolation { columns: String },

    /// A row references a missing item or department, or an item with
    /// ledger rows was removed.
    #[error("Foreign key constraint failed: {0}")]
    ForeignKeyViolation(String),

    /// A stored row broke a schema CHECK (negative stock, kind columns mixed).
    #[error("Check constraint failed: {0}")]
    CheckViolation(String),

    /// The version guard on `entity` matched no row: another writer got there
    /// first.
    #[error("{entity} {id} was modified concurrently")]
    Conflict { entity: &'static str, id: String },

    /// SQLite gave up waiting for a lock held by another connection.
    #[error("Database busy: {0}")]
    Busy(String),

    #[error("All database connections are in use")]
    PoolExhausted,

    #[error("Could not open database: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A stored row does not decode into a domain value.
    #[error("Corrupt {entity} row {id}: {reason}")]
    CorruptRow {
        entity: &'static str,
        id: String,
        reason: String,
    },
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

impl DbError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn conflict(entity: &'static str, id: impl Into<String>) -> Self {
        DbError::Conflict {
            entity,
            id: id.into(),
        }
    }

    /// True when running the whole unit of work again may succeed.
    ///
    /// A unique violation on the ledger sequence means another writer
    /// appended to the same item first, which is a lost race like any other.
    pub fn is_retryable(&self) -> bool {
        match self {
            DbError::Conflict { .. } | DbError::Busy(_) | DbError::PoolExhausted => true,
            DbError::UniqueViolation { columns } => columns.contains(".sequence"),
            _ => false,
        }
    }

    /// True for a unique violation involving `column`, e.g. `"departments.name"`.
    pub fn is_unique_on(&self, column: &str) -> bool {
        matches!(self, DbError::UniqueViolation { columns } if columns.contains(column))
    }
}

/// SQLite reports the offending columns only in the message text:
/// `UNIQUE constraint failed: inventories.name`.
fn unique_columns(message: &str) -> String {
    message
        .split_once("constraint failed: ")
        .map(|(_, columns)| columns.trim().to_string())
        .unwrap_or_else(|| message.to_string())
}

fn is_contention(code: Option<&str>) -> bool {
    code.and_then(|code| code.parse::<i32>().ok())
        .map(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
        .unwrap_or(false)
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                match db_err.kind() {
                    ErrorKind::UniqueViolation => DbError::UniqueViolation {
                        columns: unique_columns(&message),
                    },
                    ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation(message),
                    ErrorKind::CheckViolation => DbError::CheckViolation(message),
                    _ if is_contention(db_err.code().as_deref()) => DbError::Busy(message),
                    _ => DbError::QueryFailed(message),
                }
            }
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),
            sqlx::Error::Io(io) => DbError::ConnectionFailed(io.to_string()),
            other => DbError::QueryFailed(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}
