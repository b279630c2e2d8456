//! # Ledger Errors
//!
//! Service-level error type and its mapping to the HTTP boundary.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Larder                                 │
//! │                                                                         │
//! │  CoreError (rules, validation, locks) ──┐                              │
//! │                                          ├──► LedgerError               │
//! │  DbError (sqlx, constraints, busy) ─────┘        │                      │
//! │                                                   │ code()              │
//! │  retries exhausted ──► ConcurrentModification     │ http_status()       │
//! │  bad larder.toml   ──► Config                     ▼                     │
//! │                                              ApiError { code, message } │
//! │                                                                         │
//! │  { "code": "INSUFFICIENT_STOCK",                                        │
//! │    "message": "Insufficient stock for inv-1: available 15, ..." }       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use larder_core::{CoreError, ValidationError};
use larder_db::DbError;
use serde::Serialize;
use thiserror::Error;

/// Errors returned by [`crate::Ledger`] operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A ledger rule or validation failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Storage failed.
    #[error(transparent)]
    Db(#[from] DbError),

    /// Version conflicts persisted through every retry.
    #[error("Concurrent modification of {entity} {id}: gave up after {attempts} attempt(s)")]
    ConcurrentModification {
        entity: &'static str,
        id: String,
        attempts: u32,
    },

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

impl From<ValidationError> for LedgerError {
    fn from(err: ValidationError) -> Self {
        LedgerError::Core(err.into())
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for LedgerError {
    fn from(err: toml::ser::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}

// =============================================================================
// Boundary Mapping
// =============================================================================

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found (404)
    NotFound,

    /// Input validation failed (400)
    ValidationError,

    /// Quantity zero, negative or fractional units (400)
    InvalidQuantity,

    /// Not enough stock or units (422)
    InsufficientStock,

    /// Return larger than what is out (422)
    ExceedsIssued,

    /// Transaction type not applicable (400)
    UnsupportedTransactionType,

    /// Transaction may not be revised (409)
    LockedTransaction,

    /// Patch touches a non-updatable field (400)
    ImmutableField,

    /// Name already taken (409)
    DuplicateName,

    /// Report selection invalid (400)
    UnknownReportType,

    /// Item still has ledger history (409)
    InventoryInUse,

    /// Role too low (403)
    Forbidden,

    /// Retries exhausted (409)
    ConcurrentModification,

    /// Database operation failed (500)
    DatabaseError,

    /// Configuration invalid (500)
    ConfigError,
}

impl LedgerError {
    /// The boundary error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            LedgerError::Core(err) => match err {
                CoreError::NotFound { .. } => ErrorCode::NotFound,
                CoreError::InvalidQuantity { .. } => ErrorCode::InvalidQuantity,
                CoreError::InsufficientStock { .. } | CoreError::InsufficientUnits { .. } => {
                    ErrorCode::InsufficientStock
                }
                CoreError::ExceedsIssued { .. } => ErrorCode::ExceedsIssued,
                CoreError::UnsupportedTransactionType { .. } => {
                    ErrorCode::UnsupportedTransactionType
                }
                CoreError::LockedTransaction { .. } => ErrorCode::LockedTransaction,
                CoreError::ImmutableField { .. } => ErrorCode::ImmutableField,
                CoreError::DuplicateName { .. } => ErrorCode::DuplicateName,
                CoreError::UnknownReportType { .. } => ErrorCode::UnknownReportType,
                CoreError::InventoryInUse { .. } => ErrorCode::InventoryInUse,
                CoreError::Forbidden { .. } => ErrorCode::Forbidden,
                CoreError::Validation(_) => ErrorCode::ValidationError,
            },
            LedgerError::Db(DbError::NotFound { .. }) => ErrorCode::NotFound,
            LedgerError::Db(DbError::UniqueViolation { .. }) => ErrorCode::DuplicateName,
            LedgerError::Db(DbError::ForeignKeyViolation(_)) => ErrorCode::ValidationError,
            LedgerError::Db(DbError::Conflict { .. } | DbError::Busy(_)) => {
                ErrorCode::ConcurrentModification
            }
            LedgerError::Db(_) => ErrorCode::DatabaseError,
            LedgerError::ConcurrentModification { .. } => ErrorCode::ConcurrentModification,
            LedgerError::Config(_) => ErrorCode::ConfigError,
        }
    }

    /// The HTTP status the boundary layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self.code() {
            ErrorCode::NotFound => 404,
            ErrorCode::ValidationError
            | ErrorCode::InvalidQuantity
            | ErrorCode::UnsupportedTransactionType
            | ErrorCode::ImmutableField
            | ErrorCode::UnknownReportType => 400,
            ErrorCode::Forbidden => 403,
            ErrorCode::LockedTransaction
            | ErrorCode::DuplicateName
            | ErrorCode::InventoryInUse
            | ErrorCode::ConcurrentModification => 409,
            ErrorCode::InsufficientStock | ErrorCode::ExceedsIssued => 422,
            ErrorCode::DatabaseError | ErrorCode::ConfigError => 500,
        }
    }
}

/// Serialized error payload.
///
/// ```json
/// { "code": "LOCKED_TRANSACTION",
///   "message": "Transaction tx-9 cannot be modified: 2 newer transaction(s) exist" }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        let code = err.code();
        let message = match &err {
            // Storage details stay in the log
            LedgerError::Db(db) if code == ErrorCode::DatabaseError => {
                tracing::error!(error = %db, "Database operation failed");
                "Database operation failed".to_string()
            }
            LedgerError::Config(reason) => {
                tracing::error!(%reason, "Configuration error");
                err.to_string()
            }
            _ => err.to_string(),
        };
        ApiError::new(code, message)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;
    use larder_core::{LockReason, Role};

    #[test]
    fn test_status_mapping() {
        let cases: Vec<(LedgerError, u16)> = vec![
            (CoreError::not_found("Inventory", "x").into(), 404),
            (
                CoreError::InvalidQuantity {
                    field: "quantity",
                    value: 0.0,
                    reason: "must be greater than zero",
                }
                .into(),
                400,
            ),
            (
                CoreError::locked("tx", LockReason::SystemGenerated).into(),
                409,
            ),
            (
                CoreError::Forbidden {
                    required: Role::Admin,
                    actual: Role::Cashier,
                }
                .into(),
                403,
            ),
            (
                CoreError::ExceedsIssued {
                    inventory_id: "x".to_string(),
                    returnable: 0.0,
                    requested: 1.0,
                }
                .into(),
                422,
            ),
            (DbError::QueryFailed("boom".to_string()).into(), 500),
        ];

        for (err, status) in cases {
            assert_eq!(err.http_status(), status, "{err}");
        }
    }

    #[test]
    fn test_api_error_serialization() {
        let err: LedgerError = CoreError::DuplicateName {
            entity: "Inventory",
            name: "Flour".to_string(),
        }
        .into();
        let api = ApiError::from(err);
        let json = serde_json::to_value(&api).unwrap();

        assert_eq!(json["code"], "DUPLICATE_NAME");
        assert_eq!(json["message"], "Inventory named 'Flour' already exists");
    }

    #[test]
    fn test_database_details_are_hidden() {
        let api = ApiError::from(LedgerError::from(DbError::QueryFailed(
            "no such column: secret".to_string(),
        )));
        assert_eq!(api.code, ErrorCode::DatabaseError);
        assert_eq!(api.message, "Database operation failed");
    }
}
