//! # Error Types
//!
//! Domain-specific error types for larder-core.
//!
//! [`ValidationError`] folds into [`CoreError`], which larder-ledger wraps
//! alongside the database errors of larder-db.
//!
//! Every variant carries the entity id, the attempted value and the limit
//! that was violated, so the boundary can build a message without looking
//! anything up again.

use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;

use crate::roles::Role;

// =============================================================================
// Core Error
// =============================================================================

/// Ledger rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Inventory item, transaction or department is absent.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Quantity is zero, negative, not finite, or fractional where whole
    /// units are required.
    #[error("Invalid {field} {value}: {reason}")]
    InvalidQuantity {
        field: &'static str,
        value: f64,
        reason: &'static str,
    },

    /// A raw-material ISSUE, WRITE_OFF or DAMAGE asks for more than is on hand.
    ///
    /// ## User Workflow
    /// ```text
    /// Issue 20 kg of flour
    ///      │
    ///      ▼
    /// Check stock: quantity=15
    ///      │
    ///      ▼
    /// InsufficientStock { inventory_id, available: 15, requested: 20 }
    /// ```
    #[error("Insufficient stock for {inventory_id}: available {available}, requested {requested}")]
    InsufficientStock {
        inventory_id: String,
        available: f64,
        requested: f64,
    },

    /// An equipment ISSUE, WRITE_OFF or DAMAGE asks for more units than are available.
    #[error("Insufficient units for {inventory_id}: available {available}, requested {requested}")]
    InsufficientUnits {
        inventory_id: String,
        available: i64,
        requested: i64,
    },

    /// A RETURN is larger than what is still out.
    #[error("Return of {requested} for {inventory_id} exceeds returnable quantity {returnable}")]
    ExceedsIssued {
        inventory_id: String,
        returnable: f64,
        requested: f64,
    },

    /// The transaction type is unknown, or does not apply to this kind of item.
    #[error("Transaction type '{transaction_type}' is not supported for {kind}")]
    UnsupportedTransactionType {
        transaction_type: String,
        kind: String,
    },

    /// The transaction fails a mutability precondition.
    #[error("Transaction {transaction_id} cannot be modified: {reason}")]
    LockedTransaction {
        transaction_id: String,
        reason: LockReason,
    },

    /// A patch names a field outside the updatable set.
    #[error("Field '{field}' cannot be updated")]
    ImmutableField { field: String },

    /// Name uniqueness violated for an inventory item or department.
    #[error("{entity} named '{name}' already exists")]
    DuplicateName { entity: &'static str, name: String },

    /// Report selection outside the supported set.
    #[error("Invalid report type '{requested}'. Choose from: {}", .allowed.join(", "))]
    UnknownReportType {
        requested: String,
        allowed: Vec<&'static str>,
    },

    /// Inventory item still has ledger history.
    #[error("Inventory {id} has {transactions} transaction(s) and cannot be deleted")]
    InventoryInUse { id: String, transactions: i64 },

    /// Caller's role is below the one the operation needs.
    #[error("Role '{actual}' is not permitted, requires '{required}' or higher")]
    Forbidden { required: Role, actual: Role },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Creates a LockedTransaction error.
    pub fn locked(transaction_id: impl Into<String>, reason: LockReason) -> Self {
        CoreError::LockedTransaction {
            transaction_id: transaction_id.into(),
            reason,
        }
    }
}

// =============================================================================
// Lock Reason
// =============================================================================

/// Why a transaction may not be updated or deleted.
///
/// Checks run in declaration order; the first one that fails is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum LockReason {
    /// Explicitly locked.
    Locked,

    /// Recorded by the system (e.g. initial stock on creation).
    SystemGenerated,

    /// Older than the revision window.
    TooOld { age_days: i64, limit_days: i64 },

    /// Later transactions exist for the same item and must be removed first.
    NewerTransactions { count: i64 },
}

impl std::fmt::Display for LockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockReason::Locked => write!(f, "transaction is locked"),
            LockReason::SystemGenerated => write!(f, "system-generated transactions are immutable"),
            LockReason::TooOld {
                age_days,
                limit_days,
            } => write!(
                f,
                "transaction is {} days old, older than {} days cannot be modified",
                age_days, limit_days
            ),
            LockReason::NewerTransactions { count } => write!(
                f,
                "{} newer transaction(s) exist for this item, delete them first",
                count
            ),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any state is touched.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value must not be negative.
    #[error("{field} must not be negative, got {value}")]
    Negative { field: String, value: f64 },

    /// Available units above total units.
    #[error("available_units ({available}) cannot exceed total_units ({total})")]
    UnitsExceedTotal { available: i64, total: i64 },

    /// Operation targets the other inventory kind.
    #[error("Inventory {id} is {actual}, not {expected}")]
    KindMismatch {
        id: String,
        expected: String,
        actual: String,
    },

    /// Invalid format (e.g., invalid UUID, unparseable payload).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            inventory_id: "inv-1".to_string(),
            available: 15.0,
            requested: 20.0,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for inv-1: available 15, requested 20"
        );
    }

    #[test]
    fn test_unknown_report_type_lists_choices() {
        let err = CoreError::UnknownReportType {
            requested: "weekly".to_string(),
            allowed: vec!["summary", "low_stock"],
        };
        assert_eq!(
            err.to_string(),
            "Invalid report type 'weekly'. Choose from: summary, low_stock"
        );
    }

    #[test]
    fn test_lock_reason_messages() {
        let err = CoreError::locked("tx-9", LockReason::TooOld {
            age_days: 31,
            limit_days: 30,
        });
        assert!(err.to_string().contains("31 days old"));

        let err = CoreError::locked("tx-9", LockReason::NewerTransactions { count: 2 });
        assert!(err.to_string().contains("2 newer transaction(s)"));
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "name".to_string(),
        };
        let core_err: CoreError = validation_err.into();

        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
