//! # Revision Policy
//!
//! Rules deciding whether a recorded transaction may still be updated or
//! deleted, and the patch type describing an update.
//!
//! ## Lock Checks
//! ```text
//! assert_mutable(tx)
//!     │
//!     ├── is_locked?              ──► LockReason::Locked
//!     ├── is_system_generated?    ──► LockReason::SystemGenerated
//!     ├── age > window (days)?    ──► LockReason::TooOld
//!     ├── newer transactions?     ──► LockReason::NewerTransactions
//!     ▼
//!   mutable
//! ```
//!
//! Age is the number of calendar days between the transaction date and now,
//! both taken as local dates at the configured UTC offset. A transaction
//! recorded at 23:50 and checked at 00:10 the next day is one day old.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, LockReason, ValidationError};
use crate::types::{InventoryTransaction, TransactionType};
use crate::validation::validate_amount;

/// Default revision window in days.
pub const DEFAULT_WINDOW_DAYS: i64 = 30;

/// Default UTC offset for calendar-day math (West Africa Time).
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 60;

// =============================================================================
// Revision Policy
// =============================================================================

/// Lock-eligibility rules for revising recorded transactions.
#[derive(Debug, Clone, Copy)]
pub struct RevisionPolicy {
    window_days: i64,
    offset: FixedOffset,
}

impl Default for RevisionPolicy {
    fn default() -> Self {
        RevisionPolicy {
            window_days: DEFAULT_WINDOW_DAYS,
            offset: FixedOffset::east_opt(DEFAULT_UTC_OFFSET_MINUTES * 60).unwrap_or(Utc.fix()),
        }
    }
}

impl RevisionPolicy {
    /// Creates a policy.
    ///
    /// ## Arguments
    /// * `window_days` - Transactions older than this many days are locked
    /// * `utc_offset_minutes` - Offset used to turn instants into calendar days
    pub fn new(window_days: i64, utc_offset_minutes: i32) -> CoreResult<Self> {
        if window_days <= 0 {
            return Err(ValidationError::InvalidFormat {
                field: "revision_window_days".to_string(),
                reason: "must be greater than zero".to_string(),
            }
            .into());
        }

        let offset = utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "utc_offset_minutes".to_string(),
                reason: format!("{} is not a valid UTC offset", utc_offset_minutes),
            })?;

        Ok(RevisionPolicy {
            window_days,
            offset,
        })
    }

    pub fn window_days(&self) -> i64 {
        self.window_days
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Calendar days between `then` and `now` at the policy offset.
    pub fn age_days(&self, then: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
        let then = then.with_timezone(&self.offset).date_naive();
        let now = now.with_timezone(&self.offset).date_naive();
        (now - then).num_days()
    }

    /// Checks that `tx` may be updated or deleted.
    ///
    /// ## Arguments
    /// * `tx` - The transaction under revision
    /// * `now` - Current time from the injected clock
    /// * `newer` - Number of transactions recorded after `tx` for the same item
    ///
    /// ## Returns
    /// * `Ok(())` - Mutable
    /// * `Err(CoreError::LockedTransaction)` - First failing check, see module docs
    pub fn assert_mutable(
        &self,
        tx: &InventoryTransaction,
        now: DateTime<Utc>,
        newer: i64,
    ) -> CoreResult<()> {
        if tx.is_locked {
            return Err(CoreError::locked(&tx.id, LockReason::Locked));
        }

        if tx.is_system_generated {
            return Err(CoreError::locked(&tx.id, LockReason::SystemGenerated));
        }

        let age_days = self.age_days(tx.transaction_date, now);
        if age_days > self.window_days {
            return Err(CoreError::locked(
                &tx.id,
                LockReason::TooOld {
                    age_days,
                    limit_days: self.window_days,
                },
            ));
        }

        if newer > 0 {
            return Err(CoreError::locked(
                &tx.id,
                LockReason::NewerTransactions { count: newer },
            ));
        }

        Ok(())
    }
}

// =============================================================================
// Transaction Patch
// =============================================================================

/// Fields of a transaction that may be revised.
///
/// ## Absent vs Null
/// For `notes` and `department_id`, an absent key leaves the value alone and
/// an explicit `null` clears it:
/// ```text
/// {}                       → notes: None          (unchanged)
/// {"notes": null}          → notes: Some(None)    (cleared)
/// {"notes": "recount"}     → notes: Some(Some(_)) (replaced)
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(deny_unknown_fields)]
pub struct TransactionPatch {
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub transaction_type: Option<TransactionType>,
    #[serde(default, deserialize_with = "present")]
    pub notes: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub department_id: Option<Option<String>>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl TransactionPatch {
    /// The only keys a patch may carry.
    pub const UPDATABLE_FIELDS: [&'static str; 4] =
        ["quantity", "transaction_type", "notes", "department_id"];

    /// Parses a patch from a JSON object.
    ///
    /// ## Errors
    /// * `ImmutableField` - Any key outside [`Self::UPDATABLE_FIELDS`]
    /// * `UnsupportedTransactionType` - Unknown `transaction_type` string
    /// * `Validation` - Not an object, or a value of the wrong type
    pub fn from_json(value: &serde_json::Value) -> CoreResult<Self> {
        let object = value.as_object().ok_or_else(|| ValidationError::InvalidFormat {
            field: "patch".to_string(),
            reason: "expected a JSON object".to_string(),
        })?;

        if let Some(field) = object
            .keys()
            .find(|key| !Self::UPDATABLE_FIELDS.contains(&key.as_str()))
        {
            return Err(CoreError::ImmutableField {
                field: field.clone(),
            });
        }

        if let Some(serde_json::Value::String(raw)) = object.get("transaction_type") {
            raw.parse::<TransactionType>()?;
        }

        serde_json::from_value(value.clone()).map_err(|e| {
            ValidationError::InvalidFormat {
                field: "patch".to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// A patch that writes back the current values of `tx`.
    pub fn from_transaction(tx: &InventoryTransaction) -> Self {
        TransactionPatch {
            quantity: Some(tx.quantity),
            transaction_type: Some(tx.transaction_type),
            notes: Some(tx.notes.clone()),
            department_id: Some(tx.department_id.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.quantity.is_none()
            && self.transaction_type.is_none()
            && self.notes.is_none()
            && self.department_id.is_none()
    }

    /// Rejects a non-positive replacement quantity.
    pub fn validate(&self) -> CoreResult<()> {
        if let Some(quantity) = self.quantity {
            validate_amount(quantity)?;
        }
        Ok(())
    }

    /// Writes the patch over `tx`, returning the revised record.
    ///
    /// Does not touch stock snapshot or audit fields.
    pub fn apply_to(&self, tx: &InventoryTransaction) -> InventoryTransaction {
        let mut revised = tx.clone();
        if let Some(quantity) = self.quantity {
            revised.quantity = quantity;
        }
        if let Some(transaction_type) = self.transaction_type {
            revised.transaction_type = transaction_type;
        }
        if let Some(notes) = &self.notes {
            revised.notes = notes.clone();
        }
        if let Some(department_id) = &self.department_id {
            revised.department_id = department_id.clone();
        }
        revised
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InventoryStatus;
    use chrono::TimeZone;
    use serde_json::json;

    fn tx_at(date: DateTime<Utc>) -> InventoryTransaction {
        InventoryTransaction {
            id: "tx-1".to_string(),
            inventory_id: "inv-1".to_string(),
            transaction_type: TransactionType::Issue,
            quantity: 5.0,
            sequence: 2,
            transaction_date: date,
            created_by_id: "user-1".to_string(),
            updated_by_id: None,
            department_id: Some("dep-1".to_string()),
            notes: Some("lunch service".to_string()),
            previous_status: InventoryStatus::InStock,
            previous_quantity: 20.0,
            previous_total_units: None,
            resulting_quantity: 15.0,
            is_locked: false,
            is_system_generated: false,
            created_at: date,
            updated_at: None,
        }
    }

    #[test]
    fn test_fresh_transaction_is_mutable() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let policy = RevisionPolicy::default();
        assert!(policy.assert_mutable(&tx_at(now), now, 0).is_ok());
    }

    #[test]
    fn test_lock_checks_in_order() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let policy = RevisionPolicy::default();

        let mut tx = tx_at(now - chrono::Duration::days(40));
        tx.is_locked = true;
        tx.is_system_generated = true;
        let err = policy.assert_mutable(&tx, now, 3).unwrap_err();
        assert!(matches!(
            err,
            CoreError::LockedTransaction {
                reason: LockReason::Locked,
                ..
            }
        ));

        tx.is_locked = false;
        let err = policy.assert_mutable(&tx, now, 3).unwrap_err();
        assert!(matches!(
            err,
            CoreError::LockedTransaction {
                reason: LockReason::SystemGenerated,
                ..
            }
        ));

        tx.is_system_generated = false;
        let err = policy.assert_mutable(&tx, now, 3).unwrap_err();
        assert!(matches!(
            err,
            CoreError::LockedTransaction {
                reason: LockReason::TooOld {
                    age_days: 40,
                    limit_days: 30
                },
                ..
            }
        ));

        let tx = tx_at(now);
        let err = policy.assert_mutable(&tx, now, 3).unwrap_err();
        assert!(matches!(
            err,
            CoreError::LockedTransaction {
                reason: LockReason::NewerTransactions { count: 3 },
                ..
            }
        ));
    }

    #[test]
    fn test_window_boundary() {
        let now = Utc.with_ymd_and_hms(2026, 3, 31, 12, 0, 0).unwrap();
        let policy = RevisionPolicy::default();

        let thirty = tx_at(now - chrono::Duration::days(30));
        assert!(policy.assert_mutable(&thirty, now, 0).is_ok());

        let thirty_one = tx_at(now - chrono::Duration::days(31));
        assert!(policy.assert_mutable(&thirty_one, now, 0).is_err());
    }

    #[test]
    fn test_age_uses_local_calendar_days() {
        // 23:30 UTC on the 1st is 00:30 on the 2nd at UTC+1.
        let then = Utc.with_ymd_and_hms(2026, 5, 1, 23, 30, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 5, 2, 0, 10, 0).unwrap();

        assert_eq!(RevisionPolicy::new(30, 60).unwrap().age_days(then, now), 0);
        assert_eq!(RevisionPolicy::new(30, 0).unwrap().age_days(then, now), 1);
    }

    #[test]
    fn test_invalid_policy() {
        assert!(RevisionPolicy::new(0, 60).is_err());
        assert!(RevisionPolicy::new(30, 24 * 60).is_err());
    }

    #[test]
    fn test_patch_rejects_immutable_fields() {
        let err = TransactionPatch::from_json(&json!({"quantity": 3, "inventory_id": "x"}))
            .unwrap_err();
        assert!(matches!(err, CoreError::ImmutableField { field } if field == "inventory_id"));

        let err = TransactionPatch::from_json(&json!({"previous_quantity": 1})).unwrap_err();
        assert!(matches!(err, CoreError::ImmutableField { .. }));
    }

    #[test]
    fn test_patch_parsing() {
        let patch = TransactionPatch::from_json(&json!({
            "quantity": 7.5,
            "transaction_type": "damage",
            "notes": null
        }))
        .unwrap();

        assert_eq!(patch.quantity, Some(7.5));
        assert_eq!(patch.transaction_type, Some(TransactionType::Damage));
        assert_eq!(patch.notes, Some(None));
        assert_eq!(patch.department_id, None);

        let err = TransactionPatch::from_json(&json!({"transaction_type": "transfer"}))
            .unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedTransactionType { .. }));

        assert!(TransactionPatch::from_json(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_patch_apply_and_restore() {
        let now = Utc::now();
        let original = tx_at(now);
        let patch = TransactionPatch {
            quantity: Some(9.0),
            notes: Some(None),
            ..Default::default()
        };
        assert!(patch.validate().is_ok());

        let revised = patch.apply_to(&original);
        assert_eq!(revised.quantity, 9.0);
        assert_eq!(revised.notes, None);
        assert_eq!(revised.department_id, original.department_id);

        let back = TransactionPatch::from_transaction(&original).apply_to(&revised);
        assert_eq!(back, original);
    }

    #[test]
    fn test_patch_quantity_must_be_positive() {
        let patch = TransactionPatch {
            quantity: Some(-1.0),
            ..Default::default()
        };
        assert!(matches!(
            patch.validate(),
            Err(CoreError::InvalidQuantity { .. })
        ));
        assert!(TransactionPatch::default().is_empty());
    }
}
