//! # Transaction Revision
//!
//! Updating or deleting a recorded transaction. Both restore the item to the
//! snapshot stored on the transaction itself, so only the newest transaction
//! of an item can be revised.
//!
//! ## Update
//! ```text
//! stored item ──restore(tx.previous_*)──► state before tx
//!                                              │
//!                          Rules::apply(patched type, patched quantity)
//!                                              │
//!                                              ▼
//!                                     new stock + status, new resulting_quantity
//! ```
//!
//! Updating with the original values reproduces the original stock and status
//! exactly. Deleting is the restore step alone.

use tracing::info;

use larder_core::{
    Actor, CoreError, InventoryTransaction, Role, TransactionPatch, TransactionType,
};
use larder_db::{InventoryRepository, SqliteConnection, TransactionRepository};

use crate::department::require_department;
use crate::error::LedgerResult;
use crate::ledger::{commit, Ledger};

impl Ledger {
    /// Loads a transaction and checks that it may be revised.
    async fn fetch_mutable(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
    ) -> LedgerResult<InventoryTransaction> {
        let record = TransactionRepository::fetch(conn, id)
            .await?
            .ok_or_else(|| CoreError::not_found("Transaction", id))?;

        let newer =
            TransactionRepository::newer_count(conn, &record.inventory_id, record.sequence).await?;
        self.revision.assert_mutable(&record, self.clock.now(), newer)?;

        Ok(record)
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Re-applies a transaction with patched values.
    ///
    /// ## Errors
    /// * `Forbidden` - Actor below supervisor
    /// * `LockedTransaction` - See [`larder_core::RevisionPolicy::assert_mutable`]
    /// * Any rule error of the patched transaction; nothing is written
    pub async fn update_transaction(
        &self,
        id: &str,
        patch: &TransactionPatch,
        actor: &Actor,
    ) -> LedgerResult<InventoryTransaction> {
        actor.require(Role::Supervisor)?;
        patch.validate()?;

        self.retrying("Transaction", id, move || self.try_update(id, patch, actor))
            .await
    }

    /// Parses a JSON patch and applies it.
    ///
    /// Keys outside `quantity`, `transaction_type`, `notes` and
    /// `department_id` fail with `ImmutableField`.
    pub async fn update_transaction_json(
        &self,
        id: &str,
        patch: &serde_json::Value,
        actor: &Actor,
    ) -> LedgerResult<InventoryTransaction> {
        let patch = TransactionPatch::from_json(patch)?;
        self.update_transaction(id, &patch, actor).await
    }

    async fn try_update(
        &self,
        id: &str,
        patch: &TransactionPatch,
        actor: &Actor,
    ) -> LedgerResult<InventoryTransaction> {
        let mut tx = self.db.begin().await?;

        let record = self.fetch_mutable(&mut tx, id).await?;
        let mut item = InventoryRepository::fetch(&mut tx, &record.inventory_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Inventory", &record.inventory_id))?;

        if let Some(Some(department_id)) = &patch.department_id {
            require_department(&mut tx, department_id).await?;
        }

        let revised = patch.apply_to(&record);
        item.restore(&record.snapshot())?;

        let net_issued = match revised.transaction_type {
            TransactionType::Return => {
                let excluding = Some(record.id.as_str());
                TransactionRepository::net_issued(&mut tx, &item.id, excluding).await?
            }
            _ => 0.0,
        };
        let derivation =
            self.rules
                .apply(&item, revised.transaction_type, revised.quantity, net_issued)?;

        let now = self.clock.now();
        item.set_stock(derivation.level, derivation.status)?;
        item.updated_at = now;
        item.version = InventoryRepository::save(&mut tx, &item).await?;

        let revised = InventoryTransaction {
            resulting_quantity: derivation.resulting_quantity(),
            updated_by_id: Some(actor.id.clone()),
            updated_at: Some(now),
            ..revised
        };
        TransactionRepository::update(&mut tx, &revised).await?;

        commit(tx).await?;

        info!(
            transaction_id = %revised.id,
            inventory_id = %revised.inventory_id,
            transaction_type = %revised.transaction_type,
            quantity = revised.quantity,
            resulting_quantity = revised.resulting_quantity,
            updated_by = %actor.id,
            "Inventory transaction updated"
        );

        Ok(revised)
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Removes the newest transaction of an item and restores its snapshot.
    pub async fn delete_transaction(&self, id: &str, actor: &Actor) -> LedgerResult<()> {
        actor.require(Role::Admin)?;

        self.retrying("Transaction", id, move || self.try_delete(id, actor))
            .await
    }

    async fn try_delete(&self, id: &str, actor: &Actor) -> LedgerResult<()> {
        let mut tx = self.db.begin().await?;

        let record = self.fetch_mutable(&mut tx, id).await?;
        let mut item = InventoryRepository::fetch(&mut tx, &record.inventory_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Inventory", &record.inventory_id))?;

        item.restore(&record.snapshot())?;
        item.updated_at = self.clock.now();
        item.version = InventoryRepository::save(&mut tx, &item).await?;

        TransactionRepository::delete(&mut tx, &record.id).await?;

        commit(tx).await?;

        info!(
            transaction_id = %record.id,
            inventory_id = %record.inventory_id,
            restored_quantity = record.previous_quantity,
            restored_status = %record.previous_status,
            deleted_by = %actor.id,
            "Inventory transaction deleted"
        );

        Ok(())
    }

    // =========================================================================
    // Locking
    // =========================================================================

    /// Locks or unlocks a transaction against revision.
    pub async fn set_transaction_lock(
        &self,
        id: &str,
        locked: bool,
        actor: &Actor,
    ) -> LedgerResult<InventoryTransaction> {
        actor.require(Role::Admin)?;

        let mut tx = self.db.begin().await?;
        let mut record = TransactionRepository::fetch(&mut tx, id)
            .await?
            .ok_or_else(|| CoreError::not_found("Transaction", id))?;

        TransactionRepository::set_locked(&mut tx, id, locked).await?;
        commit(tx).await?;

        record.is_locked = locked;
        info!(transaction_id = %id, locked, "Transaction lock changed");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCode, LedgerError};
    use crate::ledger::test_support::*;
    use chrono::Duration;
    use larder_core::{
        Inventory, InventoryStatus, LockReason, NewDepartment, NewEquipment, NewRawMaterial,
        StockLevel, TransactionIntent,
    };
    use serde_json::json;

    async fn setup_flour(ledger: &Ledger) -> Inventory {
        ledger
            .create_raw_material(
                &NewRawMaterial {
                    name: "Flour".to_string(),
                    quantity: 100.0,
                    critical_threshold: Some(20.0),
                    ..Default::default()
                },
                &supervisor(),
            )
            .await
            .unwrap()
    }

    async fn record(
        ledger: &Ledger,
        id: &str,
        transaction_type: TransactionType,
        quantity: f64,
    ) -> InventoryTransaction {
        ledger
            .process_transaction(
                &TransactionIntent {
                    inventory_id: id.to_string(),
                    transaction_type,
                    quantity,
                    department_id: None,
                    notes: None,
                },
                &supervisor(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_update_reapplies_from_snapshot() {
        let (ledger, _clock) = ledger().await;
        let flour = setup_flour(&ledger).await;
        let issue = record(&ledger, &flour.id, TransactionType::Issue, 30.0).await;

        let revised = ledger
            .update_transaction(
                &issue.id,
                &TransactionPatch {
                    quantity: Some(85.0),
                    ..Default::default()
                },
                &supervisor(),
            )
            .await
            .unwrap();

        assert_eq!(revised.quantity, 85.0);
        assert_eq!(revised.previous_quantity, 100.0);
        assert_eq!(revised.resulting_quantity, 15.0);
        assert_eq!(revised.updated_by_id.as_deref(), Some("user-supervisor"));
        assert!(revised.updated_at.is_some());

        let item = ledger.get_inventory(&flour.id).await.unwrap();
        assert_eq!(item.stock(), StockLevel::RawMaterial { quantity: 15.0 });
        assert_eq!(item.status, InventoryStatus::LowStock);
    }

    #[tokio::test]
    async fn test_update_round_trip_restores_state() {
        let (ledger, _clock) = ledger().await;
        let flour = setup_flour(&ledger).await;
        let issue = record(&ledger, &flour.id, TransactionType::Issue, 85.0).await;
        let before = ledger.get_inventory(&flour.id).await.unwrap();

        ledger
            .update_transaction(
                &issue.id,
                &TransactionPatch {
                    quantity: Some(10.0),
                    transaction_type: Some(TransactionType::WriteOff),
                    ..Default::default()
                },
                &supervisor(),
            )
            .await
            .unwrap();
        let changed = ledger.get_inventory(&flour.id).await.unwrap();
        assert_eq!(changed.stock().quantity(), 90.0);

        ledger
            .update_transaction(&issue.id, &TransactionPatch::from_transaction(&issue), &supervisor())
            .await
            .unwrap();
        let after = ledger.get_inventory(&flour.id).await.unwrap();

        assert_eq!(after.stock(), before.stock());
        assert_eq!(after.status, before.status);
        assert_eq!(after.stock().quantity().to_bits(), before.stock().quantity().to_bits());
    }

    #[tokio::test]
    async fn test_failed_update_rolls_back() {
        let (ledger, _clock) = ledger().await;
        let flour = setup_flour(&ledger).await;
        let issue = record(&ledger, &flour.id, TransactionType::Issue, 10.0).await;
        let before = ledger.get_inventory(&flour.id).await.unwrap();

        let err = ledger
            .update_transaction(
                &issue.id,
                &TransactionPatch {
                    quantity: Some(150.0),
                    ..Default::default()
                },
                &supervisor(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::InsufficientStock { .. })));

        assert_eq!(ledger.get_inventory(&flour.id).await.unwrap(), before);
        assert_eq!(ledger.get_transaction(&issue.id).await.unwrap(), issue);
    }

    #[tokio::test]
    async fn test_updated_return_excludes_itself_from_net_issued() {
        let (ledger, _clock) = ledger().await;
        let mixers = ledger
            .create_equipment(
                &NewEquipment {
                    name: "Mixer".to_string(),
                    total_units: 5,
                    ..Default::default()
                },
                &supervisor(),
            )
            .await
            .unwrap();
        record(&ledger, &mixers.id, TransactionType::Issue, 4.0).await;
        let ret = record(&ledger, &mixers.id, TransactionType::Return, 2.0).await;

        let revised = ledger
            .update_transaction(
                &ret.id,
                &TransactionPatch {
                    quantity: Some(4.0),
                    ..Default::default()
                },
                &supervisor(),
            )
            .await
            .unwrap();
        assert_eq!(revised.resulting_quantity, 5.0);

        let err = ledger
            .update_transaction(
                &ret.id,
                &TransactionPatch {
                    quantity: Some(5.0),
                    ..Default::default()
                },
                &supervisor(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ExceedsIssued);
    }

    #[tokio::test]
    async fn test_only_newest_transaction_is_revisable() {
        let (ledger, _clock) = ledger().await;
        let flour = setup_flour(&ledger).await;
        let first = record(&ledger, &flour.id, TransactionType::Issue, 10.0).await;
        let second = record(&ledger, &flour.id, TransactionType::Issue, 5.0).await;

        let err = ledger.delete_transaction(&first.id, &admin()).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Core(CoreError::LockedTransaction {
                reason: LockReason::NewerTransactions { count: 1 },
                ..
            })
        ));

        ledger.delete_transaction(&second.id, &admin()).await.unwrap();
        let item = ledger.get_inventory(&flour.id).await.unwrap();
        assert_eq!(item.stock().quantity(), second.previous_quantity);
        assert_eq!(item.status, second.previous_status);

        ledger.delete_transaction(&first.id, &admin()).await.unwrap();
        let item = ledger.get_inventory(&flour.id).await.unwrap();
        assert_eq!(item.stock().quantity(), 100.0);
        assert_eq!(item.status, InventoryStatus::InStock);

        let status = ledger.calculate_current_status(&flour.id).await.unwrap();
        assert!(status.consistent);
    }

    #[tokio::test]
    async fn test_system_generated_and_stale_transactions_are_locked() {
        let (ledger, clock) = ledger().await;
        let flour = setup_flour(&ledger).await;

        let history = ledger.transactions_for_inventory(&flour.id).await.unwrap();
        let err = ledger.delete_transaction(&history[0].id, &admin()).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Core(CoreError::LockedTransaction {
                reason: LockReason::SystemGenerated,
                ..
            })
        ));

        let issue = record(&ledger, &flour.id, TransactionType::Issue, 1.0).await;
        clock.advance(Duration::days(31));

        let err = ledger.delete_transaction(&issue.id, &admin()).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Core(CoreError::LockedTransaction {
                reason: LockReason::TooOld { limit_days: 30, .. },
                ..
            })
        ));
        assert_eq!(err.http_status(), 409);
    }

    #[tokio::test]
    async fn test_explicit_lock() {
        let (ledger, _clock) = ledger().await;
        let flour = setup_flour(&ledger).await;
        let issue = record(&ledger, &flour.id, TransactionType::Issue, 1.0).await;

        let err = ledger
            .set_transaction_lock(&issue.id, true, &supervisor())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);

        let locked = ledger.set_transaction_lock(&issue.id, true, &admin()).await.unwrap();
        assert!(locked.is_locked);

        let err = ledger
            .update_transaction(
                &issue.id,
                &TransactionPatch {
                    notes: Some(Some("typo".to_string())),
                    ..Default::default()
                },
                &admin(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Core(CoreError::LockedTransaction {
                reason: LockReason::Locked,
                ..
            })
        ));

        ledger.set_transaction_lock(&issue.id, false, &admin()).await.unwrap();
        ledger.delete_transaction(&issue.id, &admin()).await.unwrap();
    }

    #[tokio::test]
    async fn test_json_patch_rules() {
        let (ledger, _clock) = ledger().await;
        let flour = setup_flour(&ledger).await;
        let kitchen = ledger
            .create_department(
                &NewDepartment {
                    name: "Kitchen".to_string(),
                    description: None,
                },
                &supervisor(),
            )
            .await
            .unwrap();
        let issue = record(&ledger, &flour.id, TransactionType::Issue, 1.0).await;

        let err = ledger
            .update_transaction_json(&issue.id, &json!({ "inventory_id": "other" }), &supervisor())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Core(CoreError::ImmutableField { ref field }) if field == "inventory_id"
        ));

        let revised = ledger
            .update_transaction_json(
                &issue.id,
                &json!({ "department_id": kitchen.id, "notes": "Bread run" }),
                &supervisor(),
            )
            .await
            .unwrap();
        assert_eq!(revised.department_id.as_deref(), Some(kitchen.id.as_str()));
        assert_eq!(revised.notes.as_deref(), Some("Bread run"));
        assert_eq!(revised.quantity, 1.0);

        let cleared = ledger
            .update_transaction_json(&issue.id, &json!({ "notes": null }), &supervisor())
            .await
            .unwrap();
        assert_eq!(cleared.notes, None);
        assert_eq!(cleared.department_id, revised.department_id);

        let err = ledger
            .update_transaction_json(&issue.id, &json!({ "department_id": "dep-x" }), &supervisor())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_revision_role_gates() {
        let (ledger, _clock) = ledger().await;
        let flour = setup_flour(&ledger).await;
        let issue = record(&ledger, &flour.id, TransactionType::Issue, 1.0).await;

        let err = ledger
            .update_transaction(&issue.id, &TransactionPatch::default(), &cashier())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);

        let err = ledger
            .delete_transaction(&issue.id, &supervisor())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Core(CoreError::Forbidden {
                required: Role::Admin,
                ..
            })
        ));
    }
}
