//! # Transaction Processor
//!
//! Records a stock movement and the resulting inventory state in one commit.
//!
//! ## Flow
//! ```text
//! process_transaction(intent, actor)
//!   │
//!   ├── role ≥ supervisor, quantity > 0        (before any I/O)
//!   │
//!   └── unit of work ───────────────────────────────────────────────┐
//!         load item            NotFound                             │
//!         check department     NotFound                             │
//!         net issued (RETURN)  read inside the same transaction     │
//!         Rules::apply         InsufficientStock / ExceedsIssued /  │
//!                              UnsupportedTransactionType           │
//!         save item            version guard ─► Conflict ─► retry   │
//!         insert row           previous_* snapshot + resulting qty  │
//!         commit ◄──────────────────────────────────────────────────┘
//! ```

use tracing::{debug, info};

use larder_core::validation::validate_amount;
use larder_core::{
    Actor, CoreError, InventoryTransaction, Role, TransactionFilter, TransactionIntent,
    TransactionType,
};
use larder_db::{generate_id, InventoryRepository, TransactionRepository};

use crate::department::require_department;
use crate::error::LedgerResult;
use crate::ledger::{commit, Ledger};

impl Ledger {
    /// Applies `intent` to its inventory item and appends the ledger row.
    ///
    /// ## Returns
    /// * `Ok(InventoryTransaction)` - The committed row
    /// * `Err(LedgerError)` - Nothing was written
    pub async fn process_transaction(
        &self,
        intent: &TransactionIntent,
        actor: &Actor,
    ) -> LedgerResult<InventoryTransaction> {
        actor.require(Role::Supervisor)?;
        validate_amount(intent.quantity)?;

        self.retrying("Inventory", &intent.inventory_id, move || {
            self.try_process(intent, actor)
        })
        .await
    }

    async fn try_process(
        &self,
        intent: &TransactionIntent,
        actor: &Actor,
    ) -> LedgerResult<InventoryTransaction> {
        let mut tx = self.db.begin().await?;

        let mut item = InventoryRepository::fetch(&mut tx, &intent.inventory_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Inventory", &intent.inventory_id))?;

        if let Some(department_id) = &intent.department_id {
            require_department(&mut tx, department_id).await?;
        }

        let net_issued = match intent.transaction_type {
            TransactionType::Return => {
                TransactionRepository::net_issued(&mut tx, &item.id, None).await?
            }
            _ => 0.0,
        };

        let derivation =
            self.rules
                .apply(&item, intent.transaction_type, intent.quantity, net_issued)?;

        let snapshot = item.snapshot();
        let now = self.clock.now();

        item.set_stock(derivation.level, derivation.status)?;
        item.updated_at = now;
        item.version = InventoryRepository::save(&mut tx, &item).await?;

        let sequence = TransactionRepository::next_sequence(&mut tx, &item.id).await?;
        let record = InventoryTransaction {
            id: generate_id(),
            inventory_id: item.id.clone(),
            transaction_type: intent.transaction_type,
            quantity: intent.quantity,
            sequence,
            transaction_date: now,
            created_by_id: actor.id.clone(),
            updated_by_id: None,
            department_id: intent.department_id.clone(),
            notes: intent.notes.clone(),
            previous_status: snapshot.status,
            previous_quantity: snapshot.quantity,
            previous_total_units: snapshot.total_units,
            resulting_quantity: derivation.resulting_quantity(),
            is_locked: false,
            is_system_generated: false,
            created_at: now,
            updated_at: None,
        };
        TransactionRepository::insert(&mut tx, &record).await?;

        commit(tx).await?;

        info!(
            transaction_id = %record.id,
            inventory_id = %record.inventory_id,
            transaction_type = %record.transaction_type,
            quantity = record.quantity,
            resulting_quantity = record.resulting_quantity,
            status = %item.status,
            "Inventory transaction recorded"
        );

        Ok(record)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get_transaction(&self, id: &str) -> LedgerResult<InventoryTransaction> {
        self.db
            .transactions()
            .get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::not_found("Transaction", id).into())
    }

    /// Transactions matching `filter`, newest first.
    pub async fn list_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> LedgerResult<Vec<InventoryTransaction>> {
        debug!(?filter, "Listing transactions");
        Ok(self.db.transactions().list(filter).await?)
    }

    /// Full ledger of one item, oldest first.
    pub async fn transactions_for_inventory(
        &self,
        inventory_id: &str,
    ) -> LedgerResult<Vec<InventoryTransaction>> {
        if self.db.inventories().get_by_id(inventory_id).await?.is_none() {
            return Err(CoreError::not_found("Inventory", inventory_id).into());
        }
        Ok(self.db.transactions().history(inventory_id).await?)
    }
}
