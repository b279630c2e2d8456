//! # Inventory Lifecycle
//!
//! Creating, describing and removing inventory items. Stock levels never
//! change here after creation; they move only through the ledger.
//!
//! ## Opening Balance
//! ```text
//! create_raw_material { quantity: 100 }         create_equipment { total_units: 10 }
//!   │                                             │
//!   ├── insert item  (status from threshold)      ├── insert item  (available = total)
//!   └── RESTOCK 100  system-generated,            └── RESTOCK 10   system-generated,
//!                    "Initial inventory creation"                  "Initial inventory creation"
//! ```
//!
//! The opening RESTOCK keeps the ledger reconcilable from the first row and
//! can never be revised. Items created empty get no opening row.

use tracing::info;

use larder_core::rules::{current_status, initial_status, rethreshold_status};
use larder_core::validation::{
    validate_equipment_patch, validate_new_equipment, validate_new_raw_material,
    validate_raw_material_patch,
};
use larder_core::{
    Actor, CoreError, CurrentStatus, EquipmentDetails, EquipmentPatch, Inventory,
    InventoryDetails, InventoryFilter, InventoryKind, InventoryStatus, InventoryTransaction,
    NewEquipment, NewRawMaterial, RawMaterialDetails, RawMaterialPatch, Role, TransactionType,
    ValidationError,
};
use larder_db::{generate_id, InventoryRepository, TransactionRepository};

use crate::error::LedgerResult;
use crate::ledger::{commit, duplicate_name, Ledger};

const NAME_COLUMN: &str = "inventories.name";

/// Note on the system-generated opening RESTOCK.
pub const INITIAL_INVENTORY_NOTE: &str = "Initial inventory creation";

/// Descriptive fields shared by both patch types.
struct CommonPatch<'a> {
    name: Option<&'a str>,
    description: Option<&'a String>,
    price_per_unit: Option<f64>,
    supplier_id: Option<&'a String>,
}

impl CommonPatch<'_> {
    fn apply(&self, item: &mut Inventory) {
        if let Some(name) = self.name {
            item.name = name.trim().to_string();
        }
        if let Some(description) = self.description {
            item.description = Some(description.clone());
        }
        if let Some(price) = self.price_per_unit {
            item.price_per_unit = Some(price);
        }
        if let Some(supplier_id) = self.supplier_id {
            item.supplier_id = Some(supplier_id.clone());
        }
    }
}

fn kind_mismatch(item: &Inventory, expected: InventoryKind) -> CoreError {
    ValidationError::KindMismatch {
        id: item.id.clone(),
        expected: expected.to_string(),
        actual: item.kind().to_string(),
    }
    .into()
}

impl Ledger {
    // =========================================================================
    // Creation
    // =========================================================================

    pub async fn create_raw_material(
        &self,
        input: &NewRawMaterial,
        actor: &Actor,
    ) -> LedgerResult<Inventory> {
        actor.require(Role::Supervisor)?;
        validate_new_raw_material(input)?;

        let details = InventoryDetails::RawMaterial(RawMaterialDetails {
            quantity: input.quantity,
            quantity_unit: input.quantity_unit,
            batch_number: input.batch_number.clone(),
            expiry_date: input.expiry_date,
            critical_threshold: input.critical_threshold,
            is_perishable: input.is_perishable,
        });

        let now = self.clock.now();
        let item = Inventory {
            id: generate_id(),
            name: input.name.trim().to_string(),
            description: input.description.clone(),
            price_per_unit: input.price_per_unit,
            status: InventoryStatus::InStock,
            supplier_id: input.supplier_id.clone(),
            details,
            version: 0,
            created_at: now,
            updated_at: now,
        };

        self.create(item, actor).await
    }

    pub async fn create_equipment(
        &self,
        input: &NewEquipment,
        actor: &Actor,
    ) -> LedgerResult<Inventory> {
        actor.require(Role::Supervisor)?;
        validate_new_equipment(input)?;

        let details = InventoryDetails::Equipment(EquipmentDetails {
            total_units: input.total_units,
            available_units: input.total_units,
            maintenance_schedule: input.maintenance_schedule,
            last_maintained: input.last_maintained,
            maintenance_threshold_hours: input.maintenance_threshold_hours,
        });

        let now = self.clock.now();
        let item = Inventory {
            id: generate_id(),
            name: input.name.trim().to_string(),
            description: input.description.clone(),
            price_per_unit: input.price_per_unit,
            status: InventoryStatus::InStock,
            supplier_id: input.supplier_id.clone(),
            details,
            version: 0,
            created_at: now,
            updated_at: now,
        };

        self.create(item, actor).await
    }

    async fn create(&self, mut item: Inventory, actor: &Actor) -> LedgerResult<Inventory> {
        let stock = item.stock();
        item.status = initial_status(stock, item.critical_threshold());

        let mut tx = self.db.begin().await?;

        InventoryRepository::insert(&mut tx, &item)
            .await
            .map_err(|e| duplicate_name(e, NAME_COLUMN, "Inventory", &item.name))?;

        let opening = stock.quantity();
        if opening > 0.0 {
            let record = InventoryTransaction {
                id: generate_id(),
                inventory_id: item.id.clone(),
                transaction_type: TransactionType::Restock,
                quantity: opening,
                sequence: 1,
                transaction_date: item.created_at,
                created_by_id: actor.id.clone(),
                updated_by_id: None,
                department_id: None,
                notes: Some(INITIAL_INVENTORY_NOTE.to_string()),
                previous_status: InventoryStatus::Depleted,
                previous_quantity: 0.0,
                previous_total_units: stock.total_units().map(|_| 0),
                resulting_quantity: opening,
                is_locked: false,
                is_system_generated: true,
                created_at: item.created_at,
                updated_at: None,
            };
            TransactionRepository::insert(&mut tx, &record).await?;
        }

        commit(tx).await?;

        info!(
            inventory_id = %item.id,
            name = %item.name,
            kind = %item.kind(),
            opening,
            status = %item.status,
            "Inventory created"
        );

        Ok(item)
    }

    // =========================================================================
    // Descriptive Updates
    // =========================================================================

    /// Updates descriptive fields of a raw material.
    ///
    /// ## Errors
    /// * `Validation(KindMismatch)` - `id` is equipment
    /// * `DuplicateName` - New name already taken
    pub async fn update_raw_material(
        &self,
        id: &str,
        patch: &RawMaterialPatch,
        actor: &Actor,
    ) -> LedgerResult<Inventory> {
        actor.require(Role::Manager)?;
        validate_raw_material_patch(patch)?;

        self.retrying("Inventory", id, move || self.try_update_raw_material(id, patch))
            .await
    }

    async fn try_update_raw_material(
        &self,
        id: &str,
        patch: &RawMaterialPatch,
    ) -> LedgerResult<Inventory> {
        let mut tx = self.db.begin().await?;
        let mut item = InventoryRepository::fetch(&mut tx, id)
            .await?
            .ok_or_else(|| CoreError::not_found("Inventory", id))?;

        let InventoryDetails::RawMaterial(raw) = &mut item.details else {
            return Err(kind_mismatch(&item, InventoryKind::RawMaterial).into());
        };
        if let Some(unit) = patch.quantity_unit {
            raw.quantity_unit = unit;
        }
        if let Some(batch) = &patch.batch_number {
            raw.batch_number = Some(batch.clone());
        }
        if let Some(expiry) = patch.expiry_date {
            raw.expiry_date = Some(expiry);
        }
        if let Some(threshold) = patch.critical_threshold {
            raw.critical_threshold = Some(threshold);
            item.status = rethreshold_status(item.status, raw.quantity, raw.critical_threshold);
        }
        if let Some(perishable) = patch.is_perishable {
            raw.is_perishable = perishable;
        }

        CommonPatch {
            name: patch.name.as_deref(),
            description: patch.description.as_ref(),
            price_per_unit: patch.price_per_unit,
            supplier_id: patch.supplier_id.as_ref(),
        }
        .apply(&mut item);

        self.save_descriptive(tx, item).await
    }

    /// Updates descriptive fields of an equipment item.
    pub async fn update_equipment(
        &self,
        id: &str,
        patch: &EquipmentPatch,
        actor: &Actor,
    ) -> LedgerResult<Inventory> {
        actor.require(Role::Manager)?;
        validate_equipment_patch(patch)?;

        self.retrying("Inventory", id, move || self.try_update_equipment(id, patch))
            .await
    }

    async fn try_update_equipment(
        &self,
        id: &str,
        patch: &EquipmentPatch,
    ) -> LedgerResult<Inventory> {
        let mut tx = self.db.begin().await?;
        let mut item = InventoryRepository::fetch(&mut tx, id)
            .await?
            .ok_or_else(|| CoreError::not_found("Inventory", id))?;

        let InventoryDetails::Equipment(eq) = &mut item.details else {
            return Err(kind_mismatch(&item, InventoryKind::Equipment).into());
        };
        if let Some(schedule) = patch.maintenance_schedule {
            eq.maintenance_schedule = Some(schedule);
        }
        if let Some(maintained) = patch.last_maintained {
            eq.last_maintained = Some(maintained);
        }
        if let Some(hours) = patch.maintenance_threshold_hours {
            eq.maintenance_threshold_hours = Some(hours);
        }

        CommonPatch {
            name: patch.name.as_deref(),
            description: patch.description.as_ref(),
            price_per_unit: patch.price_per_unit,
            supplier_id: patch.supplier_id.as_ref(),
        }
        .apply(&mut item);

        self.save_descriptive(tx, item).await
    }

    async fn save_descriptive(
        &self,
        mut tx: larder_db::Transaction<'static, larder_db::Sqlite>,
        mut item: Inventory,
    ) -> LedgerResult<Inventory> {
        item.updated_at = self.clock.now();
        item.version = InventoryRepository::save(&mut tx, &item)
            .await
            .map_err(|e| duplicate_name(e, NAME_COLUMN, "Inventory", &item.name))?;
        commit(tx).await?;

        info!(inventory_id = %item.id, version = item.version, "Inventory updated");
        Ok(item)
    }

    // =========================================================================
    // Deletion
    // =========================================================================

    /// Deletes an item with no ledger history.
    ///
    /// ## Errors
    /// * `InventoryInUse` - Any transaction references the item
    pub async fn delete_inventory(&self, id: &str, actor: &Actor) -> LedgerResult<()> {
        actor.require(Role::Admin)?;

        let mut tx = self.db.begin().await?;
        if InventoryRepository::fetch(&mut tx, id).await?.is_none() {
            return Err(CoreError::not_found("Inventory", id).into());
        }

        let transactions = TransactionRepository::count_for_inventory(&mut tx, id).await?;
        if transactions > 0 {
            return Err(CoreError::InventoryInUse {
                id: id.to_string(),
                transactions,
            }
            .into());
        }

        InventoryRepository::delete(&mut tx, id).await?;
        commit(tx).await?;

        info!(inventory_id = %id, "Inventory deleted");
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get_inventory(&self, id: &str) -> LedgerResult<Inventory> {
        self.db
            .inventories()
            .get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::not_found("Inventory", id).into())
    }

    pub async fn list_inventory(&self, filter: &InventoryFilter) -> LedgerResult<Vec<Inventory>> {
        Ok(self.db.inventories().list(filter).await?)
    }

    /// Compares the stored stock of an item with what its ledger implies.
    pub async fn calculate_current_status(&self, inventory_id: &str) -> LedgerResult<CurrentStatus> {
        let item = self.get_inventory(inventory_id).await?;
        let history = self.db.transactions().history(inventory_id).await?;

        let status = current_status(&item, &history, self.reports.low_stock_ratio);
        if !status.consistent {
            tracing::warn!(
                inventory_id,
                stored = status.stored.quantity(),
                ledger = status.ledger.quantity(),
                "Stored stock disagrees with ledger"
            );
        }
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCode, LedgerError};
    use crate::ledger::test_support::*;
    use larder_core::{QuantityUnit, StockLevel, TransactionIntent};

    fn butter() -> NewRawMaterial {
        NewRawMaterial {
            name: "Butter".to_string(),
            price_per_unit: Some(8.0),
            quantity: 40.0,
            quantity_unit: QuantityUnit::Kg,
            critical_threshold: Some(5.0),
            is_perishable: true,
            ..Default::default()
        }
    }

    fn ovens() -> NewEquipment {
        NewEquipment {
            name: "Oven".to_string(),
            total_units: 4,
            ..Default::default()
        }
    }

    async fn record(ledger: &Ledger, id: &str, transaction_type: TransactionType, quantity: f64) {
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
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_records_opening_restock() {
        let (ledger, _clock) = ledger().await;
        let item = ledger.create_raw_material(&butter(), &supervisor()).await.unwrap();

        let history = ledger.transactions_for_inventory(&item.id).await.unwrap();
        assert_eq!(history.len(), 1);
        let opening = &history[0];
        assert_eq!(opening.transaction_type, TransactionType::Restock);
        assert_eq!(opening.quantity, 40.0);
        assert!(opening.is_system_generated);
        assert_eq!(opening.notes.as_deref(), Some(INITIAL_INVENTORY_NOTE));
        assert_eq!(opening.created_by_id, "user-supervisor");

        let equipment = ledger.create_equipment(&ovens(), &supervisor()).await.unwrap();
        assert_eq!(
            equipment.stock(),
            StockLevel::Equipment {
                available_units: 4,
                total_units: 4
            }
        );
        assert_eq!(equipment.status, InventoryStatus::InStock);
    }

    #[tokio::test]
    async fn test_create_empty_item_has_no_history() {
        let (ledger, _clock) = ledger().await;
        let empty = NewRawMaterial {
            name: "Saffron".to_string(),
            critical_threshold: Some(1.0),
            ..Default::default()
        };
        let item = ledger.create_raw_material(&empty, &supervisor()).await.unwrap();

        assert_eq!(item.status, InventoryStatus::Depleted);
        assert!(ledger
            .transactions_for_inventory(&item.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_inventory_name() {
        let (ledger, _clock) = ledger().await;
        ledger.create_raw_material(&butter(), &supervisor()).await.unwrap();

        let err = ledger
            .create_equipment(
                &NewEquipment {
                    name: "Butter".to_string(),
                    ..ovens()
                },
                &supervisor(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Core(CoreError::DuplicateName { entity: "Inventory", .. })
        ));
        assert_eq!(ledger.list_inventory(&InventoryFilter::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_descriptive_fields_only() {
        let (ledger, _clock) = ledger().await;
        let item = ledger.create_raw_material(&butter(), &supervisor()).await.unwrap();

        let updated = ledger
            .update_raw_material(
                &item.id,
                &RawMaterialPatch {
                    name: Some("Salted Butter".to_string()),
                    price_per_unit: Some(9.5),
                    batch_number: Some("B-204".to_string()),
                    ..Default::default()
                },
                &admin(),
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Salted Butter");
        assert_eq!(updated.price_per_unit, Some(9.5));
        assert_eq!(updated.stock(), item.stock());
        assert_eq!(updated.version, item.version + 1);
        assert_eq!(
            updated.as_raw_material().and_then(|raw| raw.batch_number.as_deref()),
            Some("B-204")
        );
        assert_eq!(ledger.get_inventory(&item.id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_update_through_wrong_kind() {
        let (ledger, _clock) = ledger().await;
        let oven = ledger.create_equipment(&ovens(), &supervisor()).await.unwrap();

        let err = ledger
            .update_raw_material(&oven.id, &RawMaterialPatch::default(), &admin())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Core(CoreError::Validation(ValidationError::KindMismatch { .. }))
        ));

        let err = ledger
            .update_equipment(&oven.id, &EquipmentPatch::default(), &supervisor())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[tokio::test]
    async fn test_delete_requires_empty_ledger() {
        let (ledger, _clock) = ledger().await;
        let stocked = ledger.create_raw_material(&butter(), &supervisor()).await.unwrap();

        let err = ledger.delete_inventory(&stocked.id, &admin()).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Core(CoreError::InventoryInUse { transactions: 1, .. })
        ));

        let empty = ledger
            .create_equipment(
                &NewEquipment {
                    name: "Spare Oven".to_string(),
                    total_units: 0,
                    ..Default::default()
                },
                &supervisor(),
            )
            .await
            .unwrap();
        ledger.delete_inventory(&empty.id, &admin()).await.unwrap();
        assert_eq!(
            ledger.get_inventory(&empty.id).await.unwrap_err().code(),
            ErrorCode::NotFound
        );
    }

    #[tokio::test]
    async fn test_reconciliation_matches_ledger() {
        let (ledger, _clock) = ledger().await;
        let item = ledger.create_raw_material(&butter(), &supervisor()).await.unwrap();

        record(&ledger, &item.id, TransactionType::Issue, 12.5).await;
        record(&ledger, &item.id, TransactionType::Return, 2.5).await;
        record(&ledger, &item.id, TransactionType::Restock, 10.0).await;
        record(&ledger, &item.id, TransactionType::WriteOff, 3.0).await;
        record(&ledger, &item.id, TransactionType::Damage, 1.0).await;

        let status = ledger.calculate_current_status(&item.id).await.unwrap();
        // 40 + 10 + 2.5 - 12.5 - 3 - 1
        assert_eq!(status.stored, StockLevel::RawMaterial { quantity: 36.0 });
        assert_eq!(status.ledger, status.stored);
        assert!(status.consistent);
        assert!(!status.is_low);
        assert_eq!(status.transaction_count, 6);
    }

    #[tokio::test]
    async fn test_equipment_units_never_exceed_total() {
        let (ledger, _clock) = ledger().await;
        let oven = ledger.create_equipment(&ovens(), &supervisor()).await.unwrap();

        record(&ledger, &oven.id, TransactionType::Issue, 3.0).await;
        record(&ledger, &oven.id, TransactionType::Restock, 2.0).await;
        record(&ledger, &oven.id, TransactionType::Return, 3.0).await;

        let status = ledger.calculate_current_status(&oven.id).await.unwrap();
        assert_eq!(
            status.stored,
            StockLevel::Equipment {
                available_units: 6,
                total_units: 6
            }
        );
        assert!(status.consistent);
    }

    #[tokio::test]
    async fn test_equipment_low_follows_configured_ratio() {
        let mut config = crate::config::LedgerConfig::default();
        config.reports.low_stock_ratio = 0.5;
        let (ledger, _clock) = ledger_with_config(&config).await;
        let oven = ledger.create_equipment(&ovens(), &supervisor()).await.unwrap();

        record(&ledger, &oven.id, TransactionType::Issue, 2.0).await;

        let status = ledger.calculate_current_status(&oven.id).await.unwrap();
        assert!(status.is_low);

        let larder_core::Report::LowStock(report) =
            ledger.generate_report_by_name("low_stock").await.unwrap()
        else {
            panic!("expected a low stock report");
        };
        assert!(report.items.iter().any(|entry| entry.inventory_id == oven.id));

        let (default_ledger, _clock) = crate::ledger::test_support::ledger().await;
        let oven = default_ledger.create_equipment(&ovens(), &supervisor()).await.unwrap();
        record(&default_ledger, &oven.id, TransactionType::Issue, 2.0).await;
        assert!(!default_ledger.calculate_current_status(&oven.id).await.unwrap().is_low);
    }

    #[tokio::test]
    async fn test_threshold_change_rederives_status() {
        let (ledger, _clock) = ledger().await;
        let item = ledger.create_raw_material(&butter(), &supervisor()).await.unwrap();
        record(&ledger, &item.id, TransactionType::Issue, 36.0).await;
        assert_eq!(ledger.get_inventory(&item.id).await.unwrap().status, InventoryStatus::LowStock);

        let lowered = RawMaterialPatch {
            critical_threshold: Some(2.0),
            ..Default::default()
        };
        let updated = ledger.update_raw_material(&item.id, &lowered, &admin()).await.unwrap();
        assert_eq!(updated.status, InventoryStatus::InStock);

        let raised = RawMaterialPatch {
            critical_threshold: Some(4.0),
            ..Default::default()
        };
        let updated = ledger.update_raw_material(&item.id, &raised, &admin()).await.unwrap();
        assert_eq!(updated.status, InventoryStatus::LowStock);
    }
}
