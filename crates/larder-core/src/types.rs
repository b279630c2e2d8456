//! # Domain Types
//!
//! Core domain types used throughout Larder.
//!
//! An [`Inventory`] item carries a version for optimistic locking. Every
//! [`InventoryTransaction`] on it records the stock it replaced, so a revision
//! can restore it.
//!
//! ## Kind as a Sum Type
//! An item is exactly one of raw material or equipment. That is expressed by
//! [`InventoryDetails`], so code that needs the quantity of a raw material
//! has to match on the variant instead of reading a nullable column.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};

// =============================================================================
// Inventory Kind
// =============================================================================

/// Discriminator for [`InventoryDetails`].
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InventoryKind {
    RawMaterial,
    Equipment,
}

impl InventoryKind {
    pub const ALL: [InventoryKind; 2] = [InventoryKind::RawMaterial, InventoryKind::Equipment];

    pub fn as_str(&self) -> &'static str {
        match self {
            InventoryKind::RawMaterial => "raw_material",
            InventoryKind::Equipment => "equipment",
        }
    }
}

impl std::fmt::Display for InventoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InventoryKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "raw_material" | "raw" => Ok(InventoryKind::RawMaterial),
            "equipment" => Ok(InventoryKind::Equipment),
            _ => Err(ValidationError::NotAllowed {
                field: "inventory_type".to_string(),
                allowed: InventoryKind::ALL.iter().map(|k| k.as_str().to_string()).collect(),
            }),
        }
    }
}

// =============================================================================
// Inventory Status
// =============================================================================

/// Current status of an inventory item.
///
/// Derived by the ledger rules, never set directly by callers.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InventoryStatus {
    InStock,
    Issued,
    Returned,
    Depleted,
    LowStock,
    Maintenance,
    Damaged,
    Expired,
    Decommissioned,
}

impl InventoryStatus {
    pub const ALL: [InventoryStatus; 9] = [
        InventoryStatus::InStock,
        InventoryStatus::Issued,
        InventoryStatus::Returned,
        InventoryStatus::Depleted,
        InventoryStatus::LowStock,
        InventoryStatus::Maintenance,
        InventoryStatus::Damaged,
        InventoryStatus::Expired,
        InventoryStatus::Decommissioned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InventoryStatus::InStock => "in_stock",
            InventoryStatus::Issued => "issued",
            InventoryStatus::Returned => "returned",
            InventoryStatus::Depleted => "depleted",
            InventoryStatus::LowStock => "low_stock",
            InventoryStatus::Maintenance => "maintenance",
            InventoryStatus::Damaged => "damaged",
            InventoryStatus::Expired => "expired",
            InventoryStatus::Decommissioned => "decommissioned",
        }
    }
}

impl std::fmt::Display for InventoryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InventoryStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        InventoryStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "status".to_string(),
                allowed: InventoryStatus::ALL.iter().map(|s| s.as_str().to_string()).collect(),
            })
    }
}

// =============================================================================
// Transaction Type
// =============================================================================

/// The kind of stock movement a transaction records.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Issue,
    Restock,
    Return,
    Damage,
    WriteOff,
    Maintenance,
}

impl TransactionType {
    pub const ALL: [TransactionType; 6] = [
        TransactionType::Issue,
        TransactionType::Restock,
        TransactionType::Return,
        TransactionType::Damage,
        TransactionType::WriteOff,
        TransactionType::Maintenance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Issue => "issue",
            TransactionType::Restock => "restock",
            TransactionType::Return => "return",
            TransactionType::Damage => "damage",
            TransactionType::WriteOff => "write_off",
            TransactionType::Maintenance => "maintenance",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionType {
    type Err = CoreError;

    /// Accepts the snake_case names, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        TransactionType::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| CoreError::UnsupportedTransactionType {
                transaction_type: s.to_string(),
                kind: "any inventory".to_string(),
            })
    }
}

// =============================================================================
// Quantity Unit
// =============================================================================

/// Unit a raw material is measured in.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum QuantityUnit {
    Kg,
    Gram,
    Liter,
    Milliliter,
    #[default]
    Piece,
    Count,
}

// =============================================================================
// Inventory
// =============================================================================

/// Kind-specific fields of a raw material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RawMaterialDetails {
    /// On-hand quantity, never negative.
    pub quantity: f64,
    pub quantity_unit: QuantityUnit,
    pub batch_number: Option<String>,
    #[ts(as = "Option<String>")]
    pub expiry_date: Option<NaiveDate>,
    /// At or below this quantity the item is `low_stock`. `None` disables the check.
    pub critical_threshold: Option<f64>,
    pub is_perishable: bool,
}

/// Kind-specific fields of a piece of equipment.
///
/// Invariant: `0 <= available_units <= total_units`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct EquipmentDetails {
    pub total_units: i64,
    pub available_units: i64,
    #[ts(as = "Option<String>")]
    pub maintenance_schedule: Option<NaiveDate>,
    #[ts(as = "Option<String>")]
    pub last_maintained: Option<NaiveDate>,
    pub maintenance_threshold_hours: Option<i64>,
}

/// Kind-specific payload of an inventory item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "inventory_type", rename_all = "snake_case")]
pub enum InventoryDetails {
    RawMaterial(RawMaterialDetails),
    Equipment(EquipmentDetails),
}

impl InventoryDetails {
    pub fn kind(&self) -> InventoryKind {
        match self {
            InventoryDetails::RawMaterial(_) => InventoryKind::RawMaterial,
            InventoryDetails::Equipment(_) => InventoryKind::Equipment,
        }
    }
}

/// An inventory item tracked by the ledger.
///
/// ## Derived State
/// `status` and the stock fields inside `details` are owned by the ledger.
/// They change only when a transaction is recorded, revised or deleted, and
/// every such change bumps `version`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Inventory {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub price_per_unit: Option<f64>,
    pub status: InventoryStatus,
    pub supplier_id: Option<String>,
    pub details: InventoryDetails,
    /// Optimistic concurrency counter.
    pub version: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Inventory {
    pub fn kind(&self) -> InventoryKind {
        self.details.kind()
    }

    pub fn as_raw_material(&self) -> Option<&RawMaterialDetails> {
        match &self.details {
            InventoryDetails::RawMaterial(raw) => Some(raw),
            InventoryDetails::Equipment(_) => None,
        }
    }

    pub fn as_equipment(&self) -> Option<&EquipmentDetails> {
        match &self.details {
            InventoryDetails::Equipment(eq) => Some(eq),
            InventoryDetails::RawMaterial(_) => None,
        }
    }

    /// Current stock level.
    pub fn stock(&self) -> StockLevel {
        match &self.details {
            InventoryDetails::RawMaterial(raw) => StockLevel::RawMaterial {
                quantity: raw.quantity,
            },
            InventoryDetails::Equipment(eq) => StockLevel::Equipment {
                available_units: eq.available_units,
                total_units: eq.total_units,
            },
        }
    }

    /// The low-stock threshold, raw materials only.
    pub fn critical_threshold(&self) -> Option<f64> {
        self.as_raw_material().and_then(|raw| raw.critical_threshold)
    }

    /// Captures the state a transaction must be able to restore.
    pub fn snapshot(&self) -> StockSnapshot {
        let stock = self.stock();
        StockSnapshot {
            status: self.status,
            quantity: stock.quantity(),
            total_units: stock.total_units(),
        }
    }

    /// Writes a stock level and status into the item.
    ///
    /// Fails with `KindMismatch` if `level` belongs to the other kind.
    pub fn set_stock(&mut self, level: StockLevel, status: InventoryStatus) -> CoreResult<()> {
        match (&mut self.details, level) {
            (InventoryDetails::RawMaterial(raw), StockLevel::RawMaterial { quantity }) => {
                raw.quantity = quantity;
            }
            (
                InventoryDetails::Equipment(eq),
                StockLevel::Equipment {
                    available_units,
                    total_units,
                },
            ) => {
                eq.available_units = available_units;
                eq.total_units = total_units;
            }
            (details, level) => {
                return Err(ValidationError::KindMismatch {
                    id: self.id.clone(),
                    expected: level.kind().to_string(),
                    actual: details.kind().to_string(),
                }
                .into());
            }
        }
        self.status = status;
        Ok(())
    }

    /// Puts the item back to the state captured in `snapshot`.
    pub fn restore(&mut self, snapshot: &StockSnapshot) -> CoreResult<()> {
        let level = match &self.details {
            InventoryDetails::RawMaterial(_) => StockLevel::RawMaterial {
                quantity: snapshot.quantity,
            },
            InventoryDetails::Equipment(eq) => StockLevel::Equipment {
                available_units: snapshot.quantity as i64,
                total_units: snapshot.total_units.unwrap_or(eq.total_units),
            },
        };
        self.set_stock(level, snapshot.status)
    }
}

// =============================================================================
// Stock Level & Snapshot
// =============================================================================

/// The mutable stock fields of an item, per kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StockLevel {
    RawMaterial { quantity: f64 },
    Equipment { available_units: i64, total_units: i64 },
}

impl StockLevel {
    pub fn kind(&self) -> InventoryKind {
        match self {
            StockLevel::RawMaterial { .. } => InventoryKind::RawMaterial,
            StockLevel::Equipment { .. } => InventoryKind::Equipment,
        }
    }

    /// Scalar quantity: raw quantity, or available units for equipment.
    pub fn quantity(&self) -> f64 {
        match self {
            StockLevel::RawMaterial { quantity } => *quantity,
            StockLevel::Equipment {
                available_units, ..
            } => *available_units as f64,
        }
    }

    pub fn total_units(&self) -> Option<i64> {
        match self {
            StockLevel::RawMaterial { .. } => None,
            StockLevel::Equipment { total_units, .. } => Some(*total_units),
        }
    }
}

/// Undo state stored on every transaction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockSnapshot {
    pub status: InventoryStatus,
    /// Raw quantity, or available units for equipment.
    pub quantity: f64,
    /// Equipment only.
    pub total_units: Option<i64>,
}

// =============================================================================
// Inventory Transaction
// =============================================================================

/// One recorded stock movement.
///
/// ## Snapshot Pattern
/// `previous_status`, `previous_quantity` and `previous_total_units` are the
/// item state right before this transaction was applied. Revising or
/// deleting the transaction restores exactly that state.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventoryTransaction {
    pub id: String,
    pub inventory_id: String,
    pub transaction_type: TransactionType,
    pub quantity: f64,
    /// Position in the item's ledger, starting at 1.
    pub sequence: i64,
    #[ts(as = "String")]
    pub transaction_date: DateTime<Utc>,
    pub created_by_id: String,
    pub updated_by_id: Option<String>,
    pub department_id: Option<String>,
    pub notes: Option<String>,
    pub previous_status: InventoryStatus,
    pub previous_quantity: f64,
    pub previous_total_units: Option<i64>,
    pub resulting_quantity: f64,
    pub is_locked: bool,
    pub is_system_generated: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl InventoryTransaction {
    pub fn snapshot(&self) -> StockSnapshot {
        StockSnapshot {
            status: self.previous_status,
            quantity: self.previous_quantity,
            total_units: self.previous_total_units,
        }
    }
}

/// A request to record a new transaction.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TransactionIntent {
    pub inventory_id: String,
    pub transaction_type: TransactionType,
    pub quantity: f64,
    #[serde(default)]
    pub department_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

// =============================================================================
// Department
// =============================================================================

/// A department transactions can be attributed to.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Department {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewDepartment {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(deny_unknown_fields)]
pub struct DepartmentPatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

// =============================================================================
// Creation Inputs
// =============================================================================

/// Input for creating a raw material.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewRawMaterial {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price_per_unit: Option<f64>,
    #[serde(default)]
    pub supplier_id: Option<String>,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub quantity_unit: QuantityUnit,
    #[serde(default)]
    pub batch_number: Option<String>,
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub critical_threshold: Option<f64>,
    #[serde(default)]
    pub is_perishable: bool,
}

/// Input for creating equipment. All units start available.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewEquipment {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price_per_unit: Option<f64>,
    #[serde(default)]
    pub supplier_id: Option<String>,
    #[serde(default)]
    pub total_units: i64,
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub maintenance_schedule: Option<NaiveDate>,
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub last_maintained: Option<NaiveDate>,
    #[serde(default)]
    pub maintenance_threshold_hours: Option<i64>,
}

// =============================================================================
// Update Patches
// =============================================================================
// Stock fields are absent on purpose: quantities only move through the ledger.

/// Descriptive fields of a raw material that may be edited.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(deny_unknown_fields)]
pub struct RawMaterialPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_per_unit: Option<f64>,
    pub supplier_id: Option<String>,
    pub quantity_unit: Option<QuantityUnit>,
    pub batch_number: Option<String>,
    #[ts(as = "Option<String>")]
    pub expiry_date: Option<NaiveDate>,
    /// Moves an `in_stock` or `low_stock` item across the new threshold.
    pub critical_threshold: Option<f64>,
    pub is_perishable: Option<bool>,
}

/// Descriptive fields of equipment that may be edited.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(deny_unknown_fields)]
pub struct EquipmentPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_per_unit: Option<f64>,
    pub supplier_id: Option<String>,
    #[ts(as = "Option<String>")]
    pub maintenance_schedule: Option<NaiveDate>,
    #[ts(as = "Option<String>")]
    pub last_maintained: Option<NaiveDate>,
    pub maintenance_threshold_hours: Option<i64>,
}

// =============================================================================
// Query Filters
// =============================================================================

/// Column an inventory listing is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InventorySort {
    #[default]
    Name,
    CreatedAt,
    UpdatedAt,
    PricePerUnit,
    /// Quantity on hand, or available units for equipment.
    Quantity,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Filters for listing inventory items. Unset fields and empty lists do not
/// filter; ranges are inclusive.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct InventoryFilter {
    pub kind: Option<InventoryKind>,
    /// Any of these statuses.
    pub statuses: Vec<InventoryStatus>,
    /// Case-insensitive match against name or description.
    pub search: Option<String>,
    pub supplier_ids: Vec<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    /// Bounds on quantity for raw materials and available units for equipment.
    pub min_quantity: Option<f64>,
    pub max_quantity: Option<f64>,
    #[ts(as = "Option<String>")]
    pub created_from: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub created_to: Option<DateTime<Utc>>,
    pub sort_by: InventorySort,
    pub sort_order: SortOrder,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Filters for listing transactions. Results are newest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TransactionFilter {
    pub inventory_id: Option<String>,
    pub transaction_type: Option<TransactionType>,
    pub inventory_type: Option<InventoryKind>,
    pub department_id: Option<String>,
    #[ts(as = "Option<String>")]
    pub start: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub end: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn flour() -> Inventory {
        let now = Utc::now();
        Inventory {
            id: "inv-flour".to_string(),
            name: "Flour".to_string(),
            description: None,
            price_per_unit: Some(2.5),
            status: InventoryStatus::InStock,
            supplier_id: None,
            details: InventoryDetails::RawMaterial(RawMaterialDetails {
                quantity: 40.0,
                quantity_unit: QuantityUnit::Kg,
                batch_number: None,
                expiry_date: None,
                critical_threshold: Some(10.0),
                is_perishable: false,
            }),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_enum_string_round_trip() {
        for status in InventoryStatus::ALL {
            assert_eq!(status.as_str().parse::<InventoryStatus>().unwrap(), status);
        }
        assert_eq!(
            "WRITE_OFF".parse::<TransactionType>().unwrap(),
            TransactionType::WriteOff
        );
        assert!(matches!(
            "transfer".parse::<TransactionType>(),
            Err(CoreError::UnsupportedTransactionType { .. })
        ));
    }

    #[test]
    fn test_details_serialize_with_kind_tag() {
        let json = serde_json::to_value(&flour().details).unwrap();
        assert_eq!(json["inventory_type"], "raw_material");
        assert_eq!(json["quantity"], 40.0);
        assert_eq!(json["quantity_unit"], "kg");
    }

    #[test]
    fn test_snapshot_and_restore() {
        let mut item = flour();
        let snapshot = item.snapshot();

        item.set_stock(StockLevel::RawMaterial { quantity: 5.0 }, InventoryStatus::LowStock)
            .unwrap();
        assert_eq!(item.stock().quantity(), 5.0);

        item.restore(&snapshot).unwrap();
        assert_eq!(item.stock().quantity(), 40.0);
        assert_eq!(item.status, InventoryStatus::InStock);
    }

    #[test]
    fn test_set_stock_rejects_other_kind() {
        let mut item = flour();
        let result = item.set_stock(
            StockLevel::Equipment {
                available_units: 1,
                total_units: 1,
            },
            InventoryStatus::InStock,
        );
        assert!(matches!(
            result,
            Err(CoreError::Validation(ValidationError::KindMismatch { .. }))
        ));
    }

    #[test]
    fn test_patch_rejects_stock_fields() {
        let result: Result<RawMaterialPatch, _> =
            serde_json::from_str(r#"{"name": "Rye", "quantity": 3}"#);
        assert!(result.is_err());
    }
}
