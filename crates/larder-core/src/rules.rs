//! # Status Derivation Rules
//!
//! Pure functions mapping (current stock, transaction) to new stock and status.
//!
//! ## Rule Table
//! ```text
//! ┌────────────┬──────────────────────────────────┬──────────────────────────────────┐
//! │ Type       │ Raw material (quantity)          │ Equipment (available / total)    │
//! ├────────────┼──────────────────────────────────┼──────────────────────────────────┤
//! │ ISSUE      │ q - n, guard n <= q              │ a - n, guard n <= a              │
//! │            │ depleted / low_stock / unchanged │ issued when a hits 0             │
//! │ RESTOCK    │ q + n, in_stock (*)              │ a + n, t + n, in_stock           │
//! │ RETURN     │ q + n, guard n <= net issued     │ a + n, guard n <= net issued     │
//! │            │ in_stock (*)                     │ and n <= t - a; returned at a==t │
//! │ WRITE_OFF  │ q - n, depleted at 0 (*)         │ a - n, depleted at 0             │
//! │ DAMAGE     │ q - n, damaged                   │ a - n, damaged                   │
//! │ MAINTENANCE│ unsupported                      │ maintenance, units unchanged     │
//! └────────────┴──────────────────────────────────┴──────────────────────────────────┘
//!  (*) depends on StatusPolicy
//! ```
//!
//! Net issued is `Σ ISSUE - Σ RETURN` over the item's ledger. Callers read it
//! inside the same database transaction as the write it gates and pass it in;
//! the rules only consult it for RETURN.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{
    Inventory, InventoryKind, InventoryStatus, InventoryTransaction, StockLevel, TransactionType,
};
use crate::validation::{validate_amount, validate_units};

/// Slack for float comparisons on raw quantities.
const EPSILON: f64 = 1e-9;

// =============================================================================
// Status Policy
// =============================================================================

/// How raw-material status is derived after stock goes up or is written off.
///
/// ## Policies
/// ```text
/// LITERAL                               THRESHOLD_AWARE (default)
/// ───────                               ─────────────────────────
/// RESTOCK/RETURN → in_stock             RESTOCK/RETURN → depleted / low_stock /
///                                                        in_stock by threshold
/// WRITE_OFF → depleted at 0,            WRITE_OFF → depleted / low_stock /
///             otherwise unchanged                   unchanged by threshold
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusPolicy {
    /// Stock increases always reset to `in_stock`.
    Literal,

    /// Every stock change re-checks the critical threshold.
    #[default]
    ThresholdAware,
}

impl std::fmt::Display for StatusPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusPolicy::Literal => write!(f, "literal"),
            StatusPolicy::ThresholdAware => write!(f, "threshold_aware"),
        }
    }
}

impl std::str::FromStr for StatusPolicy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "literal" => Ok(StatusPolicy::Literal),
            "threshold_aware" | "threshold" => Ok(StatusPolicy::ThresholdAware),
            _ => Err(ValidationError::NotAllowed {
                field: "status_policy".to_string(),
                allowed: vec!["literal".to_string(), "threshold_aware".to_string()],
            }),
        }
    }
}

// =============================================================================
// Derivation
// =============================================================================

/// Result of applying one transaction to an item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Derivation {
    pub level: StockLevel,
    pub status: InventoryStatus,
}

impl Derivation {
    /// Scalar quantity to store as `resulting_quantity`.
    pub fn resulting_quantity(&self) -> f64 {
        self.level.quantity()
    }
}

/// The derivation rules under a given status policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rules {
    policy: StatusPolicy,
}

impl Rules {
    pub fn new(policy: StatusPolicy) -> Self {
        Rules { policy }
    }

    pub fn policy(&self) -> StatusPolicy {
        self.policy
    }

    /// Applies `amount` of `transaction_type` to the current state of `item`.
    ///
    /// ## Arguments
    /// * `item` - Current inventory state (not modified)
    /// * `transaction_type` - Movement to apply
    /// * `amount` - Positive amount; whole units for equipment
    /// * `net_issued` - `Σ ISSUE - Σ RETURN` for the item, consulted for RETURN only
    ///
    /// ## Returns
    /// * `Ok(Derivation)` - New stock level and status
    /// * `Err(CoreError)` - Amount invalid, stock insufficient, return too large,
    ///   or transaction type not applicable to the item's kind
    pub fn apply(
        &self,
        item: &Inventory,
        transaction_type: TransactionType,
        amount: f64,
        net_issued: f64,
    ) -> CoreResult<Derivation> {
        match item.stock() {
            StockLevel::RawMaterial { quantity } => {
                validate_amount(amount)?;
                self.raw_material(
                    &item.id,
                    quantity,
                    item.status,
                    item.critical_threshold(),
                    transaction_type,
                    amount,
                    net_issued,
                )
            }
            StockLevel::Equipment {
                available_units,
                total_units,
            } => {
                let units = validate_units(amount)?;
                equipment(
                    &item.id,
                    available_units,
                    total_units,
                    item.status,
                    transaction_type,
                    units,
                    net_issued.round() as i64,
                )
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn raw_material(
        &self,
        inventory_id: &str,
        current: f64,
        status: InventoryStatus,
        threshold: Option<f64>,
        transaction_type: TransactionType,
        amount: f64,
        net_issued: f64,
    ) -> CoreResult<Derivation> {
        let (quantity, status) = match transaction_type {
            TransactionType::Issue => {
                let quantity = take_stock(inventory_id, current, amount)?;
                (quantity, threshold_status(quantity, threshold).unwrap_or(status))
            }
            TransactionType::Restock => {
                let quantity = current + amount;
                (quantity, self.status_after_increase(quantity, threshold))
            }
            TransactionType::Return => {
                if amount > net_issued + EPSILON {
                    return Err(CoreError::ExceedsIssued {
                        inventory_id: inventory_id.to_string(),
                        returnable: net_issued.max(0.0),
                        requested: amount,
                    });
                }
                let quantity = current + amount;
                (quantity, self.status_after_increase(quantity, threshold))
            }
            TransactionType::WriteOff => {
                let quantity = take_stock(inventory_id, current, amount)?;
                let status = match self.policy {
                    StatusPolicy::Literal if quantity <= 0.0 => InventoryStatus::Depleted,
                    StatusPolicy::Literal => status,
                    StatusPolicy::ThresholdAware => {
                        threshold_status(quantity, threshold).unwrap_or(status)
                    }
                };
                (quantity, status)
            }
            TransactionType::Damage => {
                let quantity = take_stock(inventory_id, current, amount)?;
                (quantity, InventoryStatus::Damaged)
            }
            TransactionType::Maintenance => {
                return Err(CoreError::UnsupportedTransactionType {
                    transaction_type: transaction_type.to_string(),
                    kind: InventoryKind::RawMaterial.to_string(),
                });
            }
        };

        Ok(Derivation {
            level: StockLevel::RawMaterial { quantity },
            status,
        })
    }

    fn status_after_increase(&self, quantity: f64, threshold: Option<f64>) -> InventoryStatus {
        match self.policy {
            StatusPolicy::Literal => InventoryStatus::InStock,
            StatusPolicy::ThresholdAware => {
                threshold_status(quantity, threshold).unwrap_or(InventoryStatus::InStock)
            }
        }
    }
}

/// Subtracts with the insufficient-stock guard. Never returns a negative.
fn take_stock(inventory_id: &str, current: f64, amount: f64) -> CoreResult<f64> {
    if amount > current + EPSILON {
        return Err(CoreError::InsufficientStock {
            inventory_id: inventory_id.to_string(),
            available: current,
            requested: amount,
        });
    }
    Ok((current - amount).max(0.0))
}

/// The ISSUE check: `depleted` at or below zero, `low_stock` at or below the
/// threshold, otherwise no opinion.
fn threshold_status(quantity: f64, threshold: Option<f64>) -> Option<InventoryStatus> {
    if quantity <= EPSILON {
        Some(InventoryStatus::Depleted)
    } else if threshold.is_some_and(|t| quantity <= t) {
        Some(InventoryStatus::LowStock)
    } else {
        None
    }
}

fn equipment(
    inventory_id: &str,
    available: i64,
    total: i64,
    status: InventoryStatus,
    transaction_type: TransactionType,
    units: i64,
    net_issued: i64,
) -> CoreResult<Derivation> {
    let insufficient = || CoreError::InsufficientUnits {
        inventory_id: inventory_id.to_string(),
        available,
        requested: units,
    };

    let (available, total, status) = match transaction_type {
        TransactionType::Issue => {
            if units > available {
                return Err(insufficient());
            }
            let available = available - units;
            let status = if available == 0 {
                InventoryStatus::Issued
            } else {
                status
            };
            (available, total, status)
        }
        TransactionType::Restock => (available + units, total + units, InventoryStatus::InStock),
        TransactionType::Return => {
            let returnable = net_issued.min(total - available).max(0);
            if units > returnable {
                return Err(CoreError::ExceedsIssued {
                    inventory_id: inventory_id.to_string(),
                    returnable: returnable as f64,
                    requested: units as f64,
                });
            }
            let available = available + units;
            let status = if available == total {
                InventoryStatus::Returned
            } else {
                InventoryStatus::InStock
            };
            (available, total, status)
        }
        TransactionType::WriteOff => {
            if units > available {
                return Err(insufficient());
            }
            let available = available - units;
            let status = if available == 0 {
                InventoryStatus::Depleted
            } else {
                status
            };
            (available, total, status)
        }
        TransactionType::Damage => {
            if units > available {
                return Err(insufficient());
            }
            (available - units, total, InventoryStatus::Damaged)
        }
        TransactionType::Maintenance => (available, total, InventoryStatus::Maintenance),
    };

    Ok(Derivation {
        level: StockLevel::Equipment {
            available_units: available,
            total_units: total,
        },
        status,
    })
}

/// Initial status for a newly created item.
pub fn initial_status(level: StockLevel, threshold: Option<f64>) -> InventoryStatus {
    match level {
        StockLevel::RawMaterial { quantity } => {
            threshold_status(quantity, threshold).unwrap_or(InventoryStatus::InStock)
        }
        StockLevel::Equipment { total_units, .. } if total_units == 0 => InventoryStatus::Depleted,
        StockLevel::Equipment { .. } => InventoryStatus::InStock,
    }
}

/// Status of a raw material whose critical threshold was just changed.
///
/// Only `in_stock` and `low_stock` follow the threshold; every other status
/// was set by a transaction and stays until the next one.
pub fn rethreshold_status(
    status: InventoryStatus,
    quantity: f64,
    threshold: Option<f64>,
) -> InventoryStatus {
    match status {
        InventoryStatus::InStock | InventoryStatus::LowStock => {
            threshold_status(quantity, threshold).unwrap_or(InventoryStatus::InStock)
        }
        other => other,
    }
}

// =============================================================================
// Ledger Folds
// =============================================================================

/// `Σ ISSUE - Σ RETURN` over a transaction log.
pub fn net_issued<'a>(transactions: impl IntoIterator<Item = &'a InventoryTransaction>) -> f64 {
    transactions
        .into_iter()
        .map(|tx| match tx.transaction_type {
            TransactionType::Issue => tx.quantity,
            TransactionType::Return => -tx.quantity,
            _ => 0.0,
        })
        .sum()
}

/// Stock level implied by a transaction log alone.
///
/// ```text
/// raw:        Σrestock + Σreturn - Σissue - Σwrite_off - Σdamage
/// equipment:  available as above, total = Σrestock
/// ```
pub fn reconcile<'a>(
    kind: InventoryKind,
    transactions: impl IntoIterator<Item = &'a InventoryTransaction>,
) -> StockLevel {
    let mut balance = 0.0;
    let mut restocked = 0.0;

    for tx in transactions {
        match tx.transaction_type {
            TransactionType::Restock => {
                balance += tx.quantity;
                restocked += tx.quantity;
            }
            TransactionType::Return => balance += tx.quantity,
            TransactionType::Issue | TransactionType::WriteOff | TransactionType::Damage => {
                balance -= tx.quantity
            }
            TransactionType::Maintenance => {}
        }
    }

    match kind {
        InventoryKind::RawMaterial => StockLevel::RawMaterial { quantity: balance },
        InventoryKind::Equipment => StockLevel::Equipment {
            available_units: balance.round() as i64,
            total_units: restocked.round() as i64,
        },
    }
}

/// Stored stock compared with the stock the ledger implies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurrentStatus {
    pub stored: StockLevel,
    pub ledger: StockLevel,
    pub consistent: bool,
    pub is_depleted: bool,
    pub is_low: bool,
    pub transaction_count: usize,
}

/// Reconciles `item` against its full transaction log.
///
/// Equipment counts as low at or below `low_stock_ratio` of its units
/// available, the same cut the low-stock report applies.
pub fn current_status<'a>(
    item: &Inventory,
    transactions: impl IntoIterator<Item = &'a InventoryTransaction>,
    low_stock_ratio: f64,
) -> CurrentStatus {
    let transactions: Vec<&InventoryTransaction> = transactions.into_iter().collect();
    let stored = item.stock();
    let ledger = reconcile(item.kind(), transactions.iter().copied());

    let consistent = (stored.quantity() - ledger.quantity()).abs() <= EPSILON
        && stored.total_units() == ledger.total_units();

    let is_low = match stored {
        StockLevel::RawMaterial { quantity } => item
            .critical_threshold()
            .map_or(false, |threshold| quantity <= threshold + EPSILON),
        StockLevel::Equipment {
            available_units,
            total_units,
        } => {
            total_units > 0
                && available_units as f64 / total_units as f64 <= low_stock_ratio
        }
    };

    CurrentStatus {
        stored,
        ledger,
        consistent,
        is_depleted: stored.quantity() <= EPSILON,
        is_low,
        transaction_count: transactions.len(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EquipmentDetails, InventoryDetails, QuantityUnit, RawMaterialDetails};
    use chrono::Utc;

    fn raw(quantity: f64, threshold: Option<f64>, status: InventoryStatus) -> Inventory {
        let now = Utc::now();
        Inventory {
            id: "raw-1".to_string(),
            name: "Flour".to_string(),
            description: None,
            price_per_unit: None,
            status,
            supplier_id: None,
            details: InventoryDetails::RawMaterial(RawMaterialDetails {
                quantity,
                quantity_unit: QuantityUnit::Kg,
                batch_number: None,
                expiry_date: None,
                critical_threshold: threshold,
                is_perishable: false,
            }),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn gear(available: i64, total: i64, status: InventoryStatus) -> Inventory {
        let mut item = raw(0.0, None, status);
        item.id = "eq-1".to_string();
        item.details = InventoryDetails::Equipment(EquipmentDetails {
            total_units: total,
            available_units: available,
            maintenance_schedule: None,
            last_maintained: None,
            maintenance_threshold_hours: None,
        });
        item
    }

    fn step(rules: &Rules, item: &mut Inventory, tt: TransactionType, amount: f64, net: f64) {
        let d = rules.apply(item, tt, amount, net).unwrap();
        item.set_stock(d.level, d.status).unwrap();
    }

    #[test]
    fn test_raw_material_scenario() {
        let rules = Rules::default();
        let mut item = raw(100.0, Some(20.0), InventoryStatus::InStock);

        step(&rules, &mut item, TransactionType::Issue, 85.0, 0.0);
        assert_eq!(item.stock().quantity(), 15.0);
        assert_eq!(item.status, InventoryStatus::LowStock);

        let err = rules
            .apply(&item, TransactionType::Issue, 20.0, 85.0)
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientStock { available, requested, .. }
                if available == 15.0 && requested == 20.0
        ));

        step(&rules, &mut item, TransactionType::Restock, 50.0, 85.0);
        assert_eq!(item.stock().quantity(), 65.0);
        assert_eq!(item.status, InventoryStatus::InStock);
    }

    #[test]
    fn test_issue_to_zero_depletes() {
        let rules = Rules::default();
        let item = raw(10.0, None, InventoryStatus::InStock);
        let d = rules.apply(&item, TransactionType::Issue, 10.0, 0.0).unwrap();
        assert_eq!(d.resulting_quantity(), 0.0);
        assert_eq!(d.status, InventoryStatus::Depleted);
    }

    #[test]
    fn test_issue_without_threshold_keeps_status() {
        let rules = Rules::default();
        let item = raw(10.0, None, InventoryStatus::Returned);
        let d = rules.apply(&item, TransactionType::Issue, 9.0, 0.0).unwrap();
        assert_eq!(d.status, InventoryStatus::Returned);
    }

    #[test]
    fn test_restock_below_threshold_by_policy() {
        let item = raw(2.0, Some(20.0), InventoryStatus::LowStock);

        let literal = Rules::new(StatusPolicy::Literal)
            .apply(&item, TransactionType::Restock, 5.0, 0.0)
            .unwrap();
        assert_eq!(literal.status, InventoryStatus::InStock);

        let aware = Rules::new(StatusPolicy::ThresholdAware)
            .apply(&item, TransactionType::Restock, 5.0, 0.0)
            .unwrap();
        assert_eq!(aware.status, InventoryStatus::LowStock);
        assert_eq!(aware.resulting_quantity(), 7.0);
    }

    #[test]
    fn test_write_off_by_policy() {
        let item = raw(30.0, Some(20.0), InventoryStatus::InStock);

        let literal = Rules::new(StatusPolicy::Literal)
            .apply(&item, TransactionType::WriteOff, 15.0, 0.0)
            .unwrap();
        assert_eq!(literal.status, InventoryStatus::InStock);

        let aware = Rules::new(StatusPolicy::ThresholdAware)
            .apply(&item, TransactionType::WriteOff, 15.0, 0.0)
            .unwrap();
        assert_eq!(aware.status, InventoryStatus::LowStock);

        let all = Rules::new(StatusPolicy::Literal)
            .apply(&item, TransactionType::WriteOff, 30.0, 0.0)
            .unwrap();
        assert_eq!(all.status, InventoryStatus::Depleted);
    }

    #[test]
    fn test_damage_forces_damaged() {
        let rules = Rules::default();
        let item = raw(30.0, Some(5.0), InventoryStatus::InStock);
        let d = rules.apply(&item, TransactionType::Damage, 1.0, 0.0).unwrap();
        assert_eq!(d.status, InventoryStatus::Damaged);
        assert_eq!(d.resulting_quantity(), 29.0);

        assert!(matches!(
            rules.apply(&item, TransactionType::Damage, 31.0, 0.0),
            Err(CoreError::InsufficientStock { .. })
        ));
    }

    #[test]
    fn test_raw_return_bounded_by_net_issued() {
        let rules = Rules::default();
        let item = raw(5.0, None, InventoryStatus::InStock);

        let err = rules
            .apply(&item, TransactionType::Return, 4.0, 3.0)
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::ExceedsIssued { returnable, requested, .. }
                if returnable == 3.0 && requested == 4.0
        ));

        let d = rules.apply(&item, TransactionType::Return, 3.0, 3.0).unwrap();
        assert_eq!(d.resulting_quantity(), 8.0);
    }

    #[test]
    fn test_maintenance_unsupported_for_raw_material() {
        let rules = Rules::default();
        let item = raw(5.0, None, InventoryStatus::InStock);
        assert!(matches!(
            rules.apply(&item, TransactionType::Maintenance, 1.0, 0.0),
            Err(CoreError::UnsupportedTransactionType { .. })
        ));
    }

    #[test]
    fn test_invalid_amounts() {
        let rules = Rules::default();
        let item = raw(5.0, None, InventoryStatus::InStock);
        assert!(matches!(
            rules.apply(&item, TransactionType::Restock, 0.0, 0.0),
            Err(CoreError::InvalidQuantity { .. })
        ));

        let eq = gear(3, 3, InventoryStatus::InStock);
        assert!(matches!(
            rules.apply(&eq, TransactionType::Issue, 1.5, 0.0),
            Err(CoreError::InvalidQuantity { .. })
        ));
    }

    #[test]
    fn test_equipment_scenario() {
        let rules = Rules::default();
        let mut item = gear(10, 10, InventoryStatus::InStock);

        step(&rules, &mut item, TransactionType::Issue, 10.0, 0.0);
        assert_eq!(item.as_equipment().unwrap().available_units, 0);
        assert_eq!(item.status, InventoryStatus::Issued);

        step(&rules, &mut item, TransactionType::Return, 10.0, 10.0);
        assert_eq!(item.as_equipment().unwrap().available_units, 10);
        assert_eq!(item.status, InventoryStatus::Returned);

        assert!(matches!(
            rules.apply(&item, TransactionType::Return, 1.0, 0.0),
            Err(CoreError::ExceedsIssued { .. })
        ));
    }

    #[test]
    fn test_equipment_partial_return_is_in_stock() {
        let rules = Rules::default();
        let item = gear(4, 10, InventoryStatus::Issued);
        let d = rules.apply(&item, TransactionType::Return, 2.0, 6.0).unwrap();
        assert_eq!(d.status, InventoryStatus::InStock);
        assert_eq!(
            d.level,
            StockLevel::Equipment {
                available_units: 6,
                total_units: 10
            }
        );
    }

    #[test]
    fn test_equipment_return_bounded_by_units_out() {
        let rules = Rules::default();
        // Net issued says 5 are out but only 2 units are physically missing.
        let item = gear(8, 10, InventoryStatus::InStock);
        let err = rules
            .apply(&item, TransactionType::Return, 3.0, 5.0)
            .unwrap_err();
        assert!(matches!(err, CoreError::ExceedsIssued { returnable, .. } if returnable == 2.0));
    }

    #[test]
    fn test_equipment_restock_grows_total() {
        let rules = Rules::default();
        let item = gear(2, 5, InventoryStatus::Damaged);
        let d = rules.apply(&item, TransactionType::Restock, 3.0, 0.0).unwrap();
        assert_eq!(
            d.level,
            StockLevel::Equipment {
                available_units: 5,
                total_units: 8
            }
        );
        assert_eq!(d.status, InventoryStatus::InStock);
    }

    #[test]
    fn test_equipment_guards() {
        let rules = Rules::default();
        let item = gear(2, 5, InventoryStatus::InStock);
        for tt in [
            TransactionType::Issue,
            TransactionType::WriteOff,
            TransactionType::Damage,
        ] {
            assert!(matches!(
                rules.apply(&item, tt, 3.0, 0.0),
                Err(CoreError::InsufficientUnits {
                    available: 2,
                    requested: 3,
                    ..
                })
            ));
        }

        let d = rules.apply(&item, TransactionType::WriteOff, 2.0, 0.0).unwrap();
        assert_eq!(d.status, InventoryStatus::Depleted);

        let d = rules
            .apply(&item, TransactionType::Maintenance, 1.0, 0.0)
            .unwrap();
        assert_eq!(d.status, InventoryStatus::Maintenance);
        assert_eq!(d.level, item.stock());
    }

    #[test]
    fn test_equipment_units_never_exceed_total() {
        let rules = Rules::default();
        let mut item = gear(5, 5, InventoryStatus::InStock);
        let mut net = 0.0;
        let script = [
            (TransactionType::Issue, 3.0),
            (TransactionType::Restock, 2.0),
            (TransactionType::Return, 3.0),
            (TransactionType::Damage, 1.0),
            (TransactionType::Issue, 6.0),
            (TransactionType::Return, 5.0),
        ];

        for (tt, amount) in script {
            if let Ok(d) = rules.apply(&item, tt, amount, net) {
                item.set_stock(d.level, d.status).unwrap();
                match tt {
                    TransactionType::Issue => net += amount,
                    TransactionType::Return => net -= amount,
                    _ => {}
                }
            }
            let eq = item.as_equipment().unwrap();
            assert!(0 <= eq.available_units && eq.available_units <= eq.total_units);
        }
    }

    #[test]
    fn test_initial_status() {
        assert_eq!(
            initial_status(StockLevel::RawMaterial { quantity: 0.0 }, None),
            InventoryStatus::Depleted
        );
        assert_eq!(
            initial_status(StockLevel::RawMaterial { quantity: 5.0 }, Some(10.0)),
            InventoryStatus::LowStock
        );
        assert_eq!(
            initial_status(
                StockLevel::Equipment {
                    available_units: 4,
                    total_units: 4
                },
                None
            ),
            InventoryStatus::InStock
        );
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("literal".parse::<StatusPolicy>().unwrap(), StatusPolicy::Literal);
        assert_eq!(
            "THRESHOLD_AWARE".parse::<StatusPolicy>().unwrap(),
            StatusPolicy::ThresholdAware
        );
        assert!("sometimes".parse::<StatusPolicy>().is_err());
        assert_eq!(StatusPolicy::default().to_string(), "threshold_aware");
    }

    fn logged(tt: TransactionType, quantity: f64, sequence: i64) -> InventoryTransaction {
        let now = Utc::now();
        InventoryTransaction {
            id: format!("tx-{}", sequence),
            inventory_id: "raw-1".to_string(),
            transaction_type: tt,
            quantity,
            sequence,
            transaction_date: now,
            created_by_id: "user-1".to_string(),
            updated_by_id: None,
            department_id: None,
            notes: None,
            previous_status: InventoryStatus::InStock,
            previous_quantity: 0.0,
            previous_total_units: None,
            resulting_quantity: 0.0,
            is_locked: false,
            is_system_generated: false,
            created_at: now,
            updated_at: None,
        }
    }

    #[test]
    fn test_reconcile_and_net_issued() {
        let log = vec![
            logged(TransactionType::Restock, 100.0, 1),
            logged(TransactionType::Issue, 30.0, 2),
            logged(TransactionType::Return, 10.0, 3),
            logged(TransactionType::WriteOff, 5.0, 4),
            logged(TransactionType::Damage, 2.5, 5),
        ];

        assert_eq!(net_issued(&log), 20.0);
        assert_eq!(
            reconcile(InventoryKind::RawMaterial, &log),
            StockLevel::RawMaterial { quantity: 72.5 }
        );
        assert_eq!(
            reconcile(InventoryKind::Equipment, &log[..3]),
            StockLevel::Equipment {
                available_units: 80,
                total_units: 100
            }
        );
    }

    #[test]
    fn test_current_status_flags_drift() {
        let log = vec![
            logged(TransactionType::Restock, 100.0, 1),
            logged(TransactionType::Issue, 85.0, 2),
        ];

        let item = raw(15.0, Some(20.0), InventoryStatus::LowStock);
        let status = current_status(&item, &log, 0.2);
        assert!(status.consistent);
        assert!(status.is_low);
        assert!(!status.is_depleted);
        assert_eq!(status.transaction_count, 2);

        let drifted = raw(14.0, Some(20.0), InventoryStatus::LowStock);
        assert!(!current_status(&drifted, &log, 0.2).consistent);
    }

    #[test]
    fn test_current_status_equipment_low_follows_ratio() {
        let log = vec![
            logged(TransactionType::Restock, 10.0, 1),
            logged(TransactionType::Issue, 6.0, 2),
        ];
        let item = gear(4, 10, InventoryStatus::InStock);

        assert!(!current_status(&item, &log, 0.2).is_low);
        assert!(current_status(&item, &log, 0.5).is_low);
        assert!(current_status(&item, &log, 0.4).is_low);
    }

    #[test]
    fn test_rethreshold_status() {
        use InventoryStatus::*;

        assert_eq!(rethreshold_status(LowStock, 15.0, Some(10.0)), InStock);
        assert_eq!(rethreshold_status(InStock, 15.0, Some(20.0)), LowStock);
        assert_eq!(rethreshold_status(LowStock, 15.0, None), InStock);
        assert_eq!(rethreshold_status(Damaged, 15.0, Some(20.0)), Damaged);
        assert_eq!(rethreshold_status(Expired, 15.0, Some(10.0)), Expired);
    }
}
