//! # Report Aggregation
//!
//! Read-only rollups over inventory state and the transaction log.
//!
//! Aggregation never fails on incomplete data. Items without a price count
//! as unpriced, items without a usable threshold are listed as unassessed.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use ts_rs::TS;

use crate::error::CoreError;
use crate::types::{
    Inventory, InventoryDetails, InventoryKind, InventoryStatus, InventoryTransaction,
    TransactionType,
};

// =============================================================================
// Report Selection
// =============================================================================

/// The reports the aggregator can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    Summary,
    LowStock,
    Value,
    Usage,
}

impl ReportType {
    pub const ALL: [ReportType; 4] = [
        ReportType::Summary,
        ReportType::LowStock,
        ReportType::Value,
        ReportType::Usage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Summary => "summary",
            ReportType::LowStock => "low_stock",
            ReportType::Value => "value",
            ReportType::Usage => "usage",
        }
    }
}

impl std::fmt::Display for ReportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReportType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ReportType::ALL
            .into_iter()
            .find(|r| r.as_str() == wanted)
            .ok_or_else(|| CoreError::UnknownReportType {
                requested: s.to_string(),
                allowed: ReportType::ALL.iter().map(|r| r.as_str()).collect(),
            })
    }
}

/// Parameters of a report request.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReportQuery {
    pub report_type: ReportType,
    #[serde(default)]
    pub inventory_type: Option<InventoryKind>,
    /// Value report only.
    #[serde(default)]
    pub status: Option<InventoryStatus>,
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub end: Option<DateTime<Utc>>,
}

impl ReportQuery {
    pub fn new(report_type: ReportType) -> Self {
        ReportQuery {
            report_type,
            inventory_type: None,
            status: None,
            start: None,
            end: None,
        }
    }
}

/// Tunables for report thresholds.
#[derive(Debug, Clone, Copy)]
pub struct ReportSettings {
    /// Equipment is low when `available / total` is at or below this.
    pub low_stock_ratio: f64,
    /// Number of entries in the usage report.
    pub usage_top_n: usize,
}

impl Default for ReportSettings {
    fn default() -> Self {
        ReportSettings {
            low_stock_ratio: 0.2,
            usage_top_n: 10,
        }
    }
}

// =============================================================================
// Report Window
// =============================================================================

/// Inclusive time range a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReportWindow {
    #[ts(as = "String")]
    pub start: DateTime<Utc>,
    #[ts(as = "String")]
    pub end: DateTime<Utc>,
}

impl ReportWindow {
    /// Resolves optional bounds. A missing start is Jan 1 of the current
    /// year at `offset`, a missing end is `now`.
    pub fn resolve(
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        offset: FixedOffset,
    ) -> Self {
        let start = start.unwrap_or_else(|| start_of_year(now, offset));
        let end = end.unwrap_or(now);
        ReportWindow { start, end }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

fn start_of_year(now: DateTime<Utc>, offset: FixedOffset) -> DateTime<Utc> {
    let year = now.with_timezone(&offset).year();
    NaiveDate::from_ymd_opt(year, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .and_then(|midnight| offset.from_local_datetime(&midnight).single())
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or(now)
}

// =============================================================================
// Report Shapes
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "report_type", rename_all = "snake_case")]
pub enum Report {
    Summary(SummaryReport),
    LowStock(LowStockReport),
    Value(ValueReport),
    Usage(UsageReport),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SummaryReport {
    pub window: ReportWindow,
    pub total_items: usize,
    pub items_by_type: BTreeMap<InventoryKind, usize>,
    pub items_by_status: BTreeMap<InventoryStatus, usize>,
    /// Σ quantity per transaction type within the window.
    pub transaction_totals: BTreeMap<TransactionType, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LowStockEntry {
    pub inventory_id: String,
    pub name: String,
    pub inventory_type: InventoryKind,
    pub status: InventoryStatus,
    /// Raw quantity or available units.
    pub current: f64,
    /// Critical threshold or total units.
    pub reference: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UnassessedItem {
    pub inventory_id: String,
    pub name: String,
    pub inventory_type: InventoryKind,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LowStockReport {
    pub items: Vec<LowStockEntry>,
    pub unassessed: Vec<UnassessedItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ValueReport {
    pub window: ReportWindow,
    pub total_inventory_value: f64,
    pub value_by_type: BTreeMap<InventoryKind, f64>,
    pub unpriced_items: usize,
    /// Σ quantity × price per transaction type within the window.
    pub value_changes_by_transaction_type: BTreeMap<TransactionType, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UsageEntry {
    pub inventory_id: String,
    pub name: String,
    pub inventory_type: InventoryKind,
    pub issued_quantity: f64,
    pub issue_count: usize,
    pub returned_quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UsageReport {
    pub window: ReportWindow,
    pub top_used_items: Vec<UsageEntry>,
}

// =============================================================================
// Aggregation
// =============================================================================

/// Builds the report `query` asks for.
///
/// ## Arguments
/// * `items` - Inventory items (any kind, filtered here)
/// * `transactions` - Transactions, at least those inside `window`
/// * `window` - Resolved report window
pub fn build_report(
    query: &ReportQuery,
    settings: &ReportSettings,
    items: &[Inventory],
    transactions: &[InventoryTransaction],
    window: ReportWindow,
) -> Report {
    let items: Vec<&Inventory> = items
        .iter()
        .filter(|item| query.inventory_type.map_or(true, |kind| item.kind() == kind))
        .collect();

    match query.report_type {
        ReportType::Summary => Report::Summary(summary(&items, transactions, window)),
        ReportType::LowStock => Report::LowStock(low_stock(&items, settings)),
        ReportType::Value => {
            let items: Vec<&Inventory> = items
                .into_iter()
                .filter(|item| item.status != InventoryStatus::Decommissioned)
                .filter(|item| query.status.map_or(true, |status| item.status == status))
                .collect();
            Report::Value(value(&items, transactions, window))
        }
        ReportType::Usage => Report::Usage(usage(&items, transactions, window, settings)),
    }
}

/// Transactions in the window whose item is in `items`.
fn in_scope<'a>(
    items: &[&'a Inventory],
    transactions: &'a [InventoryTransaction],
    window: ReportWindow,
) -> impl Iterator<Item = (&'a Inventory, &'a InventoryTransaction)> {
    let by_id: HashMap<&str, &'a Inventory> =
        items.iter().map(|item| (item.id.as_str(), *item)).collect();

    transactions
        .iter()
        .filter(move |tx| window.contains(tx.transaction_date))
        .filter_map(move |tx| by_id.get(tx.inventory_id.as_str()).map(|item| (*item, tx)))
}

fn summary(
    items: &[&Inventory],
    transactions: &[InventoryTransaction],
    window: ReportWindow,
) -> SummaryReport {
    let mut items_by_type: BTreeMap<InventoryKind, usize> =
        InventoryKind::ALL.into_iter().map(|k| (k, 0)).collect();
    let mut items_by_status = BTreeMap::new();

    for item in items {
        *items_by_type.entry(item.kind()).or_insert(0) += 1;
        *items_by_status.entry(item.status).or_insert(0) += 1;
    }

    let mut transaction_totals: BTreeMap<TransactionType, f64> =
        TransactionType::ALL.into_iter().map(|t| (t, 0.0)).collect();
    for (_, tx) in in_scope(items, transactions, window) {
        *transaction_totals.entry(tx.transaction_type).or_insert(0.0) += tx.quantity;
    }

    SummaryReport {
        window,
        total_items: items.len(),
        items_by_type,
        items_by_status,
        transaction_totals,
    }
}

fn low_stock(items: &[&Inventory], settings: &ReportSettings) -> LowStockReport {
    let mut report = LowStockReport {
        items: Vec::new(),
        unassessed: Vec::new(),
    };

    for item in items {
        let unassessed = |reason: &str| UnassessedItem {
            inventory_id: item.id.clone(),
            name: item.name.clone(),
            inventory_type: item.kind(),
            reason: reason.to_string(),
        };

        let (current, reference, is_low) = match &item.details {
            InventoryDetails::RawMaterial(raw) => match raw.critical_threshold {
                Some(threshold) if threshold > 0.0 => {
                    (raw.quantity, threshold, raw.quantity <= threshold)
                }
                _ => {
                    report.unassessed.push(unassessed("no critical threshold"));
                    continue;
                }
            },
            InventoryDetails::Equipment(eq) => {
                if eq.total_units <= 0 {
                    report.unassessed.push(unassessed("no units owned"));
                    continue;
                }
                let ratio = eq.available_units as f64 / eq.total_units as f64;
                (
                    eq.available_units as f64,
                    eq.total_units as f64,
                    ratio <= settings.low_stock_ratio,
                )
            }
        };

        if is_low {
            report.items.push(LowStockEntry {
                inventory_id: item.id.clone(),
                name: item.name.clone(),
                inventory_type: item.kind(),
                status: item.status,
                current,
                reference,
                percentage: current / reference * 100.0,
            });
        }
    }

    report
        .items
        .sort_by(|a, b| a.percentage.total_cmp(&b.percentage));
    report
}

fn value(
    items: &[&Inventory],
    transactions: &[InventoryTransaction],
    window: ReportWindow,
) -> ValueReport {
    let mut value_by_type: BTreeMap<InventoryKind, f64> =
        InventoryKind::ALL.into_iter().map(|k| (k, 0.0)).collect();
    let mut unpriced_items = 0;

    for item in items {
        let Some(price) = item.price_per_unit else {
            unpriced_items += 1;
            continue;
        };
        let stock = match &item.details {
            InventoryDetails::RawMaterial(raw) => raw.quantity,
            InventoryDetails::Equipment(eq) => eq.total_units as f64,
        };
        *value_by_type.entry(item.kind()).or_insert(0.0) += stock * price;
    }

    let mut value_changes_by_transaction_type: BTreeMap<TransactionType, f64> =
        TransactionType::ALL.into_iter().map(|t| (t, 0.0)).collect();
    for (item, tx) in in_scope(items, transactions, window) {
        let price = item.price_per_unit.unwrap_or(0.0);
        *value_changes_by_transaction_type
            .entry(tx.transaction_type)
            .or_insert(0.0) += tx.quantity * price;
    }

    ValueReport {
        window,
        total_inventory_value: value_by_type.values().sum(),
        value_by_type,
        unpriced_items,
        value_changes_by_transaction_type,
    }
}

fn usage(
    items: &[&Inventory],
    transactions: &[InventoryTransaction],
    window: ReportWindow,
    settings: &ReportSettings,
) -> UsageReport {
    let mut by_item: HashMap<&str, UsageEntry> = HashMap::new();

    for (item, tx) in in_scope(items, transactions, window) {
        if !matches!(
            tx.transaction_type,
            TransactionType::Issue | TransactionType::Return
        ) {
            continue;
        }

        let entry = by_item.entry(item.id.as_str()).or_insert_with(|| UsageEntry {
            inventory_id: item.id.clone(),
            name: item.name.clone(),
            inventory_type: item.kind(),
            issued_quantity: 0.0,
            issue_count: 0,
            returned_quantity: 0.0,
        });

        if tx.transaction_type == TransactionType::Issue {
            entry.issued_quantity += tx.quantity;
            entry.issue_count += 1;
        } else {
            entry.returned_quantity += tx.quantity;
        }
    }

    let mut top_used_items: Vec<UsageEntry> = by_item
        .into_values()
        .filter(|entry| entry.issue_count > 0)
        .collect();
    top_used_items.sort_by(|a, b| {
        b.issued_quantity
            .total_cmp(&a.issued_quantity)
            .then_with(|| a.name.cmp(&b.name))
    });
    top_used_items.truncate(settings.usage_top_n);

    UsageReport {
        window,
        top_used_items,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
