//! # Inventory Repository
//!
//! Database operations for inventory items.
//!
//! Both kinds share one `inventories` table with an `inventory_type`
//! discriminator. `InventoryRow` is the flat nullable row; `TryFrom` turns it
//! into the [`Inventory`] sum type and rejects rows whose kind columns
//! disagree.
//!
//! ## Optimistic Versioning
//! Every write is `UPDATE ... SET version = version + 1 WHERE id = ? AND
//! version = ?`. A write that matches no row lost a race and fails with
//! [`DbError::Conflict`].

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use larder_core::{
    EquipmentDetails, Inventory, InventoryDetails, InventoryFilter, InventoryKind,
    InventorySort, InventoryStatus, QuantityUnit, RawMaterialDetails, SortOrder,
};

const COLUMNS: &str = "
    id, name, description, inventory_type, price_per_unit, status, supplier_id,
    quantity, quantity_unit, batch_number, expiry_date, critical_threshold, is_perishable,
    total_units, available_units, maintenance_schedule, last_maintained,
    maintenance_threshold_hours, version, created_at, updated_at";

// =============================================================================
// Row Mapping
// =============================================================================

/// Flat row as stored.
#[derive(Debug, FromRow)]
struct InventoryRow {
    id: String,
    name: String,
    description: Option<String>,
    inventory_type: InventoryKind,
    price_per_unit: Option<f64>,
    status: InventoryStatus,
    supplier_id: Option<String>,
    quantity: Option<f64>,
    quantity_unit: Option<QuantityUnit>,
    batch_number: Option<String>,
    expiry_date: Option<NaiveDate>,
    critical_threshold: Option<f64>,
    is_perishable: Option<bool>,
    total_units: Option<i64>,
    available_units: Option<i64>,
    maintenance_schedule: Option<NaiveDate>,
    last_maintained: Option<NaiveDate>,
    maintenance_threshold_hours: Option<i64>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InventoryRow> for Inventory {
    type Error = DbError;

    fn try_from(row: InventoryRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: &str| DbError::CorruptRow {
            entity: "Inventory",
            id: row.id.clone(),
            reason: reason.to_string(),
        };

        let details = match row.inventory_type {
            InventoryKind::RawMaterial => InventoryDetails::RawMaterial(RawMaterialDetails {
                quantity: row.quantity.ok_or_else(|| corrupt("raw material without quantity"))?,
                quantity_unit: row.quantity_unit.unwrap_or_default(),
                batch_number: row.batch_number.clone(),
                expiry_date: row.expiry_date,
                critical_threshold: row.critical_threshold,
                is_perishable: row.is_perishable.unwrap_or(false),
            }),
            InventoryKind::Equipment => InventoryDetails::Equipment(EquipmentDetails {
                total_units: row
                    .total_units
                    .ok_or_else(|| corrupt("equipment without total_units"))?,
                available_units: row
                    .available_units
                    .ok_or_else(|| corrupt("equipment without available_units"))?,
                maintenance_schedule: row.maintenance_schedule,
                last_maintained: row.last_maintained,
                maintenance_threshold_hours: row.maintenance_threshold_hours,
            }),
        };

        Ok(Inventory {
            id: row.id,
            name: row.name,
            description: row.description,
            price_per_unit: row.price_per_unit,
            status: row.status,
            supplier_id: row.supplier_id,
            details,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Kind-specific columns of an item, NULL for the other kind.
#[derive(Debug, Default)]
struct KindColumns {
    quantity: Option<f64>,
    quantity_unit: Option<QuantityUnit>,
    batch_number: Option<String>,
    expiry_date: Option<NaiveDate>,
    critical_threshold: Option<f64>,
    is_perishable: Option<bool>,
    total_units: Option<i64>,
    available_units: Option<i64>,
    maintenance_schedule: Option<NaiveDate>,
    last_maintained: Option<NaiveDate>,
    maintenance_threshold_hours: Option<i64>,
}

impl From<&InventoryDetails> for KindColumns {
    fn from(details: &InventoryDetails) -> Self {
        match details {
            InventoryDetails::RawMaterial(raw) => KindColumns {
                quantity: Some(raw.quantity),
                quantity_unit: Some(raw.quantity_unit),
                batch_number: raw.batch_number.clone(),
                expiry_date: raw.expiry_date,
                critical_threshold: raw.critical_threshold,
                is_perishable: Some(raw.is_perishable),
                ..Default::default()
            },
            InventoryDetails::Equipment(eq) => KindColumns {
                total_units: Some(eq.total_units),
                available_units: Some(eq.available_units),
                maintenance_schedule: eq.maintenance_schedule,
                last_maintained: eq.last_maintained,
                maintenance_threshold_hours: eq.maintenance_threshold_hours,
                ..Default::default()
            },
        }
    }
}

/// `ORDER BY` expression for a listing. Only fixed column names reach the SQL.
fn order_by(sort: InventorySort, order: SortOrder) -> String {
    let column = match sort {
        InventorySort::Name => "name",
        InventorySort::CreatedAt => "created_at",
        InventorySort::UpdatedAt => "updated_at",
        InventorySort::PricePerUnit => "price_per_unit",
        InventorySort::Quantity => "COALESCE(quantity, available_units)",
        InventorySort::Status => "status",
    };
    let direction = match order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };
    format!("{column} {direction}")
}

/// Comma-joined list bound as one parameter, `None` when empty.
fn joined<'a>(values: impl Iterator<Item = &'a str>) -> Option<String> {
    let list = values.collect::<Vec<_>>().join(",");
    (!list.is_empty()).then_some(list)
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for inventory database operations.
///
/// Methods taking `conn` run on the caller's connection, normally the open
/// transaction of a ledger operation (`&mut *tx`).
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    /// Creates a new InventoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    /// Gets an item by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Inventory>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut conn, id).await
    }

    /// Gets an item by ID on the given connection.
    pub async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Inventory>> {
        let sql = format!("SELECT {COLUMNS} FROM inventories WHERE id = ?1");

        let row = sqlx::query_as::<_, InventoryRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        row.map(Inventory::try_from).transpose()
    }

    /// Lists items matching `filter` in its requested order.
    pub async fn list(&self, filter: &InventoryFilter) -> DbResult<Vec<Inventory>> {
        let sql = format!(
            r#"
            SELECT {COLUMNS} FROM inventories
            WHERE (?1 IS NULL OR inventory_type = ?1)
              AND (?2 IS NULL OR instr(',' || ?2 || ',', ',' || status || ',') > 0)
              AND (?3 IS NULL OR name LIKE '%' || ?3 || '%' OR description LIKE '%' || ?3 || '%')
              AND (?4 IS NULL OR instr(',' || ?4 || ',', ',' || supplier_id || ',') > 0)
              AND (?5 IS NULL OR price_per_unit >= ?5)
              AND (?6 IS NULL OR price_per_unit <= ?6)
              AND (?7 IS NULL OR COALESCE(quantity, available_units) >= ?7)
              AND (?8 IS NULL OR COALESCE(quantity, available_units) <= ?8)
              AND (?9 IS NULL OR created_at >= ?9)
              AND (?10 IS NULL OR created_at <= ?10)
            ORDER BY {order}, id ASC
            LIMIT ?11 OFFSET ?12
            "#,
            order = order_by(filter.sort_by, filter.sort_order),
        );

        let statuses = joined(filter.statuses.iter().map(|status| status.as_str()));
        let suppliers = joined(filter.supplier_ids.iter().map(String::as_str));

        let rows = sqlx::query_as::<_, InventoryRow>(&sql)
            .bind(filter.kind)
            .bind(statuses)
            .bind(filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()))
            .bind(suppliers)
            .bind(filter.min_price)
            .bind(filter.max_price)
            .bind(filter.min_quantity)
            .bind(filter.max_quantity)
            .bind(filter.created_from)
            .bind(filter.created_to)
            // SQLite treats a negative LIMIT as "no limit"
            .bind(filter.limit.unwrap_or(-1))
            .bind(filter.offset.unwrap_or(0))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Inventory::try_from).collect()
    }

    /// Inserts a new item.
    ///
    /// ## Errors
    /// * `UniqueViolation` on `inventories.name` if the name is taken
    pub async fn insert(conn: &mut SqliteConnection, item: &Inventory) -> DbResult<()> {
        debug!(id = %item.id, name = %item.name, kind = %item.kind(), "Inserting inventory");

        let kind = KindColumns::from(&item.details);

        sqlx::query(
            r#"
            INSERT INTO inventories (
                id, name, description, inventory_type, price_per_unit, status, supplier_id,
                quantity, quantity_unit, batch_number, expiry_date, critical_threshold,
                is_perishable, total_units, available_units, maintenance_schedule,
                last_maintained, maintenance_threshold_hours, version, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7,
                ?8, ?9, ?10, ?11, ?12,
                ?13, ?14, ?15, ?16,
                ?17, ?18, ?19, ?20, ?21
            )
            "#,
        )
        .bind(&item.id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.kind())
        .bind(item.price_per_unit)
        .bind(item.status)
        .bind(&item.supplier_id)
        .bind(kind.quantity)
        .bind(kind.quantity_unit)
        .bind(kind.batch_number)
        .bind(kind.expiry_date)
        .bind(kind.critical_threshold)
        .bind(kind.is_perishable)
        .bind(kind.total_units)
        .bind(kind.available_units)
        .bind(kind.maintenance_schedule)
        .bind(kind.last_maintained)
        .bind(kind.maintenance_threshold_hours)
        .bind(item.version)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Writes every mutable column of `item`, guarded by its version.
    ///
    /// ## Returns
    /// * `Ok(new_version)` - Row written, version bumped
    /// * `Err(DbError::Conflict)` - The stored version is no longer `item.version`
    pub async fn save(conn: &mut SqliteConnection, item: &Inventory) -> DbResult<i64> {
        let kind = KindColumns::from(&item.details);

        let result = sqlx::query(
            r#"
            UPDATE inventories SET
                name = ?3,
                description = ?4,
                price_per_unit = ?5,
                status = ?6,
                supplier_id = ?7,
                quantity = ?8,
                quantity_unit = ?9,
                batch_number = ?10,
                expiry_date = ?11,
                critical_threshold = ?12,
                is_perishable = ?13,
                total_units = ?14,
                available_units = ?15,
                maintenance_schedule = ?16,
                last_maintained = ?17,
                maintenance_threshold_hours = ?18,
                updated_at = ?19,
                version = version + 1
            WHERE id = ?1 AND version = ?2
            "#,
        )
        .bind(&item.id)
        .bind(item.version)
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.price_per_unit)
        .bind(item.status)
        .bind(&item.supplier_id)
        .bind(kind.quantity)
        .bind(kind.quantity_unit)
        .bind(kind.batch_number)
        .bind(kind.expiry_date)
        .bind(kind.critical_threshold)
        .bind(kind.is_perishable)
        .bind(kind.total_units)
        .bind(kind.available_units)
        .bind(kind.maintenance_schedule)
        .bind(kind.last_maintained)
        .bind(kind.maintenance_threshold_hours)
        .bind(item.updated_at)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict("Inventory", &item.id));
        }

        debug!(id = %item.id, version = item.version + 1, status = %item.status, "Inventory saved");
        Ok(item.version + 1)
    }

    /// Deletes an item.
    ///
    /// ## Errors
    /// * `NotFound` if no such item
    /// * `ForeignKeyViolation` if transactions still reference it
    pub async fn delete(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM inventories WHERE id = ?1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Inventory", id));
        }

        Ok(())
    }

    /// Counts all items.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inventories")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
