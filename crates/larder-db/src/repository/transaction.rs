//! # Transaction Repository
//!
//! Database operations for the inventory ledger.
//!
//! Each item's rows are numbered by `sequence`. The next number is
//! `MAX(sequence) + 1`, read inside the writing unit of work, and
//! `UNIQUE(inventory_id, sequence)` rejects a second writer that read the same
//! maximum. Net issued is `TOTAL(issue) - TOTAL(return)` over those rows.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use larder_core::{InventoryTransaction, TransactionFilter};

// Aliased so joined tables never shadow the transaction columns.
const COLUMNS: &str = "
    t.id AS id,
    t.inventory_id AS inventory_id,
    t.transaction_type AS transaction_type,
    t.quantity AS quantity,
    t.sequence AS sequence,
    t.transaction_date AS transaction_date,
    t.created_by_id AS created_by_id,
    t.updated_by_id AS updated_by_id,
    t.department_id AS department_id,
    t.notes AS notes,
    t.previous_status AS previous_status,
    t.previous_quantity AS previous_quantity,
    t.previous_total_units AS previous_total_units,
    t.resulting_quantity AS resulting_quantity,
    t.is_locked AS is_locked,
    t.is_system_generated AS is_system_generated,
    t.created_at AS created_at,
    t.updated_at AS updated_at";

/// Repository for ledger database operations.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
}

impl TransactionRepository {
    /// Creates a new TransactionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TransactionRepository { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets a transaction by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<InventoryTransaction>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut conn, id).await
    }

    /// Gets a transaction by ID on the given connection.
    pub async fn fetch(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<InventoryTransaction>> {
        let sql = format!("SELECT {COLUMNS} FROM inventory_transactions t WHERE t.id = ?1");

        let tx = sqlx::query_as::<_, InventoryTransaction>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(tx)
    }

    /// Full ledger of one item, oldest first.
    pub async fn history(&self, inventory_id: &str) -> DbResult<Vec<InventoryTransaction>> {
        let mut conn = self.pool.acquire().await?;
        Self::history_on(&mut conn, inventory_id).await
    }

    /// Full ledger of one item on the given connection, oldest first.
    pub async fn history_on(
        conn: &mut SqliteConnection,
        inventory_id: &str,
    ) -> DbResult<Vec<InventoryTransaction>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM inventory_transactions t
             WHERE t.inventory_id = ?1
             ORDER BY t.sequence ASC"
        );

        let txs = sqlx::query_as::<_, InventoryTransaction>(&sql)
            .bind(inventory_id)
            .fetch_all(&mut *conn)
            .await?;

        Ok(txs)
    }

    /// Lists transactions matching `filter`, newest first.
    pub async fn list(&self, filter: &TransactionFilter) -> DbResult<Vec<InventoryTransaction>> {
        let sql = format!(
            r#"
            SELECT {COLUMNS}
            FROM inventory_transactions t
            JOIN inventories i ON i.id = t.inventory_id
            WHERE (?1 IS NULL OR t.inventory_id = ?1)
              AND (?2 IS NULL OR t.transaction_type = ?2)
              AND (?3 IS NULL OR i.inventory_type = ?3)
              AND (?4 IS NULL OR t.department_id = ?4)
              AND (?5 IS NULL OR t.transaction_date >= ?5)
              AND (?6 IS NULL OR t.transaction_date <= ?6)
            ORDER BY t.transaction_date DESC, t.sequence DESC
            LIMIT ?7 OFFSET ?8
            "#
        );

        let txs = sqlx::query_as::<_, InventoryTransaction>(&sql)
            .bind(filter.inventory_id.as_deref())
            .bind(filter.transaction_type)
            .bind(filter.inventory_type)
            .bind(filter.department_id.as_deref())
            .bind(filter.start)
            .bind(filter.end)
            .bind(filter.limit.unwrap_or(-1))
            .bind(filter.offset.unwrap_or(0))
            .fetch_all(&self.pool)
            .await?;

        Ok(txs)
    }

    /// All transactions dated within `[start, end]`.
    pub async fn in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DbResult<Vec<InventoryTransaction>> {
        self.list(&TransactionFilter {
            start: Some(start),
            end: Some(end),
            ..Default::default()
        })
        .await
    }

    // =========================================================================
    // Ledger Aggregates (run inside the writing transaction)
    // =========================================================================

    /// Sequence number for the next transaction of an item.
    pub async fn next_sequence(conn: &mut SqliteConnection, inventory_id: &str) -> DbResult<i64> {
        let max: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(sequence), 0) FROM inventory_transactions WHERE inventory_id = ?1",
        )
        .bind(inventory_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(max + 1)
    }

    /// Number of transactions of the same item recorded after `sequence`.
    pub async fn newer_count(
        conn: &mut SqliteConnection,
        inventory_id: &str,
        sequence: i64,
    ) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM inventory_transactions WHERE inventory_id = ?1 AND sequence > ?2",
        )
        .bind(inventory_id)
        .bind(sequence)
        .fetch_one(&mut *conn)
        .await?;

        Ok(count)
    }

    /// Number of transactions recorded for an item.
    pub async fn count_for_inventory(
        conn: &mut SqliteConnection,
        inventory_id: &str,
    ) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM inventory_transactions WHERE inventory_id = ?1")
                .bind(inventory_id)
                .fetch_one(&mut *conn)
                .await?;

        Ok(count)
    }

    /// `Σ ISSUE - Σ RETURN` for an item, optionally leaving one transaction out.
    ///
    /// ## Arguments
    /// * `excluding` - Transaction under revision; its own contribution is
    ///   not counted
    pub async fn net_issued(
        conn: &mut SqliteConnection,
        inventory_id: &str,
        excluding: Option<&str>,
    ) -> DbResult<f64> {
        // TOTAL() is 0.0 on no rows and always REAL, unlike SUM()
        let net: f64 = sqlx::query_scalar(
            r#"
            SELECT
                TOTAL(CASE WHEN transaction_type = 'issue' THEN quantity END)
              - TOTAL(CASE WHEN transaction_type = 'return' THEN quantity END)
            FROM inventory_transactions
            WHERE inventory_id = ?1 AND (?2 IS NULL OR id <> ?2)
            "#,
        )
        .bind(inventory_id)
        .bind(excluding)
        .fetch_one(&mut *conn)
        .await?;

        Ok(net)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Appends a transaction.
    ///
    /// ## Errors
    /// * `UniqueViolation` on the sequence if another writer appended first
    /// * `ForeignKeyViolation` if the item or department is gone
    pub async fn insert(conn: &mut SqliteConnection, tx: &InventoryTransaction) -> DbResult<()> {
        debug!(
            id = %tx.id,
            inventory_id = %tx.inventory_id,
            transaction_type = %tx.transaction_type,
            sequence = tx.sequence,
            "Inserting inventory transaction"
        );

        sqlx::query(
            r#"
            INSERT INTO inventory_transactions (
                id, inventory_id, transaction_type, quantity, sequence, transaction_date,
                created_by_id, updated_by_id, department_id, notes,
                previous_status, previous_quantity, previous_total_units, resulting_quantity,
                is_locked, is_system_generated, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14,
                ?15, ?16, ?17, ?18
            )
            "#,
        )
        .bind(&tx.id)
        .bind(&tx.inventory_id)
        .bind(tx.transaction_type)
        .bind(tx.quantity)
        .bind(tx.sequence)
        .bind(tx.transaction_date)
        .bind(&tx.created_by_id)
        .bind(&tx.updated_by_id)
        .bind(&tx.department_id)
        .bind(&tx.notes)
        .bind(tx.previous_status)
        .bind(tx.previous_quantity)
        .bind(tx.previous_total_units)
        .bind(tx.resulting_quantity)
        .bind(tx.is_locked)
        .bind(tx.is_system_generated)
        .bind(tx.created_at)
        .bind(tx.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Rewrites the revisable fields and the undo snapshot of a transaction.
    pub async fn update(conn: &mut SqliteConnection, tx: &InventoryTransaction) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE inventory_transactions SET
                transaction_type = ?2,
                quantity = ?3,
                department_id = ?4,
                notes = ?5,
                updated_by_id = ?6,
                previous_status = ?7,
                previous_quantity = ?8,
                previous_total_units = ?9,
                resulting_quantity = ?10,
                updated_at = ?11
            WHERE id = ?1
            "#,
        )
        .bind(&tx.id)
        .bind(tx.transaction_type)
        .bind(tx.quantity)
        .bind(&tx.department_id)
        .bind(&tx.notes)
        .bind(&tx.updated_by_id)
        .bind(tx.previous_status)
        .bind(tx.previous_quantity)
        .bind(tx.previous_total_units)
        .bind(tx.resulting_quantity)
        .bind(tx.updated_at)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Transaction", &tx.id));
        }

        Ok(())
    }

    /// Sets or clears the administrative lock on a transaction.
    pub async fn set_locked(conn: &mut SqliteConnection, id: &str, locked: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE inventory_transactions SET is_locked = ?2 WHERE id = ?1")
            .bind(id)
            .bind(locked)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Transaction", id));
        }

        Ok(())
    }

    /// Removes a transaction.
    pub async fn delete(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM inventory_transactions WHERE id = ?1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Transaction", id));
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
