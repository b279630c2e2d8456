//! # Schema Migrations
//!
//! The SQL files under `migrations/sqlite/` at the workspace root are compiled
//! into the binary and applied in version order on every open. sqlx records
//! each applied version with its checksum in `_sqlx_migrations`; an edited
//! file that was already applied fails the next open, so schema changes go in
//! a new `NNN_description.sql`.

use sqlx::migrate::Migrator;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;

static MIGRATOR: Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies every pending migration.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    for migration in MIGRATOR.iter() {
        debug!(version = migration.version, description = %migration.description, "Known migration");
    }

    MIGRATOR.run(pool).await?;

    info!(count = MIGRATOR.migrations.len(), "Schema up to date");
    Ok(())
}

/// Returns `(embedded, applied)` migration counts.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let applied: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await?;

    Ok((MIGRATOR.migrations.len(), applied as usize))
}
