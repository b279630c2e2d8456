//! # larder-db: Database Layer for Larder
//!
//! SQLite storage for inventory items, the transaction ledger and
//! departments.
//!
//! ## Usage
//! ```rust,ignore
//! use larder_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./larder.db")).await?;
//! let items = db.inventories().list(&Default::default()).await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::{
    generate_id, DepartmentRepository, InventoryRepository, TransactionRepository,
};

// Re-exported so callers can name the unit-of-work types without a direct
// sqlx dependency.
pub use sqlx::{Sqlite, SqliteConnection, Transaction};
