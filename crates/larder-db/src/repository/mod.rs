//! # Repository Module
//!
//! Database repository implementations for Larder.
//!
//! Outside a unit of work, read through the pool handles such as
//! `db.inventories()`. Inside one, call the associated functions with the
//! open transaction (`InventoryRepository::fetch(&mut tx, id)`) and commit
//! once at the end.
//!
//! ## Available Repositories
//!
//! - [`InventoryRepository`] - Items of both kinds, versioned writes
//! - [`TransactionRepository`] - The ledger and its aggregates
//! - [`DepartmentRepository`] - Department CRUD

pub mod department;
pub mod inventory;
pub mod transaction;

pub use department::DepartmentRepository;
pub use inventory::InventoryRepository;
pub use transaction::TransactionRepository;

use uuid::Uuid;

/// Generates a new entity ID (UUID v4).
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}
