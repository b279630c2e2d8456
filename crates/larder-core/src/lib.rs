//! # larder-core: Pure Ledger Logic for Larder
//!
//! Everything the inventory ledger decides, with no I/O: what a transaction
//! does to an item, whether a recorded transaction may still be revised, and
//! how reports roll up stock and history.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Larder Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 larder-ledger (Service Layer)                   │   │
//! │  │  process_transaction, update/delete_transaction, reports       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ larder-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   rules   │  │ revision  │  │  report   │  │   │
//! │  │   │ Inventory │  │  derive   │  │  locking  │  │  rollups  │  │   │
//! │  │   │    Tx     │  │ reconcile │  │  patches  │  │  windows  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                   larder-db (Database Layer)                    │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Inventory, transactions, departments, inputs and filters
//! - [`rules`] - Status derivation and ledger reconciliation
//! - [`revision`] - Lock checks and transaction patches
//! - [`report`] - Report selection and aggregation
//! - [`roles`] - Role hierarchy and permission checks
//! - [`clock`] - Injectable time source
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use larder_core::rules::{Rules, StatusPolicy};
//! use larder_core::types::TransactionType;
//! use larder_core::{Inventory, InventoryDetails, InventoryStatus, RawMaterialDetails};
//!
//! let now = chrono::Utc::now();
//! let flour = Inventory {
//!     id: "flour".to_string(),
//!     name: "Flour".to_string(),
//!     description: None,
//!     price_per_unit: None,
//!     status: InventoryStatus::InStock,
//!     supplier_id: None,
//!     details: InventoryDetails::RawMaterial(RawMaterialDetails {
//!         quantity: 100.0,
//!         quantity_unit: Default::default(),
//!         batch_number: None,
//!         expiry_date: None,
//!         critical_threshold: Some(20.0),
//!         is_perishable: false,
//!     }),
//!     version: 0,
//!     created_at: now,
//!     updated_at: now,
//! };
//!
//! let rules = Rules::new(StatusPolicy::default());
//! let next = rules.apply(&flour, TransactionType::Issue, 85.0, 0.0).unwrap();
//!
//! assert_eq!(next.resulting_quantity(), 15.0);
//! assert_eq!(next.status, InventoryStatus::LowStock);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod clock;
pub mod error;
pub mod report;
pub mod revision;
pub mod roles;
pub mod rules;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{CoreError, CoreResult, LockReason, ValidationError};
pub use report::{Report, ReportQuery, ReportType, ReportWindow};
pub use revision::{RevisionPolicy, TransactionPatch};
pub use roles::{Actor, Role};
pub use rules::{CurrentStatus, Rules, StatusPolicy};
pub use types::*;
