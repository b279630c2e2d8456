//! # larder-ledger: Ledger Services for Larder
//!
//! Units of work over [`larder_db`] driven by the rules in [`larder_core`].
//! Every mutating operation takes the acting [`Actor`], runs in a single
//! SQLite transaction, and either commits completely or leaves nothing behind.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           HTTP boundary                                 │
//! │              (maps LedgerError ─► ApiError + status code)               │
//! └──────────────────────────────────┬──────────────────────────────────────┘
//!                                    │
//! ┌──────────────────────────────────▼──────────────────────────────────────┐
//! │                              Ledger                                     │
//! │                                                                         │
//! │  process_transaction      update_transaction     create_raw_material   │
//! │  get_transaction          delete_transaction     create_equipment      │
//! │  list_transactions        set_transaction_lock   update_* / delete_*   │
//! │  transactions_for_...                            calculate_current_... │
//! │                                                                         │
//! │  create/get/list/update/delete_department        generate_report       │
//! └───────────┬─────────────────────────────────────────────┬───────────────┘
//!             │ Rules, RevisionPolicy, build_report         │ repositories
//!   ┌─────────▼─────────┐                         ┌─────────▼─────────┐
//!   │    larder-core    │                         │     larder-db     │
//!   └───────────────────┘                         └───────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! use larder_ledger::{Ledger, LedgerConfig};
//!
//! larder_ledger::init_tracing();
//! let config = LedgerConfig::load(None)?;
//! let ledger = Ledger::open(&config).await?;
//!
//! let tx = ledger.process_transaction(&intent, &actor).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod department;
pub mod error;
pub mod inventory;
pub mod ledger;
pub mod processor;
pub mod reports;
pub mod revision;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use config::LedgerConfig;
pub use error::{ApiError, ErrorCode, LedgerError, LedgerResult};
pub use inventory::INITIAL_INVENTORY_NOTE;
pub use ledger::Ledger;
pub use larder_core::{Actor, Role};

use tracing_subscriber::EnvFilter;

/// Installs the global `fmt` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `info,larder=debug,sqlx=warn`.
/// Does nothing if a subscriber is already installed.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,larder=debug,sqlx=warn"));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
