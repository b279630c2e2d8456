//! # Ledger Facade
//!
//! [`Ledger`] owns the database, the clock and the configured rules. Every
//! operation lives in an `impl Ledger` block in its own module:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              Ledger                                     │
//! │                                                                         │
//! │  processor.rs   process_transaction, transaction queries               │
//! │  revision.rs    update_transaction, delete_transaction, locking        │
//! │  inventory.rs   item lifecycle, calculate_current_status               │
//! │  department.rs  department CRUD                                        │
//! │  reports.rs     generate_report                                        │
//! │                                                                         │
//! │  UNIT OF WORK (mutations):                                             │
//! │  ─────────────────────────                                             │
//! │  begin (write lock) ─► read ─► derive (larder-core)                    │
//! │        ─► write (version-guarded) ─► commit                             │
//! │           │                                                             │
//! │           └── Conflict / busy ─► rollback ─► backoff ─► retry          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use larder_core::report::ReportSettings;
use larder_core::{Clock, CoreError, RevisionPolicy, Rules, SystemClock};
use larder_db::{Database, DbError, Sqlite, Transaction};

use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};

/// Inventory ledger service.
pub struct Ledger {
    /// Database connection.
    pub(crate) db: Arc<Database>,

    /// Time source for transaction dates, staleness and report windows.
    pub(crate) clock: Arc<dyn Clock>,

    pub(crate) rules: Rules,

    pub(crate) revision: RevisionPolicy,

    pub(crate) reports: ReportSettings,

    /// Extra attempts after a lost version race.
    max_conflict_retries: u32,
}

impl Ledger {
    /// Creates a ledger over an open database.
    pub fn new(
        db: Arc<Database>,
        clock: Arc<dyn Clock>,
        config: &LedgerConfig,
    ) -> LedgerResult<Self> {
        config.validate()?;

        Ok(Ledger {
            db,
            clock,
            rules: Rules::new(config.ledger.status_policy),
            revision: config.revision_policy()?,
            reports: config.report_settings(),
            max_conflict_retries: config.ledger.max_conflict_retries,
        })
    }

    /// Opens the configured database (running migrations) on the system clock.
    pub async fn open(config: &LedgerConfig) -> LedgerResult<Self> {
        info!(
            path = ?config.database.path,
            policy = %config.ledger.status_policy,
            "Opening ledger"
        );

        let db = Database::new(config.database.db_config()).await?;
        Self::new(Arc::new(db), Arc::new(SystemClock), config)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn rules(&self) -> Rules {
        self.rules
    }

    pub fn revision_policy(&self) -> RevisionPolicy {
        self.revision
    }

    /// Runs `unit` until it commits, fails for a non-transient reason, or
    /// has lost `max_conflict_retries + 1` version races.
    pub(crate) async fn retrying<T, F, Fut>(
        &self,
        entity: &'static str,
        id: &str,
        mut unit: F,
    ) -> LedgerResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = LedgerResult<T>>,
    {
        let attempts = self.max_conflict_retries + 1;
        let mut backoff = retry_backoff();

        for attempt in 1..=attempts {
            match unit().await {
                Err(LedgerError::Db(err)) if err.is_retryable() => {
                    warn!(
                        entity,
                        id,
                        attempt,
                        max_attempts = attempts,
                        error = %err,
                        "Unit of work lost a concurrent write, retrying"
                    );
                    if attempt < attempts {
                        let delay = backoff.next_backoff().unwrap_or(RETRY_MAX_INTERVAL);
                        tokio::time::sleep(delay).await;
                    }
                }
                result => return result,
            }
        }

        Err(LedgerError::ConcurrentModification {
            entity,
            id: id.to_string(),
            attempts,
        })
    }
}

const RETRY_INITIAL_INTERVAL: Duration = Duration::from_millis(10);
const RETRY_MAX_INTERVAL: Duration = Duration::from_millis(250);

/// Jittered exponential delays between attempts, so writers that lost the
/// same race do not collide again on the next one.
fn retry_backoff() -> ExponentialBackoff {
    ExponentialBackoff {
        current_interval: RETRY_INITIAL_INTERVAL,
        initial_interval: RETRY_INITIAL_INTERVAL,
        max_interval: RETRY_MAX_INTERVAL,
        multiplier: 2.0,
        max_elapsed_time: None,
        ..Default::default()
    }
}

/// Maps a unique-constraint failure on `column` to `DuplicateName`.
pub(crate) fn duplicate_name(
    err: DbError,
    column: &str,
    entity: &'static str,
    name: &str,
) -> LedgerError {
    if err.is_unique_on(column) {
        CoreError::DuplicateName {
            entity,
            name: name.to_string(),
        }
        .into()
    } else {
        err.into()
    }
}

/// Commits a unit of work.
pub(crate) async fn commit(tx: Transaction<'static, Sqlite>) -> LedgerResult<()> {
    tx.commit().await.map_err(DbError::from)?;
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retrying_gives_up_after_configured_attempts() {
        let (ledger, _clock) = ledger().await;
        let calls = AtomicU32::new(0);

        let result: LedgerResult<()> = ledger
            .retrying("Inventory", "inv-1", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(LedgerError::from(DbError::conflict("Inventory", "inv-1"))) }
            })
            .await;

        assert!(matches!(
            result,
            Err(LedgerError::ConcurrentModification { attempts: 4, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_retrying_stops_on_permanent_error() {
        let (ledger, _clock) = ledger().await;
        let calls = AtomicU32::new(0);

        let result: LedgerResult<()> = ledger
            .retrying("Inventory", "inv-1", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(LedgerError::from(CoreError::not_found("Inventory", "inv-1"))) }
            })
            .await;

        assert!(matches!(result, Err(LedgerError::Core(CoreError::NotFound { .. }))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retrying_recovers_after_conflict() {
        let (ledger, _clock) = ledger().await;
        let calls = AtomicU32::new(0);

        let result = ledger
            .retrying("Inventory", "inv-1", || {
                let attempt = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 0 {
                        Err(LedgerError::from(DbError::conflict("Inventory", "inv-1")))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, 1);
    }

    #[test]
    fn test_retry_backoff_grows_and_stays_bounded() {
        let mut backoff = retry_backoff();

        let first = backoff.next_backoff().unwrap();
        assert!(first >= RETRY_INITIAL_INTERVAL / 2 && first <= RETRY_INITIAL_INTERVAL * 3 / 2);

        for _ in 0..20 {
            let delay = backoff.next_backoff().unwrap();
            assert!(delay <= RETRY_MAX_INTERVAL * 3 / 2, "{delay:?}");
        }
    }
}
