//! # Reports
//!
//! Fetches current inventory and the transactions inside the report window,
//! then hands both to [`larder_core::report::build_report`]. Nothing here
//! writes.

use tracing::debug;

use larder_core::report::build_report;
use larder_core::{InventoryFilter, Report, ReportQuery, ReportType, ReportWindow};

use crate::error::LedgerResult;
use crate::ledger::Ledger;

impl Ledger {
    /// Builds the report `query` selects.
    pub async fn generate_report(&self, query: &ReportQuery) -> LedgerResult<Report> {
        let window = ReportWindow::resolve(
            query.start,
            query.end,
            self.clock.now(),
            self.revision.offset(),
        );

        let items = self
            .db
            .inventories()
            .list(&InventoryFilter {
                kind: query.inventory_type,
                ..Default::default()
            })
            .await?;
        let transactions = self
            .db
            .transactions()
            .in_window(window.start, window.end)
            .await?;

        debug!(
            report_type = %query.report_type,
            items = items.len(),
            transactions = transactions.len(),
            start = %window.start,
            end = %window.end,
            "Building report"
        );

        Ok(build_report(query, &self.reports, &items, &transactions, window))
    }

    /// Builds a report selected by name over the default window.
    ///
    /// ## Errors
    /// * `UnknownReportType` - `report_type` is not one of
    ///   `summary`, `low_stock`, `value`, `usage`
    pub async fn generate_report_by_name(&self, report_type: &str) -> LedgerResult<Report> {
        let report_type: ReportType = report_type.parse()?;
        self.generate_report(&ReportQuery::new(report_type)).await
    }
}
