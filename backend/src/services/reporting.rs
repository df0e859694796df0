//! Reporting service for period summaries and CSV export

use std::sync::Arc;

use serde::Serialize;

use shared::report;
use shared::{MaterialReportRow, PartnerReportRow, ReportRange, ReportSummary};

use crate::error::{AppError, AppResult};
use crate::store::LedgerStore;

/// Reporting service; aggregation is the shared fold over ledger entries
#[derive(Clone)]
pub struct ReportingService {
    store: Arc<dyn LedgerStore>,
}

impl ReportingService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Totals received, purchased and sold, with revenue and gross profit
    #[tracing::instrument(skip(self))]
    pub async fn summary(&self, range: ReportRange) -> AppResult<ReportSummary> {
        range.validate()?;
        let entries = self.store.ledger_entries(&range).await?;
        Ok(report::summarize(&entries, &range)?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn by_material(&self, range: ReportRange) -> AppResult<Vec<MaterialReportRow>> {
        range.validate()?;
        let entries = self.store.ledger_entries(&range).await?;
        Ok(report::by_material(&entries, &range)?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn by_partner(&self, range: ReportRange) -> AppResult<Vec<PartnerReportRow>> {
        range.validate()?;
        let entries = self.store.ledger_entries(&range).await?;
        Ok(report::by_partner(&entries, &range)?)
    }

    /// Export report data as CSV
    pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in data {
            wtr.serialize(record)
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
    }
}
