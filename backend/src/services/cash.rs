//! Cash book service
//!
//! Sales and purchases post here automatically from inside the store; this
//! service covers the balance, the listing and manual entries.

use std::sync::Arc;

use validator::Validate;

use shared::{validate_cash_amount, CashBalance, CashTransaction, NewCashTransaction, Page, Pagination};

use crate::error::AppResult;
use crate::store::LedgerStore;

#[derive(Clone)]
pub struct CashService {
    store: Arc<dyn LedgerStore>,
}

impl CashService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub async fn balance(&self) -> AppResult<CashBalance> {
        self.store.cash_balance().await
    }

    pub async fn list_transactions(&self, page: Pagination) -> AppResult<Page<CashTransaction>> {
        self.store.list_cash_transactions(page.normalized()).await
    }

    /// Manual entry, never linked to a movement
    #[tracing::instrument(skip(self, input), fields(kind = %input.kind.as_str(), amount = %input.amount))]
    pub async fn record_manual(&self, input: NewCashTransaction) -> AppResult<CashTransaction> {
        validate_cash_amount(&input)?;
        input.validate()?;
        let tx = self.store.insert_cash_transaction(input).await?;
        tracing::info!(transaction_id = %tx.id, "Manual cash entry recorded");
        Ok(tx)
    }
}
