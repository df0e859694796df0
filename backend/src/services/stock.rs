//! Stock projector: current stock derived from the ledger on every call

use std::sync::Arc;

use uuid::Uuid;

use shared::{MaterialFilter, MaterialStock, Page, Pagination, StockLevel};

use crate::error::AppResult;
use crate::store::LedgerStore;

#[derive(Clone)]
pub struct StockService {
    store: Arc<dyn LedgerStore>,
}

impl StockService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Receipts plus purchases minus sale items, cancelled movements excluded
    pub async fn current_stock(&self, material_id: Uuid) -> AppResult<StockLevel> {
        self.store.stock_of(material_id).await
    }

    /// Catalog listing with each material's current stock
    pub async fn list_stock(
        &self,
        filter: &MaterialFilter,
        page: Pagination,
    ) -> AppResult<Page<MaterialStock>> {
        self.store.list_stock(filter, page.normalized()).await
    }
}
