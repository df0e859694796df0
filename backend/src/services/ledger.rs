//! Movement ledger service: receipts, purchases, sales and cancellation
//!
//! Inputs are validated here; referential checks, the stock check and the
//! write itself happen atomically inside the store.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use shared::{
    validate_new_purchase, validate_new_receipt, validate_new_sale, CancelledMovement,
    MovementFilter, MovementKind, NewPurchase, NewReceipt, NewSale, Page, Pagination, Purchase,
    Receipt, Sale,
};

use crate::error::AppResult;
use crate::store::LedgerStore;

/// Ledger service for recording and cancelling stock movements
#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
}

fn movement_date(date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(|| Utc::now().date_naive())
}

impl LedgerService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Record a donation received from a partner
    #[tracing::instrument(skip(self, input), fields(partner_id = %input.partner_id, material_id = %input.material_id))]
    pub async fn create_receipt(&self, input: NewReceipt) -> AppResult<Receipt> {
        validate_new_receipt(&input)?;
        let date = movement_date(input.date);
        let receipt = self.store.insert_receipt(input, date).await?;
        tracing::info!(
            receipt_id = %receipt.id,
            lot_code = %receipt.lot_code,
            quantity = %receipt.quantity,
            "Receipt recorded"
        );
        Ok(receipt)
    }

    /// Record a paid acquisition; books the payment in the cash book
    #[tracing::instrument(skip(self, input), fields(partner_id = %input.partner_id, material_id = %input.material_id))]
    pub async fn create_purchase(&self, input: NewPurchase) -> AppResult<Purchase> {
        validate_new_purchase(&input)?;
        let date = movement_date(input.date);
        let purchase = self.store.insert_purchase(input, date).await?;
        tracing::info!(
            purchase_id = %purchase.id,
            code = %purchase.code,
            total_paid = %purchase.total_paid,
            "Purchase recorded"
        );
        Ok(purchase)
    }

    /// Record a sale; rejected as a whole if any line would oversell
    #[tracing::instrument(skip(self, input), fields(buyer_id = %input.buyer_id, items = input.items.len()))]
    pub async fn create_sale(&self, input: NewSale) -> AppResult<Sale> {
        validate_new_sale(&input)?;
        let date = movement_date(input.date);
        let sale = self.store.insert_sale(input, date).await?;
        tracing::info!(sale_id = %sale.id, code = %sale.code, total = ?sale.total().ok(), "Sale recorded");
        Ok(sale)
    }

    /// Cancel whichever movement has this id
    #[tracing::instrument(skip(self))]
    pub async fn cancel_movement(&self, id: Uuid) -> AppResult<CancelledMovement> {
        self.cancel(id, None).await
    }

    pub async fn cancel_receipt(&self, id: Uuid) -> AppResult<CancelledMovement> {
        self.cancel(id, Some(MovementKind::Receipt)).await
    }

    pub async fn cancel_purchase(&self, id: Uuid) -> AppResult<CancelledMovement> {
        self.cancel(id, Some(MovementKind::Purchase)).await
    }

    pub async fn cancel_sale(&self, id: Uuid) -> AppResult<CancelledMovement> {
        self.cancel(id, Some(MovementKind::Sale)).await
    }

    async fn cancel(&self, id: Uuid, kind: Option<MovementKind>) -> AppResult<CancelledMovement> {
        let cancelled = self.store.cancel_movement(id, kind).await?;
        tracing::info!(movement_id = %id, kind = %cancelled.kind, "Movement cancelled");
        Ok(cancelled)
    }

    pub async fn get_receipt(&self, id: Uuid) -> AppResult<Receipt> {
        self.store.get_receipt(id).await
    }

    pub async fn get_purchase(&self, id: Uuid) -> AppResult<Purchase> {
        self.store.get_purchase(id).await
    }

    pub async fn get_sale(&self, id: Uuid) -> AppResult<Sale> {
        self.store.get_sale(id).await
    }

    pub async fn list_receipts(
        &self,
        filter: &MovementFilter,
        page: Pagination,
    ) -> AppResult<Page<Receipt>> {
        filter.range().validate()?;
        self.store.list_receipts(filter, page.normalized()).await
    }

    pub async fn list_purchases(
        &self,
        filter: &MovementFilter,
        page: Pagination,
    ) -> AppResult<Page<Purchase>> {
        filter.range().validate()?;
        self.store.list_purchases(filter, page.normalized()).await
    }

    pub async fn list_sales(&self, filter: &MovementFilter, page: Pagination) -> AppResult<Page<Sale>> {
        filter.range().validate()?;
        self.store.list_sales(filter, page.normalized()).await
    }
}
