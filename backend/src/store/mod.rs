//! Ledger storage
//!
//! Services talk to the ledger through [`LedgerStore`]. Every write is
//! atomic: referential checks, stock checks, code generation, the insert
//! itself and any cash posting either all commit or none do.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use shared::{
    CancelledMovement, CashBalance, CashTransaction, Category, LedgerEntry, Material,
    MaterialChanges, MaterialFilter, MaterialStock, MovementFilter, MovementKind, NewCashTransaction,
    NewCategory, NewMaterial, NewPartner, NewPurchase, NewReceipt, NewSale, Page, Pagination, Partner, PartnerChanges,
    PartnerFilter, Purchase, Receipt, ReportRange, Sale, StockLevel,
};

use crate::error::AppResult;

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait LedgerStore: Send + Sync {
    // Catalog
    async fn create_category(&self, input: NewCategory) -> AppResult<Category>;
    /// Every category, ordered by name
    async fn list_categories(&self) -> AppResult<Vec<Category>>;

    /// A material's category must name a registered category; it is stored
    /// with the catalog's spelling
    async fn create_material(&self, input: NewMaterial) -> AppResult<Material>;
    async fn update_material(&self, id: Uuid, changes: MaterialChanges) -> AppResult<Material>;
    async fn deactivate_material(&self, id: Uuid) -> AppResult<Material>;
    async fn get_material(&self, id: Uuid) -> AppResult<Material>;
    async fn list_materials(
        &self,
        filter: &MaterialFilter,
        page: Pagination,
    ) -> AppResult<Page<Material>>;

    async fn create_partner(&self, input: NewPartner) -> AppResult<Partner>;
    async fn update_partner(&self, id: Uuid, changes: PartnerChanges) -> AppResult<Partner>;
    async fn deactivate_partner(&self, id: Uuid) -> AppResult<Partner>;
    async fn get_partner(&self, id: Uuid) -> AppResult<Partner>;
    async fn list_partners(
        &self,
        filter: &PartnerFilter,
        page: Pagination,
    ) -> AppResult<Page<Partner>>;

    // Movements; `date` is the already-resolved movement date
    async fn insert_receipt(&self, input: NewReceipt, date: NaiveDate) -> AppResult<Receipt>;
    async fn insert_purchase(&self, input: NewPurchase, date: NaiveDate) -> AppResult<Purchase>;
    async fn insert_sale(&self, input: NewSale, date: NaiveDate) -> AppResult<Sale>;

    /// Flip a live movement to cancelled; `kind` restricts the lookup
    async fn cancel_movement(
        &self,
        id: Uuid,
        kind: Option<MovementKind>,
    ) -> AppResult<CancelledMovement>;

    async fn get_receipt(&self, id: Uuid) -> AppResult<Receipt>;
    async fn get_purchase(&self, id: Uuid) -> AppResult<Purchase>;
    async fn get_sale(&self, id: Uuid) -> AppResult<Sale>;
    async fn list_receipts(
        &self,
        filter: &MovementFilter,
        page: Pagination,
    ) -> AppResult<Page<Receipt>>;
    async fn list_purchases(
        &self,
        filter: &MovementFilter,
        page: Pagination,
    ) -> AppResult<Page<Purchase>>;
    async fn list_sales(&self, filter: &MovementFilter, page: Pagination) -> AppResult<Page<Sale>>;

    // Stock
    async fn stock_of(&self, material_id: Uuid) -> AppResult<StockLevel>;
    async fn list_stock(
        &self,
        filter: &MaterialFilter,
        page: Pagination,
    ) -> AppResult<Page<MaterialStock>>;

    /// Flattened ledger lines dated inside `range`, cancelled ones included
    async fn ledger_entries(&self, range: &ReportRange) -> AppResult<Vec<LedgerEntry>>;

    // Cash book
    async fn cash_balance(&self) -> AppResult<CashBalance>;
    async fn list_cash_transactions(&self, page: Pagination) -> AppResult<Page<CashTransaction>>;
    async fn insert_cash_transaction(
        &self,
        input: NewCashTransaction,
    ) -> AppResult<CashTransaction>;

    /// Connectivity check for the health endpoint
    async fn ping(&self) -> AppResult<()>;
}
