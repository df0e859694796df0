//! In-memory ledger store
//!
//! A single `RwLock` guards the whole ledger, so every write holds the
//! write guard from its checks through to its commit and writes are
//! serialized. Used by the test suites and by `storage.backend = "memory"`.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use shared::ledger::{self, CashPosting};
use shared::LedgerResult;
use shared::{
    CancelledMovement, CashBalance, CashTransaction, Category, EntryKind, LedgerEntry, Material,
    MaterialChanges, MaterialFilter, MaterialStock, MovementFilter, MovementKind,
    NewCashTransaction, NewCategory, NewMaterial, NewPartner, NewPurchase, NewReceipt, NewSale, Page,
    Pagination, Partner, PartnerChanges, PartnerFilter, Purchase, Receipt, ReportRange, Sale,
    SaleItem, StockLevel,
};

use super::LedgerStore;
use crate::error::{AppError, AppResult};

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<LedgerState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Default)]
struct LedgerState {
    categories: Vec<Category>,
    materials: HashMap<Uuid, Material>,
    partners: HashMap<Uuid, Partner>,
    receipts: Vec<Receipt>,
    purchases: Vec<Purchase>,
    sales: Vec<Sale>,
    cash: Vec<CashTransaction>,
}

impl LedgerState {
    fn material(&self, id: Uuid) -> AppResult<&Material> {
        self.materials
            .get(&id)
            .ok_or_else(|| AppError::not_found("Material"))
    }

    fn partner(&self, id: Uuid) -> AppResult<&Partner> {
        self.partners
            .get(&id)
            .ok_or_else(|| AppError::not_found("Partner"))
    }

    /// Catalog spelling of `name`; blank clears the category
    fn resolve_category(&self, name: Option<&str>) -> AppResult<Option<String>> {
        match name.and_then(shared::non_empty) {
            None => Ok(None),
            Some(name) => shared::find_category(&self.categories, &name)
                .map(|c| Some(c.name.clone()))
                .ok_or_else(|| AppError::validation("category", "Unknown category")),
        }
    }

    fn material_name_taken(&self, name: &str, except: Option<Uuid>) -> bool {
        let name = name.trim().to_lowercase();
        self.materials
            .values()
            .any(|m| Some(m.id) != except && m.name.to_lowercase() == name)
    }

    fn partner_name_taken(&self, name: &str, except: Option<Uuid>) -> bool {
        let name = name.trim().to_lowercase();
        self.partners
            .values()
            .any(|p| Some(p.id) != except && p.name.to_lowercase() == name)
    }

    /// Every ledger line joined with catalog names
    fn entries(&self) -> LedgerResult<Vec<LedgerEntry>> {
        let mut entries = Vec::new();

        let mut push = |kind: EntryKind,
                        movement_id: Uuid,
                        date: NaiveDate,
                        material_id: Uuid,
                        partner_id: Uuid,
                        quantity: Decimal,
                        amount: Decimal,
                        cancelled: bool| {
            let (Some(material), Some(partner)) =
                (self.materials.get(&material_id), self.partners.get(&partner_id))
            else {
                return;
            };
            entries.push(LedgerEntry {
                kind,
                movement_id,
                date,
                material_id,
                material_name: material.name.clone(),
                unit_of_measure: material.unit_of_measure.clone(),
                partner_id,
                partner_name: partner.name.clone(),
                partner_type: partner.partner_type,
                quantity,
                amount,
                cancelled,
            });
        };

        for r in &self.receipts {
            push(
                EntryKind::Receipt,
                r.id,
                r.date,
                r.material_id,
                r.partner_id,
                r.quantity,
                Decimal::ZERO,
                r.cancelled,
            );
        }
        for p in &self.purchases {
            push(
                EntryKind::Purchase,
                p.id,
                p.date,
                p.material_id,
                p.partner_id,
                p.quantity,
                p.total_paid,
                p.cancelled,
            );
        }
        for s in &self.sales {
            for item in &s.items {
                push(
                    EntryKind::SaleItem,
                    s.id,
                    s.date,
                    item.material_id,
                    s.buyer_id,
                    item.quantity_sold,
                    item.line_total()?,
                    s.cancelled,
                );
            }
        }
        Ok(entries)
    }

    fn on_hand(&self, material_id: Uuid) -> LedgerResult<Decimal> {
        ledger::project_stock(&self.entries()?, material_id)?.on_hand()
    }

    fn next_code(&self, kind: MovementKind, day: NaiveDate) -> String {
        match kind {
            MovementKind::Receipt => {
                ledger::next_movement_code(kind, day, self.receipts.iter().map(|r| r.lot_code.as_str()))
            }
            MovementKind::Purchase => {
                ledger::next_movement_code(kind, day, self.purchases.iter().map(|p| p.code.as_str()))
            }
            MovementKind::Sale => {
                ledger::next_movement_code(kind, day, self.sales.iter().map(|s| s.code.as_str()))
            }
        }
    }

    fn book(
        &mut self,
        posting: CashPosting,
        purchase_id: Option<Uuid>,
        sale_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) {
        self.cash.push(CashTransaction {
            id: Uuid::new_v4(),
            kind: posting.kind,
            amount: posting.amount,
            description: Some(posting.description),
            purchase_id,
            sale_id,
            created_at: now,
        });
    }

    fn cancel_receipt(&mut self, id: Uuid, now: DateTime<Utc>) -> AppResult<Option<()>> {
        let Some(idx) = self.receipts.iter().position(|r| r.id == id && !r.cancelled) else {
            return Ok(None);
        };
        let (material_id, quantity) = (self.receipts[idx].material_id, self.receipts[idx].quantity);
        ledger::check_inflow_cancellation(material_id, self.on_hand(material_id)?, quantity)?;

        let receipt = &mut self.receipts[idx];
        receipt.cancelled = true;
        receipt.cancelled_at = Some(now);
        Ok(Some(()))
    }

    fn cancel_purchase(&mut self, id: Uuid, now: DateTime<Utc>) -> AppResult<Option<()>> {
        let Some(idx) = self.purchases.iter().position(|p| p.id == id && !p.cancelled) else {
            return Ok(None);
        };
        let (material_id, quantity) =
            (self.purchases[idx].material_id, self.purchases[idx].quantity);
        ledger::check_inflow_cancellation(material_id, self.on_hand(material_id)?, quantity)?;

        let purchase = &mut self.purchases[idx];
        purchase.cancelled = true;
        purchase.cancelled_at = Some(now);
        if let Some(posting) = ledger::purchase_posting(purchase) {
            self.book(posting.reversal(), Some(id), None, now);
        }
        Ok(Some(()))
    }

    fn cancel_sale(&mut self, id: Uuid, now: DateTime<Utc>) -> AppResult<Option<()>> {
        let Some(sale) = self.sales.iter_mut().find(|s| s.id == id && !s.cancelled) else {
            return Ok(None);
        };
        let posting = ledger::sale_posting(sale)?;
        sale.cancelled = true;
        sale.cancelled_at = Some(now);
        self.book(posting.reversal(), None, Some(id), now);
        Ok(Some(()))
    }
}

fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> (NaiveDate, DateTime<Utc>)) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

fn paged<T: Clone>(items: Vec<T>, page: Pagination) -> Page<T> {
    let total = items.len() as i64;
    Page::new(page.slice(&items), total)
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn create_category(&self, input: NewCategory) -> AppResult<Category> {
        let mut state = self.state.write().await;
        if shared::find_category(&state.categories, &input.name).is_some() {
            return Err(AppError::conflict("name", "A category with this name already exists"));
        }
        let category = Category {
            id: Uuid::new_v4(),
            name: input.name.trim().to_string(),
            created_at: Utc::now(),
        };
        state.categories.push(category.clone());
        Ok(category)
    }

    async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let state = self.state.read().await;
        let mut categories = state.categories.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn create_material(&self, input: NewMaterial) -> AppResult<Material> {
        let mut state = self.state.write().await;
        if state.material_name_taken(&input.name, None) {
            return Err(AppError::conflict("name", "A material with this name already exists"));
        }
        let category = state.resolve_category(input.category.as_deref())?;

        let now = Utc::now();
        let material = Material {
            id: Uuid::new_v4(),
            code: ledger::material_code(state.materials.len() as i64 + 1),
            name: input.name.trim().to_string(),
            category,
            unit_of_measure: input.unit_or_default(),
            active: true,
            created_at: now,
            updated_at: now,
        };
        state.materials.insert(material.id, material.clone());
        Ok(material)
    }

    async fn update_material(&self, id: Uuid, changes: MaterialChanges) -> AppResult<Material> {
        let mut state = self.state.write().await;
        state.material(id)?;
        if let Some(name) = &changes.name {
            if state.material_name_taken(name, Some(id)) {
                return Err(AppError::conflict("name", "A material with this name already exists"));
            }
        }
        let category = changes
            .category
            .as_deref()
            .map(|name| state.resolve_category(Some(name)))
            .transpose()?;
        let material = state
            .materials
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("Material"))?;
        changes.apply(material, Utc::now());
        if let Some(category) = category {
            material.category = category;
        }
        Ok(material.clone())
    }

    async fn deactivate_material(&self, id: Uuid) -> AppResult<Material> {
        let mut state = self.state.write().await;
        let material = state
            .materials
            .get_mut(&id)
            .filter(|m| m.active)
            .ok_or_else(|| AppError::not_found("Material"))?;
        material.active = false;
        material.updated_at = Utc::now();
        Ok(material.clone())
    }

    async fn get_material(&self, id: Uuid) -> AppResult<Material> {
        let state = self.state.read().await;
        state.material(id).cloned()
    }

    async fn list_materials(
        &self,
        filter: &MaterialFilter,
        page: Pagination,
    ) -> AppResult<Page<Material>> {
        let state = self.state.read().await;
        let mut materials: Vec<Material> = state
            .materials
            .values()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();
        materials.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(paged(materials, page))
    }

    async fn create_partner(&self, input: NewPartner) -> AppResult<Partner> {
        let mut state = self.state.write().await;
        if state.partner_name_taken(&input.name, None) {
            return Err(AppError::conflict("name", "A partner with this name already exists"));
        }

        let now = Utc::now();
        let partner = Partner {
            id: Uuid::new_v4(),
            name: input.name.trim().to_string(),
            partner_type: input.partner_type,
            cnpj: input.cnpj.as_deref().and_then(shared::normalize_cnpj),
            leader_name: input.leader_name.as_deref().and_then(shared::non_empty),
            phone: input.phone.as_deref().and_then(shared::non_empty),
            email: input.email.as_deref().and_then(shared::non_empty),
            active: true,
            created_at: now,
            updated_at: now,
        };
        state.partners.insert(partner.id, partner.clone());
        Ok(partner)
    }

    async fn update_partner(&self, id: Uuid, changes: PartnerChanges) -> AppResult<Partner> {
        let mut state = self.state.write().await;
        state.partner(id)?;
        if let Some(name) = &changes.name {
            if state.partner_name_taken(name, Some(id)) {
                return Err(AppError::conflict("name", "A partner with this name already exists"));
            }
        }
        let partner = state
            .partners
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("Partner"))?;
        changes.apply(partner, Utc::now());
        Ok(partner.clone())
    }

    async fn deactivate_partner(&self, id: Uuid) -> AppResult<Partner> {
        let mut state = self.state.write().await;
        let partner = state
            .partners
            .get_mut(&id)
            .filter(|p| p.active)
            .ok_or_else(|| AppError::not_found("Partner"))?;
        partner.active = false;
        partner.updated_at = Utc::now();
        Ok(partner.clone())
    }

    async fn get_partner(&self, id: Uuid) -> AppResult<Partner> {
        let state = self.state.read().await;
        state.partner(id).cloned()
    }

    async fn list_partners(
        &self,
        filter: &PartnerFilter,
        page: Pagination,
    ) -> AppResult<Page<Partner>> {
        let state = self.state.read().await;
        let mut partners: Vec<Partner> = state
            .partners
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        partners.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(paged(partners, page))
    }

    async fn insert_receipt(&self, input: NewReceipt, date: NaiveDate) -> AppResult<Receipt> {
        let mut state = self.state.write().await;
        state.partner(input.partner_id)?;
        state.material(input.material_id)?;

        let now = Utc::now();
        let receipt = Receipt {
            id: Uuid::new_v4(),
            lot_code: state.next_code(MovementKind::Receipt, now.date_naive()),
            date,
            partner_id: input.partner_id,
            material_id: input.material_id,
            quantity: input.quantity,
            cancelled: false,
            created_at: now,
            cancelled_at: None,
        };
        state.receipts.push(receipt.clone());
        Ok(receipt)
    }

    async fn insert_purchase(&self, input: NewPurchase, date: NaiveDate) -> AppResult<Purchase> {
        let mut state = self.state.write().await;
        state.partner(input.partner_id)?;
        state.material(input.material_id)?;

        let now = Utc::now();
        let purchase = Purchase {
            id: Uuid::new_v4(),
            code: state.next_code(MovementKind::Purchase, now.date_naive()),
            date,
            partner_id: input.partner_id,
            material_id: input.material_id,
            quantity: input.quantity,
            unit_price_paid: input.unit_price_paid,
            total_paid: ledger::purchase_total(input.quantity, input.unit_price_paid)?,
            cancelled: false,
            created_at: now,
            cancelled_at: None,
        };
        if let Some(posting) = ledger::purchase_posting(&purchase) {
            state.book(posting, Some(purchase.id), None, now);
        }
        state.purchases.push(purchase.clone());
        Ok(purchase)
    }

    async fn insert_sale(&self, input: NewSale, date: NaiveDate) -> AppResult<Sale> {
        let mut state = self.state.write().await;
        let buyer = state.partner(input.buyer_id)?;
        ledger::ensure_buyer(buyer)?;

        let requested = ledger::requested_by_material(&input.items)?;
        for material_id in requested.keys() {
            state.material(*material_id)?;
        }
        let stock = ledger::project_all(&state.entries()?)?;
        let mut available = BTreeMap::new();
        for material_id in requested.keys() {
            let on_hand = match stock.get(material_id) {
                Some(totals) => totals.on_hand()?,
                None => Decimal::ZERO,
            };
            available.insert(*material_id, on_hand);
        }
        ledger::check_sale_availability(&requested, |id| {
            available.get(&id).copied().unwrap_or_default()
        })?;

        let now = Utc::now();
        let sale_id = Uuid::new_v4();
        let sale = Sale {
            id: sale_id,
            code: state.next_code(MovementKind::Sale, now.date_naive()),
            date,
            buyer_id: input.buyer_id,
            cancelled: false,
            items: input
                .items
                .iter()
                .map(|item| SaleItem {
                    id: Uuid::new_v4(),
                    sale_id,
                    material_id: item.material_id,
                    quantity_sold: item.quantity_sold,
                    unit_price: item.unit_price,
                })
                .collect(),
            created_at: now,
            cancelled_at: None,
        };
        let posting = ledger::sale_posting(&sale)?;
        state.book(posting, None, Some(sale_id), now);
        state.sales.push(sale.clone());
        Ok(sale)
    }

    async fn cancel_movement(
        &self,
        id: Uuid,
        kind: Option<MovementKind>,
    ) -> AppResult<CancelledMovement> {
        let mut state = self.state.write().await;
        let now = Utc::now();

        for candidate in [MovementKind::Receipt, MovementKind::Purchase, MovementKind::Sale] {
            if kind.map_or(false, |k| k != candidate) {
                continue;
            }
            let cancelled = match candidate {
                MovementKind::Receipt => state.cancel_receipt(id, now)?,
                MovementKind::Purchase => state.cancel_purchase(id, now)?,
                MovementKind::Sale => state.cancel_sale(id, now)?,
            };
            if cancelled.is_some() {
                return Ok(CancelledMovement {
                    id,
                    kind: candidate,
                    cancelled_at: now,
                });
            }
        }

        Err(AppError::not_found(
            kind.map_or("Movement", |k| match k {
                MovementKind::Receipt => "Receipt",
                MovementKind::Purchase => "Purchase",
                MovementKind::Sale => "Sale",
            }),
        ))
    }

    async fn get_receipt(&self, id: Uuid) -> AppResult<Receipt> {
        let state = self.state.read().await;
        state
            .receipts
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Receipt"))
    }

    async fn get_purchase(&self, id: Uuid) -> AppResult<Purchase> {
        let state = self.state.read().await;
        state
            .purchases
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Purchase"))
    }

    async fn get_sale(&self, id: Uuid) -> AppResult<Sale> {
        let state = self.state.read().await;
        state
            .sales
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Sale"))
    }

    async fn list_receipts(
        &self,
        filter: &MovementFilter,
        page: Pagination,
    ) -> AppResult<Page<Receipt>> {
        let state = self.state.read().await;
        let mut receipts: Vec<Receipt> = state
            .receipts
            .iter()
            .filter(|r| filter.matches_receipt(r))
            .cloned()
            .collect();
        newest_first(&mut receipts, |r| (r.date, r.created_at));
        Ok(paged(receipts, page))
    }

    async fn list_purchases(
        &self,
        filter: &MovementFilter,
        page: Pagination,
    ) -> AppResult<Page<Purchase>> {
        let state = self.state.read().await;
        let mut purchases: Vec<Purchase> = state
            .purchases
            .iter()
            .filter(|p| filter.matches_purchase(p))
            .cloned()
            .collect();
        newest_first(&mut purchases, |p| (p.date, p.created_at));
        Ok(paged(purchases, page))
    }

    async fn list_sales(&self, filter: &MovementFilter, page: Pagination) -> AppResult<Page<Sale>> {
        let state = self.state.read().await;
        let mut sales: Vec<Sale> = state
            .sales
            .iter()
            .filter(|s| filter.matches_sale(s))
            .cloned()
            .collect();
        newest_first(&mut sales, |s| (s.date, s.created_at));
        Ok(paged(sales, page))
    }

    async fn stock_of(&self, material_id: Uuid) -> AppResult<StockLevel> {
        let state = self.state.read().await;
        let material = state.material(material_id)?;
        Ok(StockLevel {
            material_id,
            quantity: state.on_hand(material_id)?,
            unit_of_measure: material.unit_of_measure.clone(),
        })
    }

    async fn list_stock(
        &self,
        filter: &MaterialFilter,
        page: Pagination,
    ) -> AppResult<Page<MaterialStock>> {
        let state = self.state.read().await;
        let totals = ledger::project_all(&state.entries()?)?;
        let mut rows = state
            .materials
            .values()
            .filter(|m| filter.matches(m))
            .map(|m| {
                let current_stock = match totals.get(&m.id) {
                    Some(t) => t.on_hand()?,
                    None => Decimal::ZERO,
                };
                Ok(MaterialStock {
                    id: m.id,
                    code: m.code.clone(),
                    name: m.name.clone(),
                    category: m.category.clone(),
                    unit_of_measure: m.unit_of_measure.clone(),
                    current_stock,
                })
            })
            .collect::<LedgerResult<Vec<MaterialStock>>>()?;
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(paged(rows, page))
    }

    async fn ledger_entries(&self, range: &ReportRange) -> AppResult<Vec<LedgerEntry>> {
        let state = self.state.read().await;
        Ok(state
            .entries()?
            .into_iter()
            .filter(|e| range.contains(e.date))
            .collect())
    }

    async fn cash_balance(&self) -> AppResult<CashBalance> {
        let state = self.state.read().await;
        Ok(CashBalance::from_transactions(&state.cash)?)
    }

    async fn list_cash_transactions(&self, page: Pagination) -> AppResult<Page<CashTransaction>> {
        let state = self.state.read().await;
        let newest: Vec<CashTransaction> = state.cash.iter().rev().cloned().collect();
        Ok(paged(newest, page))
    }

    async fn insert_cash_transaction(
        &self,
        input: NewCashTransaction,
    ) -> AppResult<CashTransaction> {
        let mut state = self.state.write().await;
        let tx = CashTransaction {
            id: Uuid::new_v4(),
            kind: input.kind,
            amount: input.amount,
            description: input.description.as_deref().and_then(shared::non_empty),
            purchase_id: None,
            sale_id: None,
            created_at: Utc::now(),
        };
        state.cash.push(tx.clone());
        Ok(tx)
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}
