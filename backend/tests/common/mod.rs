//! Fixtures shared by the backend test suites
//!
//! Everything runs against the in-memory store through the services, the
//! same path the HTTP handlers take.

#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use recycling_ledger_backend::error::AppResult;
use recycling_ledger_backend::services::{
    CashService, CatalogService, LedgerService, ReportingService, StockService,
};
use recycling_ledger_backend::store::{LedgerStore, MemoryStore};
use shared::{
    Category, Material, NewCategory, NewMaterial, NewPartner, NewPurchase, NewReceipt, NewSale, NewSaleItem, Partner,
    PartnerType, Purchase, Receipt, Sale,
};

/// Decimal from a literal string
pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// One ledger with a handle on every service
pub struct Ledger {
    pub store: Arc<dyn LedgerStore>,
    pub catalog: CatalogService,
    pub movements: LedgerService,
    pub stock: StockService,
    pub reports: ReportingService,
    pub cash: CashService,
}

impl Ledger {
    pub fn new() -> Self {
        let store: Arc<dyn LedgerStore> = Arc::new(MemoryStore::new());
        Self {
            catalog: CatalogService::new(store.clone()),
            movements: LedgerService::new(store.clone()),
            stock: StockService::new(store.clone()),
            reports: ReportingService::new(store.clone()),
            cash: CashService::new(store.clone()),
            store,
        }
    }

    pub async fn category(&self, name: &str) -> Category {
        self.catalog
            .create_category(NewCategory {
                name: name.to_string(),
            })
            .await
            .unwrap()
    }

    pub async fn material(&self, name: &str) -> Material {
        self.catalog
            .create_material(NewMaterial {
                name: name.to_string(),
                category: None,
                unit_of_measure: None,
            })
            .await
            .unwrap()
    }

    pub async fn partner(&self, name: &str, partner_type: PartnerType) -> Partner {
        self.catalog
            .create_partner(NewPartner {
                name: name.to_string(),
                partner_type,
                cnpj: None,
                leader_name: None,
                phone: None,
                email: None,
            })
            .await
            .unwrap()
    }

    pub async fn association(&self, name: &str) -> Partner {
        self.partner(name, PartnerType::Association).await
    }

    pub async fn buyer(&self, name: &str) -> Partner {
        self.partner(name, PartnerType::Buyer).await
    }

    pub async fn receive(
        &self,
        partner: &Partner,
        material: &Material,
        quantity: &str,
        date: NaiveDate,
    ) -> Receipt {
        self.movements
            .create_receipt(NewReceipt {
                partner_id: partner.id,
                material_id: material.id,
                quantity: dec(quantity),
                date: Some(date),
            })
            .await
            .unwrap()
    }

    pub async fn buy(
        &self,
        partner: &Partner,
        material: &Material,
        quantity: &str,
        unit_price: &str,
        date: NaiveDate,
    ) -> Purchase {
        self.movements
            .create_purchase(NewPurchase {
                partner_id: partner.id,
                material_id: material.id,
                quantity: dec(quantity),
                unit_price_paid: dec(unit_price),
                date: Some(date),
            })
            .await
            .unwrap()
    }

    /// Attempt a sale of `(material, quantity, unit_price)` lines
    pub async fn sell(
        &self,
        buyer: &Partner,
        lines: &[(&Material, &str, &str)],
        date: NaiveDate,
    ) -> AppResult<Sale> {
        self.movements
            .create_sale(NewSale {
                buyer_id: buyer.id,
                items: lines
                    .iter()
                    .map(|(material, quantity, price)| NewSaleItem {
                        material_id: material.id,
                        quantity_sold: dec(quantity),
                        unit_price: dec(price),
                    })
                    .collect(),
                date: Some(date),
            })
            .await
    }

    pub async fn on_hand(&self, material: &Material) -> Decimal {
        self.stock.current_stock(material.id).await.unwrap().quantity
    }
}
