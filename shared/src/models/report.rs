//! Stock and report models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PartnerType;
use crate::error::LedgerResult;
use crate::ledger;

/// Current stock of one material
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockLevel {
    pub material_id: Uuid,
    pub quantity: Decimal,
    pub unit_of_measure: String,
}

/// Catalog row with its derived stock
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaterialStock {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub category: Option<String>,
    pub unit_of_measure: String,
    pub current_stock: Decimal,
}

/// Period totals over non-cancelled movements
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReportSummary {
    pub total_received_qty: Decimal,
    pub total_purchased_qty: Decimal,
    pub total_sold_qty: Decimal,
    pub revenue: Decimal,
    pub total_spent_on_purchases: Decimal,
    /// `revenue - total_spent_on_purchases`
    pub gross_profit: Decimal,
}

/// Per-material totals for a period
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaterialReportRow {
    pub material_id: Uuid,
    pub material_name: String,
    pub unit_of_measure: String,
    pub received_qty: Decimal,
    pub purchased_qty: Decimal,
    pub sold_qty: Decimal,
    /// `received_qty + purchased_qty - sold_qty`
    pub balance: Decimal,
    pub revenue: Decimal,
}

/// Per-partner totals for a period
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PartnerReportRow {
    pub partner_id: Uuid,
    pub partner_name: String,
    pub partner_type: PartnerType,
    /// Donated through receipts
    pub quantity_donated: Decimal,
    /// Supplied through purchases
    pub quantity_supplied: Decimal,
    /// Bought through sales
    pub quantity_bought: Decimal,
}

impl PartnerReportRow {
    pub fn total_moved(&self) -> LedgerResult<Decimal> {
        let supplied = ledger::checked_add("total_moved", self.quantity_donated, self.quantity_supplied)?;
        ledger::checked_add("total_moved", supplied, self.quantity_bought)
    }
}
