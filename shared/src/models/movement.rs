//! Movement ledger models: receipts, purchases and sales

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PartnerType;
use crate::error::LedgerResult;
use crate::ledger;
use crate::types::ReportRange;

/// The three kinds of ledger movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Free donation inflow
    Receipt,
    /// Paid inflow
    Purchase,
    /// Outflow to a buyer, possibly multi-item
    Sale,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Receipt => "receipt",
            MovementKind::Purchase => "purchase",
            MovementKind::Sale => "sale",
        }
    }

    /// Letter prefixed to generated movement codes
    pub fn code_prefix(&self) -> char {
        match self {
            MovementKind::Receipt => 'R',
            MovementKind::Purchase => 'C',
            MovementKind::Sale => 'V',
        }
    }
}

impl std::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MovementKind::Receipt => write!(f, "Receipt"),
            MovementKind::Purchase => write!(f, "Purchase"),
            MovementKind::Sale => write!(f, "Sale"),
        }
    }
}

/// A donation received from a partner
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Receipt {
    pub id: Uuid,
    /// Lot code (e.g., "R-20240105-001")
    pub lot_code: String,
    pub date: NaiveDate,
    pub partner_id: Uuid,
    pub material_id: Uuid,
    pub quantity: Decimal,
    pub cancelled: bool,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// A paid acquisition from a partner
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Purchase {
    pub id: Uuid,
    /// Purchase code (e.g., "C-20240110-001")
    pub code: String,
    pub date: NaiveDate,
    pub partner_id: Uuid,
    pub material_id: Uuid,
    pub quantity: Decimal,
    pub unit_price_paid: Decimal,
    /// `quantity * unit_price_paid`, fixed at write time
    pub total_paid: Decimal,
    pub cancelled: bool,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// A sale header with one or more line items
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sale {
    pub id: Uuid,
    /// Sale code (e.g., "V-20240115-001")
    pub code: String,
    pub date: NaiveDate,
    pub buyer_id: Uuid,
    pub cancelled: bool,
    pub items: Vec<SaleItem>,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Sale {
    pub fn total(&self) -> LedgerResult<Decimal> {
        self.items.iter().try_fold(Decimal::ZERO, |total, item| {
            ledger::checked_add("total", total, item.line_total()?)
        })
    }

    pub fn material_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.items.iter().map(|i| i.material_id).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// One material line of a sale
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaleItem {
    pub id: Uuid,
    pub sale_id: Uuid,
    pub material_id: Uuid,
    pub quantity_sold: Decimal,
    pub unit_price: Decimal,
}

impl SaleItem {
    pub fn line_total(&self) -> LedgerResult<Decimal> {
        ledger::checked_mul("line_total", self.quantity_sold, self.unit_price)
    }
}

/// Input for recording a donation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReceipt {
    pub partner_id: Uuid,
    pub material_id: Uuid,
    pub quantity: Decimal,
    /// Movement date; defaults to today
    pub date: Option<NaiveDate>,
}

/// Input for recording a purchase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPurchase {
    pub partner_id: Uuid,
    pub material_id: Uuid,
    pub quantity: Decimal,
    pub unit_price_paid: Decimal,
    /// Movement date; defaults to today
    pub date: Option<NaiveDate>,
}

/// Input for recording a sale
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSale {
    pub buyer_id: Uuid,
    pub items: Vec<NewSaleItem>,
    /// Movement date; defaults to today
    pub date: Option<NaiveDate>,
}

/// One requested sale line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSaleItem {
    pub material_id: Uuid,
    pub quantity_sold: Decimal,
    pub unit_price: Decimal,
}

/// Filters for movement listings; all are additive
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MovementFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub partner_id: Option<Uuid>,
    pub material_id: Option<Uuid>,
    #[serde(default)]
    pub include_cancelled: bool,
}

impl MovementFilter {
    pub fn range(&self) -> ReportRange {
        ReportRange::new(self.start_date, self.end_date)
    }

    fn admits(&self, date: NaiveDate, cancelled: bool) -> bool {
        (self.include_cancelled || !cancelled) && self.range().contains(date)
    }

    pub fn matches_receipt(&self, r: &Receipt) -> bool {
        self.admits(r.date, r.cancelled)
            && self.partner_id.map_or(true, |id| id == r.partner_id)
            && self.material_id.map_or(true, |id| id == r.material_id)
    }

    pub fn matches_purchase(&self, p: &Purchase) -> bool {
        self.admits(p.date, p.cancelled)
            && self.partner_id.map_or(true, |id| id == p.partner_id)
            && self.material_id.map_or(true, |id| id == p.material_id)
    }

    /// For sales, `partner_id` filters on the buyer
    pub fn matches_sale(&self, s: &Sale) -> bool {
        self.admits(s.date, s.cancelled)
            && self.partner_id.map_or(true, |id| id == s.buyer_id)
            && self
                .material_id
                .map_or(true, |id| s.items.iter().any(|i| i.material_id == id))
    }
}

/// Outcome of a cancellation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CancelledMovement {
    pub id: Uuid,
    pub kind: MovementKind,
    pub cancelled_at: DateTime<Utc>,
}

/// Ledger line kind as seen by the projector and the aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Receipt,
    Purchase,
    SaleItem,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Receipt => "receipt",
            EntryKind::Purchase => "purchase",
            EntryKind::SaleItem => "sale_item",
        }
    }

    pub fn is_inflow(&self) -> bool {
        !matches!(self, EntryKind::SaleItem)
    }
}

impl std::str::FromStr for EntryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "receipt" => Ok(EntryKind::Receipt),
            "purchase" => Ok(EntryKind::Purchase),
            "sale_item" => Ok(EntryKind::SaleItem),
            other => Err(format!("unknown ledger entry kind: {}", other)),
        }
    }
}

/// One flattened ledger line, joined with catalog names
///
/// Receipts and purchases yield one entry each; a sale yields one entry per
/// item, with the buyer as partner. `amount` is the money moved: zero for
/// donations, `total_paid` for purchases, the line total for sale items.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerEntry {
    pub kind: EntryKind,
    pub movement_id: Uuid,
    pub date: NaiveDate,
    pub material_id: Uuid,
    pub material_name: String,
    pub unit_of_measure: String,
    pub partner_id: Uuid,
    pub partner_name: String,
    pub partner_type: PartnerType,
    pub quantity: Decimal,
    pub amount: Decimal,
    pub cancelled: bool,
}
