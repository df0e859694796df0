//! Stock projection and ledger rules
//!
//! Stock of a material is the fold of its non-cancelled ledger entries:
//! receipts and purchases add, sale items subtract. Nothing else moves it.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};
use crate::models::{
    CashKind, EntryKind, LedgerEntry, MovementKind, NewSaleItem, Partner, Purchase, Sale,
};

/// Non-cancelled totals of one material
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTotals {
    pub received: Decimal,
    pub purchased: Decimal,
    pub sold: Decimal,
}

impl StockTotals {
    pub fn new(received: Decimal, purchased: Decimal, sold: Decimal) -> Self {
        Self {
            received,
            purchased,
            sold,
        }
    }

    /// Quantity on hand
    pub fn on_hand(&self) -> LedgerResult<Decimal> {
        checked_add("quantity", self.received, self.purchased)
            .and_then(|inflow| checked_sub("quantity", inflow, self.sold))
    }

    /// Fold one entry in; cancelled entries are ignored
    pub fn apply(&mut self, entry: &LedgerEntry) -> LedgerResult<()> {
        if entry.cancelled {
            return Ok(());
        }
        let total = match entry.kind {
            EntryKind::Receipt => &mut self.received,
            EntryKind::Purchase => &mut self.purchased,
            EntryKind::SaleItem => &mut self.sold,
        };
        *total = checked_add("quantity", *total, entry.quantity)?;
        Ok(())
    }
}

/// `a + b`, failing on `field` instead of overflowing
pub fn checked_add(field: &str, a: Decimal, b: Decimal) -> LedgerResult<Decimal> {
    a.checked_add(b).ok_or_else(|| LedgerError::out_of_range(field))
}

pub fn checked_sub(field: &str, a: Decimal, b: Decimal) -> LedgerResult<Decimal> {
    a.checked_sub(b).ok_or_else(|| LedgerError::out_of_range(field))
}

pub fn checked_mul(field: &str, a: Decimal, b: Decimal) -> LedgerResult<Decimal> {
    a.checked_mul(b).ok_or_else(|| LedgerError::out_of_range(field))
}

/// Fold the ledger into the stock totals of `material_id`
pub fn project_stock<'a>(
    entries: impl IntoIterator<Item = &'a LedgerEntry>,
    material_id: Uuid,
) -> LedgerResult<StockTotals> {
    entries
        .into_iter()
        .filter(|e| e.material_id == material_id)
        .try_fold(StockTotals::default(), |mut totals, e| {
            totals.apply(e)?;
            Ok(totals)
        })
}

/// Fold the ledger into stock totals for every material it mentions
pub fn project_all<'a>(
    entries: impl IntoIterator<Item = &'a LedgerEntry>,
) -> LedgerResult<BTreeMap<Uuid, StockTotals>> {
    let mut totals: BTreeMap<Uuid, StockTotals> = BTreeMap::new();
    for entry in entries {
        totals.entry(entry.material_id).or_default().apply(entry)?;
    }
    Ok(totals)
}

/// Requested quantity per material, summing repeated lines
///
/// Keys are ordered, which is also the order stores lock material rows in.
pub fn requested_by_material(items: &[NewSaleItem]) -> LedgerResult<BTreeMap<Uuid, Decimal>> {
    let mut requested: BTreeMap<Uuid, Decimal> = BTreeMap::new();
    for item in items {
        let total = requested.entry(item.material_id).or_insert(Decimal::ZERO);
        *total = checked_add("items", *total, item.quantity_sold)?;
    }
    Ok(requested)
}

/// An outflow of `requested` must not exceed `available`
pub fn check_availability(
    material_id: Uuid,
    available: Decimal,
    requested: Decimal,
) -> LedgerResult<()> {
    if requested > available {
        return Err(LedgerError::InsufficientStock {
            material_id,
            available,
            requested,
        });
    }
    Ok(())
}

/// Check every requested material against its pre-transaction stock
pub fn check_sale_availability(
    requested: &BTreeMap<Uuid, Decimal>,
    mut available: impl FnMut(Uuid) -> Decimal,
) -> LedgerResult<()> {
    for (&material_id, &quantity) in requested {
        check_availability(material_id, available(material_id), quantity)?;
    }
    Ok(())
}

/// Cancelling an inflow removes its quantity from stock, which must not
/// drive the material negative
pub fn check_inflow_cancellation(
    material_id: Uuid,
    on_hand: Decimal,
    quantity: Decimal,
) -> LedgerResult<()> {
    check_availability(material_id, on_hand, quantity)
}

/// Sales may only be made to partners of type BUYER
pub fn ensure_buyer(partner: &Partner) -> LedgerResult<()> {
    if !partner.is_buyer() {
        return Err(LedgerError::invalid(
            "buyer_id",
            format!("Partner {} is not a buyer", partner.name),
        ));
    }
    Ok(())
}

/// Money paid for a purchase
pub fn purchase_total(quantity: Decimal, unit_price_paid: Decimal) -> LedgerResult<Decimal> {
    checked_mul("total_paid", quantity, unit_price_paid)
}

/// Prefix shared by all codes of `kind` issued on `day` (e.g., "V-20240115-")
pub fn code_prefix(kind: MovementKind, day: NaiveDate) -> String {
    format!("{}-{}-", kind.code_prefix(), day.format("%Y%m%d"))
}

/// Movement code: `{R|C|V}-YYYYMMDD-NNN`
pub fn movement_code(kind: MovementKind, day: NaiveDate, sequence: u32) -> String {
    format!("{}{:03}", code_prefix(kind, day), sequence)
}

/// Next code given how many codes with the same prefix already exist
pub fn next_movement_code<'a>(
    kind: MovementKind,
    day: NaiveDate,
    existing: impl IntoIterator<Item = &'a str>,
) -> String {
    let prefix = code_prefix(kind, day);
    let issued = existing
        .into_iter()
        .filter(|code| code.starts_with(&prefix))
        .count() as u32;
    movement_code(kind, day, issued + 1)
}

/// Material catalog code: `MAT-NNNN`
pub fn material_code(sequence: i64) -> String {
    format!("MAT-{:04}", sequence)
}

/// Cash book entry a movement books automatically
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CashPosting {
    pub kind: CashKind,
    pub amount: Decimal,
    pub description: String,
}

impl CashPosting {
    /// Compensating entry booked when the movement is cancelled
    pub fn reversal(&self) -> Self {
        Self {
            kind: self.kind.reversed(),
            amount: self.amount,
            description: format!("Reversal: {}", self.description),
        }
    }
}

/// A sale brings its total into the cash book
pub fn sale_posting(sale: &Sale) -> LedgerResult<CashPosting> {
    Ok(CashPosting {
        kind: CashKind::Inflow,
        amount: sale.total()?,
        description: format!("Sale {}", sale.code),
    })
}

/// A paid purchase takes its total out of the cash book; free ones book nothing
pub fn purchase_posting(purchase: &Purchase) -> Option<CashPosting> {
    (purchase.total_paid > Decimal::ZERO).then(|| CashPosting {
        kind: CashKind::Outflow,
        amount: purchase.total_paid,
        description: format!("Purchase {}", purchase.code),
    })
}
