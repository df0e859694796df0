//! Period reports over the flattened ledger
//!
//! All three reports read the same entries and only count non-cancelled
//! movements dated inside the requested range.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::LedgerResult;
use crate::ledger::{checked_add, checked_sub};
use crate::models::{EntryKind, LedgerEntry, MaterialReportRow, PartnerReportRow, ReportSummary};
use crate::types::ReportRange;

fn live_in<'a>(
    entries: &'a [LedgerEntry],
    range: &'a ReportRange,
) -> impl Iterator<Item = &'a LedgerEntry> + 'a {
    entries
        .iter()
        .filter(move |e| !e.cancelled && range.contains(e.date))
}

fn accumulate(total: &mut Decimal, field: &str, value: Decimal) -> LedgerResult<()> {
    *total = checked_add(field, *total, value)?;
    Ok(())
}

/// Totals for the period
pub fn summarize(entries: &[LedgerEntry], range: &ReportRange) -> LedgerResult<ReportSummary> {
    let mut summary = ReportSummary::default();
    for entry in live_in(entries, range) {
        match entry.kind {
            EntryKind::Receipt => {
                accumulate(&mut summary.total_received_qty, "total_received_qty", entry.quantity)?
            }
            EntryKind::Purchase => {
                accumulate(&mut summary.total_purchased_qty, "total_purchased_qty", entry.quantity)?;
                accumulate(
                    &mut summary.total_spent_on_purchases,
                    "total_spent_on_purchases",
                    entry.amount,
                )?;
            }
            EntryKind::SaleItem => {
                accumulate(&mut summary.total_sold_qty, "total_sold_qty", entry.quantity)?;
                accumulate(&mut summary.revenue, "revenue", entry.amount)?;
            }
        }
    }
    summary.gross_profit = checked_sub(
        "gross_profit",
        summary.revenue,
        summary.total_spent_on_purchases,
    )?;
    Ok(summary)
}

/// One row per material that moved in the period, sorted by name
pub fn by_material(
    entries: &[LedgerEntry],
    range: &ReportRange,
) -> LedgerResult<Vec<MaterialReportRow>> {
    let mut rows: BTreeMap<Uuid, MaterialReportRow> = BTreeMap::new();
    for entry in live_in(entries, range) {
        let row = rows
            .entry(entry.material_id)
            .or_insert_with(|| MaterialReportRow {
                material_id: entry.material_id,
                material_name: entry.material_name.clone(),
                unit_of_measure: entry.unit_of_measure.clone(),
                received_qty: Decimal::ZERO,
                purchased_qty: Decimal::ZERO,
                sold_qty: Decimal::ZERO,
                balance: Decimal::ZERO,
                revenue: Decimal::ZERO,
            });
        match entry.kind {
            EntryKind::Receipt => accumulate(&mut row.received_qty, "received_qty", entry.quantity)?,
            EntryKind::Purchase => {
                accumulate(&mut row.purchased_qty, "purchased_qty", entry.quantity)?
            }
            EntryKind::SaleItem => {
                accumulate(&mut row.sold_qty, "sold_qty", entry.quantity)?;
                accumulate(&mut row.revenue, "revenue", entry.amount)?;
            }
        }
    }

    let mut rows = rows
        .into_values()
        .map(|mut row| {
            let inflow = checked_add("balance", row.received_qty, row.purchased_qty)?;
            row.balance = checked_sub("balance", inflow, row.sold_qty)?;
            Ok(row)
        })
        .collect::<LedgerResult<Vec<MaterialReportRow>>>()?;
    rows.sort_by(|a, b| {
        a.material_name
            .cmp(&b.material_name)
            .then(a.material_id.cmp(&b.material_id))
    });
    Ok(rows)
}

/// One row per partner that moved material in the period, sorted by name
///
/// Sale items count toward the buyer's `quantity_bought`.
pub fn by_partner(
    entries: &[LedgerEntry],
    range: &ReportRange,
) -> LedgerResult<Vec<PartnerReportRow>> {
    let mut rows: BTreeMap<Uuid, PartnerReportRow> = BTreeMap::new();
    for entry in live_in(entries, range) {
        let row = rows
            .entry(entry.partner_id)
            .or_insert_with(|| PartnerReportRow {
                partner_id: entry.partner_id,
                partner_name: entry.partner_name.clone(),
                partner_type: entry.partner_type,
                quantity_donated: Decimal::ZERO,
                quantity_supplied: Decimal::ZERO,
                quantity_bought: Decimal::ZERO,
            });
        let (total, field) = match entry.kind {
            EntryKind::Receipt => (&mut row.quantity_donated, "quantity_donated"),
            EntryKind::Purchase => (&mut row.quantity_supplied, "quantity_supplied"),
            EntryKind::SaleItem => (&mut row.quantity_bought, "quantity_bought"),
        };
        accumulate(total, field, entry.quantity)?;
    }

    let mut rows: Vec<PartnerReportRow> = rows.into_values().collect();
    rows.sort_by(|a, b| {
        a.partner_name
            .cmp(&b.partner_name)
            .then(a.partner_id.cmp(&b.partner_id))
    });
    Ok(rows)
}
