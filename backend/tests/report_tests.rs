//! Report aggregation tests
//!
//! Summary, per-material and per-partner reports over a period, with
//! cancelled and out-of-range movements excluded.

mod common;

use rust_decimal::Decimal;

use common::{day, dec, Ledger};
use recycling_ledger_backend::error::AppError;
use recycling_ledger_backend::services::ReportingService;
use shared::{PartnerType, ReportRange};

fn january() -> ReportRange {
    ReportRange::new(Some(day(2024, 1, 1)), Some(day(2024, 1, 31)))
}

/// 100 kg donated, 50 kg bought for 25.00, 30 kg sold for 60.00, all in
/// January, plus a sale in February and a cancelled receipt
async fn seeded() -> Ledger {
    let ledger = Ledger::new();
    let pet = ledger.material("PET").await;
    let glass = ledger.material("Glass").await;
    let vila = ledger.association("Coop Vila").await;
    let buyer = ledger.buyer("Recicla SA").await;

    ledger.receive(&vila, &pet, "100", day(2024, 1, 5)).await;
    ledger.buy(&vila, &pet, "50", "0.50", day(2024, 1, 10)).await;
    ledger
        .sell(&buyer, &[(&pet, "30", "2.00")], day(2024, 1, 31))
        .await
        .unwrap();

    ledger
        .sell(&buyer, &[(&pet, "10", "2.00")], day(2024, 2, 1))
        .await
        .unwrap();
    let cancelled = ledger.receive(&vila, &glass, "40", day(2024, 1, 15)).await;
    ledger.movements.cancel_receipt(cancelled.id).await.unwrap();

    ledger
}

#[tokio::test]
async fn test_summary_for_period() {
    let ledger = seeded().await;

    let summary = ledger.reports.summary(january()).await.unwrap();

    assert_eq!(summary.total_received_qty, dec("100"));
    assert_eq!(summary.total_purchased_qty, dec("50"));
    assert_eq!(summary.total_sold_qty, dec("30"));
    assert_eq!(summary.revenue, dec("60.00"));
    assert_eq!(summary.total_spent_on_purchases, dec("25.00"));
    assert_eq!(summary.gross_profit, dec("35.00"));
}

#[tokio::test]
async fn test_summary_unbounded_includes_every_live_movement() {
    let ledger = seeded().await;

    let summary = ledger.reports.summary(ReportRange::unbounded()).await.unwrap();

    assert_eq!(summary.total_received_qty, dec("100"));
    assert_eq!(summary.total_sold_qty, dec("40"));
    assert_eq!(summary.revenue, dec("80.00"));
}

#[tokio::test]
async fn test_empty_period_is_all_zero() {
    let ledger = seeded().await;
    let march = ReportRange::new(Some(day(2024, 3, 1)), Some(day(2024, 3, 31)));

    let summary = ledger.reports.summary(march).await.unwrap();

    assert_eq!(summary.revenue, Decimal::ZERO);
    assert_eq!(summary.gross_profit, Decimal::ZERO);
    assert!(ledger.reports.by_material(march).await.unwrap().is_empty());
    assert!(ledger.reports.by_partner(march).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_by_material() {
    let ledger = seeded().await;

    let rows = ledger.reports.by_material(january()).await.unwrap();

    // Glass only had a cancelled receipt
    assert_eq!(rows.len(), 1);
    let pet = &rows[0];
    assert_eq!(pet.material_name, "PET");
    assert_eq!(pet.received_qty, dec("100"));
    assert_eq!(pet.purchased_qty, dec("50"));
    assert_eq!(pet.sold_qty, dec("30"));
    assert_eq!(pet.balance, dec("120"));
    assert_eq!(pet.revenue, dec("60.00"));
}

#[tokio::test]
async fn test_by_partner() {
    let ledger = seeded().await;

    let rows = ledger.reports.by_partner(january()).await.unwrap();

    assert_eq!(rows.len(), 2);
    let vila = rows.iter().find(|r| r.partner_name == "Coop Vila").unwrap();
    assert_eq!(vila.partner_type, PartnerType::Association);
    assert_eq!(vila.quantity_donated, dec("100"));
    assert_eq!(vila.quantity_supplied, dec("50"));
    assert_eq!(vila.quantity_bought, Decimal::ZERO);

    let buyer = rows.iter().find(|r| r.partner_name == "Recicla SA").unwrap();
    assert_eq!(buyer.quantity_bought, dec("30"));
    assert_eq!(buyer.total_moved().unwrap(), dec("30"));
}

#[tokio::test]
async fn test_inverted_period_is_rejected() {
    let ledger = Ledger::new();
    let inverted = ReportRange::new(Some(day(2024, 2, 1)), Some(day(2024, 1, 1)));

    let err = ledger.reports.summary(inverted).await.unwrap_err();

    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "start_date"));
}

#[tokio::test]
async fn test_material_report_csv_export() {
    let ledger = seeded().await;
    let rows = ledger.reports.by_material(january()).await.unwrap();

    let csv = ReportingService::export_to_csv(&rows).unwrap();
    let mut lines = csv.lines();

    assert_eq!(
        lines.next(),
        Some("material_id,material_name,unit_of_measure,received_qty,purchased_qty,sold_qty,balance,revenue")
    );
    let row = lines.next().unwrap();
    assert!(row.contains(",PET,kg,100,50,30,120,"));
    assert!(lines.next().is_none());
}
