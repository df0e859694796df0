//! Movement ledger tests
//!
//! Receipts, purchases and sales recorded through the services, including:
//! - Oversell rejection for single and multi-line sales
//! - Cancellation and its effect on stock and the cash book
//! - Movement codes and listing filters

mod common;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use common::{day, dec, Ledger};
use recycling_ledger_backend::error::AppError;
use shared::{
    CashKind, MovementFilter, MovementKind, NewPurchase, NewReceipt, NewSale, Pagination,
};

// ============================================================================
// Receipts
// ============================================================================

#[cfg(test)]
mod receipt_tests {
    use super::*;

    #[tokio::test]
    async fn test_receipt_adds_to_stock() {
        let ledger = Ledger::new();
        let pet = ledger.material("PET").await;
        let coop = ledger.association("Coop Vila").await;

        ledger.receive(&coop, &pet, "100", day(2024, 1, 5)).await;
        ledger.receive(&coop, &pet, "20.5", day(2024, 1, 6)).await;

        assert_eq!(ledger.on_hand(&pet).await, dec("120.5"));
    }

    #[tokio::test]
    async fn test_receipt_lot_codes_are_sequential_per_day() {
        let ledger = Ledger::new();
        let pet = ledger.material("PET").await;
        let coop = ledger.association("Coop Vila").await;

        let first = ledger.receive(&coop, &pet, "1", day(2024, 1, 5)).await;
        let second = ledger.receive(&coop, &pet, "1", day(2024, 1, 5)).await;

        let prefix = format!("R-{}-", Utc::now().date_naive().format("%Y%m%d"));
        assert_eq!(first.lot_code, format!("{}001", prefix));
        assert_eq!(second.lot_code, format!("{}002", prefix));
    }

    #[tokio::test]
    async fn test_receipt_date_defaults_to_today() {
        let ledger = Ledger::new();
        let pet = ledger.material("PET").await;
        let coop = ledger.association("Coop Vila").await;

        let receipt = ledger
            .movements
            .create_receipt(NewReceipt {
                partner_id: coop.id,
                material_id: pet.id,
                quantity: dec("3"),
                date: None,
            })
            .await
            .unwrap();

        assert_eq!(receipt.date, Utc::now().date_naive());
    }

    #[tokio::test]
    async fn test_receipt_rejects_non_positive_quantity() {
        let ledger = Ledger::new();
        let pet = ledger.material("PET").await;
        let coop = ledger.association("Coop Vila").await;

        for quantity in ["0", "-1"] {
            let err = ledger
                .movements
                .create_receipt(NewReceipt {
                    partner_id: coop.id,
                    material_id: pet.id,
                    quantity: dec(quantity),
                    date: None,
                })
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Validation { ref field, .. } if field == "quantity"));
        }
        assert_eq!(ledger.on_hand(&pet).await, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_receipt_unknown_references() {
        let ledger = Ledger::new();
        let pet = ledger.material("PET").await;
        let coop = ledger.association("Coop Vila").await;

        let err = ledger
            .movements
            .create_receipt(NewReceipt {
                partner_id: Uuid::new_v4(),
                material_id: pet.id,
                quantity: dec("1"),
                date: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref r) if r == "Partner"));

        let err = ledger
            .movements
            .create_receipt(NewReceipt {
                partner_id: coop.id,
                material_id: Uuid::new_v4(),
                quantity: dec("1"),
                date: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref r) if r == "Material"));
    }
}

// ============================================================================
// Purchases
// ============================================================================

#[cfg(test)]
mod purchase_tests {
    use super::*;

    #[tokio::test]
    async fn test_purchase_total_and_cash_outflow() {
        let ledger = Ledger::new();
        let pet = ledger.material("PET").await;
        let coop = ledger.association("Coop Vila").await;

        let purchase = ledger.buy(&coop, &pet, "50", "0.50", day(2024, 1, 10)).await;

        assert_eq!(purchase.total_paid, dec("25.00"));
        assert!(purchase.code.starts_with("C-"));
        assert_eq!(ledger.on_hand(&pet).await, dec("50"));

        let balance = ledger.cash.balance().await.unwrap();
        assert_eq!(balance.total_outflow, dec("25.00"));
        assert_eq!(balance.balance, dec("-25.00"));

        let txs = ledger.cash.list_transactions(Pagination::default()).await.unwrap();
        assert_eq!(txs.total_count, 1);
        assert_eq!(txs.items[0].kind, CashKind::Outflow);
        assert_eq!(txs.items[0].purchase_id, Some(purchase.id));
    }

    #[tokio::test]
    async fn test_free_purchase_books_no_cash() {
        let ledger = Ledger::new();
        let pet = ledger.material("PET").await;
        let coop = ledger.association("Coop Vila").await;

        ledger.buy(&coop, &pet, "10", "0", day(2024, 1, 10)).await;

        assert_eq!(ledger.on_hand(&pet).await, dec("10"));
        let txs = ledger.cash.list_transactions(Pagination::default()).await.unwrap();
        assert_eq!(txs.total_count, 0);
    }

    #[tokio::test]
    async fn test_purchase_rejects_negative_price() {
        let ledger = Ledger::new();
        let pet = ledger.material("PET").await;
        let coop = ledger.association("Coop Vila").await;

        let err = ledger
            .movements
            .create_purchase(NewPurchase {
                partner_id: coop.id,
                material_id: pet.id,
                quantity: dec("10"),
                unit_price_paid: dec("-0.10"),
                date: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "unit_price_paid"));
    }
}

// ============================================================================
// Sales
// ============================================================================

#[cfg(test)]
mod sale_tests {
    use super::*;

    #[tokio::test]
    async fn test_multi_line_sale() {
        let ledger = Ledger::new();
        let pet = ledger.material("PET").await;
        let glass = ledger.material("Glass").await;
        let coop = ledger.association("Coop Vila").await;
        let buyer = ledger.buyer("Recicla SA").await;

        ledger.receive(&coop, &pet, "100", day(2024, 1, 5)).await;
        ledger.receive(&coop, &glass, "40", day(2024, 1, 5)).await;

        let sale = ledger
            .sell(
                &buyer,
                &[(&pet, "30", "1.50"), (&glass, "40", "0.25")],
                day(2024, 1, 20),
            )
            .await
            .unwrap();

        assert_eq!(sale.items.len(), 2);
        assert_eq!(sale.total().unwrap(), dec("55.00"));
        assert!(sale.code.starts_with("V-"));
        assert_eq!(ledger.on_hand(&pet).await, dec("70"));
        assert_eq!(ledger.on_hand(&glass).await, Decimal::ZERO);

        let balance = ledger.cash.balance().await.unwrap();
        assert_eq!(balance.total_inflow, dec("55.00"));
    }

    #[tokio::test]
    async fn test_oversell_rejected_without_side_effects() {
        let ledger = Ledger::new();
        let pet = ledger.material("PET").await;
        let glass = ledger.material("Glass").await;
        let coop = ledger.association("Coop Vila").await;
        let buyer = ledger.buyer("Recicla SA").await;

        ledger.receive(&coop, &pet, "100", day(2024, 1, 5)).await;
        ledger.receive(&coop, &glass, "10", day(2024, 1, 5)).await;

        // First line fits, second does not; nothing may be written
        let err = ledger
            .sell(
                &buyer,
                &[(&pet, "50", "1.00"), (&glass, "11", "1.00")],
                day(2024, 1, 20),
            )
            .await
            .unwrap_err();

        match err {
            AppError::InsufficientStock {
                material_id,
                available,
                requested,
            } => {
                assert_eq!(material_id, glass.id);
                assert_eq!(available, dec("10"));
                assert_eq!(requested, dec("11"));
            }
            other => panic!("expected insufficient stock, got {other:?}"),
        }

        assert_eq!(ledger.on_hand(&pet).await, dec("100"));
        assert_eq!(ledger.on_hand(&glass).await, dec("10"));
        let sales = ledger
            .movements
            .list_sales(&MovementFilter::default(), Pagination::default())
            .await
            .unwrap();
        assert_eq!(sales.total_count, 0);
        assert_eq!(ledger.cash.balance().await.unwrap().balance, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_repeated_material_lines_are_summed() {
        let ledger = Ledger::new();
        let pet = ledger.material("PET").await;
        let coop = ledger.association("Coop Vila").await;
        let buyer = ledger.buyer("Recicla SA").await;
        ledger.receive(&coop, &pet, "100", day(2024, 1, 5)).await;

        let err = ledger
            .sell(
                &buyer,
                &[(&pet, "60", "1.00"), (&pet, "60", "1.00")],
                day(2024, 1, 20),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::InsufficientStock { requested, .. } if requested == dec("120")
        ));
    }

    #[tokio::test]
    async fn test_selling_exactly_the_stock_empties_it() {
        let ledger = Ledger::new();
        let pet = ledger.material("PET").await;
        let coop = ledger.association("Coop Vila").await;
        let buyer = ledger.buyer("Recicla SA").await;
        ledger.receive(&coop, &pet, "100", day(2024, 1, 5)).await;

        ledger
            .sell(&buyer, &[(&pet, "100", "1.00")], day(2024, 1, 20))
            .await
            .unwrap();

        assert_eq!(ledger.on_hand(&pet).await, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_sale_requires_buyer_partner() {
        let ledger = Ledger::new();
        let pet = ledger.material("PET").await;
        let coop = ledger.association("Coop Vila").await;
        ledger.receive(&coop, &pet, "100", day(2024, 1, 5)).await;

        let err = ledger
            .sell(&coop, &[(&pet, "10", "1.00")], day(2024, 1, 20))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "buyer_id"));
    }

    #[tokio::test]
    async fn test_sale_line_validation() {
        let ledger = Ledger::new();
        let buyer = ledger.buyer("Recicla SA").await;
        let pet = ledger.material("PET").await;

        let err = ledger
            .movements
            .create_sale(NewSale {
                buyer_id: buyer.id,
                items: vec![],
                date: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "items"));

        let err = ledger
            .sell(&buyer, &[(&pet, "1", "1.00"), (&pet, "0", "1.00")], day(2024, 1, 20))
            .await
            .unwrap_err();
        assert!(
            matches!(err, AppError::Validation { ref field, .. } if field == "items[1].quantity_sold")
        );
    }
}

// ============================================================================
// Cancellation
// ============================================================================

#[cfg(test)]
mod cancel_tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_sale_restores_stock_and_reverses_cash() {
        let ledger = Ledger::new();
        let pet = ledger.material("PET").await;
        let coop = ledger.association("Coop Vila").await;
        let buyer = ledger.buyer("Recicla SA").await;
        ledger.receive(&coop, &pet, "100", day(2024, 1, 5)).await;
        let sale = ledger
            .sell(&buyer, &[(&pet, "40", "2.00")], day(2024, 1, 20))
            .await
            .unwrap();

        let cancelled = ledger.movements.cancel_sale(sale.id).await.unwrap();

        assert_eq!(cancelled.kind, MovementKind::Sale);
        assert_eq!(ledger.on_hand(&pet).await, dec("100"));
        let stored = ledger.movements.get_sale(sale.id).await.unwrap();
        assert!(stored.cancelled);
        assert!(stored.cancelled_at.is_some());

        let balance = ledger.cash.balance().await.unwrap();
        assert_eq!(balance.total_inflow, dec("80.00"));
        assert_eq!(balance.total_outflow, dec("80.00"));
        assert_eq!(balance.balance, Decimal::ZERO);

        let txs = ledger.cash.list_transactions(Pagination::default()).await.unwrap();
        let reversal = &txs.items[0];
        assert_eq!(reversal.kind, CashKind::Outflow);
        assert!(reversal
            .description
            .as_deref()
            .is_some_and(|d| d.starts_with("Reversal: Sale V-")));
    }

    #[tokio::test]
    async fn test_cancel_twice_is_not_found() {
        let ledger = Ledger::new();
        let pet = ledger.material("PET").await;
        let coop = ledger.association("Coop Vila").await;
        let receipt = ledger.receive(&coop, &pet, "10", day(2024, 1, 5)).await;

        ledger.movements.cancel_movement(receipt.id).await.unwrap();
        let err = ledger.movements.cancel_movement(receipt.id).await.unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(ledger.on_hand(&pet).await, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_generic_cancel_finds_any_kind() {
        let ledger = Ledger::new();
        let pet = ledger.material("PET").await;
        let coop = ledger.association("Coop Vila").await;
        let purchase = ledger.buy(&coop, &pet, "10", "1.00", day(2024, 1, 5)).await;

        let cancelled = ledger.movements.cancel_movement(purchase.id).await.unwrap();

        assert_eq!(cancelled.kind, MovementKind::Purchase);
        assert_eq!(cancelled.id, purchase.id);
        // Outflow of the purchase plus its compensating inflow
        let balance = ledger.cash.balance().await.unwrap();
        assert_eq!(balance.balance, Decimal::ZERO);
        assert_eq!(balance.total_inflow, dec("10.00"));
    }

    #[tokio::test]
    async fn test_typed_cancel_ignores_other_kinds() {
        let ledger = Ledger::new();
        let pet = ledger.material("PET").await;
        let coop = ledger.association("Coop Vila").await;
        let receipt = ledger.receive(&coop, &pet, "10", day(2024, 1, 5)).await;

        let err = ledger.movements.cancel_sale(receipt.id).await.unwrap_err();

        assert!(matches!(err, AppError::NotFound(ref r) if r == "Sale"));
        assert!(!ledger.movements.get_receipt(receipt.id).await.unwrap().cancelled);
    }

    #[tokio::test]
    async fn test_cancel_unknown_id() {
        let ledger = Ledger::new();
        let err = ledger
            .movements
            .cancel_movement(Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref r) if r == "Movement"));
    }

    #[tokio::test]
    async fn test_cancelling_consumed_inflow_is_rejected() {
        let ledger = Ledger::new();
        let pet = ledger.material("PET").await;
        let coop = ledger.association("Coop Vila").await;
        let buyer = ledger.buyer("Recicla SA").await;
        let receipt = ledger.receive(&coop, &pet, "100", day(2024, 1, 5)).await;
        ledger
            .sell(&buyer, &[(&pet, "70", "1.00")], day(2024, 1, 20))
            .await
            .unwrap();

        let err = ledger.movements.cancel_receipt(receipt.id).await.unwrap_err();

        assert!(matches!(
            err,
            AppError::InsufficientStock { available, requested, .. }
                if available == dec("30") && requested == dec("100")
        ));
        assert_eq!(ledger.on_hand(&pet).await, dec("30"));
        assert!(!ledger.movements.get_receipt(receipt.id).await.unwrap().cancelled);
    }
}

// ============================================================================
// Listings
// ============================================================================

#[cfg(test)]
mod listing_tests {
    use super::*;

    #[tokio::test]
    async fn test_receipts_newest_first_with_filters() {
        let ledger = Ledger::new();
        let pet = ledger.material("PET").await;
        let glass = ledger.material("Glass").await;
        let vila = ledger.association("Coop Vila").await;
        let sol = ledger.association("Coop Sol").await;

        ledger.receive(&vila, &pet, "1", day(2024, 1, 5)).await;
        ledger.receive(&sol, &glass, "2", day(2024, 1, 15)).await;
        let latest = ledger.receive(&vila, &glass, "3", day(2024, 1, 25)).await;

        let all = ledger
            .movements
            .list_receipts(&MovementFilter::default(), Pagination::default())
            .await
            .unwrap();
        assert_eq!(all.total_count, 3);
        assert_eq!(all.items[0].id, latest.id);

        let by_partner = MovementFilter {
            partner_id: Some(vila.id),
            ..MovementFilter::default()
        };
        let page = ledger
            .movements
            .list_receipts(&by_partner, Pagination::default())
            .await
            .unwrap();
        assert_eq!(page.total_count, 2);

        let window = MovementFilter {
            start_date: Some(day(2024, 1, 10)),
            end_date: Some(day(2024, 1, 20)),
            ..MovementFilter::default()
        };
        let page = ledger
            .movements
            .list_receipts(&window, Pagination::default())
            .await
            .unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.items[0].material_id, glass.id);

        let paged = ledger
            .movements
            .list_receipts(&MovementFilter::default(), Pagination::new(1, 1))
            .await
            .unwrap();
        assert_eq!(paged.total_count, 3);
        assert_eq!(paged.items.len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_hidden_unless_requested() {
        let ledger = Ledger::new();
        let pet = ledger.material("PET").await;
        let coop = ledger.association("Coop Vila").await;
        let receipt = ledger.receive(&coop, &pet, "1", day(2024, 1, 5)).await;
        ledger.movements.cancel_receipt(receipt.id).await.unwrap();

        let live = ledger
            .movements
            .list_receipts(&MovementFilter::default(), Pagination::default())
            .await
            .unwrap();
        assert_eq!(live.total_count, 0);

        let everything = MovementFilter {
            include_cancelled: true,
            ..MovementFilter::default()
        };
        let page = ledger
            .movements
            .list_receipts(&everything, Pagination::default())
            .await
            .unwrap();
        assert_eq!(page.total_count, 1);
    }

    #[tokio::test]
    async fn test_inverted_range_is_rejected() {
        let ledger = Ledger::new();
        let filter = MovementFilter {
            start_date: Some(day(2024, 2, 1)),
            end_date: Some(day(2024, 1, 1)),
            ..MovementFilter::default()
        };
        let err = ledger
            .movements
            .list_sales(&filter, Pagination::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "start_date"));
    }
}

// ============================================================================
// Quantity and price limits
// ============================================================================

#[cfg(test)]
mod limit_tests {
    use super::*;
    use shared::{MAX_QUANTITY, MAX_UNIT_PRICE};

    fn receipt(coop: Uuid, material: Uuid, quantity: &str) -> NewReceipt {
        NewReceipt {
            partner_id: coop,
            material_id: material,
            quantity: dec(quantity),
            date: Some(day(2024, 1, 5)),
        }
    }

    #[tokio::test]
    async fn test_oversized_receipt_is_rejected_and_stock_stays_readable() {
        let ledger = Ledger::new();
        let pet = ledger.material("PET").await;
        let coop = ledger.association("Coop Vila").await;

        for _ in 0..2 {
            let err = ledger
                .movements
                .create_receipt(receipt(coop.id, pet.id, "50000000000000000000000000000"))
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Validation { ref field, .. } if field == "quantity"));
        }

        assert_eq!(ledger.on_hand(&pet).await, Decimal::ZERO);
        ledger.receive(&coop, &pet, "10", day(2024, 1, 6)).await;
        assert_eq!(ledger.on_hand(&pet).await, dec("10"));
    }

    #[tokio::test]
    async fn test_oversized_purchase_is_rejected() {
        let ledger = Ledger::new();
        let pet = ledger.material("PET").await;
        let coop = ledger.association("Coop Vila").await;

        let err = ledger
            .movements
            .create_purchase(NewPurchase {
                partner_id: coop.id,
                material_id: pet.id,
                quantity: dec("70000000000000000000000000000"),
                unit_price_paid: dec("2"),
                date: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "quantity"));

        let err = ledger
            .movements
            .create_purchase(NewPurchase {
                partner_id: coop.id,
                material_id: pet.id,
                quantity: dec("1"),
                unit_price_paid: MAX_UNIT_PRICE + dec("1"),
                date: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "unit_price_paid"));
        assert_eq!(ledger.cash.balance().await.unwrap().balance, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_values_beyond_stored_scale_are_rejected() {
        let ledger = Ledger::new();
        let pet = ledger.material("PET").await;
        let coop = ledger.association("Coop Vila").await;
        let buyer = ledger.buyer("Recicla SA").await;
        ledger.receive(&coop, &pet, "10", day(2024, 1, 5)).await;

        for quantity in ["0.0001", "1.2345"] {
            let err = ledger
                .movements
                .create_receipt(receipt(coop.id, pet.id, quantity))
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Validation { ref field, .. } if field == "quantity"));
        }

        let err = ledger
            .sell(&buyer, &[(&pet, "1.0005", "2.00")], day(2024, 1, 6))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "items[0].quantity_sold"));

        let err = ledger
            .sell(&buyer, &[(&pet, "1", "2.00005")], day(2024, 1, 6))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "items[0].unit_price"));

        // the edges themselves are accepted
        ledger.receive(&coop, &pet, "0.001", day(2024, 1, 7)).await;
        ledger
            .sell(&buyer, &[(&pet, "1.235", "0.0001")], day(2024, 1, 8))
            .await
            .unwrap();
        assert_eq!(ledger.on_hand(&pet).await, dec("8.766"));
    }

    #[tokio::test]
    async fn test_largest_accepted_values_stay_usable() {
        let ledger = Ledger::new();
        let pet = ledger.material("PET").await;
        let coop = ledger.association("Coop Vila").await;
        let buyer = ledger.buyer("Recicla SA").await;
        let max = MAX_QUANTITY.to_string();

        let first = ledger.receive(&coop, &pet, &max, day(2024, 1, 5)).await;
        ledger.receive(&coop, &pet, &max, day(2024, 1, 5)).await;
        assert_eq!(ledger.on_hand(&pet).await, MAX_QUANTITY * Decimal::TWO);

        let sale = ledger
            .sell(&buyer, &[(&pet, &max, &MAX_UNIT_PRICE.to_string())], day(2024, 1, 6))
            .await
            .unwrap();
        assert_eq!(sale.total().unwrap(), MAX_QUANTITY * MAX_UNIT_PRICE);
        assert_eq!(ledger.on_hand(&pet).await, MAX_QUANTITY);

        ledger.movements.cancel_movement(first.id).await.unwrap();
        assert_eq!(ledger.on_hand(&pet).await, Decimal::ZERO);
    }
}
