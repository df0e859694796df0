//! Validation utilities for the Recycling Network Ledger
//!
//! Numeric ledger rules live here as plain functions; text field rules are
//! exposed as `validator` custom functions for the catalog inputs.

use rust_decimal::Decimal;
use validator::ValidationError;

use crate::error::{LedgerError, LedgerResult};
use crate::models::{NewCashTransaction, NewPurchase, NewReceipt, NewSale};

// ============================================================================
// Ledger Validations
// ============================================================================

/// Decimal places a quantity may carry
pub const QUANTITY_SCALE: u32 = 3;

/// Decimal places a unit price or cash amount may carry
pub const MONEY_SCALE: u32 = 4;

/// Largest quantity of one movement or sale line: 99,999,999,999.999
pub const MAX_QUANTITY: Decimal = Decimal::from_parts(276_447_231, 23_283, 0, false, 3);

/// Largest unit price: 9,999,999,999.9999
pub const MAX_UNIT_PRICE: Decimal = Decimal::from_parts(276_447_231, 23_283, 0, false, 4);

/// Largest manual cash entry: 99,999,999,999,999.9999
pub const MAX_CASH_AMOUNT: Decimal =
    Decimal::from_parts(2_808_348_671, 232_830_643, 0, false, 4);

fn check_range(
    field: &str,
    value: Decimal,
    max: Decimal,
    scale: u32,
) -> LedgerResult<()> {
    if value > max {
        return Err(LedgerError::invalid(field, format!("Must not exceed {}", max)));
    }
    if value.normalize().scale() > scale {
        return Err(LedgerError::invalid(
            field,
            format!("At most {} decimal places are allowed", scale),
        ));
    }
    Ok(())
}

/// Quantities of every movement and sale line must be strictly positive
pub fn validate_quantity(field: &str, quantity: Decimal) -> LedgerResult<()> {
    if quantity <= Decimal::ZERO {
        return Err(LedgerError::invalid(field, "Quantity must be positive"));
    }
    check_range(field, quantity, MAX_QUANTITY, QUANTITY_SCALE)
}

/// Unit prices are non-negative; `allow_zero` admits free purchases
pub fn validate_unit_price(field: &str, price: Decimal, allow_zero: bool) -> LedgerResult<()> {
    if price < Decimal::ZERO || (!allow_zero && price.is_zero()) {
        let message = if allow_zero {
            "Unit price paid cannot be negative"
        } else {
            "Unit price must be positive"
        };
        return Err(LedgerError::invalid(field, message));
    }
    check_range(field, price, MAX_UNIT_PRICE, MONEY_SCALE)
}

pub fn validate_new_receipt(input: &NewReceipt) -> LedgerResult<()> {
    validate_quantity("quantity", input.quantity)
}

/// A purchase may be free (price zero) but never negative
pub fn validate_new_purchase(input: &NewPurchase) -> LedgerResult<()> {
    validate_quantity("quantity", input.quantity)?;
    validate_unit_price("unit_price_paid", input.unit_price_paid, true)
}

pub fn validate_new_sale(input: &NewSale) -> LedgerResult<()> {
    if input.items.is_empty() {
        return Err(LedgerError::invalid(
            "items",
            "A sale needs at least one item",
        ));
    }
    for (index, item) in input.items.iter().enumerate() {
        validate_quantity(&format!("items[{}].quantity_sold", index), item.quantity_sold)?;
        validate_unit_price(&format!("items[{}].unit_price", index), item.unit_price, false)?;
    }
    Ok(())
}

pub fn validate_cash_amount(input: &NewCashTransaction) -> LedgerResult<()> {
    if input.amount <= Decimal::ZERO {
        return Err(LedgerError::invalid("amount", "Amount must be positive"));
    }
    check_range("amount", input.amount, MAX_CASH_AMOUNT, MONEY_SCALE)
}

// ============================================================================
// Catalog Field Validations
// ============================================================================

/// Reject text that is empty once trimmed
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Must not be blank".into());
        return Err(err);
    }
    Ok(())
}

/// CNPJ must have 14 digits once punctuation is stripped
///
/// Accepts: 12345678000190, 12.345.678/0001-90
pub fn cnpj(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Ok(());
    }
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    let only_punctuation = value
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '/' | '-' | ' '));
    if digits.len() != 14 || !only_punctuation {
        let mut err = ValidationError::new("cnpj");
        err.message = Some("CNPJ must have 14 digits".into());
        return Err(err);
    }
    Ok(())
}

/// Digits-only CNPJ, or `None` when blank
pub fn normalize_cnpj(value: &str) -> Option<String> {
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    (!digits.is_empty()).then_some(digits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewSaleItem;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn sale_with(items: Vec<(Decimal, Decimal)>) -> NewSale {
        NewSale {
            buyer_id: Uuid::new_v4(),
            items: items
                .into_iter()
                .map(|(q, p)| NewSaleItem {
                    material_id: Uuid::new_v4(),
                    quantity_sold: q,
                    unit_price: p,
                })
                .collect(),
            date: None,
        }
    }

    #[test]
    fn test_quantity_must_be_positive() {
        assert!(validate_quantity("quantity", dec!(0.1)).is_ok());
        assert!(validate_quantity("quantity", Decimal::ZERO).is_err());
        assert!(validate_quantity("quantity", dec!(-3)).is_err());
    }

    #[test]
    fn test_quantity_bounds() {
        assert!(validate_quantity("quantity", MAX_QUANTITY).is_ok());
        assert_eq!(MAX_QUANTITY, dec!(99999999999.999));

        let err = validate_quantity("quantity", MAX_QUANTITY + dec!(0.001)).unwrap_err();
        assert!(matches!(err, LedgerError::Invalid { ref field, .. } if field == "quantity"));
        assert!(validate_quantity("quantity", dec!(50000000000000000000000000000)).is_err());
    }

    #[test]
    fn test_quantity_scale() {
        assert!(validate_quantity("quantity", dec!(1.235)).is_ok());
        // trailing zeros do not count
        assert!(validate_quantity("quantity", dec!(1.2000)).is_ok());
        assert!(validate_quantity("quantity", dec!(1.2345)).is_err());
        assert!(validate_quantity("quantity", dec!(0.0001)).is_err());
    }

    #[test]
    fn test_price_bounds_and_scale() {
        assert_eq!(MAX_UNIT_PRICE, dec!(9999999999.9999));
        assert!(validate_unit_price("unit_price", MAX_UNIT_PRICE, false).is_ok());
        assert!(validate_unit_price("unit_price", dec!(10000000000), false).is_err());
        assert!(validate_unit_price("unit_price", dec!(0.0001), false).is_ok());
        assert!(validate_unit_price("unit_price", dec!(0.00001), false).is_err());
        assert!(validate_unit_price("unit_price", Decimal::ZERO, false).is_err());
        assert!(validate_unit_price("unit_price_paid", Decimal::ZERO, true).is_ok());
    }

    #[test]
    fn test_cash_amount_bounds() {
        assert_eq!(MAX_CASH_AMOUNT, dec!(99999999999999.9999));
        let entry = |amount| NewCashTransaction {
            kind: crate::models::CashKind::Inflow,
            amount,
            description: None,
        };
        assert!(validate_cash_amount(&entry(MAX_CASH_AMOUNT)).is_ok());
        assert!(validate_cash_amount(&entry(dec!(100000000000000))).is_err());
        assert!(validate_cash_amount(&entry(dec!(10.00001))).is_err());
    }

    #[test]
    fn test_purchase_price_may_be_zero() {
        let input = NewPurchase {
            partner_id: Uuid::new_v4(),
            material_id: Uuid::new_v4(),
            quantity: dec!(10),
            unit_price_paid: Decimal::ZERO,
            date: None,
        };
        assert!(validate_new_purchase(&input).is_ok());

        let negative = NewPurchase {
            unit_price_paid: dec!(-0.01),
            ..input
        };
        let err = validate_new_purchase(&negative).unwrap_err();
        assert!(matches!(err, LedgerError::Invalid { ref field, .. } if field == "unit_price_paid"));
    }

    #[test]
    fn test_sale_requires_items() {
        assert!(validate_new_sale(&sale_with(vec![])).is_err());
    }

    #[test]
    fn test_sale_item_rules_name_the_line() {
        let err = validate_new_sale(&sale_with(vec![
            (dec!(1), dec!(2)),
            (dec!(1), Decimal::ZERO),
        ]))
        .unwrap_err();
        assert_eq!(
            err,
            LedgerError::invalid("items[1].unit_price", "Unit price must be positive")
        );

        let err = validate_new_sale(&sale_with(vec![(dec!(0), dec!(2))])).unwrap_err();
        assert!(matches!(err, LedgerError::Invalid { ref field, .. } if field == "items[0].quantity_sold"));
    }

    #[test]
    fn test_cnpj_formats() {
        assert!(cnpj("12345678000190").is_ok());
        assert!(cnpj("12.345.678/0001-90").is_ok());
        assert!(cnpj("1234567800019").is_err());
        assert!(cnpj("12a45678000190").is_err());
        assert_eq!(normalize_cnpj("12.345.678/0001-90").as_deref(), Some("12345678000190"));
        assert_eq!(normalize_cnpj("  "), None);
    }

    #[test]
    fn test_not_blank() {
        assert!(not_blank("PET").is_ok());
        assert!(not_blank(" \t").is_err());
    }
}
