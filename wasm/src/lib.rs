//! WebAssembly module for the Recycling Network Ledger
//!
//! Provides client-side computation for:
//! - Building a sale draft with stock pre-checks
//! - Line and sale totals
//! - Money and quantity formatting
//!
//! The server re-checks everything; nothing here is authoritative.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;
use wasm_bindgen::prelude::*;

use shared::ledger;
use shared::{
    validate_new_sale, validate_quantity, validate_unit_price, LedgerError, NewSale, NewSaleItem,
};

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, LedgerError> {
    Decimal::from_str(value.trim()).map_err(|_| LedgerError::invalid(field, "Not a number"))
}

fn parse_id(field: &str, value: &str) -> Result<Uuid, LedgerError> {
    Uuid::parse_str(value.trim()).map_err(|_| LedgerError::invalid(field, "Not a valid id"))
}

fn to_js(err: LedgerError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// A sale being assembled in the browser before it is submitted
#[wasm_bindgen]
#[derive(Debug, Clone)]
pub struct SaleDraft {
    buyer_id: Uuid,
    items: Vec<NewSaleItem>,
}

impl SaleDraft {
    pub fn for_buyer(buyer_id: Uuid) -> Self {
        Self {
            buyer_id,
            items: Vec::new(),
        }
    }

    /// Quantity of `material_id` already on the draft
    pub fn drafted(&self, material_id: Uuid) -> Result<Decimal, LedgerError> {
        self.items
            .iter()
            .filter(|i| i.material_id == material_id)
            .try_fold(Decimal::ZERO, |total, i| {
                ledger::checked_add("quantity_sold", total, i.quantity_sold)
            })
    }

    /// Add a line, refusing it when the draft would exceed `available`
    pub fn push_item(
        &mut self,
        material_id: Uuid,
        quantity: Decimal,
        unit_price: Decimal,
        available: Decimal,
    ) -> Result<(), LedgerError> {
        validate_quantity("quantity_sold", quantity)?;
        validate_unit_price("unit_price", unit_price, false)?;
        let requested = ledger::checked_add("quantity_sold", self.drafted(material_id)?, quantity)?;
        ledger::check_availability(material_id, available, requested)?;

        self.items.push(NewSaleItem {
            material_id,
            quantity_sold: quantity,
            unit_price,
        });
        Ok(())
    }

    pub fn sale_total(&self) -> Result<Decimal, LedgerError> {
        self.items.iter().try_fold(Decimal::ZERO, |total, i| {
            let line = ledger::checked_mul("total", i.quantity_sold, i.unit_price)?;
            ledger::checked_add("total", total, line)
        })
    }

    /// The request body for `POST /sales`
    pub fn to_new_sale(&self) -> Result<NewSale, LedgerError> {
        let sale = NewSale {
            buyer_id: self.buyer_id,
            items: self.items.clone(),
            date: None,
        };
        validate_new_sale(&sale)?;
        Ok(sale)
    }
}

#[wasm_bindgen]
impl SaleDraft {
    #[wasm_bindgen(constructor)]
    pub fn new(buyer_id: &str) -> Result<SaleDraft, JsValue> {
        parse_id("buyer_id", buyer_id)
            .map(SaleDraft::for_buyer)
            .map_err(to_js)
    }

    /// Add a line; `available` is the stock the server reported
    #[wasm_bindgen(js_name = addItem)]
    pub fn add_item(
        &mut self,
        material_id: &str,
        quantity: &str,
        unit_price: &str,
        available: &str,
    ) -> Result<(), JsValue> {
        let material_id = parse_id("material_id", material_id).map_err(to_js)?;
        let quantity = parse_decimal("quantity_sold", quantity).map_err(to_js)?;
        let unit_price = parse_decimal("unit_price", unit_price).map_err(to_js)?;
        let available = parse_decimal("available", available).map_err(to_js)?;
        self.push_item(material_id, quantity, unit_price, available)
            .map_err(to_js)
    }

    #[wasm_bindgen(js_name = removeItem)]
    pub fn remove_item(&mut self, index: usize) -> bool {
        if index < self.items.len() {
            self.items.remove(index);
            true
        } else {
            false
        }
    }

    #[wasm_bindgen(js_name = itemCount)]
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Sale total as a decimal string
    pub fn total(&self) -> Result<String, JsValue> {
        self.sale_total().map(|t| t.to_string()).map_err(to_js)
    }

    #[wasm_bindgen(js_name = toJson)]
    pub fn to_json(&self) -> Result<String, JsValue> {
        let sale = self.to_new_sale().map_err(to_js)?;
        serde_json::to_string(&sale).map_err(|e| JsValue::from_str(&e.to_string()))
    }
}

/// Total of one sale line, or `"0"` when either input is not a number
/// or the product does not fit
#[wasm_bindgen(js_name = lineTotal)]
pub fn line_total(quantity: &str, unit_price: &str) -> String {
    match (Decimal::from_str(quantity.trim()), Decimal::from_str(unit_price.trim())) {
        (Ok(q), Ok(p)) => q.checked_mul(p).unwrap_or_default().to_string(),
        _ => Decimal::ZERO.to_string(),
    }
}

/// Brazilian real formatting: `R$ 1.234,56`
#[wasm_bindgen(js_name = formatMoney)]
pub fn format_money(amount: &str) -> String {
    let value = Decimal::from_str(amount.trim()).unwrap_or_default();
    format!("R$ {}", group_pt_br(value, 2))
}

/// Quantity with one decimal and its unit: `1.234,5 kg`
#[wasm_bindgen(js_name = formatQuantity)]
pub fn format_quantity(quantity: &str, unit: &str) -> String {
    let value = Decimal::from_str(quantity.trim()).unwrap_or_default();
    let unit = if unit.trim().is_empty() { "un" } else { unit.trim() };
    format!("{} {}", group_pt_br(value, 1), unit)
}

fn group_pt_br(value: Decimal, places: u32) -> String {
    let mut rounded = value.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(places);
    let text = rounded.abs().to_string();
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), ""));

    let mut grouped = String::new();
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    if frac_part.is_empty() {
        format!("{}{}", sign, grouped)
    } else {
        format!("{}{},{}", sign, grouped, frac_part)
    }
}
