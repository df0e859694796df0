//! Cash book models

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{LedgerError, LedgerResult};
use crate::ledger;

/// Direction of money
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CashKind {
    Inflow,
    Outflow,
}

impl CashKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CashKind::Inflow => "INFLOW",
            CashKind::Outflow => "OUTFLOW",
        }
    }

    pub fn reversed(&self) -> Self {
        match self {
            CashKind::Inflow => CashKind::Outflow,
            CashKind::Outflow => CashKind::Inflow,
        }
    }
}

impl FromStr for CashKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INFLOW" => Ok(CashKind::Inflow),
            "OUTFLOW" => Ok(CashKind::Outflow),
            other => Err(LedgerError::UnknownCashKind(other.to_string())),
        }
    }
}

/// An entry of the cash book
///
/// Sales and purchases book their entries automatically and their
/// cancellations book the reversal; manual entries carry no link.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CashTransaction {
    pub id: Uuid,
    pub kind: CashKind,
    pub amount: Decimal,
    pub description: Option<String>,
    pub purchase_id: Option<Uuid>,
    pub sale_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Input for a manual cash entry
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewCashTransaction {
    pub kind: CashKind,
    pub amount: Decimal,
    #[validate(length(max = 255, message = "Description must have at most 255 characters"))]
    pub description: Option<String>,
}

/// Cash book position
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CashBalance {
    pub balance: Decimal,
    pub total_inflow: Decimal,
    pub total_outflow: Decimal,
}

impl CashBalance {
    pub fn from_transactions<'a>(
        txs: impl IntoIterator<Item = &'a CashTransaction>,
    ) -> LedgerResult<Self> {
        let (mut total_inflow, mut total_outflow) = (Decimal::ZERO, Decimal::ZERO);
        for tx in txs {
            match tx.kind {
                CashKind::Inflow => {
                    total_inflow = ledger::checked_add("total_inflow", total_inflow, tx.amount)?
                }
                CashKind::Outflow => {
                    total_outflow = ledger::checked_add("total_outflow", total_outflow, tx.amount)?
                }
            }
        }
        Self::from_totals(total_inflow, total_outflow)
    }

    pub fn from_totals(total_inflow: Decimal, total_outflow: Decimal) -> LedgerResult<Self> {
        Ok(Self {
            balance: ledger::checked_sub("balance", total_inflow, total_outflow)?,
            total_inflow,
            total_outflow,
        })
    }
}
