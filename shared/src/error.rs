//! Errors raised by the pure ledger rules

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Failure of a domain rule, independent of storage or transport
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("{field}: {message}")]
    Invalid { field: String, message: String },

    #[error(
        "insufficient stock for material {material_id}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        material_id: Uuid,
        available: Decimal,
        requested: Decimal,
    },

    #[error("unknown partner type: {0}")]
    UnknownPartnerType(String),

    #[error("unknown cash transaction kind: {0}")]
    UnknownCashKind(String),
}

impl LedgerError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        LedgerError::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }

    /// A computed total that does not fit in a decimal
    pub fn out_of_range(field: impl Into<String>) -> Self {
        LedgerError::invalid(field, "Value is out of range")
    }

    /// Missing quantity for an insufficient-stock failure
    pub fn shortfall(&self) -> Option<Decimal> {
        match self {
            LedgerError::InsufficientStock {
                available,
                requested,
                ..
            } => requested.checked_sub(*available),
            _ => None,
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
