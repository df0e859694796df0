//! HTTP request handlers

pub mod cash;
pub mod categories;
pub mod health;
pub mod materials;
pub mod movements;
pub mod partners;
pub mod reporting;
pub mod stock;

pub use cash::*;
pub use categories::*;
pub use health::*;
pub use materials::*;
pub use movements::*;
pub use partners::*;
pub use reporting::*;
pub use stock::*;

use axum::extract::{Json, Path, Query};
use axum_extra::extract::WithRejection;
use chrono::NaiveDate;

use shared::{Pagination, DEFAULT_LIMIT};

use crate::error::AppError;

/// JSON body whose rejections render as `VALIDATION_ERROR`
pub type JsonBody<T> = WithRejection<Json<T>, AppError>;

/// Query string whose rejections render as `VALIDATION_ERROR`
pub type QueryParams<T> = WithRejection<Query<T>, AppError>;

/// Path segments whose rejections render as `VALIDATION_ERROR`
pub type PathParam<T> = WithRejection<Path<T>, AppError>;

/// Parse an optional `YYYY-MM-DD` query value
pub(crate) fn parse_date(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => NaiveDate::parse_from_str(v, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| AppError::validation(field, "Expected a date as YYYY-MM-DD")),
    }
}

pub(crate) fn page(skip: Option<i64>, limit: Option<i64>) -> Pagination {
    Pagination::new(skip.unwrap_or(0), limit.unwrap_or(DEFAULT_LIMIT))
}
