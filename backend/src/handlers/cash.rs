//! Cash book handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;

use shared::{CashBalance, CashTransaction, NewCashTransaction, Page};

use crate::error::AppResult;
use crate::handlers::{page, partners::PageQuery, JsonBody, QueryParams};
use crate::middleware::CurrentUser;
use crate::services::CashService;
use crate::AppState;

pub async fn get_cash_balance(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<Json<CashBalance>> {
    let service = CashService::new(state.store);
    let balance = service.balance().await?;
    Ok(Json(balance))
}

/// Cash transactions, newest first
pub async fn list_cash_transactions(
    State(state): State<AppState>,
    _user: CurrentUser,
    WithRejection(Query(query), _): QueryParams<PageQuery>,
) -> AppResult<Json<Page<CashTransaction>>> {
    let service = CashService::new(state.store);
    let transactions = service
        .list_transactions(page(query.skip, query.limit))
        .await?;
    Ok(Json(transactions))
}

/// Record a manual cash entry
pub async fn create_cash_transaction(
    State(state): State<AppState>,
    current_user: CurrentUser,
    WithRejection(Json(input), _): JsonBody<NewCashTransaction>,
) -> AppResult<(StatusCode, Json<CashTransaction>)> {
    let service = CashService::new(state.store);
    let transaction = service.record_manual(input).await?;
    tracing::debug!(subject = %current_user.0.subject, "Manual cash entry by operator");
    Ok((StatusCode::CREATED, Json(transaction)))
}
