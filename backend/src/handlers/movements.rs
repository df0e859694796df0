//! HTTP handlers for the movement ledger: receipts, purchases and sales

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use uuid::Uuid;

use shared::{
    MovementFilter, NewPurchase, NewReceipt, NewSale, Page, Purchase, Receipt, Sale,
};

use crate::error::AppResult;
use crate::handlers::{page, parse_date, JsonBody, PathParam, QueryParams};
use crate::middleware::CurrentUser;
use crate::services::LedgerService;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct MovementQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub partner_id: Option<Uuid>,
    pub material_id: Option<Uuid>,
    #[serde(default)]
    pub include_cancelled: bool,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl MovementQuery {
    fn filter(&self) -> AppResult<MovementFilter> {
        Ok(MovementFilter {
            start_date: parse_date("start_date", self.start_date.as_deref())?,
            end_date: parse_date("end_date", self.end_date.as_deref())?,
            partner_id: self.partner_id,
            material_id: self.material_id,
            include_cancelled: self.include_cancelled,
        })
    }
}

// ============================================================================
// Receipts
// ============================================================================

/// Record a donation
pub async fn create_receipt(
    State(state): State<AppState>,
    _user: CurrentUser,
    WithRejection(Json(input), _): JsonBody<NewReceipt>,
) -> AppResult<(StatusCode, Json<Receipt>)> {
    let service = LedgerService::new(state.store);
    let receipt = service.create_receipt(input).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn list_receipts(
    State(state): State<AppState>,
    _user: CurrentUser,
    WithRejection(Query(query), _): QueryParams<MovementQuery>,
) -> AppResult<Json<Page<Receipt>>> {
    let service = LedgerService::new(state.store);
    let receipts = service
        .list_receipts(&query.filter()?, page(query.skip, query.limit))
        .await?;
    Ok(Json(receipts))
}

pub async fn get_receipt(
    State(state): State<AppState>,
    _user: CurrentUser,
    WithRejection(Path(receipt_id), _): PathParam<Uuid>,
) -> AppResult<Json<Receipt>> {
    let service = LedgerService::new(state.store);
    let receipt = service.get_receipt(receipt_id).await?;
    Ok(Json(receipt))
}

pub async fn cancel_receipt(
    State(state): State<AppState>,
    _user: CurrentUser,
    WithRejection(Path(receipt_id), _): PathParam<Uuid>,
) -> AppResult<StatusCode> {
    let service = LedgerService::new(state.store);
    service.cancel_receipt(receipt_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Purchases
// ============================================================================

/// Record a paid acquisition
pub async fn create_purchase(
    State(state): State<AppState>,
    _user: CurrentUser,
    WithRejection(Json(input), _): JsonBody<NewPurchase>,
) -> AppResult<(StatusCode, Json<Purchase>)> {
    let service = LedgerService::new(state.store);
    let purchase = service.create_purchase(input).await?;
    Ok((StatusCode::CREATED, Json(purchase)))
}

pub async fn list_purchases(
    State(state): State<AppState>,
    _user: CurrentUser,
    WithRejection(Query(query), _): QueryParams<MovementQuery>,
) -> AppResult<Json<Page<Purchase>>> {
    let service = LedgerService::new(state.store);
    let purchases = service
        .list_purchases(&query.filter()?, page(query.skip, query.limit))
        .await?;
    Ok(Json(purchases))
}

pub async fn get_purchase(
    State(state): State<AppState>,
    _user: CurrentUser,
    WithRejection(Path(purchase_id), _): PathParam<Uuid>,
) -> AppResult<Json<Purchase>> {
    let service = LedgerService::new(state.store);
    let purchase = service.get_purchase(purchase_id).await?;
    Ok(Json(purchase))
}

pub async fn cancel_purchase(
    State(state): State<AppState>,
    _user: CurrentUser,
    WithRejection(Path(purchase_id), _): PathParam<Uuid>,
) -> AppResult<StatusCode> {
    let service = LedgerService::new(state.store);
    service.cancel_purchase(purchase_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Sales
// ============================================================================

/// Record a multi-line sale; rejected whole if any line would oversell
pub async fn create_sale(
    State(state): State<AppState>,
    _user: CurrentUser,
    WithRejection(Json(input), _): JsonBody<NewSale>,
) -> AppResult<(StatusCode, Json<Sale>)> {
    let service = LedgerService::new(state.store);
    let sale = service.create_sale(input).await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

pub async fn list_sales(
    State(state): State<AppState>,
    _user: CurrentUser,
    WithRejection(Query(query), _): QueryParams<MovementQuery>,
) -> AppResult<Json<Page<Sale>>> {
    let service = LedgerService::new(state.store);
    let sales = service
        .list_sales(&query.filter()?, page(query.skip, query.limit))
        .await?;
    Ok(Json(sales))
}

pub async fn get_sale(
    State(state): State<AppState>,
    _user: CurrentUser,
    WithRejection(Path(sale_id), _): PathParam<Uuid>,
) -> AppResult<Json<Sale>> {
    let service = LedgerService::new(state.store);
    let sale = service.get_sale(sale_id).await?;
    Ok(Json(sale))
}

pub async fn cancel_sale(
    State(state): State<AppState>,
    _user: CurrentUser,
    WithRejection(Path(sale_id), _): PathParam<Uuid>,
) -> AppResult<StatusCode> {
    let service = LedgerService::new(state.store);
    service.cancel_sale(sale_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Cancel any movement by id, whatever its kind
pub async fn cancel_movement(
    State(state): State<AppState>,
    _user: CurrentUser,
    WithRejection(Path(movement_id), _): PathParam<Uuid>,
) -> AppResult<StatusCode> {
    let service = LedgerService::new(state.store);
    service.cancel_movement(movement_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
