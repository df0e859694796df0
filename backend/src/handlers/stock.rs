//! Stock handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use shared::{MaterialStock, Page, StockLevel};

use crate::error::AppResult;
use crate::handlers::{materials::MaterialQuery, page, PathParam, QueryParams};
use crate::middleware::CurrentUser;
use crate::services::StockService;
use crate::AppState;

/// Current stock of one material
pub async fn get_stock(
    State(state): State<AppState>,
    _user: CurrentUser,
    WithRejection(Path(material_id), _): PathParam<Uuid>,
) -> AppResult<Json<StockLevel>> {
    let service = StockService::new(state.store);
    let level = service.current_stock(material_id).await?;
    Ok(Json(level))
}

/// Catalog listing with current stock per material
pub async fn list_stock(
    State(state): State<AppState>,
    _user: CurrentUser,
    WithRejection(Query(query), _): QueryParams<MaterialQuery>,
) -> AppResult<Json<Page<MaterialStock>>> {
    let service = StockService::new(state.store);
    let stock = service
        .list_stock(&query.filter(), page(query.skip, query.limit))
        .await?;
    Ok(Json(stock))
}
