//! HTTP handlers for the waste-category catalog

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::WithRejection;

use shared::{Category, NewCategory};

use crate::error::AppResult;
use crate::handlers::JsonBody;
use crate::middleware::CurrentUser;
use crate::services::CatalogService;
use crate::AppState;

/// Register a category
pub async fn create_category(
    State(state): State<AppState>,
    _user: CurrentUser,
    WithRejection(Json(input), _): JsonBody<NewCategory>,
) -> AppResult<(StatusCode, Json<Category>)> {
    let service = CatalogService::new(state.store);
    let category = service.create_category(input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// List every category by name
pub async fn list_categories(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<Json<Vec<Category>>> {
    let service = CatalogService::new(state.store);
    Ok(Json(service.list_categories().await?))
}
