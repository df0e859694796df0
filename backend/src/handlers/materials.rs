//! HTTP handlers for the material catalog

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use uuid::Uuid;

use shared::{Material, MaterialChanges, MaterialFilter, NewMaterial, Page};

use crate::error::AppResult;
use crate::handlers::{page, JsonBody, PathParam, QueryParams};
use crate::middleware::CurrentUser;
use crate::services::CatalogService;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct MaterialQuery {
    pub name: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl MaterialQuery {
    pub(crate) fn filter(&self) -> MaterialFilter {
        MaterialFilter {
            name: self.name.clone(),
            include_inactive: self.include_inactive,
        }
    }
}

/// Register a material
pub async fn create_material(
    State(state): State<AppState>,
    _user: CurrentUser,
    WithRejection(Json(input), _): JsonBody<NewMaterial>,
) -> AppResult<(StatusCode, Json<Material>)> {
    let service = CatalogService::new(state.store);
    let material = service.create_material(input).await?;
    Ok((StatusCode::CREATED, Json(material)))
}

/// List materials, active only unless `include_inactive` is set
pub async fn list_materials(
    State(state): State<AppState>,
    _user: CurrentUser,
    WithRejection(Query(query), _): QueryParams<MaterialQuery>,
) -> AppResult<Json<Page<Material>>> {
    let service = CatalogService::new(state.store);
    let materials = service
        .list_materials(&query.filter(), page(query.skip, query.limit))
        .await?;
    Ok(Json(materials))
}

/// Get a material by id
pub async fn get_material(
    State(state): State<AppState>,
    _user: CurrentUser,
    WithRejection(Path(material_id), _): PathParam<Uuid>,
) -> AppResult<Json<Material>> {
    let service = CatalogService::new(state.store);
    let material = service.get_material(material_id).await?;
    Ok(Json(material))
}

/// Update a material
pub async fn update_material(
    State(state): State<AppState>,
    _user: CurrentUser,
    WithRejection(Path(material_id), _): PathParam<Uuid>,
    WithRejection(Json(changes), _): JsonBody<MaterialChanges>,
) -> AppResult<Json<Material>> {
    let service = CatalogService::new(state.store);
    let material = service.update_material(material_id, changes).await?;
    Ok(Json(material))
}

/// Deactivate a material; its movements stay in the ledger
pub async fn deactivate_material(
    State(state): State<AppState>,
    _user: CurrentUser,
    WithRejection(Path(material_id), _): PathParam<Uuid>,
) -> AppResult<Json<Material>> {
    let service = CatalogService::new(state.store);
    let material = service.deactivate_material(material_id).await?;
    Ok(Json(material))
}
