//! HTTP handlers for partners (donor associations and buyers)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use uuid::Uuid;

use shared::{NewPartner, Page, Partner, PartnerChanges, PartnerFilter, PartnerType};

use crate::error::AppResult;
use crate::handlers::{page, JsonBody, PathParam, QueryParams};
use crate::middleware::CurrentUser;
use crate::services::CatalogService;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PartnerQuery {
    pub name: Option<String>,
    pub partner_type: Option<PartnerType>,
    #[serde(default)]
    pub include_inactive: bool,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

/// Register a partner
pub async fn create_partner(
    State(state): State<AppState>,
    _user: CurrentUser,
    WithRejection(Json(input), _): JsonBody<NewPartner>,
) -> AppResult<(StatusCode, Json<Partner>)> {
    let service = CatalogService::new(state.store);
    let partner = service.create_partner(input).await?;
    Ok((StatusCode::CREATED, Json(partner)))
}

/// List partners, optionally by type
pub async fn list_partners(
    State(state): State<AppState>,
    _user: CurrentUser,
    WithRejection(Query(query), _): QueryParams<PartnerQuery>,
) -> AppResult<Json<Page<Partner>>> {
    let service = CatalogService::new(state.store);
    let filter = PartnerFilter {
        name: query.name,
        partner_type: query.partner_type,
        include_inactive: query.include_inactive,
    };
    let partners = service
        .list_partners(&filter, page(query.skip, query.limit))
        .await?;
    Ok(Json(partners))
}

/// Active partners of type BUYER
pub async fn list_buyers(
    State(state): State<AppState>,
    _user: CurrentUser,
    WithRejection(Query(query), _): QueryParams<PageQuery>,
) -> AppResult<Json<Page<Partner>>> {
    let service = CatalogService::new(state.store);
    let buyers = service.list_buyers(page(query.skip, query.limit)).await?;
    Ok(Json(buyers))
}

pub async fn get_partner(
    State(state): State<AppState>,
    _user: CurrentUser,
    WithRejection(Path(partner_id), _): PathParam<Uuid>,
) -> AppResult<Json<Partner>> {
    let service = CatalogService::new(state.store);
    let partner = service.get_partner(partner_id).await?;
    Ok(Json(partner))
}

pub async fn update_partner(
    State(state): State<AppState>,
    _user: CurrentUser,
    WithRejection(Path(partner_id), _): PathParam<Uuid>,
    WithRejection(Json(changes), _): JsonBody<PartnerChanges>,
) -> AppResult<Json<Partner>> {
    let service = CatalogService::new(state.store);
    let partner = service.update_partner(partner_id, changes).await?;
    Ok(Json(partner))
}

/// Deactivate a partner
pub async fn deactivate_partner(
    State(state): State<AppState>,
    _user: CurrentUser,
    WithRejection(Path(partner_id), _): PathParam<Uuid>,
) -> AppResult<Json<Partner>> {
    let service = CatalogService::new(state.store);
    let partner = service.deactivate_partner(partner_id).await?;
    Ok(Json(partner))
}
