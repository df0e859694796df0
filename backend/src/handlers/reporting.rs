//! Reporting handlers with optional CSV export

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};

use shared::ReportRange;

use crate::error::AppResult;
use crate::handlers::{parse_date, QueryParams};
use crate::middleware::CurrentUser;
use crate::services::ReportingService;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub format: Option<String>, // "json" or "csv"
}

impl ReportQuery {
    fn range(&self) -> AppResult<ReportRange> {
        Ok(ReportRange::new(
            parse_date("start_date", self.start_date.as_deref())?,
            parse_date("end_date", self.end_date.as_deref())?,
        ))
    }

    fn wants_csv(&self) -> bool {
        self.format
            .as_deref()
            .is_some_and(|f| f.eq_ignore_ascii_case("csv"))
    }
}

/// JSON `body`, or `rows` as a CSV attachment when `format=csv`
fn respond<B: Serialize, T: Serialize>(
    query: &ReportQuery,
    filename: &str,
    body: &B,
    rows: &[T],
) -> AppResult<Response> {
    if query.wants_csv() {
        let csv = ReportingService::export_to_csv(rows)?;
        let disposition = format!("attachment; filename=\"{}.csv\"", filename);
        Ok((
            [
                (header::CONTENT_TYPE, "text/csv".to_string()),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            csv,
        )
            .into_response())
    } else {
        Ok(Json(body).into_response())
    }
}

/// Period totals: received, purchased, sold, revenue, spend and gross profit
pub async fn get_summary_report(
    State(state): State<AppState>,
    _user: CurrentUser,
    WithRejection(Query(query), _): QueryParams<ReportQuery>,
) -> AppResult<Response> {
    let service = ReportingService::new(state.store);
    let summary = service.summary(query.range()?).await?;
    respond(&query, "summary", &summary, std::slice::from_ref(&summary))
}

/// Per-material totals for the period
pub async fn get_material_report(
    State(state): State<AppState>,
    _user: CurrentUser,
    WithRejection(Query(query), _): QueryParams<ReportQuery>,
) -> AppResult<Response> {
    let service = ReportingService::new(state.store);
    let rows = service.by_material(query.range()?).await?;
    respond(&query, "by_material", &rows, &rows)
}

/// Per-partner totals for the period
pub async fn get_partner_report(
    State(state): State<AppState>,
    _user: CurrentUser,
    WithRejection(Query(query), _): QueryParams<ReportQuery>,
) -> AppResult<Response> {
    let service = ReportingService::new(state.store);
    let rows = service.by_partner(query.range()?).await?;
    respond(&query, "by_partner", &rows, &rows)
}
