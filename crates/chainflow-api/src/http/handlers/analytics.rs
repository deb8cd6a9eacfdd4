//! Usage analytics over the execution history.

use std::time::Instant;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chainflow_core::analytics::usage_report;
use chainflow_types::analytics::UsageReport;

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::extractors::query::UsageQuery;
use crate::http::response::ApiResponse;
use crate::state::AppState;

pub fn analytics_routes() -> Router<AppState> {
    Router::new().route("/analytics/usage", get(get_usage))
}

/// GET /api/v1/analytics/usage?start_date=&end_date=&granularity=&workflow_id=
pub async fn get_usage(
    State(state): State<AppState>,
    _auth: Authenticated,
    Query(query): Query<UsageQuery>,
) -> Result<Json<ApiResponse<UsageReport>>, AppError> {
    let start = Instant::now();
    let (from, to) = query.window().map_err(AppError::Validation)?;
    let report = usage_report(
        &*state.executions,
        from,
        to,
        query.granularity,
        query.workflow_id.as_ref(),
    )
    .await?;
    Ok(Json(ApiResponse::success(report, start)))
}
