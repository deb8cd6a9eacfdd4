//! Execution inspection and control: fetch, cancel, resume.

use std::time::Instant;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chainflow_core::repository::execution::ExecutionStore;
use chainflow_types::execution::{ExecutionRecord, ExecutionSummary};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use super::workflow::load_workflow;
use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Body of `POST /executions/{id}/resume`.
#[derive(Debug, Deserialize)]
pub struct ResumeExecution {
    pub token: Uuid,
    #[serde(default)]
    pub response: Value,
}

pub fn execution_routes() -> Router<AppState> {
    Router::new()
        .route("/executions/{id}", get(get_execution))
        .route("/executions/{id}/cancel", post(cancel_execution))
        .route("/executions/{id}/resume", post(resume_execution))
}

/// GET /api/v1/executions/{id}
pub async fn get_execution(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ExecutionRecord>>, AppError> {
    let start = Instant::now();
    let record = state
        .executions
        .get_execution(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Execution {id} not found")))?;

    let workflow_link = format!("/api/v1/workflows/{}", record.workflow_id);
    Ok(Json(
        ApiResponse::success(record, start)
            .with_link("self", format!("/api/v1/executions/{id}"))
            .with_link("workflow", workflow_link),
    ))
}

/// POST /api/v1/executions/{id}/cancel
pub async fn cancel_execution(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let start = Instant::now();
    let cancelled = state.engine.cancel(id).await?;
    Ok(Json(ApiResponse::success(json!({ "id": id, "cancelled": cancelled }), start)))
}

/// POST /api/v1/executions/{id}/resume
///
/// Continues a paused run with the human's response. The graph is reloaded
/// from the stored workflow.
pub async fn resume_execution(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<Uuid>,
    Json(body): Json<ResumeExecution>,
) -> Result<Json<ExecutionSummary>, AppError> {
    let record = state
        .executions
        .get_execution(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Execution {id} not found")))?;
    let workflow = load_workflow(&state, &record.workflow_id).await?;

    let summary = state.engine.resume(id, body.token, body.response, &workflow.graph).await?;
    Ok(Json(summary))
}
