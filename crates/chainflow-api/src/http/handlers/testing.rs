//! Test suite handlers: CRUD plus running a suite against its workflow.

use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chainflow_core::repository::testing::TestStore;
use chainflow_types::testing::{TestCase, TestRun, TestSuite};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use super::workflow::load_workflow;
use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::extractors::query::LimitQuery;
use crate::http::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateTestSuite {
    pub workflow_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
}

pub fn testing_routes() -> Router<AppState> {
    Router::new()
        .route("/test-suites", post(create_suite))
        .route("/test-suites/{id}", get(get_suite).delete(delete_suite))
        .route("/test-suites/{id}/run", post(run_suite))
        .route("/test-suites/{id}/runs", get(list_runs))
        .route("/workflows/{id}/test-suites", get(list_suites))
}

async fn load_suite(state: &AppState, id: &Uuid) -> Result<TestSuite, AppError> {
    state
        .test_store
        .get_suite(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Test suite {id} not found")))
}

/// POST /api/v1/test-suites
pub async fn create_suite(
    State(state): State<AppState>,
    _auth: Authenticated,
    Json(body): Json<CreateTestSuite>,
) -> Result<Json<ApiResponse<TestSuite>>, AppError> {
    let start = Instant::now();

    if body.name.trim().is_empty() {
        return Err(AppError::Validation("test suite name must not be empty".to_string()));
    }
    load_workflow(&state, &body.workflow_id).await?;

    let suite = TestSuite {
        id: Uuid::now_v7(),
        workflow_id: body.workflow_id,
        name: body.name,
        description: body.description,
        test_cases: body.test_cases,
        created_at: Utc::now(),
    };
    state.test_store.save_suite(&suite).await?;

    let id = suite.id;
    Ok(Json(
        ApiResponse::success(suite, start)
            .with_link("self", format!("/api/v1/test-suites/{id}"))
            .with_link("run", format!("/api/v1/test-suites/{id}/run")),
    ))
}

/// GET /api/v1/workflows/{id}/test-suites
pub async fn list_suites(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<TestSuite>>>, AppError> {
    let start = Instant::now();
    let suites = state.test_store.list_suites(&id).await?;
    Ok(Json(ApiResponse::success(suites, start)))
}

/// GET /api/v1/test-suites/{id}
pub async fn get_suite(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<TestSuite>>, AppError> {
    let start = Instant::now();
    let suite = load_suite(&state, &id).await?;
    Ok(Json(ApiResponse::success(suite, start)))
}

/// DELETE /api/v1/test-suites/{id}
pub async fn delete_suite(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let start = Instant::now();
    if !state.test_store.delete_suite(&id).await? {
        return Err(AppError::NotFound(format!("Test suite {id} not found")));
    }
    Ok(Json(ApiResponse::success(json!({ "deleted": true, "id": id }), start)))
}

/// POST /api/v1/test-suites/{id}/run
///
/// Runs the suite against the workflow's current graph.
pub async fn run_suite(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<TestRun>>, AppError> {
    let start = Instant::now();
    let suite = load_suite(&state, &id).await?;
    let workflow = load_workflow(&state, &suite.workflow_id).await?;

    let run = state.test_runner.run_suite_definition(&suite, &workflow.graph).await?;
    Ok(Json(ApiResponse::success(run, start)))
}

/// GET /api/v1/test-suites/{id}/runs
pub async fn list_runs(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<Uuid>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ApiResponse<Vec<TestRun>>>, AppError> {
    let start = Instant::now();
    let runs = state.test_store.list_runs(&id, query.clamped()).await?;
    Ok(Json(ApiResponse::success(runs, start)))
}
