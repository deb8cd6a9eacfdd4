//! Workflow CRUD and execution handlers.

use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chainflow_core::engine::graph::execution_order;
use chainflow_core::repository::execution::ExecutionStore;
use chainflow_core::repository::workflow::WorkflowStore;
use chainflow_types::execution::{ExecutionRecord, ExecutionRequest, ExecutionSummary, TestModeConfig};
use chainflow_types::workflow::{Workflow, WorkflowGraph, WorkflowStatus};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::extractors::query::{LimitQuery, WorkflowListQuery};
use crate::http::response::ApiResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateWorkflow {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub status: Option<WorkflowStatus>,
    pub graph: WorkflowGraph,
}

#[derive(Debug, Deserialize)]
pub struct UpdateWorkflow {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<WorkflowStatus>,
    pub graph: Option<WorkflowGraph>,
}

/// Body of `POST /workflows/{id}/execute`, camelCase as the builder sends it.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteWorkflow {
    #[serde(default)]
    pub trigger_data: Value,
    pub execution_id: Option<Uuid>,
    pub source: Option<String>,
    #[serde(default)]
    pub test_mode: bool,
    pub test_mode_config: Option<TestModeConfig>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn workflow_routes() -> Router<AppState> {
    Router::new()
        .route("/workflows", post(create_workflow).get(list_workflows))
        .route(
            "/workflows/{id}",
            get(get_workflow).put(update_workflow).delete(delete_workflow),
        )
        .route("/workflows/{id}/execute", post(execute_workflow))
        .route("/workflows/{id}/executions", get(list_executions))
}

fn validate_graph(graph: &WorkflowGraph) -> Result<(), AppError> {
    execution_order(graph)
        .map(|_| ())
        .map_err(|e| AppError::Validation(e.to_string()))
}

pub(crate) async fn load_workflow(state: &AppState, id: &Uuid) -> Result<Workflow, AppError> {
    state
        .workflows
        .get_workflow(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Workflow {id} not found")))
}

// ---------------------------------------------------------------------------
// CRUD
// ---------------------------------------------------------------------------

/// POST /api/v1/workflows
pub async fn create_workflow(
    State(state): State<AppState>,
    _auth: Authenticated,
    Json(body): Json<CreateWorkflow>,
) -> Result<Json<ApiResponse<Workflow>>, AppError> {
    let start = Instant::now();

    if body.name.trim().is_empty() {
        return Err(AppError::Validation("name must not be empty".to_string()));
    }
    validate_graph(&body.graph)?;

    let now = Utc::now();
    let workflow = Workflow {
        id: Uuid::now_v7(),
        user_id: body.user_id,
        name: body.name.trim().to_string(),
        description: body.description,
        status: body.status.unwrap_or(WorkflowStatus::Draft),
        graph: body.graph,
        created_at: now,
        updated_at: now,
    };
    state.workflows.save_workflow(&workflow).await?;

    tracing::info!(workflow_id = %workflow.id, name = %workflow.name, "created workflow");

    let link = format!("/api/v1/workflows/{}", workflow.id);
    Ok(Json(ApiResponse::success(workflow, start).with_link("self", link)))
}

/// GET /api/v1/workflows?page=&limit=&user_id=
///
/// Newest first, with a `pagination` block beside `data`.
pub async fn list_workflows(
    State(state): State<AppState>,
    _auth: Authenticated,
    Query(query): Query<WorkflowListQuery>,
) -> Result<Json<ApiResponse<Vec<Workflow>>>, AppError> {
    let start = Instant::now();
    let request = query.page_request();
    let page = state
        .workflows
        .list_workflows_page(query.user_id.as_deref(), request)
        .await?;
    let pagination = page.pagination(request);

    let mut response = ApiResponse::success(page.items, start)
        .with_pagination(pagination)
        .with_link("self", format!("/api/v1/workflows?page={}&limit={}", request.page, request.limit));
    if u64::from(request.page) < pagination.total_pages {
        response = response.with_link(
            "next",
            format!("/api/v1/workflows?page={}&limit={}", request.page + 1, request.limit),
        );
    }
    Ok(Json(response))
}

/// GET /api/v1/workflows/{id}
pub async fn get_workflow(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Workflow>>, AppError> {
    let start = Instant::now();
    let workflow = load_workflow(&state, &id).await?;

    Ok(Json(
        ApiResponse::success(workflow, start)
            .with_link("self", format!("/api/v1/workflows/{id}"))
            .with_link("executions", format!("/api/v1/workflows/{id}/executions"))
            .with_link("webhooks", format!("/api/v1/workflows/{id}/webhooks")),
    ))
}

/// PUT /api/v1/workflows/{id}
pub async fn update_workflow(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateWorkflow>,
) -> Result<Json<ApiResponse<Workflow>>, AppError> {
    let start = Instant::now();
    let mut workflow = load_workflow(&state, &id).await?;

    if let Some(name) = body.name {
        if name.trim().is_empty() {
            return Err(AppError::Validation("name must not be empty".to_string()));
        }
        workflow.name = name.trim().to_string();
    }
    if let Some(description) = body.description {
        workflow.description = Some(description);
    }
    if let Some(status) = body.status {
        workflow.status = status;
    }
    if let Some(graph) = body.graph {
        validate_graph(&graph)?;
        workflow.graph = graph;
    }
    workflow.updated_at = Utc::now();

    state.workflows.save_workflow(&workflow).await?;
    Ok(Json(
        ApiResponse::success(workflow, start).with_link("self", format!("/api/v1/workflows/{id}")),
    ))
}

/// DELETE /api/v1/workflows/{id}
///
/// Also tears down the workflow's webhooks, best effort.
pub async fn delete_workflow(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let start = Instant::now();

    load_workflow(&state, &id).await?;
    state.trigger_manager.unregister_workflow_webhooks(&id).await;
    state.workflows.delete_workflow(&id).await?;

    tracing::info!(workflow_id = %id, "deleted workflow");
    Ok(Json(ApiResponse::success(serde_json::json!({ "deleted": true, "id": id }), start)))
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// POST /api/v1/workflows/{id}/execute
///
/// Runs the stored graph to completion and returns the summary body
/// directly: `{success, steps, output}` or `{success: false, error, details, steps}`.
pub async fn execute_workflow(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<Uuid>,
    body: Option<Json<ExecuteWorkflow>>,
) -> Result<Json<ExecutionSummary>, AppError> {
    let Json(body) = body.unwrap_or_default();
    let workflow = load_workflow(&state, &id).await?;

    let mut request = ExecutionRequest::new(workflow.id, workflow.graph, body.trigger_data);
    request.user_id = workflow.user_id;
    request.execution_id = body.execution_id;
    request.source = body.source.unwrap_or_else(|| "manual".to_string());
    if body.test_mode {
        request = request.in_test_mode(body.test_mode_config);
    }

    let summary = state.engine.execute(request).await?;
    Ok(Json(summary))
}

/// GET /api/v1/workflows/{id}/executions
pub async fn list_executions(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<Uuid>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ApiResponse<Vec<ExecutionRecord>>>, AppError> {
    let start = Instant::now();
    let records = state.executions.list_executions(&id, query.clamped()).await?;
    Ok(Json(
        ApiResponse::success(records, start).with_link("workflow", format!("/api/v1/workflows/{id}")),
    ))
}
