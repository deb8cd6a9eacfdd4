//! Webhook endpoints: the public delivery receiver plus registration and
//! inspection routes under `/api/v1`.

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chainflow_core::webhook::catalog::{SupportedTrigger, supported_triggers};
use chainflow_core::webhook::signature::WebhookHeaders;
use chainflow_types::webhook::{RegisterWebhook, UpdateWebhook, WebhookConfig, WebhookExecution};
use serde::Serialize;
use serde_json::{Value, json};
use uuid::Uuid;

use super::workflow::load_workflow;
use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::extractors::query::{LimitQuery, WebhookDeliveryQuery};
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Registration result. The secret is returned here once so it can be
/// configured on the provider side; it is never serialized again.
#[derive(Debug, Serialize)]
pub struct RegisteredWebhook {
    pub webhook: WebhookConfig,
    pub secret: String,
}

/// Public receiver, mounted at the root: `POST /webhooks/{provider}?id=`.
pub fn receiver_routes() -> Router<AppState> {
    Router::new().route("/webhooks/{provider}", post(receive_webhook))
}

pub fn webhook_routes() -> Router<AppState> {
    Router::new()
        .route("/webhooks", post(register_webhook))
        .route("/webhooks/triggers", get(list_triggers))
        .route("/webhooks/{id}", put(update_webhook).delete(delete_webhook))
        .route("/webhooks/{id}/executions", get(list_deliveries))
        .route("/workflows/{id}/webhooks", get(list_workflow_webhooks))
}

// ---------------------------------------------------------------------------
// Receiver
// ---------------------------------------------------------------------------

/// POST /webhooks/{provider}?id={webhook_id}
///
/// No API key: the request is authenticated by its provider signature.
/// Responds `{received: true, execution_id}` once the run is launched.
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<WebhookDeliveryQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let raw_id = query
        .id
        .ok_or_else(|| AppError::Validation("missing 'id' query parameter".to_string()))?;
    let webhook_id: Uuid = raw_id
        .parse()
        .map_err(|_| AppError::NotFound(format!("Webhook {raw_id} not found")))?;

    let headers = lowercase_headers(&headers);
    let delivery = state
        .trigger_manager
        .process_webhook_payload(webhook_id, &provider, &body, &headers)
        .await?;

    Ok(Json(json!({
        "received": true,
        "execution_id": delivery.execution_id,
    })))
}

fn lowercase_headers(headers: &HeaderMap) -> WebhookHeaders {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Management
// ---------------------------------------------------------------------------

/// GET /api/v1/webhooks/triggers
pub async fn list_triggers(_auth: Authenticated) -> Json<ApiResponse<&'static [SupportedTrigger]>> {
    Json(ApiResponse::success(supported_triggers(), Instant::now()))
}

/// POST /api/v1/webhooks
pub async fn register_webhook(
    State(state): State<AppState>,
    _auth: Authenticated,
    Json(body): Json<RegisterWebhook>,
) -> Result<Json<ApiResponse<RegisteredWebhook>>, AppError> {
    let start = Instant::now();

    load_workflow(&state, &body.workflow_id).await?;
    let id = state.trigger_manager.register_webhook(body).await?;
    let webhook = state
        .trigger_manager
        .get_webhook(&id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("webhook {id} vanished after registration")))?;

    let secret = webhook.secret.clone();
    Ok(Json(
        ApiResponse::success(RegisteredWebhook { webhook, secret }, start)
            .with_link("executions", format!("/api/v1/webhooks/{id}/executions")),
    ))
}

/// GET /api/v1/workflows/{id}/webhooks
pub async fn list_workflow_webhooks(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<WebhookConfig>>>, AppError> {
    let start = Instant::now();
    let webhooks = state.trigger_manager.list_webhooks(&id).await?;
    Ok(Json(ApiResponse::success(webhooks, start)))
}

/// PUT /api/v1/webhooks/{id}
///
/// Body `{status?: "active" | "disabled", config?: {...}}`.
pub async fn update_webhook(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateWebhook>,
) -> Result<Json<ApiResponse<WebhookConfig>>, AppError> {
    let start = Instant::now();
    let webhook = state.trigger_manager.update_webhook(&id, body).await?;
    Ok(Json(
        ApiResponse::success(webhook, start).with_link("executions", format!("/api/v1/webhooks/{id}/executions")),
    ))
}

/// DELETE /api/v1/webhooks/{id}
pub async fn delete_webhook(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let start = Instant::now();

    if state.trigger_manager.get_webhook(&id).await?.is_none() {
        return Err(AppError::NotFound(format!("Webhook {id} not found")));
    }
    state.trigger_manager.unregister_webhook(&id).await;

    Ok(Json(ApiResponse::success(json!({ "deleted": true, "id": id }), start)))
}

/// GET /api/v1/webhooks/{id}/executions
pub async fn list_deliveries(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<Uuid>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ApiResponse<Vec<WebhookExecution>>>, AppError> {
    let start = Instant::now();
    let deliveries = state.trigger_manager.list_executions(&id, query.clamped()).await?;
    Ok(Json(ApiResponse::success(deliveries, start)))
}
