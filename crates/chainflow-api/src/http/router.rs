//! Axum router configuration with middleware.
//!
//! Management routes live under `/api/v1/` behind an API key. Provider
//! deliveries arrive at `/webhooks/{provider}?id=` and authenticate by
//! signature instead.

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .merge(handlers::workflow::workflow_routes())
        .merge(handlers::execution::execution_routes())
        .merge(handlers::webhook::webhook_routes())
        .merge(handlers::testing::testing_routes())
        .merge(handlers::analytics::analytics_routes());

    Router::new()
        .nest("/api/v1", api_routes)
        .merge(handlers::webhook::receiver_routes())
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
