//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use chainflow_core::engine::error::EngineError;
use chainflow_core::testing::runner::TestRunError;
use chainflow_core::webhook::manager::WebhookError;
use chainflow_types::error::RepositoryError;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    Engine(EngineError),
    Webhook(WebhookError),
    TestRun(TestRunError),
    Repository(RepositoryError),
    /// A requested resource does not exist.
    NotFound(String),
    /// Authentication failure.
    Unauthorized(String),
    /// Validation error.
    Validation(String),
    /// Generic internal error.
    Internal(String),
}

impl From<EngineError> for AppError {
    fn from(e: EngineError) -> Self {
        AppError::Engine(e)
    }
}

impl From<WebhookError> for AppError {
    fn from(e: WebhookError) -> Self {
        AppError::Webhook(e)
    }
}

impl From<TestRunError> for AppError {
    fn from(e: TestRunError) -> Self {
        AppError::TestRun(e)
    }
}

impl From<RepositoryError> for AppError {
    fn from(e: RepositoryError) -> Self {
        AppError::Repository(e)
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Engine(EngineError::RunNotFound(id)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", format!("Execution {id} not found"))
            }
            AppError::Engine(e @ EngineError::NotPaused(_)) => (StatusCode::CONFLICT, "NOT_PAUSED", e.to_string()),
            AppError::Engine(e @ EngineError::InvalidPauseToken(_)) => {
                (StatusCode::FORBIDDEN, "INVALID_PAUSE_TOKEN", e.to_string())
            }
            AppError::Engine(e) => (StatusCode::INTERNAL_SERVER_ERROR, "ENGINE_ERROR", e.to_string()),
            AppError::Webhook(WebhookError::NotFound(id)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", format!("Webhook {id} not found"))
            }
            AppError::Webhook(e @ WebhookError::InvalidSignature(_)) => {
                (StatusCode::UNAUTHORIZED, "INVALID_SIGNATURE", e.to_string())
            }
            AppError::Webhook(e @ WebhookError::UnsupportedTrigger { .. }) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string())
            }
            AppError::Webhook(e @ WebhookError::InvalidUpdate(_)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string())
            }
            AppError::Webhook(e @ WebhookError::Registration(_)) => {
                (StatusCode::BAD_GATEWAY, "REGISTRATION_FAILED", e.to_string())
            }
            AppError::Webhook(e) => (StatusCode::INTERNAL_SERVER_ERROR, "WEBHOOK_ERROR", e.to_string()),
            AppError::TestRun(TestRunError::SuiteNotFound(id)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", format!("Test suite {id} not found"))
            }
            AppError::TestRun(e) => (StatusCode::INTERNAL_SERVER_ERROR, "TEST_RUN_ERROR", e.to_string()),
            AppError::Repository(RepositoryError::NotFound) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", "Resource not found".to_string())
            }
            AppError::Repository(RepositoryError::Conflict(msg)) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::Repository(e) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR", e.to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        if status.is_server_error() {
            tracing::error!(code, error = %message, "request failed");
        }

        let body = json!({
            "data": null,
            "meta": {
                "request_id": uuid::Uuid::now_v7().to_string(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "response_time_ms": 0
            },
            "errors": [{
                "code": code,
                "message": message,
            }]
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}
