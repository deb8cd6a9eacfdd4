//! HTTP/REST API layer for chainflow.
//!
//! Axum-based REST API at `/api/v1/` with API key authentication and an
//! envelope response format, plus the public webhook receiver at
//! `/webhooks/{provider}`.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod router;
