//! HTTP request handlers for the REST API, one sub-router per resource.

pub mod analytics;
pub mod execution;
pub mod testing;
pub mod webhook;
pub mod workflow;
