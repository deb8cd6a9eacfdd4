//! Request extractors: API key authentication and query parameters.

pub mod auth;
pub mod query;
