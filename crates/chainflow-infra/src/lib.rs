//! Infrastructure layer for chainflow.
//!
//! Implements the ports defined in `chainflow-core`: SQLite stores for
//! workflows, executions, variables, webhooks and test suites, the Anthropic
//! text generator, the HTTP webhook subscriber, the built-in `http_request`
//! action, and config file loading.

pub mod actions;
pub mod config;
pub mod llm;
pub mod sqlite;
pub mod webhook;
