//! Shared domain types for chainflow.
//!
//! This crate contains the types used across the workflow engine: graphs,
//! node results, executions, AI agent chains, webhooks, test suites,
//! configuration, and the list and analytics shapes the API returns.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod analytics;
pub mod chain;
pub mod config;
pub mod error;
pub mod execution;
pub mod llm;
pub mod node;
pub mod page;
pub mod testing;
pub mod webhook;
pub mod workflow;
