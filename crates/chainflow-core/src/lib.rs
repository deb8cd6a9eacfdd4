//! Workflow engine and repository trait definitions for chainflow.
//!
//! This crate defines the "ports" (repository traits, the text generator,
//! webhook collaborators) that the infrastructure layer implements. It
//! depends only on `chainflow-types` -- never on `chainflow-infra` or any
//! database/IO crate.

pub mod analytics;
pub mod chain;
pub mod engine;
pub mod handlers;
pub mod llm;
pub mod repository;
pub mod testing;
pub mod webhook;
