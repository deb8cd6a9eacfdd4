//! Repository trait definitions (ports).
//!
//! These traits define the storage interface that the infrastructure layer
//! (chainflow-infra) implements. The core crate never depends on any
//! specific storage technology.

pub mod execution;
pub mod testing;
pub mod variable;
pub mod webhook;
pub mod workflow;
