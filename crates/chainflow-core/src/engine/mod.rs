//! Workflow engine: graph walk, node dispatch, and the run lifecycle.

pub mod context;
pub mod control;
pub mod error;
pub mod executor;
pub mod expression;
pub mod graph;
pub mod registry;
pub mod resolver;

#[cfg(test)]
mod tests;
