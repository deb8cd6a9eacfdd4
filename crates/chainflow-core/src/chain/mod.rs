//! AI agent chains: condition pre-filtering, model-driven routing, and
//! batched execution of the selected chains.

pub mod ai_field;
pub mod conditions;
pub mod decision;
pub mod executor;
