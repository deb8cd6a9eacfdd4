//! Webhook triggers: which provider events may start a workflow, how their
//! signatures are checked, and how their payloads are normalized.

pub mod catalog;
pub mod manager;
pub mod signature;
pub mod transform;
