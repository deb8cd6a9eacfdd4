//! Node execution results and the per-run execution trace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// NodeResult
// ---------------------------------------------------------------------------

/// Uniform result returned by every node handler.
///
/// Serializes as `{ type, success, output?, error?, message? }`. When `output`
/// is a JSON object its keys are additionally flattened onto the top level, so
/// a filter result reads `{type, success, output: {passed, data}, passed, data}`
/// and both `{{node.output.passed}}` and `{{node.passed}}` resolve.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeResult {
    pub node_type: String,
    pub success: bool,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub message: Option<String>,
}

/// Keys the flattened output may never overwrite.
const RESERVED_KEYS: [&str; 5] = ["type", "success", "output", "error", "message"];

impl NodeResult {
    pub fn success(node_type: impl Into<String>, output: Value) -> Self {
        Self {
            node_type: node_type.into(),
            success: true,
            output: Some(output),
            error: None,
            message: None,
        }
    }

    pub fn failure(node_type: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            success: false,
            output: None,
            error: Some(error.into()),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_output(mut self, output: Value) -> Self {
        self.output = Some(output);
        self
    }

    /// The flattened JSON form stored in the execution context.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("type".to_string(), Value::String(self.node_type.clone()));
        map.insert("success".to_string(), Value::Bool(self.success));

        if let Some(output) = &self.output {
            if let Value::Object(fields) = output {
                for (key, value) in fields {
                    if !RESERVED_KEYS.contains(&key.as_str()) {
                        map.insert(key.clone(), value.clone());
                    }
                }
            }
            map.insert("output".to_string(), output.clone());
        }
        if let Some(error) = &self.error {
            map.insert("error".to_string(), Value::String(error.clone()));
        }
        if let Some(message) = &self.message {
            map.insert("message".to_string(), Value::String(message.clone()));
        }

        Value::Object(map)
    }
}

impl Serialize for NodeResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

// ---------------------------------------------------------------------------
// Routing state
// ---------------------------------------------------------------------------

/// Which outgoing edges a completed node activates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "handle", rename_all = "snake_case")]
pub enum Route {
    /// Every edge except the `catch`/`error` handles.
    All,
    /// Only edges whose `source_handle` matches (unlabeled edges stay active).
    Handle(String),
    /// No outgoing edge is active (e.g. a filter that did not pass).
    Blocked,
}

/// Walk state of a node within one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum NodeState {
    Completed { route: Route },
    /// `handled` is true when the failure was routed to `error` edges.
    Failed { handled: bool },
    Skipped,
}

// ---------------------------------------------------------------------------
// Execution trace
// ---------------------------------------------------------------------------

/// Status of one entry in the execution trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Failed,
    Skipped,
    Paused,
}

/// One entry in a run's execution trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub node_id: String,
    pub node_type: String,
    pub status: StepStatus,
    /// 1-based; increments when a `retry` node re-runs its branch.
    pub attempt: u32,
    /// Set when the node ran inside an AI agent chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl StepRecord {
    /// A zero-duration `skipped` entry.
    pub fn skipped(node_id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            node_type: node_type.into(),
            status: StepStatus::Skipped,
            attempt: 1,
            chain_id: None,
            output: None,
            error: None,
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }
}
