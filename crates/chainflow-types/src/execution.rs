//! Workflow run types: requests, persisted execution records, and the
//! summary returned to API callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::node::StepRecord;
use crate::workflow::WorkflowGraph;

// ---------------------------------------------------------------------------
// Test mode
// ---------------------------------------------------------------------------

/// Where trigger nodes take their data from in test mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerDataMode {
    #[default]
    Mock,
    Live,
}

/// Test-mode knobs carried by an execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestModeConfig {
    #[serde(default)]
    pub trigger_mode: TriggerDataMode,
    /// Replaces the trigger payload when `trigger_mode` is `mock`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mock_trigger_data: Option<Value>,
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Everything the engine needs to start one run.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub workflow_id: Uuid,
    pub user_id: String,
    pub graph: WorkflowGraph,
    pub trigger_data: Value,
    /// Caller-supplied ID; a fresh UUIDv7 is generated when absent.
    pub execution_id: Option<Uuid>,
    /// What started the run (`manual`, `webhook`, `test`, ...).
    pub source: String,
    pub test_mode: bool,
    pub test_mode_config: Option<TestModeConfig>,
}

impl ExecutionRequest {
    pub fn new(workflow_id: Uuid, graph: WorkflowGraph, trigger_data: Value) -> Self {
        Self {
            workflow_id,
            user_id: String::new(),
            graph,
            trigger_data,
            execution_id: None,
            source: "manual".to_string(),
            test_mode: false,
            test_mode_config: None,
        }
    }

    pub fn in_test_mode(mut self, config: Option<TestModeConfig>) -> Self {
        self.test_mode = true;
        self.test_mode_config = config;
        self
    }
}

// ---------------------------------------------------------------------------
// Persisted record
// ---------------------------------------------------------------------------

/// Overall status of a workflow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
    Paused,
    Cancelled,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStatus::Running => write!(f, "running"),
            ExecutionStatus::Completed => write!(f, "completed"),
            ExecutionStatus::Failed => write!(f, "failed"),
            ExecutionStatus::Paused => write!(f, "paused"),
            ExecutionStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(ExecutionStatus::Running),
            "completed" => Ok(ExecutionStatus::Completed),
            "failed" => Ok(ExecutionStatus::Failed),
            "paused" => Ok(ExecutionStatus::Paused),
            "cancelled" => Ok(ExecutionStatus::Cancelled),
            other => Err(format!("invalid execution status: '{other}'")),
        }
    }
}

/// Durable pause state for a human-in-the-loop node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PauseState {
    pub node_id: String,
    /// Must be presented on resume.
    pub token: Uuid,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    pub requested_at: DateTime<Utc>,
}

/// A persisted workflow execution (history row and pause checkpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub user_id: String,
    pub source: String,
    pub status: ExecutionStatus,
    pub trigger_data: Value,
    pub test_mode: bool,
    /// Serialized execution context; kept so a paused run can resume.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(default)]
    pub steps: Vec<StepRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause: Option<PauseState>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// What `execute` returns. Partial `steps` are always present, even on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub execution_id: Uuid,
    pub workflow_id: Uuid,
    pub success: bool,
    pub status: ExecutionStatus,
    pub steps: Vec<StepRecord>,
    /// Node ID -> result, for every node that produced one.
    pub output: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_token: Option<Uuid>,
}
