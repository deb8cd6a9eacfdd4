//! Execution context: the mutable state owned by one workflow run.
//!
//! Holds the trigger payload, run variables, per-node results and states,
//! and the step trace. Serializes to JSON so a paused run can be
//! checkpointed and restored.

use std::collections::HashMap;

use chainflow_types::execution::{ExecutionRequest, TestModeConfig, TriggerDataMode};
use chainflow_types::node::{NodeResult, NodeState, Route, StepRecord};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum size of a single stored node result (1 MB).
pub const MAX_RESULT_SIZE: usize = 1_048_576;

// ---------------------------------------------------------------------------
// ExecutionContext
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub workflow_id: Uuid,
    pub execution_id: Uuid,
    pub user_id: String,
    /// Effective trigger payload (the mock payload in mock test mode).
    pub trigger_data: Value,
    /// Current input document: trigger data at top level, `flowData` inside a chain.
    pub data: Value,
    pub variables: Map<String, Value>,
    /// Node ID -> serialized `NodeResult`.
    pub results: Map<String, Value>,
    /// Node IDs in completion order.
    pub execution_path: Vec<String>,
    pub node_states: HashMap<String, NodeState>,
    pub steps: Vec<StepRecord>,
    pub test_mode: bool,
    #[serde(default)]
    pub test_mode_config: TestModeConfig,
}

impl ExecutionContext {
    /// Build the context for a fresh run.
    pub fn for_request(request: &ExecutionRequest, execution_id: Uuid) -> Self {
        let test_mode_config = request.test_mode_config.clone().unwrap_or_default();
        let trigger_data = match (&test_mode_config.trigger_mode, &test_mode_config.mock_trigger_data) {
            (TriggerDataMode::Mock, Some(mock)) if request.test_mode => mock.clone(),
            _ => request.trigger_data.clone(),
        };

        Self {
            workflow_id: request.workflow_id,
            execution_id,
            user_id: request.user_id.clone(),
            data: trigger_data.clone(),
            trigger_data,
            variables: Map::new(),
            results: Map::new(),
            execution_path: Vec::new(),
            node_states: HashMap::new(),
            steps: Vec::new(),
            test_mode: request.test_mode,
            test_mode_config,
        }
    }

    /// Copy for a chain run: same identity, variables, and upstream results,
    /// but a fresh walk state and `data` replaced by the chain input.
    pub fn fork(&self, data: Value) -> Self {
        Self {
            workflow_id: self.workflow_id,
            execution_id: self.execution_id,
            user_id: self.user_id.clone(),
            trigger_data: self.trigger_data.clone(),
            data,
            variables: self.variables.clone(),
            results: self.results.clone(),
            execution_path: Vec::new(),
            node_states: HashMap::new(),
            steps: Vec::new(),
            test_mode: self.test_mode,
            test_mode_config: self.test_mode_config.clone(),
        }
    }

    /// Fold a finished fork back in: the fork's results for `node_ids` and
    /// its whole step trace. Variables set inside the fork stay local.
    pub fn absorb<'a>(&mut self, mut child: ExecutionContext, node_ids: impl IntoIterator<Item = &'a str>) {
        for id in node_ids {
            if let Some(result) = child.results.remove(id) {
                self.results.insert(id.to_string(), result);
            }
        }
        self.steps.append(&mut child.steps);
    }

    /// The JSON document JEXL expressions evaluate against.
    pub fn expression_context(&self) -> Value {
        json!({
            "data": self.data,
            "variables": self.variables,
            "trigger": self.trigger_data,
            "results": self.results,
        })
    }

    // -----------------------------------------------------------------------
    // Node bookkeeping
    // -----------------------------------------------------------------------

    /// Store a node result, replacing oversized results with a marker.
    pub fn set_result(&mut self, node_id: &str, result: &NodeResult) {
        let value = result.to_value();
        let size = serde_json::to_string(&value).map(|s| s.len()).unwrap_or(0);
        if size > MAX_RESULT_SIZE {
            tracing::warn!(node_id, size, max = MAX_RESULT_SIZE, "node result exceeds size limit, truncating");
            let truncated = json!({
                "type": result.node_type,
                "success": result.success,
                "_truncated": true,
                "_original_size": size,
            });
            self.results.insert(node_id.to_string(), truncated);
        } else {
            self.results.insert(node_id.to_string(), value);
        }
    }

    pub fn record_completed(&mut self, node_id: &str, result: &NodeResult, route: Route, step: StepRecord) {
        self.set_result(node_id, result);
        self.node_states
            .insert(node_id.to_string(), NodeState::Completed { route });
        self.execution_path.push(node_id.to_string());
        self.steps.push(step);
    }

    pub fn record_failed(&mut self, node_id: &str, result: &NodeResult, handled: bool, step: StepRecord) {
        self.set_result(node_id, result);
        self.node_states
            .insert(node_id.to_string(), NodeState::Failed { handled });
        self.steps.push(step);
    }

    pub fn record_skipped(&mut self, node_id: &str, node_type: &str, chain_id: Option<&str>) {
        self.node_states.insert(node_id.to_string(), NodeState::Skipped);
        let mut step = StepRecord::skipped(node_id, node_type);
        step.chain_id = chain_id.map(str::to_string);
        self.steps.push(step);
    }

    /// Forget walk state for `node_ids` so a sub-walk can run them again.
    pub fn reset_nodes<'a>(&mut self, node_ids: impl IntoIterator<Item = &'a String>) {
        for id in node_ids {
            self.node_states.remove(id);
        }
    }

    /// `output` of the most recently completed node, or null.
    pub fn last_output(&self) -> Value {
        self.execution_path
            .last()
            .and_then(|id| self.results.get(id))
            .and_then(|result| result.get("output"))
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Results of the given nodes, keyed by node ID.
    pub fn results_for<'a>(&self, node_ids: impl IntoIterator<Item = &'a String>) -> Value {
        let mut map = Map::new();
        for id in node_ids {
            if let Some(result) = self.results.get(id) {
                map.insert(id.clone(), result.clone());
            }
        }
        Value::Object(map)
    }

    // -----------------------------------------------------------------------
    // Checkpointing
    // -----------------------------------------------------------------------

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(json!({}))
    }

    pub fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}
