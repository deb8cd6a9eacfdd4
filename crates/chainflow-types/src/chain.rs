//! AI agent chain types: chain definitions, routing decisions, and the
//! aggregated results of running the selected chains.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::node::StepRecord;
use crate::workflow::WorkflowGraph;

// ---------------------------------------------------------------------------
// Chain definition
// ---------------------------------------------------------------------------

/// A named, self-contained sub-graph an AI agent node can choose to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub graph: WorkflowGraph,
    /// Declarative gate; every condition must match for the chain to be a candidate.
    #[serde(default)]
    pub conditions: Vec<ChainCondition>,
}

/// Operators available to chain conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    Contains,
    Matches,
    Exists,
}

/// A `field operator value` triple evaluated against the agent's input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainCondition {
    /// Dotted path into the input document.
    pub field: String,
    pub operator: ConditionOperator,
    #[serde(default)]
    pub value: Value,
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Progress of one AI agent routing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionState {
    Analyzing,
    Selected,
    Executing,
    Summarized,
}

impl DecisionState {
    /// Legal forward moves. `Selected -> Summarized` covers an empty selection.
    pub fn can_transition_to(self, next: DecisionState) -> bool {
        matches!(
            (self, next),
            (DecisionState::Analyzing, DecisionState::Selected)
                | (DecisionState::Selected, DecisionState::Executing)
                | (DecisionState::Selected, DecisionState::Summarized)
                | (DecisionState::Executing, DecisionState::Summarized)
        )
    }
}

impl std::fmt::Display for DecisionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecisionState::Analyzing => write!(f, "analyzing"),
            DecisionState::Selected => write!(f, "selected"),
            DecisionState::Executing => write!(f, "executing"),
            DecisionState::Summarized => write!(f, "summarized"),
        }
    }
}

/// A chain chosen to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedChain {
    pub chain_id: String,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub priority: u32,
    #[serde(default)]
    pub confidence: f64,
    /// Extra keys merged into the chain's input before it runs.
    #[serde(default)]
    pub input_mapping: Map<String, Value>,
}

/// A candidate that was not chosen, kept for observability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnselectedChain {
    pub chain_id: String,
    #[serde(default)]
    pub reasoning: String,
}

fn default_max_concurrency() -> usize {
    3
}

/// How the selected chains are run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    #[serde(default)]
    pub parallel: bool,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default)]
    pub continue_on_error: bool,
}

impl Default for ExecutionPlan {
    fn default() -> Self {
        Self {
            parallel: false,
            max_concurrency: default_max_concurrency(),
            continue_on_error: false,
        }
    }
}

/// Output of the chain decision maker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSelectionResult {
    #[serde(default)]
    pub selected_chains: Vec<SelectedChain>,
    #[serde(default)]
    pub unselected_chains: Vec<UnselectedChain>,
    #[serde(default)]
    pub execution_plan: ExecutionPlan,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

// ---------------------------------------------------------------------------
// Execution results
// ---------------------------------------------------------------------------

/// Outcome of running one chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainResult {
    pub chain_id: String,
    pub chain_name: String,
    pub success: bool,
    /// `output` of the chain's last completed node.
    pub output: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub steps: Vec<StepRecord>,
    pub duration_ms: u64,
}

/// A chain failure recorded in the aggregate result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainError {
    pub chain_id: String,
    pub error: String,
}

/// Aggregate of every chain run by one AI agent node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainExecutionResult {
    pub chains: Vec<ChainResult>,
    pub errors: Vec<ChainError>,
    /// Accumulated sequential data; equals the input in parallel mode.
    pub flow_data: Value,
}
