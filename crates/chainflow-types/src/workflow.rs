//! Workflow domain types for chainflow.
//!
//! A workflow is a stored graph of nodes and edges. The graph is the unit the
//! engine walks; the surrounding `Workflow` record carries ownership and
//! lifecycle status for the persistence layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// Immutable-per-run view of a workflow: nodes plus the edges between them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowGraph {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl WorkflowGraph {
    /// Look up a node by ID.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Edges leaving `node_id`, in declaration order.
    pub fn outgoing<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == node_id)
    }

    /// Edges entering `node_id`, in declaration order.
    pub fn incoming<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.target == node_id)
    }
}

/// One step in a workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique within the graph.
    pub id: String,
    /// Discriminates the handler (e.g. `filter`, `ai_agent`, `slack_action_send_message`).
    #[serde(rename = "type")]
    pub node_type: String,
    /// Arbitrary configuration; string values may contain `{{...}}` references.
    #[serde(default)]
    pub config: Map<String, Value>,
    /// Entry node of the workflow.
    #[serde(default, alias = "is_trigger")]
    pub is_trigger: bool,
}

impl Node {
    /// Convenience constructor used by tests and programmatic graph builders.
    pub fn new(id: impl Into<String>, node_type: impl Into<String>, config: Value) -> Self {
        let config = match config {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            id: id.into(),
            node_type: node_type.into(),
            config,
            is_trigger: false,
        }
    }

    /// Mark this node as the workflow trigger.
    pub fn trigger(mut self) -> Self {
        self.is_trigger = true;
        self
    }
}

/// A directed connection between two nodes.
///
/// `source_handle` selects which output of a branching node the edge hangs
/// off (`"true"`/`"false"` for conditions, a case label for switches,
/// `"catch"` for try/catch, `"error"` for failure routing).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    #[serde(default)]
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "source_handle")]
    pub source_handle: Option<String>,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: format!("{source}->{target}"),
            source,
            target,
            source_handle: None,
        }
    }

    /// Attach the edge to a named output handle of its source.
    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.source_handle = Some(handle.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Stored workflow
// ---------------------------------------------------------------------------

/// Lifecycle status of a stored workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Draft,
    Active,
    Paused,
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowStatus::Draft => write!(f, "draft"),
            WorkflowStatus::Active => write!(f, "active"),
            WorkflowStatus::Paused => write!(f, "paused"),
        }
    }
}

impl std::str::FromStr for WorkflowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(WorkflowStatus::Draft),
            "active" => Ok(WorkflowStatus::Active),
            "paused" => Ok(WorkflowStatus::Paused),
            other => Err(format!("invalid workflow status: '{other}'")),
        }
    }
}

/// A persisted workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    /// UUIDv7 assigned on creation.
    pub id: Uuid,
    /// Owning user.
    pub user_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: WorkflowStatus,
    pub graph: WorkflowGraph,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_graph_deserializes_builder_shape() {
        let raw = json!({
            "nodes": [
                { "id": "trigger", "type": "webhook", "isTrigger": true },
                { "id": "check", "type": "if_condition", "config": { "condition": "data.amount > 10" } }
            ],
            "edges": [
                { "id": "e1", "source": "trigger", "target": "check" },
                { "id": "e2", "source": "check", "target": "notify", "sourceHandle": "true" }
            ]
        });

        let graph: WorkflowGraph = serde_json::from_value(raw).unwrap();
        assert_eq!(graph.nodes.len(), 2);
        assert!(graph.nodes[0].is_trigger);
        assert!(!graph.nodes[1].is_trigger);
        assert_eq!(graph.nodes[1].config["condition"], json!("data.amount > 10"));
        assert_eq!(graph.edges[1].source_handle.as_deref(), Some("true"));
    }

    #[test]
    fn test_outgoing_and_incoming() {
        let graph = WorkflowGraph {
            nodes: vec![
                Node::new("a", "webhook", json!({})).trigger(),
                Node::new("b", "template", json!({})),
                Node::new("c", "template", json!({})),
            ],
            edges: vec![Edge::new("a", "b"), Edge::new("a", "c"), Edge::new("b", "c")],
        };

        assert_eq!(graph.outgoing("a").count(), 2);
        assert_eq!(graph.incoming("c").count(), 2);
        assert!(graph.node("b").is_some());
        assert!(graph.node("zzz").is_none());
    }

    #[test]
    fn test_edge_serialization_skips_missing_handle() {
        let edge = Edge::new("a", "b");
        let json = serde_json::to_value(&edge).unwrap();
        assert!(json.get("sourceHandle").is_none());

        let edge = Edge::new("a", "b").with_handle("catch");
        let json = serde_json::to_value(&edge).unwrap();
        assert_eq!(json["sourceHandle"], "catch");
    }

    #[test]
    fn test_workflow_status_roundtrip() {
        for status in [WorkflowStatus::Draft, WorkflowStatus::Active, WorkflowStatus::Paused] {
            let s = status.to_string();
            assert_eq!(s.parse::<WorkflowStatus>().unwrap(), status);
        }
        assert!("archived".parse::<WorkflowStatus>().is_err());
    }
}
