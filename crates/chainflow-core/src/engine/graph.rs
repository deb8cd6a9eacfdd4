//! Graph validation, ordering, and edge routing.
//!
//! Uses `petgraph` to model the workflow as a directed graph. Topological
//! sort detects cycles; routing decides which edges a finished node
//! activates based on its `NodeState`.

use std::collections::{HashMap, HashSet, VecDeque};

use chainflow_types::node::{NodeState, Route};
use chainflow_types::workflow::{Edge, Node, WorkflowGraph};
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;

use super::error::EngineError;

/// Handle on `try_catch` edges that lead to the catch branch.
pub const CATCH_HANDLE: &str = "catch";

/// Handle on edges followed when their source node fails.
pub const ERROR_HANDLE: &str = "error";

/// Validate the graph and return node IDs in a topological order.
///
/// Fails with `MalformedGraph` on duplicate node IDs, edges that reference
/// missing nodes, or cycles.
pub fn execution_order(graph: &WorkflowGraph) -> Result<Vec<String>, EngineError> {
    let mut dag = DiGraph::<&str, ()>::new();
    let mut index = HashMap::new();

    for node in &graph.nodes {
        if index.contains_key(node.id.as_str()) {
            return Err(EngineError::MalformedGraph(format!(
                "duplicate node id '{}'",
                node.id
            )));
        }
        index.insert(node.id.as_str(), dag.add_node(node.id.as_str()));
    }

    for edge in &graph.edges {
        let from = index.get(edge.source.as_str()).ok_or_else(|| {
            EngineError::MalformedGraph(format!(
                "edge '{}' references unknown source '{}'",
                edge.id, edge.source
            ))
        })?;
        let to = index.get(edge.target.as_str()).ok_or_else(|| {
            EngineError::MalformedGraph(format!(
                "edge '{}' references unknown target '{}'",
                edge.id, edge.target
            ))
        })?;
        dag.add_edge(*from, *to, ());
    }

    let sorted = toposort(&dag, None).map_err(|cycle| {
        EngineError::MalformedGraph(format!(
            "cycle detected involving node '{}'",
            dag[cycle.node_id()]
        ))
    })?;

    Ok(sorted.into_iter().map(|idx| dag[idx].to_string()).collect())
}

/// Triggers and nodes without incoming edges always run.
pub fn is_root(graph: &WorkflowGraph, node: &Node) -> bool {
    node.is_trigger || graph.incoming(&node.id).next().is_none()
}

/// Whether `edge` carries control given the state of its source node.
pub fn edge_active(edge: &Edge, states: &HashMap<String, NodeState>) -> bool {
    let handle = edge.source_handle.as_deref();
    match states.get(&edge.source) {
        Some(NodeState::Completed { route }) => match route {
            Route::All => !matches!(handle, Some(CATCH_HANDLE) | Some(ERROR_HANDLE)),
            Route::Handle(expected) => handle.is_none() || handle == Some(expected.as_str()),
            Route::Blocked => false,
        },
        Some(NodeState::Failed { handled: true }) => handle == Some(ERROR_HANDLE),
        _ => false,
    }
}

/// A node runs when it is a root or any incoming edge is active.
pub fn should_run(graph: &WorkflowGraph, node: &Node, states: &HashMap<String, NodeState>) -> bool {
    is_root(graph, node) || graph.incoming(&node.id).any(|edge| edge_active(edge, states))
}

pub fn has_error_edges(graph: &WorkflowGraph, node_id: &str) -> bool {
    graph
        .outgoing(node_id)
        .any(|edge| edge.source_handle.as_deref() == Some(ERROR_HANDLE))
}

/// Targets of the node's outgoing edges.
pub fn direct_successors(graph: &WorkflowGraph, node_id: &str) -> HashSet<String> {
    graph.outgoing(node_id).map(|edge| edge.target.clone()).collect()
}

/// Every node reachable from `node_id` whose first hop passes `first_hop`.
pub fn descendants(
    graph: &WorkflowGraph,
    node_id: &str,
    first_hop: impl Fn(&Edge) -> bool,
) -> HashSet<String> {
    let mut seen = HashSet::new();
    let mut queue: VecDeque<String> = graph
        .outgoing(node_id)
        .filter(|edge| first_hop(edge))
        .map(|edge| edge.target.clone())
        .collect();

    while let Some(id) = queue.pop_front() {
        if id == node_id || !seen.insert(id.clone()) {
            continue;
        }
        for edge in graph.outgoing(&id) {
            queue.push_back(edge.target.clone());
        }
    }
    seen
}
