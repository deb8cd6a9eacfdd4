//! End-to-end runs through `WorkflowEngine` with in-memory ports.

use std::sync::Arc;
use std::time::Duration;

use chainflow_types::config::EngineConfig;
use chainflow_types::execution::{ExecutionRequest, ExecutionStatus};
use chainflow_types::node::StepStatus;
use chainflow_types::workflow::{Edge, Node, WorkflowGraph};
use serde_json::{Value, json};
use uuid::Uuid;

use super::error::EngineError;
use super::executor::WorkflowEngine;
use super::registry::HandlerRegistry;
use crate::repository::variable::VariableStore;
use crate::testing::memory::{
    ConcurrencyGauge, EchoAction, FlakyAction, MemoryExecutionStore, MemoryVariableStore, ScriptedGenerator,
};

type Engine = WorkflowEngine<MemoryVariableStore, MemoryExecutionStore, ScriptedGenerator>;

struct Harness {
    engine: Arc<Engine>,
    variables: Arc<MemoryVariableStore>,
    executions: Arc<MemoryExecutionStore>,
}

fn harness_with(registry: HandlerRegistry, config: EngineConfig) -> Harness {
    let variables = Arc::new(MemoryVariableStore::default());
    let executions = Arc::new(MemoryExecutionStore::default());
    let engine = Arc::new(WorkflowEngine::new(
        variables.clone(),
        executions.clone(),
        Arc::new(ScriptedGenerator::failing()),
        registry,
        config,
    ));
    Harness {
        engine,
        variables,
        executions,
    }
}

fn harness() -> Harness {
    let mut registry = HandlerRegistry::new();
    registry.register(EchoAction);
    harness_with(registry, EngineConfig::default())
}

fn trigger() -> Node {
    Node::new("t", "manual_trigger", json!({})).trigger()
}

fn graph(nodes: Vec<Node>, edges: Vec<Edge>) -> WorkflowGraph {
    WorkflowGraph { nodes, edges }
}

fn request(graph: WorkflowGraph, data: Value) -> ExecutionRequest {
    ExecutionRequest::new(Uuid::now_v7(), graph, data)
}

fn step_status(steps: &[chainflow_types::node::StepRecord], node_id: &str) -> Option<StepStatus> {
    steps.iter().rev().find(|s| s.node_id == node_id).map(|s| s.status)
}

// ---------------------------------------------------------------------------
// Filters and branching
// ---------------------------------------------------------------------------

fn filter_graph() -> WorkflowGraph {
    graph(
        vec![
            trigger(),
            Node::new("check", "filter", json!({ "condition": "data.amount > 100" })),
            Node::new("notify", "echo", json!({ "text": "big order {{data.amount}}" })),
        ],
        vec![Edge::new("t", "check"), Edge::new("check", "notify")],
    )
}

#[tokio::test]
async fn test_filter_pass_runs_downstream() {
    let h = harness();
    let summary = h.engine.execute(request(filter_graph(), json!({ "amount": 150 }))).await.unwrap();

    assert!(summary.success);
    assert_eq!(summary.status, ExecutionStatus::Completed);
    assert_eq!(summary.output["check"]["passed"], true);
    assert_eq!(summary.output["check"]["data"], json!({ "amount": 150 }));
    assert_eq!(summary.output["notify"]["text"], "big order 150");

    let stored = h.executions.snapshot(&summary.execution_id).unwrap();
    assert_eq!(stored.status, ExecutionStatus::Completed);
    assert!(stored.completed_at.is_some());
}

#[tokio::test]
async fn test_filter_block_skips_downstream() {
    let h = harness();
    let summary = h.engine.execute(request(filter_graph(), json!({ "amount": 50 }))).await.unwrap();

    assert_eq!(summary.status, ExecutionStatus::Completed);
    assert_eq!(summary.output["check"]["passed"], false);
    assert!(summary.output.get("notify").is_none());
    assert_eq!(step_status(&summary.steps, "notify"), Some(StepStatus::Skipped));
}

#[tokio::test]
async fn test_if_condition_follows_matching_branch() {
    let h = harness();
    let g = graph(
        vec![
            trigger(),
            Node::new("route", "if_condition", json!({ "condition": "data.priority == 'high'" })),
            Node::new("urgent", "echo", json!({ "lane": "urgent" })),
            Node::new("normal", "echo", json!({ "lane": "normal" })),
        ],
        vec![
            Edge::new("t", "route"),
            Edge::new("route", "urgent").with_handle("true"),
            Edge::new("route", "normal").with_handle("false"),
        ],
    );

    let summary = h.engine.execute(request(g, json!({ "priority": "high" }))).await.unwrap();
    assert_eq!(summary.output["urgent"]["lane"], "urgent");
    assert_eq!(step_status(&summary.steps, "normal"), Some(StepStatus::Skipped));
}

// ---------------------------------------------------------------------------
// Variables
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_run_variable_shadows_stored_value() {
    let h = harness();
    let workflow_id = Uuid::now_v7();
    h.variables
        .set_variable(&workflow_id, "greeting", &json!("from store"))
        .await
        .unwrap();

    let g = graph(
        vec![
            trigger(),
            Node::new("before", "variable_get", json!({ "name": "greeting" })),
            Node::new("set", "variable_set", json!({ "name": "greeting", "value": "from run" })),
            Node::new("after", "variable_get", json!({ "name": "greeting" })),
        ],
        vec![Edge::new("t", "before"), Edge::new("before", "set"), Edge::new("set", "after")],
    );
    let summary = h
        .engine
        .execute(ExecutionRequest::new(workflow_id, g, json!({})))
        .await
        .unwrap();

    assert_eq!(summary.output["before"]["value"], "from store");
    assert_eq!(summary.output["before"]["source"], "store");
    assert_eq!(summary.output["after"]["value"], "from run");
    assert_eq!(summary.output["after"]["source"], "context");
    // Run scope never writes through.
    assert_eq!(
        h.variables.get_variable(&workflow_id, "greeting").await.unwrap(),
        Some(json!("from store"))
    );
}

#[tokio::test]
async fn test_repository_error_marks_record_failed() {
    let executions = Arc::new(MemoryExecutionStore::default());
    let mut registry = HandlerRegistry::new();
    registry.register(EchoAction);
    let engine = WorkflowEngine::new(
        Arc::new(MemoryVariableStore::unavailable()),
        executions.clone(),
        Arc::new(ScriptedGenerator::failing()),
        registry,
        EngineConfig::default(),
    );

    let execution_id = Uuid::now_v7();
    let g = graph(
        vec![trigger(), Node::new("read", "variable_get", json!({ "name": "tier" }))],
        vec![Edge::new("t", "read")],
    );
    let mut req = request(g, json!({}));
    req.execution_id = Some(execution_id);

    let err = engine.execute(req).await.unwrap_err();
    assert!(matches!(err, EngineError::Repository(_)));

    let record = executions.snapshot(&execution_id).unwrap();
    assert_eq!(record.status, ExecutionStatus::Failed);
    assert!(record.completed_at.is_some());
    assert!(record.error.unwrap().contains("database connection"));
}

// ---------------------------------------------------------------------------
// Wrappers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_retry_succeeds_on_third_attempt() {
    let mut registry = HandlerRegistry::new();
    registry.register(FlakyAction::new(3));
    let h = harness_with(registry, EngineConfig::default());

    let g = graph(
        vec![
            trigger(),
            Node::new("retry", "retry", json!({ "max_retries": 3, "retry_delay": 10 })),
            Node::new("call", "flaky", json!({})),
        ],
        vec![Edge::new("t", "retry"), Edge::new("retry", "call")],
    );
    let summary = h.engine.execute(request(g, json!({}))).await.unwrap();

    assert_eq!(summary.status, ExecutionStatus::Completed);
    assert_eq!(summary.output["retry"]["attempts"], 3);
    assert_eq!(summary.output["retry"]["succeeded"], true);

    let attempts: Vec<(u32, StepStatus)> = summary
        .steps
        .iter()
        .filter(|s| s.node_id == "call")
        .map(|s| (s.attempt, s.status))
        .collect();
    assert_eq!(
        attempts,
        vec![(1, StepStatus::Failed), (2, StepStatus::Failed), (3, StepStatus::Completed)]
    );
}

#[tokio::test]
async fn test_retry_exhausted_fails_run() {
    let mut registry = HandlerRegistry::new();
    registry.register(FlakyAction::new(10));
    let h = harness_with(registry, EngineConfig::default());

    let g = graph(
        vec![
            trigger(),
            Node::new("retry", "retry", json!({ "max_retries": 2, "retry_delay": 0 })),
            Node::new("call", "flaky", json!({})),
        ],
        vec![Edge::new("t", "retry"), Edge::new("retry", "call")],
    );
    let summary = h.engine.execute(request(g, json!({})).in_test_mode(None)).await.unwrap();

    assert_eq!(summary.status, ExecutionStatus::Failed);
    assert_eq!(summary.details.as_ref().unwrap()["node_id"], "retry");
    assert!(summary.error.unwrap().contains("all 2 attempts failed"));
}

#[tokio::test]
async fn test_try_catch_routes_failure_to_catch_branch() {
    let mut registry = HandlerRegistry::new();
    registry.register(FlakyAction::new(100));
    registry.register(EchoAction);
    let h = harness_with(registry, EngineConfig::default());

    let g = graph(
        vec![
            trigger(),
            Node::new("guard", "try_catch", json!({})),
            Node::new("call", "flaky", json!({})),
            Node::new("recover", "echo", json!({ "failed": "{{guard.failed_node}}" })),
        ],
        vec![
            Edge::new("t", "guard"),
            Edge::new("guard", "call"),
            Edge::new("guard", "recover").with_handle("catch"),
        ],
    );
    let summary = h.engine.execute(request(g, json!({}))).await.unwrap();

    assert_eq!(summary.status, ExecutionStatus::Completed);
    assert_eq!(summary.output["guard"]["caught"], true);
    assert_eq!(summary.output["recover"]["failed"], "call");
    assert_eq!(step_status(&summary.steps, "call"), Some(StepStatus::Failed));
}

fn rejoin_graph() -> WorkflowGraph {
    graph(
        vec![
            trigger(),
            Node::new("guard", "try_catch", json!({})),
            Node::new("call", "flaky", json!({})),
            Node::new("recover", "echo", json!({ "failed": "{{guard.failed_node}}" })),
            Node::new("end", "echo", json!({ "done": true })),
        ],
        vec![
            Edge::new("t", "guard"),
            Edge::new("guard", "call"),
            Edge::new("guard", "recover").with_handle("catch"),
            Edge::new("call", "end"),
            Edge::new("recover", "end"),
        ],
    )
}

#[tokio::test]
async fn test_try_catch_join_runs_after_catch_branch() {
    let mut registry = HandlerRegistry::new();
    registry.register(FlakyAction::new(100));
    registry.register(EchoAction);
    let h = harness_with(registry, EngineConfig::default());

    let summary = h.engine.execute(request(rejoin_graph(), json!({}))).await.unwrap();

    assert_eq!(summary.status, ExecutionStatus::Completed);
    assert_eq!(step_status(&summary.steps, "call"), Some(StepStatus::Failed));
    assert_eq!(step_status(&summary.steps, "recover"), Some(StepStatus::Completed));
    assert_eq!(step_status(&summary.steps, "end"), Some(StepStatus::Completed));
    assert_eq!(summary.steps.iter().filter(|s| s.node_id == "end").count(), 1);
    assert_eq!(summary.output["end"]["done"], true);
}

#[tokio::test]
async fn test_try_catch_join_runs_after_try_branch() {
    let mut registry = HandlerRegistry::new();
    registry.register(FlakyAction::new(1));
    registry.register(EchoAction);
    let h = harness_with(registry, EngineConfig::default());

    let summary = h.engine.execute(request(rejoin_graph(), json!({}))).await.unwrap();

    assert_eq!(summary.status, ExecutionStatus::Completed);
    assert_eq!(summary.output["guard"]["caught"], false);
    assert_eq!(step_status(&summary.steps, "recover"), Some(StepStatus::Skipped));
    assert_eq!(step_status(&summary.steps, "end"), Some(StepStatus::Completed));
}

#[tokio::test]
async fn test_loop_runs_body_per_item() {
    let h = harness();
    let g = graph(
        vec![
            trigger(),
            Node::new("each", "loop", json!({ "array_path": "data.items" })),
            Node::new("show", "echo", json!({ "value": "{{item}}" })),
        ],
        vec![Edge::new("t", "each"), Edge::new("each", "show")],
    );
    let summary = h.engine.execute(request(g, json!({ "items": ["a", "b", "c"] }))).await.unwrap();

    assert_eq!(summary.output["each"]["iterations"], 3);
    assert_eq!(summary.output["each"]["items"][1]["results"]["show"]["value"], "b");
    assert_eq!(summary.steps.iter().filter(|s| s.node_id == "show").count(), 3);
}

#[tokio::test]
async fn test_loop_over_non_array_fails_run() {
    let h = harness();
    let g = graph(
        vec![
            trigger(),
            Node::new("each", "loop", json!({ "array_path": "data.items" })),
            Node::new("show", "echo", json!({})),
        ],
        vec![Edge::new("t", "each"), Edge::new("each", "show")],
    );
    let summary = h.engine.execute(request(g, json!({ "items": "abc" }))).await.unwrap();

    assert_eq!(summary.status, ExecutionStatus::Failed);
    assert_eq!(summary.details.unwrap()["kind"], "loop_target_not_array");
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_unknown_node_type_fails_run() {
    let h = harness();
    let g = graph(vec![trigger(), Node::new("fax", "fax_send", json!({}))], vec![Edge::new("t", "fax")]);
    let summary = h.engine.execute(request(g, json!({}))).await.unwrap();

    assert!(!summary.success);
    assert_eq!(summary.details.unwrap()["kind"], "unknown_node_type");
    assert!(summary.error.unwrap().contains("fax_send"));
}

#[tokio::test]
async fn test_malformed_graph_fails_before_any_node_runs() {
    let h = harness();
    let g = graph(vec![trigger()], vec![Edge::new("t", "ghost")]);
    let summary = h.engine.execute(request(g, json!({}))).await.unwrap();

    assert_eq!(summary.status, ExecutionStatus::Failed);
    assert_eq!(summary.details.unwrap()["kind"], "malformed_graph");
    assert!(summary.steps.is_empty());
}

// ---------------------------------------------------------------------------
// AI agent chains
// ---------------------------------------------------------------------------

fn chain(id: &str, nodes: Value) -> Value {
    json!({ "id": id, "name": format!("chain {id}"), "nodes": nodes, "edges": [] })
}

#[tokio::test]
async fn test_parallel_chains_respect_max_concurrency() {
    let gauge = Arc::new(ConcurrencyGauge::default());
    let mut registry = HandlerRegistry::new();
    registry.register(gauge.clone());
    let h = harness_with(registry, EngineConfig::default());

    let chains: Vec<Value> = (1..=5)
        .map(|i| chain(&format!("c{i}"), json!([{ "id": format!("p{i}"), "type": "gauge" }])))
        .collect();
    let g = graph(
        vec![
            trigger(),
            Node::new(
                "agent",
                "ai_agent",
                json!({
                    "chains": chains,
                    "executionPlan": { "parallel": true, "maxConcurrency": 2 }
                }),
            ),
        ],
        vec![Edge::new("t", "agent")],
    );
    let summary = h.engine.execute(request(g, json!({})).in_test_mode(None)).await.unwrap();

    assert_eq!(summary.status, ExecutionStatus::Completed);
    assert_eq!(gauge.calls(), 5);
    assert!(gauge.peak() <= 2, "peak concurrency was {}", gauge.peak());
    assert_eq!(summary.output["agent"]["chains"].as_array().unwrap().len(), 5);
    assert_eq!(summary.output["agent"]["decision_state"], "summarized");
    for i in 1..=5 {
        assert!(summary.output.get(format!("p{i}").as_str()).is_some());
    }
}

fn flow_graph(parallel: bool) -> WorkflowGraph {
    graph(
        vec![
            trigger(),
            Node::new(
                "agent",
                "ai_agent",
                json!({
                    "chains": [
                        chain("first", json!([{ "id": "stage", "type": "echo", "config": { "stage": "one" } }])),
                        chain("second", json!([{ "id": "seen", "type": "echo", "config": { "seen": "{{data.stage}}" } }])),
                    ],
                    "executionPlan": { "parallel": parallel }
                }),
            ),
        ],
        vec![Edge::new("t", "agent")],
    )
}

#[tokio::test]
async fn test_sequential_chains_pass_data_forward() {
    let h = harness();
    let summary = h
        .engine
        .execute(request(flow_graph(false), json!({ "ticket": 7 })).in_test_mode(None))
        .await
        .unwrap();

    let flow = &summary.output["agent"]["flow_data"];
    assert_eq!(flow["ticket"], 7);
    assert_eq!(flow["stage"], "one");
    assert_eq!(flow["seen"], "one");
}

#[tokio::test]
async fn test_parallel_chains_do_not_see_each_other() {
    let h = harness();
    let summary = h
        .engine
        .execute(request(flow_graph(true), json!({ "ticket": 7 })).in_test_mode(None))
        .await
        .unwrap();

    assert_eq!(summary.output["seen"]["seen"], "{{data.stage}}");
    assert_eq!(summary.output["agent"]["flow_data"], json!({ "ticket": 7 }));
}

#[tokio::test]
async fn test_nested_agents_beyond_max_depth_fail_run() {
    let config = EngineConfig {
        max_chain_depth: 1,
        ..EngineConfig::default()
    };
    let h = harness_with(HandlerRegistry::new(), config);

    let inner = json!([{ "id": "inner", "type": "ai_agent", "config": { "chains": [] } }]);
    let g = graph(
        vec![
            trigger(),
            Node::new("outer", "ai_agent", json!({ "chains": [chain("nest", inner)] })),
        ],
        vec![Edge::new("t", "outer")],
    );
    let summary = h.engine.execute(request(g, json!({})).in_test_mode(None)).await.unwrap();

    assert_eq!(summary.status, ExecutionStatus::Failed);
    assert_eq!(summary.details.unwrap()["kind"], "depth_exceeded");
}

#[tokio::test]
async fn test_live_routing_failure_degrades_to_no_chains() {
    let h = harness();
    let summary = h.engine.execute(request(flow_graph(false), json!({}))).await.unwrap();

    assert_eq!(summary.status, ExecutionStatus::Completed);
    assert!(summary.output["agent"]["decision_error"].is_string());
    assert_eq!(summary.output["agent"]["chains"], json!([]));
    assert!(summary.output["agent"]["message"].as_str().unwrap().contains("routing failed"));
}

// ---------------------------------------------------------------------------
// Pause, resume, cancel
// ---------------------------------------------------------------------------

fn approval_graph() -> WorkflowGraph {
    graph(
        vec![
            trigger(),
            Node::new("ask", "hitl_conversation", json!({ "prompt": "Ship it?", "channel": "slack" })),
            Node::new("ship", "echo", json!({ "answer": "{{ask.response}}" })),
        ],
        vec![Edge::new("t", "ask"), Edge::new("ask", "ship")],
    )
}

#[tokio::test]
async fn test_pause_then_resume_completes_run() {
    let h = harness();
    let paused = h.engine.execute(request(approval_graph(), json!({}))).await.unwrap();

    assert_eq!(paused.status, ExecutionStatus::Paused);
    assert!(paused.success);
    let token = paused.pause_token.unwrap();
    let stored = h.executions.snapshot(&paused.execution_id).unwrap();
    assert_eq!(stored.pause.as_ref().unwrap().prompt, "Ship it?");
    assert!(stored.context.is_some());

    let wrong = h
        .engine
        .resume(paused.execution_id, Uuid::new_v4(), json!("yes"), &approval_graph())
        .await
        .unwrap_err();
    assert!(matches!(wrong, EngineError::InvalidPauseToken(_)));

    let resumed = h
        .engine
        .resume(paused.execution_id, token, json!("yes"), &approval_graph())
        .await
        .unwrap();
    assert_eq!(resumed.status, ExecutionStatus::Completed);
    assert_eq!(resumed.output["ship"]["answer"], "yes");

    let again = h
        .engine
        .resume(paused.execution_id, token, json!("yes"), &approval_graph())
        .await
        .unwrap_err();
    assert!(matches!(again, EngineError::NotPaused(_)));
}

#[tokio::test]
async fn test_hitl_in_test_mode_is_simulated() {
    let h = harness();
    let summary = h
        .engine
        .execute(request(approval_graph(), json!({})).in_test_mode(None))
        .await
        .unwrap();
    assert_eq!(summary.status, ExecutionStatus::Completed);
    assert_eq!(summary.output["ask"]["status"], "simulated");
}

#[tokio::test]
async fn test_cancel_stops_inflight_run() {
    let h = harness();
    let g = graph(
        vec![trigger(), Node::new("wait", "delay", json!({ "delay": 10_000 }))],
        vec![Edge::new("t", "wait")],
    );
    let execution_id = Uuid::now_v7();
    let mut req = request(g, json!({}));
    req.execution_id = Some(execution_id);

    let engine = h.engine.clone();
    let handle = tokio::spawn(async move { engine.execute(req).await });

    for _ in 0..100 {
        if h.engine.is_running(&execution_id) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(h.engine.cancel(execution_id).await.unwrap());

    let summary = handle.await.unwrap().unwrap();
    assert_eq!(summary.status, ExecutionStatus::Cancelled);
    assert!(!h.engine.is_running(&execution_id));
    assert!(!h.engine.cancel(execution_id).await.unwrap());
}

#[tokio::test]
async fn test_cancel_paused_run() {
    let h = harness();
    let paused = h.engine.execute(request(approval_graph(), json!({}))).await.unwrap();

    assert!(h.engine.cancel(paused.execution_id).await.unwrap());
    let stored = h.executions.snapshot(&paused.execution_id).unwrap();
    assert_eq!(stored.status, ExecutionStatus::Cancelled);
    assert!(stored.pause.is_none());
}
