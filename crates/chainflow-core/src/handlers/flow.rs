//! Flow-control handlers: `delay`, `hitl_conversation`, and config parsing
//! for the wrapper nodes the engine drives (`loop`, `retry`).

use std::time::Duration;

use chainflow_types::node::NodeResult;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::{NodeOutcome, loose, parse_config};
use crate::engine::context::ExecutionContext;
use crate::engine::control::RunControl;
use crate::engine::error::EngineError;
use crate::engine::resolver::lookup_path;

// ---------------------------------------------------------------------------
// delay
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct DelayConfig {
    /// Milliseconds.
    #[serde(default, deserialize_with = "loose::u64_or_string")]
    delay: u64,
}

/// `delay`: sleep in live mode, return immediately in test mode.
pub async fn delay(
    node_id: &str,
    config: &Map<String, Value>,
    test_mode: bool,
    control: &RunControl,
) -> Result<NodeOutcome, EngineError> {
    let cfg: DelayConfig = parse_config(node_id, config)?;

    if test_mode {
        return Ok(NodeOutcome::done(NodeResult::success(
            "delay",
            json!({ "delayed_ms": 0, "requested_ms": cfg.delay, "simulated": true }),
        )));
    }

    control.sleep(Duration::from_millis(cfg.delay)).await?;
    Ok(NodeOutcome::done(NodeResult::success(
        "delay",
        json!({ "delayed_ms": cfg.delay, "requested_ms": cfg.delay }),
    )))
}

// ---------------------------------------------------------------------------
// loop
// ---------------------------------------------------------------------------

fn default_item_variable() -> String {
    "item".to_string()
}

fn default_max_iterations() -> usize {
    100
}

#[derive(Debug, Deserialize)]
pub struct LoopConfig {
    /// A resolved array, or a dotted path into `{data, variables, trigger, results}`.
    #[serde(default)]
    pub array_path: Value,
    #[serde(default = "default_item_variable")]
    pub item_variable: String,
    #[serde(default = "default_max_iterations", deserialize_with = "loose::usize_or_string")]
    pub max_iterations: usize,
}

impl LoopConfig {
    pub fn parse(node_id: &str, config: &Map<String, Value>) -> Result<Self, EngineError> {
        parse_config(node_id, config)
    }

    /// The items to iterate, or `LoopTargetNotArray`.
    pub fn items(&self, ctx: &ExecutionContext) -> Result<Vec<Value>, EngineError> {
        match &self.array_path {
            Value::Array(items) => Ok(items.clone()),
            Value::String(path) => {
                let path = path
                    .trim()
                    .trim_start_matches("{{")
                    .trim_end_matches("}}")
                    .trim();
                let scope = ctx.expression_context();
                match lookup_path(&scope, path) {
                    Some(Value::Array(items)) => Ok(items.clone()),
                    Some(other) => Err(EngineError::LoopTargetNotArray(format!(
                        "'{path}' resolved to {}",
                        json_kind(other)
                    ))),
                    None => Err(EngineError::LoopTargetNotArray(format!("'{path}' did not resolve"))),
                }
            }
            other => Err(EngineError::LoopTargetNotArray(format!(
                "array_path is {}",
                json_kind(other)
            ))),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// retry
// ---------------------------------------------------------------------------

fn default_max_retries() -> u64 {
    3
}

fn default_retry_delay() -> u64 {
    1000
}

#[derive(Debug, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    #[serde(default = "default_max_retries", deserialize_with = "loose::u64_or_string")]
    pub max_retries: u64,
    /// Milliseconds between attempts.
    #[serde(default = "default_retry_delay", deserialize_with = "loose::u64_or_string")]
    pub retry_delay: u64,
}

impl RetryConfig {
    pub fn parse(node_id: &str, config: &Map<String, Value>) -> Result<Self, EngineError> {
        parse_config(node_id, config)
    }

    pub fn attempts(&self) -> u32 {
        self.max_retries.clamp(1, u32::MAX as u64) as u32
    }
}

// ---------------------------------------------------------------------------
// hitl_conversation
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct HitlConfig {
    #[serde(default)]
    prompt: String,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    test_response: Option<Value>,
}

/// `hitl_conversation`: simulated in test mode; a live request pauses the
/// run, which only works at the top level of the graph.
pub fn hitl(
    node_id: &str,
    config: &Map<String, Value>,
    test_mode: bool,
    nested: bool,
) -> Result<NodeOutcome, EngineError> {
    let cfg: HitlConfig = parse_config(node_id, config)?;

    if test_mode {
        let response = cfg
            .test_response
            .unwrap_or_else(|| Value::String("Simulated human response".to_string()));
        return Ok(NodeOutcome::done(NodeResult::success(
            "hitl_conversation",
            json!({ "status": "simulated", "prompt": cfg.prompt, "response": response }),
        )));
    }

    if nested {
        return Ok(NodeOutcome::done(NodeResult::failure(
            "hitl_conversation",
            "human-in-the-loop pause inside a chain or wrapper is not resumable",
        )));
    }

    Ok(NodeOutcome::Pause {
        prompt: cfg.prompt,
        channel: cfg.channel,
    })
}

/// Result recorded for a paused node once the human responds.
pub fn hitl_response(response: Value) -> NodeResult {
    NodeResult::success(
        "hitl_conversation",
        json!({ "status": "responded", "response": response }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainflow_types::execution::ExecutionRequest;
    use chainflow_types::workflow::WorkflowGraph;
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn ctx(data: Value) -> ExecutionContext {
        let request = ExecutionRequest::new(Uuid::now_v7(), WorkflowGraph::default(), data);
        ExecutionContext::for_request(&request, Uuid::now_v7())
    }

    #[tokio::test]
    async fn test_delay_skipped_in_test_mode() {
        let control = RunControl::new(CancellationToken::new(), Duration::from_secs(5));
        let started = std::time::Instant::now();
        let outcome = delay("d", &map(json!({ "delay": 60_000 })), true, &control).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        match outcome {
            NodeOutcome::Done { result, .. } => assert_eq!(result.to_value()["delayed_ms"], 0),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delay_cancelled() {
        let token = CancellationToken::new();
        let control = RunControl::new(token.clone(), Duration::from_secs(5));
        token.cancel();
        let err = delay("d", &map(json!({ "delay": "60000" })), false, &control).await.unwrap_err();
        assert!(matches!(err, EngineError::Cancelled));
    }

    #[test]
    fn test_loop_items_from_path_and_literal() {
        let ctx = ctx(json!({ "orders": [1, 2, 3] }));
        let cfg = LoopConfig::parse("l", &map(json!({ "array_path": "data.orders" }))).unwrap();
        assert_eq!(cfg.items(&ctx).unwrap().len(), 3);
        assert_eq!(cfg.item_variable, "item");
        assert_eq!(cfg.max_iterations, 100);

        let cfg = LoopConfig::parse("l", &map(json!({ "array_path": ["a", "b"] }))).unwrap();
        assert_eq!(cfg.items(&ctx).unwrap(), vec![json!("a"), json!("b")]);
    }

    #[test]
    fn test_loop_max_iterations_accepts_numeric_string() {
        let cfg = LoopConfig::parse("l", &map(json!({ "array_path": [], "max_iterations": "5" }))).unwrap();
        assert_eq!(cfg.max_iterations, 5);

        let err = LoopConfig::parse("l", &map(json!({ "max_iterations": "lots" }))).unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig { .. }));
    }

    #[test]
    fn test_loop_target_not_array() {
        let ctx = ctx(json!({ "orders": { "id": 1 } }));
        let cfg = LoopConfig::parse("l", &map(json!({ "array_path": "data.orders" }))).unwrap();
        let err = cfg.items(&ctx).unwrap_err();
        assert!(matches!(err, EngineError::LoopTargetNotArray(_)));
        assert!(err.to_string().contains("an object"));

        let cfg = LoopConfig::parse("l", &map(json!({ "array_path": 7 }))).unwrap();
        assert!(matches!(cfg.items(&ctx), Err(EngineError::LoopTargetNotArray(_))));
    }

    #[test]
    fn test_retry_attempts_at_least_one() {
        let cfg = RetryConfig::parse("r", &map(json!({ "max_retries": 0 }))).unwrap();
        assert_eq!(cfg.attempts(), 1);
        let cfg = RetryConfig::parse("r", &map(json!({}))).unwrap();
        assert_eq!(cfg.attempts(), 3);
        assert_eq!(cfg.retry_delay, 1000);
    }

    #[test]
    fn test_hitl_modes() {
        let config = map(json!({ "prompt": "Approve refund?", "test_response": "yes" }));

        match hitl("h", &config, true, false).unwrap() {
            NodeOutcome::Done { result, .. } => {
                assert_eq!(result.to_value()["status"], "simulated");
                assert_eq!(result.to_value()["response"], "yes");
            }
            other => panic!("unexpected {other:?}"),
        }

        match hitl("h", &config, false, true).unwrap() {
            NodeOutcome::Done { result, .. } => assert!(!result.success),
            other => panic!("unexpected {other:?}"),
        }

        assert_eq!(
            hitl("h", &config, false, false).unwrap(),
            NodeOutcome::Pause { prompt: "Approve refund?".into(), channel: None }
        );
    }
}
