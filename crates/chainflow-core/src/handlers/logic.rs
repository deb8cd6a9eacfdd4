//! Branching handlers: `filter`, `if_condition`, `switch_case`.

use chainflow_types::node::{NodeResult, Route};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::{NodeOutcome, parse_config};
use crate::engine::context::ExecutionContext;
use crate::engine::error::EngineError;
use crate::engine::expression::{ExpressionError, ExpressionEvaluator, value_to_bool};
use crate::engine::resolver::value_to_string;

#[derive(Debug, Deserialize)]
struct ConditionConfig {
    #[serde(default)]
    condition: Value,
}

/// A condition resolved to a literal is used as-is; a string is a JEXL expression.
fn evaluate_condition(condition: &Value, ctx: &ExecutionContext) -> Result<bool, ExpressionError> {
    match condition {
        Value::String(expression) if !expression.trim().is_empty() => {
            let result = ExpressionEvaluator::new().evaluate_in_context(expression, ctx)?;
            Ok(value_to_bool(&result))
        }
        Value::String(_) => Err(ExpressionError::EvalFailed("empty condition".to_string())),
        other => Ok(value_to_bool(other)),
    }
}

/// `filter`: pass `data` through, or stop the path.
pub fn filter(node_id: &str, config: &Map<String, Value>, ctx: &ExecutionContext) -> Result<NodeOutcome, EngineError> {
    let cfg: ConditionConfig = parse_config(node_id, config)?;

    match evaluate_condition(&cfg.condition, ctx) {
        Ok(true) => Ok(NodeOutcome::routed(
            NodeResult::success("filter", json!({ "passed": true, "data": ctx.data })),
            Route::All,
        )),
        Ok(false) => Ok(NodeOutcome::routed(
            NodeResult::success("filter", json!({ "passed": false, "data": null })),
            Route::Blocked,
        )),
        Err(e) => {
            tracing::warn!(node_id, error = %e, "filter condition failed to evaluate");
            Ok(NodeOutcome::routed(
                NodeResult::success("filter", json!({ "passed": null, "data": null }))
                    .with_message(e.to_string()),
                Route::Blocked,
            ))
        }
    }
}

/// `if_condition`: route to the `true` or `false` handle.
pub fn if_condition(
    node_id: &str,
    config: &Map<String, Value>,
    ctx: &ExecutionContext,
) -> Result<NodeOutcome, EngineError> {
    let cfg: ConditionConfig = parse_config(node_id, config)?;

    let (result, message) = match evaluate_condition(&cfg.condition, ctx) {
        Ok(result) => (result, None),
        Err(e) => {
            tracing::warn!(node_id, error = %e, "if condition failed to evaluate, taking false branch");
            (false, Some(e.to_string()))
        }
    };
    let branch = if result { "true" } else { "false" };

    let mut node_result = NodeResult::success("if_condition", json!({ "result": result, "branch": branch }));
    if let Some(message) = message {
        node_result = node_result.with_message(message);
    }
    Ok(NodeOutcome::routed(node_result, Route::Handle(branch.to_string())))
}

#[derive(Debug, Deserialize)]
struct SwitchCase {
    value: Value,
    #[serde(default)]
    label: Option<String>,
}

fn default_branch() -> String {
    "default".to_string()
}

#[derive(Debug, Deserialize)]
struct SwitchConfig {
    #[serde(default)]
    value: Value,
    #[serde(default)]
    cases: Vec<SwitchCase>,
    #[serde(default = "default_branch")]
    default_branch: String,
}

/// Equal as JSON, or equal once both sides are rendered as text.
fn loosely_equal(a: &Value, b: &Value) -> bool {
    a == b || (!a.is_object() && !a.is_array() && value_to_string(a) == value_to_string(b))
}

/// `switch_case`: route to the first matching case's handle.
pub fn switch_case(node_id: &str, config: &Map<String, Value>) -> Result<NodeOutcome, EngineError> {
    let cfg: SwitchConfig = parse_config(node_id, config)?;

    let matched = cfg.cases.iter().find(|case| loosely_equal(&case.value, &cfg.value));
    let branch = match matched {
        Some(case) => case
            .label
            .clone()
            .unwrap_or_else(|| value_to_string(&case.value)),
        None => cfg.default_branch.clone(),
    };

    Ok(NodeOutcome::routed(
        NodeResult::success(
            "switch_case",
            json!({ "value": cfg.value, "matched": matched.is_some(), "branch": branch }),
        ),
        Route::Handle(branch),
    ))
}
