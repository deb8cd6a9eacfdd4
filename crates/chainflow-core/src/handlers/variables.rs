//! `variable_set` / `variable_get`: run variables with optional
//! workflow-scoped persistence.

use chainflow_types::node::NodeResult;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::{NodeOutcome, parse_config};
use crate::engine::context::ExecutionContext;
use crate::engine::error::EngineError;
use crate::repository::variable::VariableStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum VariableScope {
    #[default]
    Run,
    Workflow,
}

#[derive(Debug, Deserialize)]
struct SetConfig {
    name: String,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    scope: VariableScope,
}

#[derive(Debug, Deserialize)]
struct GetConfig {
    name: String,
    #[serde(default)]
    default: Value,
}

/// Write a run variable; `scope: workflow` also persists it.
pub async fn variable_set<V: VariableStore>(
    store: &V,
    node_id: &str,
    config: &Map<String, Value>,
    ctx: &mut ExecutionContext,
) -> Result<NodeOutcome, EngineError> {
    let cfg: SetConfig = parse_config(node_id, config)?;
    if cfg.name.trim().is_empty() {
        return Err(EngineError::invalid_config(node_id, "variable name is empty"));
    }

    ctx.variables.insert(cfg.name.clone(), cfg.value.clone());
    if cfg.scope == VariableScope::Workflow {
        store.set_variable(&ctx.workflow_id, &cfg.name, &cfg.value).await?;
    }

    let scope = match cfg.scope {
        VariableScope::Run => "run",
        VariableScope::Workflow => "workflow",
    };
    Ok(NodeOutcome::done(NodeResult::success(
        "variable_set",
        json!({ "name": cfg.name, "value": cfg.value, "scope": scope }),
    )))
}

/// Read a variable: run context first, then the store, then `default`.
pub async fn variable_get<V: VariableStore>(
    store: &V,
    node_id: &str,
    config: &Map<String, Value>,
    ctx: &ExecutionContext,
) -> Result<NodeOutcome, EngineError> {
    let cfg: GetConfig = parse_config(node_id, config)?;

    let (value, source) = if let Some(value) = ctx.variables.get(&cfg.name) {
        (value.clone(), "context")
    } else if let Some(value) = store.get_variable(&ctx.workflow_id, &cfg.name).await? {
        (value, "store")
    } else {
        (cfg.default, "default")
    };

    Ok(NodeOutcome::done(NodeResult::success(
        "variable_get",
        json!({ "name": cfg.name, "value": value, "source": source }),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::memory::MemoryVariableStore;
    use chainflow_types::execution::ExecutionRequest;
    use chainflow_types::workflow::WorkflowGraph;
    use uuid::Uuid;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn ctx() -> ExecutionContext {
        let request = ExecutionRequest::new(Uuid::now_v7(), WorkflowGraph::default(), json!({}));
        ExecutionContext::for_request(&request, Uuid::now_v7())
    }

    fn output(outcome: NodeOutcome) -> Value {
        match outcome {
            NodeOutcome::Done { result, .. } => result.to_value(),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_scope_stays_in_context() {
        let store = MemoryVariableStore::default();
        let mut ctx = ctx();
        variable_set(&store, "s", &map(json!({ "name": "tier", "value": "gold" })), &mut ctx)
            .await
            .unwrap();
        assert_eq!(ctx.variables["tier"], "gold");
        assert!(store.get_variable(&ctx.workflow_id, "tier").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_workflow_scope_persists() {
        let store = MemoryVariableStore::default();
        let mut ctx = ctx();
        variable_set(
            &store,
            "s",
            &map(json!({ "name": "counter", "value": 3, "scope": "workflow" })),
            &mut ctx,
        )
        .await
        .unwrap();
        assert_eq!(
            store.get_variable(&ctx.workflow_id, "counter").await.unwrap(),
            Some(json!(3))
        );
    }

    #[tokio::test]
    async fn test_context_cache_wins_over_store() {
        let store = MemoryVariableStore::default();
        let mut ctx = ctx();
        store.set_variable(&ctx.workflow_id, "mode", &json!("stored")).await.unwrap();
        ctx.variables.insert("mode".into(), json!("cached"));

        let value = output(variable_get(&store, "g", &map(json!({ "name": "mode" })), &ctx).await.unwrap());
        assert_eq!(value["value"], "cached");
        assert_eq!(value["source"], "context");
    }

    #[tokio::test]
    async fn test_get_falls_back_to_store_then_default() {
        let store = MemoryVariableStore::default();
        let ctx = ctx();
        store.set_variable(&ctx.workflow_id, "mode", &json!("stored")).await.unwrap();

        let value = output(variable_get(&store, "g", &map(json!({ "name": "mode" })), &ctx).await.unwrap());
        assert_eq!(value["value"], "stored");

        let value = output(
            variable_get(&store, "g", &map(json!({ "name": "absent", "default": 42 })), &ctx)
                .await
                .unwrap(),
        );
        assert_eq!(value["value"], 42);
        assert_eq!(value["source"], "default");
    }

    #[tokio::test]
    async fn test_empty_name_is_invalid() {
        let store = MemoryVariableStore::default();
        let mut ctx = ctx();
        let err = variable_set(&store, "s", &map(json!({ "name": " " })), &mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig { .. }));
    }
}
