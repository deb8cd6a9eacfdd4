//! Chain executor: runs the chains an agent selected, either in bounded
//! parallel batches over forked contexts or sequentially with data flowing
//! from one chain into the next.

use std::future::Future;
use std::pin::Pin;

use chainflow_types::chain::{
    ChainDefinition, ChainError, ChainExecutionResult, ChainResult, ChainSelectionResult, SelectedChain,
};
use futures_util::future::join_all;
use serde_json::{Map, Value};

use crate::engine::context::ExecutionContext;
use crate::engine::control::RunControl;
use crate::engine::error::EngineError;
use crate::engine::resolver::resolve_value;

pub type ChainFuture<'a> =
    Pin<Box<dyn Future<Output = Result<(ChainResult, ExecutionContext), EngineError>> + Send + 'a>>;

/// Runs one chain's graph on its own context.
///
/// Implemented by the workflow engine so chain nodes share the top-level
/// dispatch. A non-fatal node failure becomes an unsuccessful `ChainResult`;
/// run-fatal errors come back as `Err`.
pub trait ChainRunner: Send + Sync {
    fn run_chain<'a>(
        &'a self,
        chain: &'a ChainDefinition,
        ctx: ExecutionContext,
        depth: usize,
        control: &'a RunControl,
    ) -> ChainFuture<'a>;
}

/// Execute `selection` against `chains`.
///
/// Selected chains run in priority order. Node results and steps from every
/// chain are merged back into `parent`.
pub async fn execute_chains<R: ChainRunner>(
    runner: &R,
    parent: &mut ExecutionContext,
    chains: &[ChainDefinition],
    selection: &ChainSelectionResult,
    input: &Value,
    depth: usize,
    control: &RunControl,
) -> Result<ChainExecutionResult, EngineError> {
    let mut selected: Vec<&SelectedChain> = selection.selected_chains.iter().collect();
    selected.sort_by_key(|s| s.priority);

    let mut result = ChainExecutionResult {
        flow_data: input.clone(),
        ..ChainExecutionResult::default()
    };

    let mut runnable = Vec::new();
    for sel in selected {
        match chains.iter().find(|c| c.id == sel.chain_id) {
            Some(chain) => runnable.push((sel, chain)),
            None => result.errors.push(ChainError {
                chain_id: sel.chain_id.clone(),
                error: "chain is not defined on this agent".to_string(),
            }),
        }
    }

    let plan = &selection.execution_plan;
    tracing::info!(
        chains = runnable.len(),
        parallel = plan.parallel,
        max_concurrency = plan.max_concurrency,
        depth,
        "executing agent chains"
    );

    if plan.parallel {
        for batch in runnable.chunks(plan.max_concurrency.max(1)) {
            let runs = batch.iter().map(|(sel, chain)| {
                let child = parent.fork(chain_input(input, sel, parent));
                runner.run_chain(chain, child, depth, control)
            });
            let outcomes = join_all(runs).await;

            // Keep every sibling's trace before surfacing a fatal error.
            let mut fatal = None;
            for ((_, chain), outcome) in batch.iter().zip(outcomes) {
                match outcome {
                    Ok((chain_result, child)) => {
                        parent.absorb(child, chain.graph.nodes.iter().map(|n| n.id.as_str()));
                        record(&mut result, chain_result);
                    }
                    Err(e) => {
                        tracing::warn!(chain_id = %chain.id, error = %e, "chain aborted the run");
                        fatal.get_or_insert(e);
                    }
                }
            }
            if let Some(e) = fatal {
                return Err(e);
            }
        }
    } else {
        let mut flow_data = input.clone();
        for (sel, chain) in runnable {
            let child = parent.fork(chain_input(&flow_data, sel, parent));
            let (chain_result, child) = runner.run_chain(chain, child, depth, control).await?;
            parent.absorb(child, chain.graph.nodes.iter().map(|n| n.id.as_str()));

            let succeeded = chain_result.success;
            if succeeded {
                if let (Value::Object(flow), Value::Object(output)) = (&mut flow_data, &chain_result.output) {
                    for (key, value) in output {
                        flow.insert(key.clone(), value.clone());
                    }
                }
            }
            record(&mut result, chain_result);

            if !succeeded && !plan.continue_on_error {
                tracing::warn!(chain_id = %chain.id, "chain failed, stopping sequential execution");
                break;
            }
        }
        result.flow_data = flow_data;
    }

    Ok(result)
}

fn record(result: &mut ChainExecutionResult, chain_result: ChainResult) {
    if !chain_result.success {
        result.errors.push(ChainError {
            chain_id: chain_result.chain_id.clone(),
            error: chain_result
                .error
                .clone()
                .unwrap_or_else(|| "chain failed".to_string()),
        });
    }
    result.chains.push(chain_result);
}

/// The chain's `data`: the base document with the selection's input mapping
/// laid over it. Mapping values may reference upstream results.
fn chain_input(base: &Value, selection: &SelectedChain, parent: &ExecutionContext) -> Value {
    if selection.input_mapping.is_empty() {
        return base.clone();
    }
    let mut merged = match base {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("input".to_string(), other.clone());
            map
        }
    };
    for (key, value) in &selection.input_mapping {
        merged.insert(key.clone(), resolve_value(value, parent));
    }
    Value::Object(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainflow_types::chain::ExecutionPlan;
    use chainflow_types::execution::ExecutionRequest;
    use chainflow_types::node::{NodeResult, StepRecord};
    use chainflow_types::workflow::{Node, WorkflowGraph};
    use serde_json::json;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    /// Chains named `fatal-*` abort; every other chain completes one node.
    struct StubRunner;

    impl ChainRunner for StubRunner {
        fn run_chain<'a>(
            &'a self,
            chain: &'a ChainDefinition,
            mut ctx: ExecutionContext,
            _depth: usize,
            _control: &'a RunControl,
        ) -> ChainFuture<'a> {
            Box::pin(async move {
                if chain.id.starts_with("fatal") {
                    return Err(EngineError::Cancelled);
                }
                let node_id = format!("{}-node", chain.id);
                ctx.set_result(&node_id, &NodeResult::success("template", json!({ "chain": chain.id })));
                ctx.steps.push(StepRecord::skipped(node_id.as_str(), "template"));
                let chain_result = ChainResult {
                    chain_id: chain.id.clone(),
                    chain_name: chain.name.clone(),
                    success: true,
                    output: json!({ "chain": chain.id }),
                    error: None,
                    steps: Vec::new(),
                    duration_ms: 0,
                };
                Ok((chain_result, ctx))
            })
        }
    }

    fn chain(id: &str) -> ChainDefinition {
        ChainDefinition {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            graph: WorkflowGraph {
                nodes: vec![Node::new(format!("{id}-node"), "template", json!({}))],
                edges: Vec::new(),
            },
            conditions: Vec::new(),
        }
    }

    fn select(ids: &[&str], parallel: bool) -> ChainSelectionResult {
        ChainSelectionResult {
            selected_chains: ids
                .iter()
                .enumerate()
                .map(|(i, id)| SelectedChain {
                    chain_id: id.to_string(),
                    reasoning: String::new(),
                    priority: i as u32,
                    confidence: 1.0,
                    input_mapping: Map::new(),
                })
                .collect(),
            execution_plan: ExecutionPlan {
                parallel,
                max_concurrency: 3,
                continue_on_error: false,
            },
            ..ChainSelectionResult::default()
        }
    }

    fn parent() -> ExecutionContext {
        let request = ExecutionRequest::new(Uuid::now_v7(), WorkflowGraph::default(), json!({}));
        ExecutionContext::for_request(&request, Uuid::now_v7())
    }

    #[tokio::test]
    async fn test_parallel_fatal_error_keeps_sibling_results() {
        let chains = vec![chain("fatal-a"), chain("b"), chain("c")];
        let selection = select(&["fatal-a", "b", "c"], true);
        let control = RunControl::new(CancellationToken::new(), Duration::from_secs(5));
        let mut ctx = parent();

        let err = execute_chains(&StubRunner, &mut ctx, &chains, &selection, &json!({}), 1, &control)
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Cancelled));
        assert!(ctx.results.contains_key("b-node"));
        assert!(ctx.results.contains_key("c-node"));
        let traced: Vec<&str> = ctx.steps.iter().map(|s| s.node_id.as_str()).collect();
        assert_eq!(traced, vec!["b-node", "c-node"]);
    }

    #[tokio::test]
    async fn test_sequential_chains_stop_at_fatal_error() {
        let chains = vec![chain("a"), chain("fatal-b"), chain("c")];
        let selection = select(&["a", "fatal-b", "c"], false);
        let control = RunControl::new(CancellationToken::new(), Duration::from_secs(5));
        let mut ctx = parent();

        let err = execute_chains(&StubRunner, &mut ctx, &chains, &selection, &json!({}), 1, &control)
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Cancelled));
        assert!(ctx.results.contains_key("a-node"));
        assert!(!ctx.results.contains_key("c-node"));
    }
}
