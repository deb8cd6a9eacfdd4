//! Workflow engine: walks a graph in topological order, dispatching each
//! node and routing along the edges its result activates.
//!
//! # Run lifecycle
//!
//! 1. Create an `ExecutionRecord` with status `running`.
//! 2. Register a cancellation token and start the duration budget.
//! 3. Walk the graph. Wrapper nodes (`loop`, `retry`, `try_catch`) re-walk
//!    their branch as a sub-walk; `ai_agent` nodes run chains through the
//!    chain executor, which calls back into the same walk.
//! 4. Persist the final status (or the pause checkpoint) and return the
//!    summary. Only store failures surface as `Err`.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chainflow_types::chain::{ChainResult, ChainSelectionResult, DecisionState};
use chainflow_types::config::EngineConfig;
use chainflow_types::execution::{
    ExecutionRecord, ExecutionRequest, ExecutionStatus, ExecutionSummary, PauseState,
};
use chainflow_types::node::{NodeResult, NodeState, Route, StepRecord, StepStatus};
use chainflow_types::workflow::{Edge, Node, WorkflowGraph};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::context::ExecutionContext;
use super::control::RunControl;
use super::error::EngineError;
use super::graph::{self, CATCH_HANDLE, ERROR_HANDLE};
use super::registry::{HandlerRegistry, NodeKind};
use super::resolver::resolve_object;
use crate::chain::ai_field::AiFieldResolver;
use crate::chain::decision::{AgentConfig, DecisionTracker, analyze_and_route};
use crate::chain::executor::{ChainFuture, ChainRunner, execute_chains};
use crate::handlers::flow::{self, LoopConfig, RetryConfig};
use crate::handlers::{NodeOutcome, ai_action, logic, transform, variables};
use crate::llm::generator::TextGenerator;
use crate::repository::execution::ExecutionStore;
use crate::repository::variable::VariableStore;

type WalkFuture<'a> = std::pin::Pin<Box<dyn std::future::Future<Output = Result<WalkOutcome, EngineError>> + Send + 'a>>;

// ---------------------------------------------------------------------------
// Walk state
// ---------------------------------------------------------------------------

/// Where a walk is running and what it may touch.
#[derive(Clone, Copy)]
struct WalkScope<'a> {
    /// Restricts a sub-walk to a wrapper's branch.
    body: Option<&'a HashSet<String>>,
    control: &'a RunControl,
    /// Chain nesting depth; 0 at the top level.
    depth: usize,
    chain_id: Option<&'a str>,
    /// Inside a chain or wrapper; live human-in-the-loop pauses fail here.
    nested: bool,
    attempt: u32,
}

impl<'a> WalkScope<'a> {
    fn top(control: &'a RunControl) -> Self {
        Self {
            body: None,
            control,
            depth: 0,
            chain_id: None,
            nested: false,
            attempt: 1,
        }
    }
}

/// How a walk ended when no run-fatal error occurred.
#[derive(Debug)]
enum WalkOutcome {
    Completed,
    Failed {
        node_id: String,
        node_type: String,
        error: String,
    },
    Paused {
        node_id: String,
        prompt: String,
        channel: Option<String>,
    },
}

impl WalkOutcome {
    /// `(node_id, error)` for anything other than a clean completion.
    fn failure(&self) -> Option<(String, String)> {
        match self {
            WalkOutcome::Completed => None,
            WalkOutcome::Failed { node_id, error, .. } => Some((node_id.clone(), error.clone())),
            WalkOutcome::Paused { node_id, .. } => {
                Some((node_id.clone(), "human-in-the-loop pause is not resumable here".to_string()))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// WorkflowEngine
// ---------------------------------------------------------------------------

/// Executes workflow graphs.
///
/// Generic over its ports so the API can plug in SQLite stores and the
/// Anthropic generator while tests use in-memory doubles.
pub struct WorkflowEngine<V: VariableStore, E: ExecutionStore, G: TextGenerator> {
    variables: Arc<V>,
    executions: Arc<E>,
    generator: Arc<G>,
    registry: Arc<HandlerRegistry>,
    config: EngineConfig,
    /// Cancellation tokens of in-flight runs, keyed by execution ID.
    cancellation_tokens: DashMap<Uuid, CancellationToken>,
}

impl<V, E, G> WorkflowEngine<V, E, G>
where
    V: VariableStore,
    E: ExecutionStore,
    G: TextGenerator,
{
    pub fn new(
        variables: Arc<V>,
        executions: Arc<E>,
        generator: Arc<G>,
        registry: HandlerRegistry,
        config: EngineConfig,
    ) -> Self {
        Self {
            variables,
            executions,
            generator,
            registry: Arc::new(registry),
            config,
            cancellation_tokens: DashMap::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn executions(&self) -> &Arc<E> {
        &self.executions
    }

    /// Whether `execution_id` is currently walking in this process.
    pub fn is_running(&self, execution_id: &Uuid) -> bool {
        self.cancellation_tokens.contains_key(execution_id)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Run a workflow graph to completion, failure, cancellation, or pause.
    pub async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionSummary, EngineError> {
        let execution_id = request.execution_id.unwrap_or_else(Uuid::now_v7);
        let mut ctx = ExecutionContext::for_request(&request, execution_id);

        let record = ExecutionRecord {
            id: execution_id,
            workflow_id: request.workflow_id,
            user_id: request.user_id.clone(),
            source: request.source.clone(),
            status: ExecutionStatus::Running,
            trigger_data: ctx.trigger_data.clone(),
            test_mode: request.test_mode,
            context: None,
            steps: Vec::new(),
            error: None,
            pause: None,
            started_at: Utc::now(),
            completed_at: None,
        };
        self.executions.create_execution(&record).await?;

        tracing::info!(
            execution_id = %execution_id,
            workflow_id = %request.workflow_id,
            source = %request.source,
            test_mode = request.test_mode,
            nodes = request.graph.nodes.len(),
            "starting workflow execution"
        );

        if let Err(e) = graph::execution_order(&request.graph) {
            return self.finish(record, ctx, Err(e)).await;
        }

        let outcome = self.walk_registered(execution_id, &request.graph, &mut ctx).await;
        self.finish(record, ctx, outcome).await
    }

    /// Continue a paused run with the human's response.
    pub async fn resume(
        &self,
        execution_id: Uuid,
        pause_token: Uuid,
        response: Value,
        graph: &WorkflowGraph,
    ) -> Result<ExecutionSummary, EngineError> {
        let mut record = self
            .executions
            .get_execution(&execution_id)
            .await?
            .ok_or(EngineError::RunNotFound(execution_id))?;

        if record.status != ExecutionStatus::Paused {
            return Err(EngineError::NotPaused(execution_id));
        }
        let pause = record.pause.take().ok_or(EngineError::NotPaused(execution_id))?;
        if pause.token != pause_token {
            return Err(EngineError::InvalidPauseToken(execution_id));
        }

        let checkpoint = record
            .context
            .take()
            .ok_or_else(|| EngineError::CorruptCheckpoint(execution_id, "no context stored".to_string()))?;
        let mut ctx = ExecutionContext::from_json(checkpoint)
            .map_err(|e| EngineError::CorruptCheckpoint(execution_id, e.to_string()))?;

        let result = flow::hitl_response(response);
        let step = StepRecord {
            node_id: pause.node_id.clone(),
            node_type: result.node_type.clone(),
            status: StepStatus::Completed,
            attempt: 1,
            chain_id: None,
            output: result.output.clone(),
            error: None,
            started_at: pause.requested_at,
            duration_ms: elapsed_ms_since(pause.requested_at),
        };
        ctx.record_completed(&pause.node_id, &result, Route::All, step);

        record.status = ExecutionStatus::Running;
        self.executions.update_execution(&record).await?;

        tracing::info!(execution_id = %execution_id, node_id = %pause.node_id, "resuming paused workflow execution");

        let outcome = self.walk_registered(execution_id, graph, &mut ctx).await;
        self.finish(record, ctx, outcome).await
    }

    /// Stop a run. In-flight runs stop at their next node boundary; paused
    /// runs are marked cancelled directly. Returns false when there is
    /// nothing to cancel.
    pub async fn cancel(&self, execution_id: Uuid) -> Result<bool, EngineError> {
        let token = self.cancellation_tokens.get(&execution_id).map(|t| t.clone());
        if let Some(token) = token {
            token.cancel();
            tracing::info!(execution_id = %execution_id, "cancellation requested");
            return Ok(true);
        }

        match self.executions.get_execution(&execution_id).await? {
            Some(mut record) if record.status == ExecutionStatus::Paused => {
                record.status = ExecutionStatus::Cancelled;
                record.pause = None;
                record.context = None;
                record.completed_at = Some(Utc::now());
                self.executions.update_execution(&record).await?;
                tracing::info!(execution_id = %execution_id, "cancelled paused execution");
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn walk_registered(
        &self,
        execution_id: Uuid,
        graph: &WorkflowGraph,
        ctx: &mut ExecutionContext,
    ) -> Result<WalkOutcome, EngineError> {
        let token = CancellationToken::new();
        self.cancellation_tokens.insert(execution_id, token.clone());
        let control = RunControl::new(token, Duration::from_secs(self.config.max_run_duration_secs));

        let outcome = self.walk(graph, ctx, WalkScope::top(&control)).await;

        self.cancellation_tokens.remove(&execution_id);
        outcome
    }

    /// Persist the final state of a run and build its summary.
    async fn finish(
        &self,
        mut record: ExecutionRecord,
        ctx: ExecutionContext,
        outcome: Result<WalkOutcome, EngineError>,
    ) -> Result<ExecutionSummary, EngineError> {
        let mut pause_token = None;
        let (status, error, details) = match outcome {
            Ok(WalkOutcome::Completed) => (ExecutionStatus::Completed, None, None),
            Ok(WalkOutcome::Failed {
                node_id,
                node_type,
                error,
            }) => (
                ExecutionStatus::Failed,
                Some(error),
                Some(json!({ "kind": "node_failed", "node_id": node_id, "node_type": node_type })),
            ),
            Ok(WalkOutcome::Paused {
                node_id,
                prompt,
                channel,
            }) => {
                let token = Uuid::new_v4();
                pause_token = Some(token);
                record.pause = Some(PauseState {
                    node_id,
                    token,
                    prompt,
                    channel,
                    requested_at: Utc::now(),
                });
                (ExecutionStatus::Paused, None, None)
            }
            Err(EngineError::Repository(e)) => {
                record.status = ExecutionStatus::Failed;
                record.steps = ctx.steps;
                record.error = Some(e.to_string());
                record.context = None;
                record.pause = None;
                record.completed_at = Some(Utc::now());
                if let Err(update_err) = self.executions.update_execution(&record).await {
                    tracing::error!(execution_id = %record.id, error = %update_err, "failed to mark execution failed");
                }
                tracing::error!(execution_id = %record.id, error = %e, "workflow execution aborted by repository error");
                return Err(EngineError::Repository(e));
            }
            Err(e) => {
                let status = if matches!(e, EngineError::Cancelled) {
                    ExecutionStatus::Cancelled
                } else {
                    ExecutionStatus::Failed
                };
                (status, Some(e.to_string()), Some(json!({ "kind": e.kind() })))
            }
        };

        record.status = status;
        record.steps = ctx.steps.clone();
        record.error = error.clone();
        if status == ExecutionStatus::Paused {
            record.context = Some(ctx.to_json());
            record.completed_at = None;
        } else {
            record.context = None;
            record.pause = None;
            record.completed_at = Some(Utc::now());
        }
        self.executions.update_execution(&record).await?;

        let duration_ms = elapsed_ms_since(record.started_at);
        match status {
            ExecutionStatus::Completed | ExecutionStatus::Paused => tracing::info!(
                execution_id = %record.id,
                status = %status,
                steps = ctx.steps.len(),
                duration_ms,
                "workflow execution finished"
            ),
            _ => tracing::warn!(
                execution_id = %record.id,
                status = %status,
                error = error.as_deref().unwrap_or(""),
                duration_ms,
                "workflow execution did not complete"
            ),
        }

        Ok(ExecutionSummary {
            execution_id: record.id,
            workflow_id: record.workflow_id,
            success: matches!(status, ExecutionStatus::Completed | ExecutionStatus::Paused),
            status,
            steps: ctx.steps,
            output: Value::Object(ctx.results),
            error,
            details,
            pause_token,
        })
    }

    // -----------------------------------------------------------------------
    // Graph walk
    // -----------------------------------------------------------------------

    /// Walk `graph` (or the `scope.body` subset of it) in topological order.
    fn walk<'a>(&'a self, graph: &'a WorkflowGraph, ctx: &'a mut ExecutionContext, scope: WalkScope<'a>) -> WalkFuture<'a> {
        Box::pin(async move {
            let order = graph::execution_order(graph)?;

            for node_id in &order {
                if scope.body.is_some_and(|body| !body.contains(node_id)) {
                    continue;
                }
                if ctx.node_states.contains_key(node_id) {
                    continue;
                }
                let Some(node) = graph.node(node_id) else {
                    continue;
                };

                scope.control.check()?;

                if !graph::should_run(graph, node, &ctx.node_states) {
                    tracing::debug!(node_id = %node.id, "no active incoming edge, skipping node");
                    ctx.record_skipped(&node.id, &node.node_type, scope.chain_id);
                    continue;
                }

                let started_at = Utc::now();
                let started = Instant::now();
                tracing::debug!(node_id = %node.id, node_type = %node.node_type, attempt = scope.attempt, "running node");

                let outcome = match self.run_node(graph, node, ctx, scope).await {
                    Ok(outcome) => outcome,
                    Err(e) if e.is_run_fatal() => return Err(e),
                    Err(e) => NodeOutcome::done(NodeResult::failure(node.node_type.clone(), e.to_string())),
                };

                let mut step = StepRecord {
                    node_id: node.id.clone(),
                    node_type: node.node_type.clone(),
                    status: StepStatus::Completed,
                    attempt: scope.attempt,
                    chain_id: scope.chain_id.map(str::to_string),
                    output: None,
                    error: None,
                    started_at,
                    duration_ms: started.elapsed().as_millis() as u64,
                };

                match outcome {
                    NodeOutcome::Done { result, route } => {
                        step.output = result.output.clone();
                        step.error = result.error.clone();

                        if result.success {
                            ctx.record_completed(&node.id, &result, route, step);
                            continue;
                        }

                        step.status = StepStatus::Failed;
                        let error = result.error.clone().unwrap_or_else(|| "node failed".to_string());
                        if graph::has_error_edges(graph, &node.id) {
                            tracing::warn!(node_id = %node.id, error = %error, "node failed, following error edges");
                            ctx.record_failed(&node.id, &result, true, step);
                            continue;
                        }

                        tracing::warn!(node_id = %node.id, node_type = %node.node_type, error = %error, "node failed");
                        ctx.record_failed(&node.id, &result, false, step);
                        return Ok(WalkOutcome::Failed {
                            node_id: node.id.clone(),
                            node_type: node.node_type.clone(),
                            error,
                        });
                    }
                    NodeOutcome::Pause { prompt, channel } => {
                        step.status = StepStatus::Paused;
                        step.output = Some(json!({ "prompt": prompt, "channel": channel }));
                        ctx.steps.push(step);
                        tracing::info!(node_id = %node.id, "waiting for human response");
                        return Ok(WalkOutcome::Paused {
                            node_id: node.id.clone(),
                            prompt,
                            channel,
                        });
                    }
                }
            }

            Ok(WalkOutcome::Completed)
        })
    }

    /// Resolve a node's config and dispatch it by kind.
    async fn run_node(
        &self,
        graph: &WorkflowGraph,
        node: &Node,
        ctx: &mut ExecutionContext,
        scope: WalkScope<'_>,
    ) -> Result<NodeOutcome, EngineError> {
        let kind = NodeKind::classify(node, &self.registry);

        let mut config = match kind {
            // Chain definitions resolve later, against each chain's own context.
            NodeKind::AiAgent => {
                let mut raw = node.config.clone();
                let chains = raw.remove("chains");
                let mut resolved = resolve_object(&raw, ctx);
                if let Some(chains) = chains {
                    resolved.insert("chains".to_string(), chains);
                }
                resolved
            }
            _ => resolve_object(&node.config, ctx),
        };
        if scope.chain_id.is_some() {
            config = AiFieldResolver::new(&*self.generator).resolve(node, config, ctx).await;
        }

        let id = node.id.as_str();
        match kind {
            NodeKind::Trigger => Ok(NodeOutcome::done(NodeResult::success(
                node.node_type.clone(),
                ctx.trigger_data.clone(),
            ))),
            NodeKind::Filter => logic::filter(id, &config, ctx),
            NodeKind::IfCondition => logic::if_condition(id, &config, ctx),
            NodeKind::SwitchCase => logic::switch_case(id, &config),
            NodeKind::Delay => flow::delay(id, &config, ctx.test_mode, scope.control).await,
            NodeKind::VariableSet => variables::variable_set(&*self.variables, id, &config, ctx).await,
            NodeKind::VariableGet => variables::variable_get(&*self.variables, id, &config, ctx).await,
            NodeKind::DataTransform => transform::data_transform(id, &config, ctx),
            NodeKind::Template => transform::template(id, &config),
            NodeKind::Javascript => transform::javascript(id, &config, ctx),
            NodeKind::Hitl => flow::hitl(id, &config, ctx.test_mode, scope.nested),
            NodeKind::Loop => self.run_loop(graph, node, &config, ctx, scope).await,
            NodeKind::Retry => self.run_retry(graph, node, &config, ctx, scope).await,
            NodeKind::TryCatch => self.run_try_catch(graph, node, ctx, scope).await,
            NodeKind::AiAction(action) => ai_action::run(&*self.generator, action, id, &config, ctx).await,
            NodeKind::AiAgent => self.run_agent(node, &config, ctx, scope).await,
            NodeKind::Action(node_type) => {
                let Some(handler) = self.registry.get(&node_type) else {
                    return Err(EngineError::UnknownNodeType {
                        node_id: node.id.clone(),
                        node_type,
                    });
                };
                let resolved = Node {
                    config,
                    ..node.clone()
                };
                Ok(NodeOutcome::done(match handler.execute(&resolved, ctx).await {
                    Ok(output) => NodeResult::success(node_type, output),
                    Err(e) => {
                        tracing::warn!(node_id = %node.id, node_type = %node_type, error = %e, "action handler failed");
                        NodeResult::failure(node_type, e.to_string())
                    }
                }))
            }
            NodeKind::Unknown(node_type) => Err(EngineError::UnknownNodeType {
                node_id: node.id.clone(),
                node_type,
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Wrapper nodes
    // -----------------------------------------------------------------------

    /// `loop`: re-run the directly connected nodes once per item.
    async fn run_loop(
        &self,
        graph: &WorkflowGraph,
        node: &Node,
        config: &Map<String, Value>,
        ctx: &mut ExecutionContext,
        scope: WalkScope<'_>,
    ) -> Result<NodeOutcome, EngineError> {
        let cfg = LoopConfig::parse(&node.id, config)?;
        let items = cfg.items(ctx)?;
        let total = items.len();
        let limit = cfg.max_iterations.min(self.config.max_loop_iterations);
        let body: HashSet<String> = graph
            .outgoing(&node.id)
            .filter(|edge| edge.source_handle.as_deref() != Some(ERROR_HANDLE))
            .map(|edge| edge.target.clone())
            .collect();

        let sub = WalkScope {
            body: Some(&body),
            nested: true,
            ..scope
        };
        let mut iterations = Vec::new();

        for (index, item) in items.into_iter().take(limit).enumerate() {
            ctx.variables.insert(cfg.item_variable.clone(), item.clone());
            ctx.variables.insert("loop_index".to_string(), json!(index));
            ctx.reset_nodes(&body);
            ctx.node_states
                .insert(node.id.clone(), NodeState::Completed { route: Route::All });

            let outcome = self.walk(graph, ctx, sub).await?;
            if let Some((failed_node, error)) = outcome.failure() {
                skip_unvisited(ctx, graph, &body, scope.chain_id);
                let output = json!({ "iterations": iterations.len(), "total": total, "items": iterations });
                return Ok(NodeOutcome::done(
                    NodeResult::failure("loop", format!("iteration {index} failed at node '{failed_node}': {error}"))
                        .with_output(output),
                ));
            }

            iterations.push(json!({ "index": index, "item": item, "results": ctx.results_for(&body) }));
        }

        skip_unvisited(ctx, graph, &body, scope.chain_id);
        Ok(NodeOutcome::done(NodeResult::success(
            "loop",
            json!({ "iterations": iterations.len(), "total": total, "items": iterations }),
        )))
    }

    /// `retry`: re-run the whole downstream branch until it completes.
    async fn run_retry(
        &self,
        graph: &WorkflowGraph,
        node: &Node,
        config: &Map<String, Value>,
        ctx: &mut ExecutionContext,
        scope: WalkScope<'_>,
    ) -> Result<NodeOutcome, EngineError> {
        let cfg = RetryConfig::parse(&node.id, config)?;
        let attempts = cfg.attempts();
        let body = graph::descendants(graph, &node.id, |edge| edge.source_handle.as_deref() != Some(ERROR_HANDLE));
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            ctx.reset_nodes(&body);
            ctx.node_states
                .insert(node.id.clone(), NodeState::Completed { route: Route::All });

            let sub = WalkScope {
                body: Some(&body),
                nested: true,
                attempt,
                ..scope
            };
            let outcome = self.walk(graph, ctx, sub).await?;
            let Some((failed_node, error)) = outcome.failure() else {
                return Ok(NodeOutcome::done(NodeResult::success(
                    "retry",
                    json!({ "attempts": attempt, "succeeded": true }),
                )));
            };

            tracing::warn!(node_id = %node.id, attempt, max_attempts = attempts, failed_node = %failed_node, error = %error, "retry attempt failed");
            last_error = format!("node '{failed_node}' failed: {error}");

            if attempt < attempts && !ctx.test_mode {
                scope.control.sleep(Duration::from_millis(cfg.retry_delay)).await?;
            }
        }

        skip_unvisited(ctx, graph, &body, scope.chain_id);
        Ok(NodeOutcome::done(
            NodeResult::failure("retry", format!("all {attempts} attempts failed; last error: {last_error}"))
                .with_output(json!({ "attempts": attempts, "succeeded": false })),
        ))
    }

    /// `try_catch`: run the try branch; on failure route to the `catch` handle.
    async fn run_try_catch(
        &self,
        graph: &WorkflowGraph,
        node: &Node,
        ctx: &mut ExecutionContext,
        scope: WalkScope<'_>,
    ) -> Result<NodeOutcome, EngineError> {
        let is_catch = |edge: &Edge| matches!(edge.source_handle.as_deref(), Some(CATCH_HANDLE) | Some(ERROR_HANDLE));
        // Nodes the catch side also reaches are joins; the enclosing walk runs them.
        let catch_branch = graph::descendants(graph, &node.id, is_catch);
        let try_branch: HashSet<String> = graph::descendants(graph, &node.id, |edge| !is_catch(edge))
            .into_iter()
            .filter(|id| !catch_branch.contains(id))
            .collect();
        ctx.node_states
            .insert(node.id.clone(), NodeState::Completed { route: Route::All });

        let sub = WalkScope {
            body: Some(&try_branch),
            nested: true,
            ..scope
        };
        let outcome = self.walk(graph, ctx, sub).await?;

        match outcome.failure() {
            None => Ok(NodeOutcome::done(NodeResult::success("try_catch", json!({ "caught": false })))),
            Some((failed_node, error)) => {
                tracing::info!(node_id = %node.id, failed_node = %failed_node, "try branch failed, running catch branch");
                skip_unvisited(ctx, graph, &try_branch, scope.chain_id);
                Ok(NodeOutcome::routed(
                    NodeResult::success(
                        "try_catch",
                        json!({ "caught": true, "error": error, "failed_node": failed_node }),
                    ),
                    Route::Handle(CATCH_HANDLE.to_string()),
                ))
            }
        }
    }

    // -----------------------------------------------------------------------
    // AI agent
    // -----------------------------------------------------------------------

    /// `ai_agent`: route the input to chains and execute them.
    async fn run_agent(
        &self,
        node: &Node,
        config: &Map<String, Value>,
        ctx: &mut ExecutionContext,
        scope: WalkScope<'_>,
    ) -> Result<NodeOutcome, EngineError> {
        let agent = AgentConfig::parse(&node.id, config)?;
        let depth = scope.depth + 1;
        if depth > self.config.max_chain_depth {
            return Err(EngineError::DepthExceeded {
                depth,
                max: self.config.max_chain_depth,
            });
        }

        let input = agent.input.clone().unwrap_or_else(|| ctx.data.clone());
        let mut tracker = DecisionTracker::default();

        let routed = analyze_and_route(
            &*self.generator,
            &agent,
            &input,
            ctx.test_mode,
            self.config.default_max_concurrency,
        )
        .await;
        let (selection, decision_error) = match routed {
            Ok(selection) => (selection, None),
            Err(e) => {
                tracing::warn!(node_id = %node.id, error = %e, "chain routing failed, continuing with no chains");
                let fallback = ChainSelectionResult {
                    execution_plan: agent.plan(self.config.default_max_concurrency),
                    ..ChainSelectionResult::default()
                };
                (fallback, Some(e.to_string()))
            }
        };
        tracker.advance(DecisionState::Selected);

        if !selection.selected_chains.is_empty() {
            tracker.advance(DecisionState::Executing);
        }
        let executed = execute_chains(self, ctx, &agent.chains, &selection, &input, depth, scope.control).await?;
        tracker.advance(DecisionState::Summarized);

        let success = executed.errors.is_empty() || selection.execution_plan.continue_on_error;
        let mut output = json!({
            "selection": selection,
            "chains": executed.chains,
            "errors": executed.errors,
            "flow_data": executed.flow_data,
            "decision_state": tracker.state(),
        });
        if let Some(error) = &decision_error {
            output["decision_error"] = Value::String(error.clone());
        }

        let mut result = if success {
            NodeResult::success("ai_agent", output)
        } else {
            NodeResult::failure("ai_agent", format!("{} chain(s) failed", executed.errors.len())).with_output(output)
        };
        if let Some(error) = decision_error {
            result = result.with_message(format!("routing failed, no chains executed: {error}"));
        }
        Ok(NodeOutcome::done(result))
    }
}

impl<V, E, G> ChainRunner for WorkflowEngine<V, E, G>
where
    V: VariableStore,
    E: ExecutionStore,
    G: TextGenerator,
{
    fn run_chain<'a>(
        &'a self,
        chain: &'a chainflow_types::chain::ChainDefinition,
        ctx: ExecutionContext,
        depth: usize,
        control: &'a RunControl,
    ) -> ChainFuture<'a> {
        Box::pin(async move {
            let mut ctx = ctx;
            let started = Instant::now();
            tracing::debug!(chain_id = %chain.id, depth, "running chain");

            let scope = WalkScope {
                body: None,
                control,
                depth,
                chain_id: Some(chain.id.as_str()),
                nested: true,
                attempt: 1,
            };
            let outcome = self.walk(&chain.graph, &mut ctx, scope).await?;
            let error = outcome
                .failure()
                .map(|(node_id, error)| format!("node '{node_id}' failed: {error}"));

            let result = ChainResult {
                chain_id: chain.id.clone(),
                chain_name: chain.name.clone(),
                success: error.is_none(),
                output: ctx.last_output(),
                error,
                steps: ctx.steps.clone(),
                duration_ms: started.elapsed().as_millis() as u64,
            };
            Ok((result, ctx))
        })
    }
}

/// Record every node of `ids` that a sub-walk never reached as skipped, in
/// graph order.
fn skip_unvisited(ctx: &mut ExecutionContext, graph: &WorkflowGraph, ids: &HashSet<String>, chain_id: Option<&str>) {
    for node in &graph.nodes {
        if ids.contains(&node.id) && !ctx.node_states.contains_key(&node.id) {
            ctx.record_skipped(&node.id, &node.node_type, chain_id);
        }
    }
}

fn elapsed_ms_since(start: DateTime<Utc>) -> u64 {
    (Utc::now() - start).num_milliseconds().max(0) as u64
}
