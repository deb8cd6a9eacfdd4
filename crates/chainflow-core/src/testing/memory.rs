//! In-memory port implementations for unit tests.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chainflow_types::error::RepositoryError;
use chainflow_types::execution::ExecutionRecord;
use chainflow_types::llm::{GenerationRequest, GenerationResponse, LlmError, StopReason, Usage};
use chainflow_types::testing::{TestRun, TestSuite};
use chainflow_types::webhook::{
    ExternalSubscription, WebhookConfig, WebhookExecution, WebhookExecutionStatus,
};
use chainflow_types::workflow::Node;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::engine::context::ExecutionContext;
use crate::engine::registry::{ActionError, ActionHandler};
use crate::llm::generator::TextGenerator;
use crate::repository::execution::ExecutionStore;
use crate::repository::testing::TestStore;
use crate::repository::variable::VariableStore;
use crate::repository::webhook::WebhookStore;
use crate::webhook::manager::{WebhookError, WebhookLaunch, WebhookSubscriber, WorkflowLauncher};

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryVariableStore {
    unavailable: bool,
    values: Mutex<HashMap<(Uuid, String), Value>>,
}

impl MemoryVariableStore {
    /// A store whose every call fails as if the database were down.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if self.unavailable {
            return Err(RepositoryError::Connection);
        }
        Ok(())
    }
}

impl VariableStore for MemoryVariableStore {
    async fn get_variable(&self, workflow_id: &Uuid, name: &str) -> Result<Option<Value>, RepositoryError> {
        self.check()?;
        Ok(self.values.lock().unwrap().get(&(*workflow_id, name.to_string())).cloned())
    }

    async fn set_variable(&self, workflow_id: &Uuid, name: &str, value: &Value) -> Result<(), RepositoryError> {
        self.check()?;
        self.values
            .lock()
            .unwrap()
            .insert((*workflow_id, name.to_string()), value.clone());
        Ok(())
    }

    async fn list_variables(&self, workflow_id: &Uuid) -> Result<Vec<(String, Value)>, RepositoryError> {
        let mut vars: Vec<(String, Value)> = self
            .values
            .lock()
            .unwrap()
            .iter()
            .filter(|((wf, _), _)| wf == workflow_id)
            .map(|((_, name), value)| (name.clone(), value.clone()))
            .collect();
        vars.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(vars)
    }
}

#[derive(Default)]
pub struct MemoryExecutionStore {
    records: Mutex<HashMap<Uuid, ExecutionRecord>>,
}

impl MemoryExecutionStore {
    pub fn snapshot(&self, id: &Uuid) -> Option<ExecutionRecord> {
        self.records.lock().unwrap().get(id).cloned()
    }
}

impl ExecutionStore for MemoryExecutionStore {
    async fn create_execution(&self, record: &ExecutionRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.lock().unwrap();
        if records.contains_key(&record.id) {
            return Err(RepositoryError::Conflict(format!("execution {} exists", record.id)));
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn update_execution(&self, record: &ExecutionRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.lock().unwrap();
        match records.get_mut(&record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn get_execution(&self, id: &Uuid) -> Result<Option<ExecutionRecord>, RepositoryError> {
        Ok(self.records.lock().unwrap().get(id).cloned())
    }

    async fn list_executions(&self, workflow_id: &Uuid, limit: u32) -> Result<Vec<ExecutionRecord>, RepositoryError> {
        let mut records: Vec<ExecutionRecord> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| &r.workflow_id == workflow_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        records.truncate(limit as usize);
        Ok(records)
    }

    async fn list_executions_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        workflow_id: Option<&Uuid>,
    ) -> Result<Vec<ExecutionRecord>, RepositoryError> {
        let mut records: Vec<ExecutionRecord> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.started_at >= start && r.started_at < end)
            .filter(|r| workflow_id.is_none_or(|id| &r.workflow_id == id))
            .cloned()
            .collect();
        records.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        Ok(records)
    }
}

#[derive(Default)]
pub struct MemoryWebhookStore {
    fail_updates: bool,
    configs: Mutex<HashMap<Uuid, WebhookConfig>>,
    executions: Mutex<Vec<WebhookExecution>>,
}

impl MemoryWebhookStore {
    /// A store whose `update_webhook` always fails.
    pub fn failing_updates() -> Self {
        Self {
            fail_updates: true,
            ..Self::default()
        }
    }

    pub fn config_count(&self) -> usize {
        self.configs.lock().unwrap().len()
    }

    pub fn all_executions(&self) -> Vec<WebhookExecution> {
        self.executions.lock().unwrap().clone()
    }
}

impl WebhookStore for MemoryWebhookStore {
    async fn insert_webhook(&self, config: &WebhookConfig) -> Result<(), RepositoryError> {
        self.configs.lock().unwrap().insert(config.id, config.clone());
        Ok(())
    }

    async fn update_webhook(&self, config: &WebhookConfig) -> Result<(), RepositoryError> {
        if self.fail_updates {
            return Err(RepositoryError::Query("update failed".to_string()));
        }
        let mut configs = self.configs.lock().unwrap();
        if !configs.contains_key(&config.id) {
            return Err(RepositoryError::NotFound);
        }
        configs.insert(config.id, config.clone());
        Ok(())
    }

    async fn get_webhook(&self, id: &Uuid) -> Result<Option<WebhookConfig>, RepositoryError> {
        Ok(self.configs.lock().unwrap().get(id).cloned())
    }

    async fn list_webhooks(&self, workflow_id: &Uuid) -> Result<Vec<WebhookConfig>, RepositoryError> {
        Ok(self
            .configs
            .lock()
            .unwrap()
            .values()
            .filter(|c| &c.workflow_id == workflow_id)
            .cloned()
            .collect())
    }

    async fn delete_webhook(&self, id: &Uuid) -> Result<bool, RepositoryError> {
        Ok(self.configs.lock().unwrap().remove(id).is_some())
    }

    async fn touch_last_triggered(&self, id: &Uuid, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        if let Some(config) = self.configs.lock().unwrap().get_mut(id) {
            config.last_triggered = Some(at);
        }
        Ok(())
    }

    async fn insert_execution(&self, execution: &WebhookExecution) -> Result<(), RepositoryError> {
        self.executions.lock().unwrap().push(execution.clone());
        Ok(())
    }

    async fn update_execution_status(
        &self,
        id: &Uuid,
        status: WebhookExecutionStatus,
        execution_id: Option<&Uuid>,
        error: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let mut executions = self.executions.lock().unwrap();
        let row = executions
            .iter_mut()
            .find(|e| &e.id == id)
            .ok_or(RepositoryError::NotFound)?;
        row.status = status;
        if let Some(execution_id) = execution_id {
            row.execution_id = Some(*execution_id);
        }
        row.error = error.map(str::to_string);
        Ok(())
    }

    async fn list_executions(&self, webhook_id: &Uuid, limit: u32) -> Result<Vec<WebhookExecution>, RepositoryError> {
        let mut rows: Vec<WebhookExecution> = self
            .executions
            .lock()
            .unwrap()
            .iter()
            .filter(|e| &e.webhook_id == webhook_id)
            .cloned()
            .collect();
        rows.reverse();
        rows.truncate(limit as usize);
        Ok(rows)
    }
}

#[derive(Default)]
pub struct MemoryTestStore {
    suites: Mutex<HashMap<Uuid, TestSuite>>,
    runs: Mutex<Vec<TestRun>>,
}

impl TestStore for MemoryTestStore {
    async fn save_suite(&self, suite: &TestSuite) -> Result<(), RepositoryError> {
        self.suites.lock().unwrap().insert(suite.id, suite.clone());
        Ok(())
    }

    async fn get_suite(&self, id: &Uuid) -> Result<Option<TestSuite>, RepositoryError> {
        Ok(self.suites.lock().unwrap().get(id).cloned())
    }

    async fn list_suites(&self, workflow_id: &Uuid) -> Result<Vec<TestSuite>, RepositoryError> {
        Ok(self
            .suites
            .lock()
            .unwrap()
            .values()
            .filter(|s| &s.workflow_id == workflow_id)
            .cloned()
            .collect())
    }

    async fn delete_suite(&self, id: &Uuid) -> Result<bool, RepositoryError> {
        Ok(self.suites.lock().unwrap().remove(id).is_some())
    }

    async fn save_run(&self, run: &TestRun) -> Result<(), RepositoryError> {
        self.runs.lock().unwrap().push(run.clone());
        Ok(())
    }

    async fn list_runs(&self, suite_id: &Uuid, limit: u32) -> Result<Vec<TestRun>, RepositoryError> {
        let mut runs: Vec<TestRun> = self
            .runs
            .lock()
            .unwrap()
            .iter()
            .filter(|r| &r.suite_id == suite_id)
            .cloned()
            .collect();
        runs.reverse();
        runs.truncate(limit as usize);
        Ok(runs)
    }
}

// ---------------------------------------------------------------------------
// Text generator
// ---------------------------------------------------------------------------

/// Replays queued replies in order and records every request.
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<GenerationRequest>>,
    always_fail: bool,
}

impl ScriptedGenerator {
    pub fn new(replies: Vec<Result<String, String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
            always_fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            always_fail: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl TextGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted-1"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.always_fail {
            return Err(LlmError::Provider {
                message: "HTTP 500: upstream unavailable".to_string(),
            });
        }
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Ok(text)) => Ok(GenerationResponse {
                text,
                model: request.model.clone(),
                stop_reason: StopReason::EndTurn,
                usage: Usage::default(),
            }),
            Some(Err(message)) => Err(LlmError::Provider { message }),
            None => Err(LlmError::Provider {
                message: "no scripted reply left".to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Action handlers
// ---------------------------------------------------------------------------

/// Sleeps briefly and records how many invocations overlap.
#[derive(Default)]
pub struct ConcurrencyGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl ConcurrencyGauge {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ActionHandler for std::sync::Arc<ConcurrencyGauge> {
    fn node_type(&self) -> &str {
        "gauge"
    }

    async fn execute(&self, node: &Node, _ctx: &ExecutionContext) -> Result<Value, ActionError> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(json!({ "node": node.id }))
    }
}

/// Fails until its `succeed_on` call, then succeeds.
pub struct FlakyAction {
    succeed_on: usize,
    calls: AtomicUsize,
}

impl FlakyAction {
    pub fn new(succeed_on: usize) -> Self {
        Self {
            succeed_on,
            calls: AtomicUsize::new(0),
        }
    }
}

impl ActionHandler for FlakyAction {
    fn node_type(&self) -> &str {
        "flaky"
    }

    async fn execute(&self, _node: &Node, _ctx: &ExecutionContext) -> Result<Value, ActionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call < self.succeed_on {
            return Err(ActionError::Provider(format!("transient failure on call {call}")));
        }
        Ok(json!({ "call": call }))
    }
}

/// Echoes its resolved config back as output.
pub struct EchoAction;

impl ActionHandler for EchoAction {
    fn node_type(&self) -> &str {
        "echo"
    }

    async fn execute(&self, node: &Node, _ctx: &ExecutionContext) -> Result<Value, ActionError> {
        Ok(Value::Object(node.config.clone()))
    }
}

// ---------------------------------------------------------------------------
// Webhook collaborators
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingSubscriber {
    pub fail_subscribe: bool,
    subscribed: Mutex<Vec<Uuid>>,
    unsubscribed: Mutex<Vec<String>>,
}

impl RecordingSubscriber {
    pub fn failing() -> Self {
        Self {
            fail_subscribe: true,
            ..Self::default()
        }
    }

    pub fn subscribed(&self) -> Vec<Uuid> {
        self.subscribed.lock().unwrap().clone()
    }

    pub fn unsubscribed(&self) -> Vec<String> {
        self.unsubscribed.lock().unwrap().clone()
    }
}

impl WebhookSubscriber for RecordingSubscriber {
    async fn subscribe(&self, config: &WebhookConfig) -> Result<ExternalSubscription, WebhookError> {
        if self.fail_subscribe {
            return Err(WebhookError::Registration("provider rejected watch request".to_string()));
        }
        self.subscribed.lock().unwrap().push(config.id);
        Ok(ExternalSubscription {
            external_id: format!("watch-{}", config.id),
            expires_at: None,
        })
    }

    async fn unsubscribe(&self, config: &WebhookConfig) -> Result<(), WebhookError> {
        if let Some(external_id) = config.external_id() {
            self.unsubscribed.lock().unwrap().push(external_id.to_string());
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingLauncher {
    launches: Mutex<Vec<WebhookLaunch>>,
}

impl RecordingLauncher {
    pub fn launches(&self) -> Vec<WebhookLaunch> {
        self.launches.lock().unwrap().clone()
    }
}

impl WorkflowLauncher for RecordingLauncher {
    async fn launch(&self, launch: WebhookLaunch) -> Result<(), WebhookError> {
        self.launches.lock().unwrap().push(launch);
        Ok(())
    }
}
