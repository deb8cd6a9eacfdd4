//! Starts webhook-triggered runs in the background.

use std::sync::Arc;

use chainflow_core::repository::webhook::WebhookStore;
use chainflow_core::repository::workflow::WorkflowStore;
use chainflow_core::webhook::manager::{WebhookError, WebhookLaunch, WorkflowLauncher};
use chainflow_infra::sqlite::webhook::SqliteWebhookStore;
use chainflow_infra::sqlite::workflow::SqliteWorkflowStore;
use chainflow_types::execution::ExecutionRequest;
use chainflow_types::webhook::WebhookExecutionStatus;

use crate::state::ConcreteEngine;

/// [`WorkflowLauncher`] that spawns the engine on the tokio runtime and
/// records the delivery's final status when the run ends.
pub struct EngineLauncher {
    engine: Arc<ConcreteEngine>,
    workflows: Arc<SqliteWorkflowStore>,
    webhooks: Arc<SqliteWebhookStore>,
}

impl EngineLauncher {
    pub fn new(
        engine: Arc<ConcreteEngine>,
        workflows: Arc<SqliteWorkflowStore>,
        webhooks: Arc<SqliteWebhookStore>,
    ) -> Self {
        Self {
            engine,
            workflows,
            webhooks,
        }
    }
}

impl WorkflowLauncher for EngineLauncher {
    async fn launch(&self, launch: WebhookLaunch) -> Result<(), WebhookError> {
        let workflow = self
            .workflows
            .get_workflow(&launch.workflow_id)
            .await?
            .ok_or_else(|| WebhookError::Launch(format!("workflow {} not found", launch.workflow_id)))?;

        let mut request = ExecutionRequest::new(workflow.id, workflow.graph, launch.trigger_data);
        request.user_id = launch.user_id;
        request.execution_id = Some(launch.execution_id);
        request.source = "webhook".to_string();

        let engine = Arc::clone(&self.engine);
        let webhooks = Arc::clone(&self.webhooks);
        let delivery_id = launch.webhook_execution_id;
        let execution_id = launch.execution_id;

        tokio::spawn(async move {
            let (status, error) = match engine.execute(request).await {
                Ok(summary) if summary.success => (WebhookExecutionStatus::Completed, None),
                Ok(summary) => (WebhookExecutionStatus::Failed, summary.error),
                Err(e) => {
                    tracing::error!(execution_id = %execution_id, error = %e, "webhook-triggered run failed");
                    (WebhookExecutionStatus::Failed, Some(e.to_string()))
                }
            };

            if let Err(e) = webhooks
                .update_execution_status(&delivery_id, status, Some(&execution_id), error.as_deref())
                .await
            {
                tracing::warn!(webhook_execution_id = %delivery_id, error = %e, "failed to record delivery outcome");
            }
        });

        Ok(())
    }
}
