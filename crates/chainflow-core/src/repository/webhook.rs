//! Webhook configuration and delivery log storage.

use chainflow_types::error::RepositoryError;
use chainflow_types::webhook::{WebhookConfig, WebhookExecution, WebhookExecutionStatus};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Repository trait for webhook configs and their execution log.
pub trait WebhookStore: Send + Sync {
    // -----------------------------------------------------------------------
    // Configs
    // -----------------------------------------------------------------------

    fn insert_webhook(
        &self,
        config: &WebhookConfig,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Overwrite status, config, and metadata of an existing webhook.
    fn update_webhook(
        &self,
        config: &WebhookConfig,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get_webhook(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<WebhookConfig>, RepositoryError>> + Send;

    fn list_webhooks(
        &self,
        workflow_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<WebhookConfig>, RepositoryError>> + Send;

    /// Delete a webhook by ID. Returns `true` if it existed.
    fn delete_webhook(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    fn touch_last_triggered(
        &self,
        id: &Uuid,
        at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Executions
    // -----------------------------------------------------------------------

    fn insert_execution(
        &self,
        execution: &WebhookExecution,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Set the final status of a delivery once the launched run finishes.
    fn update_execution_status(
        &self,
        id: &Uuid,
        status: WebhookExecutionStatus,
        execution_id: Option<&Uuid>,
        error: Option<&str>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// List deliveries for a webhook, newest first.
    fn list_executions(
        &self,
        webhook_id: &Uuid,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<WebhookExecution>, RepositoryError>> + Send;
}
