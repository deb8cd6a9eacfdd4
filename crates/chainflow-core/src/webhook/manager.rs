//! Webhook trigger manager: registration, verified delivery, and cleanup.
//!
//! Delivery is fire-and-forget. The manager verifies and logs the request,
//! then hands it to a `WorkflowLauncher`, which starts the run in the
//! background and later marks the delivery `completed` or `failed`.

use std::sync::Arc;

use chainflow_types::error::RepositoryError;
use chainflow_types::webhook::{
    ExternalSubscription, RegisterWebhook, UpdateWebhook, WebhookConfig, WebhookExecution, WebhookExecutionStatus,
    WebhookStatus,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{Value, json};
use uuid::Uuid;

use super::catalog::find_trigger;
use super::signature::{WebhookHeaders, verify_signature};
use super::transform::transform_payload;
use crate::repository::webhook::WebhookStore;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("provider '{provider_id}' trigger '{trigger_type}' does not support webhooks")]
    UnsupportedTrigger { provider_id: String, trigger_type: String },

    #[error("webhook not found: {0}")]
    NotFound(String),

    #[error("invalid webhook signature: {0}")]
    InvalidSignature(String),

    #[error("webhook registration failed: {0}")]
    Registration(String),

    #[error("invalid webhook update: {0}")]
    InvalidUpdate(String),

    #[error("workflow launch failed: {0}")]
    Launch(String),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// Creates and removes provider-side subscriptions (watch channels,
/// webhook registrations) for triggers that need them.
pub trait WebhookSubscriber: Send + Sync {
    fn subscribe(
        &self,
        config: &WebhookConfig,
    ) -> impl std::future::Future<Output = Result<ExternalSubscription, WebhookError>> + Send;

    fn unsubscribe(
        &self,
        config: &WebhookConfig,
    ) -> impl std::future::Future<Output = Result<(), WebhookError>> + Send;
}

/// Everything needed to start the workflow a webhook delivery targets.
#[derive(Debug, Clone)]
pub struct WebhookLaunch {
    pub webhook_execution_id: Uuid,
    pub webhook_id: Uuid,
    pub workflow_id: Uuid,
    pub user_id: String,
    pub trigger_type: String,
    /// Pre-assigned so the HTTP response can report it.
    pub execution_id: Uuid,
    pub trigger_data: Value,
}

/// Starts a workflow run for a verified delivery without waiting for it.
pub trait WorkflowLauncher: Send + Sync {
    fn launch(&self, launch: WebhookLaunch) -> impl std::future::Future<Output = Result<(), WebhookError>> + Send;
}

/// Result of an accepted delivery.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookDelivery {
    pub webhook_execution_id: Uuid,
    pub execution_id: Uuid,
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

pub struct WebhookTriggerManager<S: WebhookStore, X: WebhookSubscriber, L: WorkflowLauncher> {
    store: Arc<S>,
    subscriber: Arc<X>,
    launcher: Arc<L>,
    public_url: String,
}

impl<S, X, L> WebhookTriggerManager<S, X, L>
where
    S: WebhookStore,
    X: WebhookSubscriber,
    L: WorkflowLauncher,
{
    pub fn new(store: Arc<S>, subscriber: Arc<X>, launcher: Arc<L>, public_url: impl Into<String>) -> Self {
        Self {
            store,
            subscriber,
            launcher,
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Register a webhook trigger for a workflow.
    ///
    /// Triggers that need a provider subscription are only kept when the
    /// subscription succeeds; otherwise the row is removed again.
    pub async fn register_webhook(&self, request: RegisterWebhook) -> Result<Uuid, WebhookError> {
        let Some(trigger) = find_trigger(&request.provider_id, &request.trigger_type) else {
            return Err(WebhookError::UnsupportedTrigger {
                provider_id: request.provider_id,
                trigger_type: request.trigger_type,
            });
        };

        let id = Uuid::now_v7();
        let mut config = WebhookConfig {
            id,
            workflow_id: request.workflow_id,
            user_id: request.user_id,
            webhook_url: format!("{}/webhooks/{}?id={id}", self.public_url, request.provider_id),
            trigger_type: request.trigger_type,
            provider_id: request.provider_id,
            secret: generate_secret(),
            status: WebhookStatus::Pending,
            config: request.config,
            metadata: Default::default(),
            last_triggered: None,
            created_at: Utc::now(),
        };
        self.store.insert_webhook(&config).await?;

        if trigger.requires_subscription {
            match self.subscriber.subscribe(&config).await {
                Ok(subscription) => {
                    config
                        .metadata
                        .insert("external_id".to_string(), Value::String(subscription.external_id));
                    if let Some(expires_at) = subscription.expires_at {
                        config
                            .metadata
                            .insert("expires_at".to_string(), Value::String(expires_at.to_rfc3339()));
                    }
                }
                Err(e) => {
                    tracing::warn!(webhook_id = %id, provider = %config.provider_id, error = %e, "provider subscription failed, removing webhook");
                    if let Err(delete_err) = self.store.delete_webhook(&id).await {
                        tracing::warn!(webhook_id = %id, error = %delete_err, "failed to remove webhook after subscription failure");
                    }
                    return Err(match e {
                        WebhookError::Registration(message) => WebhookError::Registration(message),
                        other => WebhookError::Registration(other.to_string()),
                    });
                }
            }
        }

        config.status = WebhookStatus::Active;
        if let Err(e) = self.store.update_webhook(&config).await {
            tracing::warn!(webhook_id = %id, error = %e, "failed to activate webhook, rolling back registration");
            self.teardown(&config).await;
            return Err(e.into());
        }

        tracing::info!(
            webhook_id = %id,
            workflow_id = %config.workflow_id,
            provider = %config.provider_id,
            trigger_type = %config.trigger_type,
            "registered webhook trigger"
        );
        Ok(id)
    }

    /// Verify and accept one delivery, then launch the workflow.
    pub async fn process_webhook_payload(
        &self,
        webhook_id: Uuid,
        provider: &str,
        body: &[u8],
        headers: &WebhookHeaders,
    ) -> Result<WebhookDelivery, WebhookError> {
        let config = self
            .store
            .get_webhook(&webhook_id)
            .await?
            .filter(|c| c.provider_id == provider && c.status == WebhookStatus::Active)
            .ok_or_else(|| WebhookError::NotFound(webhook_id.to_string()))?;

        let payload = parse_body(body);

        if let Err(e) = verify_signature(provider, &config.secret, body, headers) {
            tracing::warn!(webhook_id = %webhook_id, provider, error = %e, "rejected webhook delivery");
            let rejected = delivery_row(&config, WebhookExecutionStatus::Rejected, payload, None);
            let rejected = WebhookExecution {
                error: Some(e.to_string()),
                ..rejected
            };
            self.store.insert_execution(&rejected).await?;
            return Err(WebhookError::InvalidSignature(e.to_string()));
        }

        let trigger_data = transform_payload(&config.trigger_type, &payload);
        let now = Utc::now();
        self.store.touch_last_triggered(&webhook_id, now).await?;

        let execution_id = Uuid::now_v7();
        let accepted = delivery_row(&config, WebhookExecutionStatus::Accepted, payload, Some(execution_id));
        self.store.insert_execution(&accepted).await?;

        let launch = WebhookLaunch {
            webhook_execution_id: accepted.id,
            webhook_id,
            workflow_id: config.workflow_id,
            user_id: config.user_id.clone(),
            trigger_type: config.trigger_type.clone(),
            execution_id,
            trigger_data,
        };
        if let Err(e) = self.launcher.launch(launch).await {
            tracing::error!(webhook_id = %webhook_id, error = %e, "failed to launch workflow for webhook");
            self.store
                .update_execution_status(&accepted.id, WebhookExecutionStatus::Failed, None, Some(&e.to_string()))
                .await?;
            return Err(e);
        }

        tracing::info!(
            webhook_id = %webhook_id,
            workflow_id = %config.workflow_id,
            execution_id = %execution_id,
            "accepted webhook delivery"
        );
        Ok(WebhookDelivery {
            webhook_execution_id: accepted.id,
            execution_id,
        })
    }

    /// Enable, disable, or reconfigure a registration. The provider-side
    /// subscription is left in place; a disabled webhook refuses deliveries.
    pub async fn update_webhook(&self, webhook_id: &Uuid, update: UpdateWebhook) -> Result<WebhookConfig, WebhookError> {
        let mut config = self
            .store
            .get_webhook(webhook_id)
            .await?
            .ok_or_else(|| WebhookError::NotFound(webhook_id.to_string()))?;

        if let Some(status) = update.status {
            if !matches!(status, WebhookStatus::Active | WebhookStatus::Disabled) {
                return Err(WebhookError::InvalidUpdate(format!(
                    "status can only be set to 'active' or 'disabled', got '{status}'"
                )));
            }
            if config.status == WebhookStatus::Pending {
                return Err(WebhookError::InvalidUpdate("registration has not completed".to_string()));
            }
            config.status = status;
        }
        if let Some(trigger_config) = update.config {
            config.config = trigger_config;
        }

        self.store.update_webhook(&config).await?;
        tracing::info!(webhook_id = %webhook_id, status = %config.status, "updated webhook trigger");
        Ok(config)
    }

    /// Best-effort removal of one webhook. Failures are logged, never returned.
    pub async fn unregister_webhook(&self, webhook_id: &Uuid) {
        match self.store.get_webhook(webhook_id).await {
            Ok(Some(config)) => self.teardown(&config).await,
            Ok(None) => tracing::debug!(webhook_id = %webhook_id, "webhook already removed"),
            Err(e) => tracing::warn!(webhook_id = %webhook_id, error = %e, "failed to load webhook for removal"),
        }
    }

    /// Best-effort removal of every webhook of a workflow.
    pub async fn unregister_workflow_webhooks(&self, workflow_id: &Uuid) {
        match self.store.list_webhooks(workflow_id).await {
            Ok(configs) => {
                for config in configs {
                    self.teardown(&config).await;
                }
            }
            Err(e) => tracing::warn!(workflow_id = %workflow_id, error = %e, "failed to list webhooks for removal"),
        }
    }

    pub async fn list_webhooks(&self, workflow_id: &Uuid) -> Result<Vec<WebhookConfig>, WebhookError> {
        Ok(self.store.list_webhooks(workflow_id).await?)
    }

    pub async fn get_webhook(&self, webhook_id: &Uuid) -> Result<Option<WebhookConfig>, WebhookError> {
        Ok(self.store.get_webhook(webhook_id).await?)
    }

    pub async fn list_executions(&self, webhook_id: &Uuid, limit: u32) -> Result<Vec<WebhookExecution>, WebhookError> {
        Ok(self.store.list_executions(webhook_id, limit).await?)
    }

    async fn teardown(&self, config: &WebhookConfig) {
        if config.external_id().is_some() {
            if let Err(e) = self.subscriber.unsubscribe(config).await {
                tracing::warn!(webhook_id = %config.id, provider = %config.provider_id, error = %e, "provider unsubscribe failed");
            }
        }
        match self.store.delete_webhook(&config.id).await {
            Ok(_) => tracing::info!(webhook_id = %config.id, "unregistered webhook trigger"),
            Err(e) => tracing::warn!(webhook_id = %config.id, error = %e, "failed to delete webhook"),
        }
    }
}

fn generate_secret() -> String {
    format!("whsec_{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

/// JSON bodies parse as-is; anything else is kept as text under `raw`.
fn parse_body(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap_or_else(|_| json!({ "raw": String::from_utf8_lossy(body) }))
}

fn delivery_row(
    config: &WebhookConfig,
    status: WebhookExecutionStatus,
    payload: Value,
    execution_id: Option<Uuid>,
) -> WebhookExecution {
    WebhookExecution {
        id: Uuid::now_v7(),
        webhook_id: config.id,
        workflow_id: config.workflow_id,
        trigger_type: config.trigger_type.clone(),
        status,
        payload,
        error: None,
        execution_id,
        created_at: Utc::now(),
    }
}
