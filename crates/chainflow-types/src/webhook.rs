//! Webhook trigger types: registered subscriptions and their delivery log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Lifecycle status of a webhook registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookStatus {
    /// Row inserted, external subscription not yet confirmed.
    Pending,
    Active,
    /// Switched off by the owner; deliveries are refused until re-enabled.
    Disabled,
    Error,
}

impl std::fmt::Display for WebhookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebhookStatus::Pending => write!(f, "pending"),
            WebhookStatus::Active => write!(f, "active"),
            WebhookStatus::Disabled => write!(f, "disabled"),
            WebhookStatus::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for WebhookStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(WebhookStatus::Pending),
            "active" => Ok(WebhookStatus::Active),
            "disabled" => Ok(WebhookStatus::Disabled),
            "error" => Ok(WebhookStatus::Error),
            other => Err(format!("invalid webhook status: '{other}'")),
        }
    }
}

/// A persisted webhook registration for one (workflow, provider, trigger type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub user_id: String,
    pub trigger_type: String,
    pub provider_id: String,
    pub webhook_url: String,
    /// Shared secret for HMAC signature verification. Never serialized to API clients.
    #[serde(skip_serializing, default)]
    pub secret: String,
    pub status: WebhookStatus,
    /// Trigger-specific configuration (label filters, base IDs, ...).
    #[serde(default)]
    pub config: Map<String, Value>,
    /// External subscription bookkeeping (`external_id`, `expires_at`).
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_triggered: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl WebhookConfig {
    /// ID of the provider-side subscription, if one was created.
    pub fn external_id(&self) -> Option<&str> {
        self.metadata.get("external_id").and_then(Value::as_str)
    }
}

/// Request to register a new webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterWebhook {
    pub workflow_id: Uuid,
    #[serde(default)]
    pub user_id: String,
    pub trigger_type: String,
    pub provider_id: String,
    #[serde(default)]
    pub config: Map<String, Value>,
}

/// Partial update of a registration. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateWebhook {
    /// Only `active` and `disabled` may be set by clients.
    #[serde(default)]
    pub status: Option<WebhookStatus>,
    /// Replaces the trigger configuration wholesale.
    #[serde(default)]
    pub config: Option<Map<String, Value>>,
}

/// What a provider returns after creating an external subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalSubscription {
    pub external_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Outcome of one inbound delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookExecutionStatus {
    /// Signature valid, workflow launched.
    Accepted,
    /// Signature invalid; no workflow ran.
    Rejected,
    Completed,
    Failed,
}

impl std::fmt::Display for WebhookExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebhookExecutionStatus::Accepted => write!(f, "accepted"),
            WebhookExecutionStatus::Rejected => write!(f, "rejected"),
            WebhookExecutionStatus::Completed => write!(f, "completed"),
            WebhookExecutionStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for WebhookExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accepted" => Ok(WebhookExecutionStatus::Accepted),
            "rejected" => Ok(WebhookExecutionStatus::Rejected),
            "completed" => Ok(WebhookExecutionStatus::Completed),
            "failed" => Ok(WebhookExecutionStatus::Failed),
            other => Err(format!("invalid webhook execution status: '{other}'")),
        }
    }
}

/// Log row for one inbound webhook delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookExecution {
    pub id: Uuid,
    pub webhook_id: Uuid,
    pub workflow_id: Uuid,
    pub trigger_type: String,
    pub status: WebhookExecutionStatus,
    /// Normalized trigger data (raw payload for rejected deliveries).
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Workflow execution started by this delivery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
