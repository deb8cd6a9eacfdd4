//! HttpWebhookSubscriber -- delegates provider-side watches to a connector
//! relay over HTTP.
//!
//! - `POST {base}/subscriptions` with the webhook's provider, trigger, URL and
//!   config; the relay answers `{external_id, expires_at?}`.
//! - `DELETE {base}/subscriptions/{external_id}` tears the watch down.
//!
//! Without a configured relay every `subscribe` fails with a registration
//! error, so only triggers that need no subscription can be registered.

use std::time::Duration;

use chainflow_core::webhook::manager::{WebhookError, WebhookSubscriber};
use chainflow_types::webhook::{ExternalSubscription, WebhookConfig};
use serde_json::json;

pub struct HttpWebhookSubscriber {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl HttpWebhookSubscriber {
    pub fn new(base_url: Option<String>) -> Result<Self, WebhookError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| WebhookError::Registration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.map(|url| url.trim_end_matches('/').to_string()),
        })
    }

    fn base_url(&self, provider_id: &str) -> Result<&str, WebhookError> {
        self.base_url.as_deref().ok_or_else(|| {
            WebhookError::Registration(format!(
                "provider '{provider_id}' needs an external subscription but no [webhooks] subscription_url is configured"
            ))
        })
    }
}

impl WebhookSubscriber for HttpWebhookSubscriber {
    async fn subscribe(&self, config: &WebhookConfig) -> Result<ExternalSubscription, WebhookError> {
        let url = format!("{}/subscriptions", self.base_url(&config.provider_id)?);
        let body = json!({
            "webhook_id": config.id,
            "provider_id": config.provider_id,
            "trigger_type": config.trigger_type,
            "webhook_url": config.webhook_url,
            "secret": config.secret,
            "config": config.config,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| WebhookError::Registration(format!("subscription request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(WebhookError::Registration(format!(
                "subscription relay returned HTTP {status}: {error_body}"
            )));
        }

        let subscription: ExternalSubscription = response
            .json()
            .await
            .map_err(|e| WebhookError::Registration(format!("invalid subscription response: {e}")))?;

        tracing::info!(
            webhook_id = %config.id,
            provider = %config.provider_id,
            external_id = %subscription.external_id,
            "external subscription created"
        );
        Ok(subscription)
    }

    async fn unsubscribe(&self, config: &WebhookConfig) -> Result<(), WebhookError> {
        let Some(external_id) = config.external_id() else {
            return Ok(());
        };
        let url = format!("{}/subscriptions/{external_id}", self.base_url(&config.provider_id)?);

        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| WebhookError::Registration(format!("unsubscribe request failed: {e}")))?;

        let status = response.status();
        // Already gone on the relay side counts as success.
        if status.is_success() || status.as_u16() == 404 {
            return Ok(());
        }
        Err(WebhookError::Registration(format!("subscription relay returned HTTP {status}")))
    }
}
