//! AnthropicGenerator -- [`TextGenerator`] backed by the Anthropic Messages API.
//!
//! The API key is a [`SecretString`] and is only exposed while building the
//! request headers.

use std::time::Duration;

use chainflow_core::llm::generator::TextGenerator;
use chainflow_types::config::LlmConfig;
use chainflow_types::llm::{GenerationRequest, GenerationResponse, LlmError, StopReason, Usage};
use secrecy::{ExposeSecret, SecretString};

use super::types::{MessageParam, MessagesRequest, MessagesResponse};

/// Anthropic text generator.
///
/// Deliberately not `Debug`.
pub struct AnthropicGenerator {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    temperature: Option<f64>,
}

impl AnthropicGenerator {
    const API_VERSION: &'static str = "2023-06-01";

    pub fn new(api_key: SecretString, model: impl Into<String>) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| LlmError::Provider {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_key,
            base_url: "https://api.anthropic.com".to_string(),
            model: model.into(),
            temperature: None,
        })
    }

    /// Build a generator from the `[llm]` config section.
    pub fn from_config(config: &LlmConfig, api_key: SecretString) -> Result<Self, LlmError> {
        Ok(Self::new(api_key, config.model.clone())?
            .with_base_url(config.base_url.clone())
            .with_default_temperature(config.temperature))
    }

    /// Override the base URL (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Temperature used when a request does not set one.
    pub fn with_default_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn to_messages_request(&self, request: &GenerationRequest) -> MessagesRequest {
        let model = if request.model.is_empty() {
            self.model.clone()
        } else {
            request.model.clone()
        };

        MessagesRequest {
            model,
            max_tokens: request.max_tokens,
            messages: vec![MessageParam {
                role: "user".to_string(),
                content: request.user_prompt.clone(),
            }],
            system: request.system_prompt.clone(),
            temperature: request.temperature.or(self.temperature),
        }
    }
}

impl TextGenerator for AnthropicGenerator {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let body = self.to_messages_request(request);
        let url = format!("{}/v1/messages", self.base_url);

        tracing::debug!(model = %body.model, max_tokens = body.max_tokens, "anthropic generate");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", Self::API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Provider {
                message: format!("HTTP request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_ms = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000);
            let error_body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 => LlmError::AuthenticationFailed,
                429 => LlmError::RateLimited { retry_after_ms },
                529 => LlmError::Overloaded(error_body),
                _ => LlmError::Provider {
                    message: format!("HTTP {status}: {error_body}"),
                },
            });
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Deserialization(format!("failed to parse response: {e}")))?;

        let stop_reason = parsed
            .stop_reason
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(StopReason::EndTurn);

        Ok(GenerationResponse {
            text: parsed.text(),
            model: parsed.model,
            stop_reason,
            usage: Usage {
                input_tokens: parsed.usage.input_tokens,
                output_tokens: parsed.usage.output_tokens,
            },
        })
    }
}
