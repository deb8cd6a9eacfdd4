//! Text generator implementations.
//!
//! [`build_generator`] picks the provider at startup: Anthropic when an API
//! key is available, otherwise [`UnconfiguredGenerator`], which fails every
//! call so AI nodes report a clear error instead of the process refusing to
//! start.

pub mod anthropic;

use chainflow_core::llm::box_generator::BoxTextGenerator;
use chainflow_core::llm::generator::TextGenerator;
use chainflow_types::config::LlmConfig;
use chainflow_types::llm::{GenerationRequest, GenerationResponse, LlmError};
use secrecy::SecretString;

use self::anthropic::AnthropicGenerator;

/// Placeholder generator used when no API key is configured.
#[derive(Debug, Clone, Default)]
pub struct UnconfiguredGenerator;

impl TextGenerator for UnconfiguredGenerator {
    fn name(&self) -> &str {
        "unconfigured"
    }

    fn default_model(&self) -> &str {
        ""
    }

    async fn generate(&self, _request: &GenerationRequest) -> Result<GenerationResponse, LlmError> {
        Err(LlmError::NotConfigured)
    }
}

/// Build the process-wide text generator from config and an optional key.
pub fn build_generator(config: &LlmConfig, api_key: Option<SecretString>) -> Result<BoxTextGenerator, LlmError> {
    match api_key {
        Some(key) => {
            tracing::info!(model = %config.model, "using anthropic text generator");
            Ok(BoxTextGenerator::new(AnthropicGenerator::from_config(config, key)?))
        }
        None => {
            tracing::warn!(
                env = %config.api_key_env,
                "no LLM API key set; AI nodes and live chain routing will fail"
            );
            Ok(BoxTextGenerator::new(UnconfiguredGenerator))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_generator_always_fails() {
        let err = UnconfiguredGenerator
            .generate(&GenerationRequest::new("hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured));
    }

    #[test]
    fn test_build_generator_picks_provider() {
        let config = LlmConfig::default();

        let without_key = build_generator(&config, None).unwrap();
        assert_eq!(without_key.name(), "unconfigured");

        let with_key = build_generator(&config, Some(SecretString::from("sk-test"))).unwrap();
        assert_eq!(with_key.name(), "anthropic");
        assert_eq!(with_key.default_model(), config.model);
    }
}
