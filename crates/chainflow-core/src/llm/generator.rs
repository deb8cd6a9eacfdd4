//! TextGenerator trait definition.
//!
//! The single reasoning call the engine makes: AI actions, chain routing
//! decisions, and `AI_FIELD` placeholders all go through `generate`.

use chainflow_types::llm::{GenerationRequest, GenerationResponse, LlmError};

/// Trait for text generation backends.
///
/// Implementations live in chainflow-infra (e.g., `AnthropicGenerator`).
pub trait TextGenerator: Send + Sync {
    /// Human-readable provider name (e.g., "anthropic").
    fn name(&self) -> &str;

    /// Model used when a request leaves `model` empty.
    fn default_model(&self) -> &str;

    /// Send a generation request and receive the full response.
    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> impl std::future::Future<Output = Result<GenerationResponse, LlmError>> + Send;
}
