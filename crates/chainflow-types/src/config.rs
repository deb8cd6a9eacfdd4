//! Global configuration types for chainflow.
//!
//! `ChainflowConfig` represents the top-level `config.toml`. Every field has
//! a default, so an empty or missing file yields a working configuration.

use serde::{Deserialize, Serialize};

/// Top-level configuration, loaded from `~/.chainflow/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChainflowConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub webhooks: WebhooksConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Externally reachable base URL used when building webhook URLs.
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_public_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: default_public_url(),
        }
    }
}

/// Workflow engine limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum nesting of AI agent chains within chains.
    #[serde(default = "default_max_chain_depth")]
    pub max_chain_depth: usize,
    /// Used when an agent's execution plan does not specify one.
    #[serde(default = "default_max_concurrency")]
    pub default_max_concurrency: usize,
    /// Wall-clock budget for one run; exceeding it fails the run at the next node boundary.
    #[serde(default = "default_max_run_duration_secs")]
    pub max_run_duration_secs: u64,
    /// Upper bound applied on top of each loop node's own `max_iterations`.
    #[serde(default = "default_max_loop_iterations")]
    pub max_loop_iterations: usize,
}

fn default_max_chain_depth() -> usize {
    5
}

fn default_max_concurrency() -> usize {
    3
}

fn default_max_run_duration_secs() -> u64 {
    900
}

fn default_max_loop_iterations() -> usize {
    1000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_chain_depth: default_max_chain_depth(),
            default_max_concurrency: default_max_concurrency(),
            max_run_duration_secs: default_max_run_duration_secs(),
            max_loop_iterations: default_max_loop_iterations(),
        }
    }
}

/// Text-generation provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key. The key itself never lives in the file.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_temperature() -> f64 {
    0.3
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
        }
    }
}

/// Database location. `None` means `{data_dir}/chainflow.db`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Provider subscription relay for triggers that need an external watch.
///
/// Chainflow does not talk to provider APIs itself. Subscriptions are
/// delegated to a connector service at `subscription_url`; without one,
/// registering a subscription-backed trigger fails.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhooksConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_url: Option<String>,
}
