//! Configuration loader for chainflow.
//!
//! Reads `config.toml` from the data directory (`~/.chainflow/` unless
//! `CHAINFLOW_DATA_DIR` says otherwise) and deserializes it into
//! [`ChainflowConfig`]. Falls back to defaults when the file is missing or
//! malformed.

use std::path::{Path, PathBuf};

use chainflow_types::config::ChainflowConfig;
use secrecy::SecretString;

/// Environment variable that overrides the data directory.
pub const DATA_DIR_ENV: &str = "CHAINFLOW_DATA_DIR";

/// Resolve the data directory: `CHAINFLOW_DATA_DIR`, else `~/.chainflow`.
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".chainflow")
}

/// Load configuration from `{data_dir}/config.toml`.
///
/// - Missing file: [`ChainflowConfig::default()`].
/// - Unparseable file: logs a warning and returns the default.
pub async fn load_config(data_dir: &Path) -> ChainflowConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return ChainflowConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return ChainflowConfig::default();
        }
    };

    match toml::from_str::<ChainflowConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", config_path.display());
            ChainflowConfig::default()
        }
    }
}

/// Database URL: the configured one, else `sqlite://{data_dir}/chainflow.db?mode=rwc`.
pub fn database_url(config: &ChainflowConfig, data_dir: &Path) -> String {
    match &config.database.url {
        Some(url) => url.clone(),
        None => format!("sqlite://{}?mode=rwc", data_dir.join("chainflow.db").display()),
    }
}

/// Read the LLM API key from the environment variable named in `[llm]`.
///
/// Returns `None` when the variable is unset or empty.
pub fn llm_api_key(config: &ChainflowConfig) -> Option<SecretString> {
    std::env::var(&config.llm.api_key_env)
        .ok()
        .filter(|key| !key.trim().is_empty())
        .map(SecretString::from)
}
