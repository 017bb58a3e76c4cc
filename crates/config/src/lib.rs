//! Configuration loading, validation, and management for RagRelay.
//!
//! Loads configuration from `~/.ragrelay/config.toml` with environment
//! variable overrides. Validates all settings at startup. The agent/toolset
//! catalog lives in a separate file, see [`catalog`].

pub mod catalog;

pub use catalog::{Catalog, CatalogAgent};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.ragrelay/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Provider used for model identifiers without a provider prefix
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Context assembly settings
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Vector search backend
    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    /// Execution engine settings
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Webhook tool settings
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Path of the agent/toolset catalog file
    #[serde(default = "default_catalog_path")]
    pub catalog_path: PathBuf,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_catalog_path() -> PathBuf {
    AppConfig::config_dir().join("catalog.toml")
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("providers", &self.providers)
            .field("retrieval", &self.retrieval)
            .field("vector_store", &self.vector_store)
            .field("execution", &self.execution)
            .field("webhook", &self.webhook)
            .field("catalog_path", &self.catalog_path)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// What to do when one knowledge base cannot be searched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log the failure and render whatever the other knowledge bases returned.
    #[default]
    Degrade,
    /// Fail the whole assembly with the first error, after all searches settle.
    FailFast,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Model used to rewrite the user message into a standalone question
    #[serde(default = "default_rewrite_model")]
    pub rewrite_model: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Provider used for embeddings; the default provider when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_provider: Option<String>,

    /// Points fetched per knowledge base
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Knowledge bases searched at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

fn default_rewrite_model() -> String {
    "gpt-4o-mini".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_top_k() -> usize {
    30
}
fn default_concurrency() -> usize {
    10
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            rewrite_model: default_rewrite_model(),
            embedding_model: default_embedding_model(),
            embedding_provider: None,
            top_k: default_top_k(),
            concurrency: default_concurrency(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default = "default_qdrant_url")]
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_qdrant_url() -> String {
    "http://localhost:6333".into()
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: default_qdrant_url(),
            api_key: None,
        }
    }
}

impl std::fmt::Debug for VectorStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStoreConfig")
            .field("url", &self.url)
            .field("api_key", &redact(&self.api_key))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Idle seconds before a streaming turn emits a keepalive event
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,

    /// Maximum model round-trips per turn
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: usize,
}

fn default_keepalive_secs() -> u64 {
    10
}
fn default_max_tool_iterations() -> usize {
    25
}

impl ExecutionConfig {
    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            keepalive_secs: default_keepalive_secs(),
            max_tool_iterations: default_max_tool_iterations(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default = "default_webhook_timeout")]
    pub timeout_secs: u64,
}

fn default_webhook_timeout() -> u64 {
    30
}

impl WebhookConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_webhook_timeout(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.ragrelay/config.toml).
    ///
    /// Environment variables take priority over the file:
    /// - `RAGRELAY_API_KEY`, then `OPENAI_API_KEY` (only when no key is configured)
    /// - `RAGRELAY_PROVIDER`
    /// - `RAGRELAY_QDRANT_URL`, `RAGRELAY_QDRANT_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if self.api_key.is_none() {
            self.api_key = std::env::var("RAGRELAY_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }
        if let Ok(provider) = std::env::var("RAGRELAY_PROVIDER") {
            self.default_provider = provider;
        }
        if let Ok(url) = std::env::var("RAGRELAY_QDRANT_URL") {
            self.vector_store.url = url;
        }
        if let Ok(key) = std::env::var("RAGRELAY_QDRANT_API_KEY") {
            self.vector_store.api_key = Some(key);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".ragrelay")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retrieval.concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.concurrency must be at least 1".into(),
            ));
        }
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.top_k must be at least 1".into(),
            ));
        }
        if self.execution.keepalive_secs == 0 {
            return Err(ConfigError::ValidationError(
                "execution.keepalive_secs must be at least 1".into(),
            ));
        }
        if self.execution.max_tool_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "execution.max_tool_iterations must be at least 1".into(),
            ));
        }
        if self.webhook.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "webhook.timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            providers: HashMap::new(),
            retrieval: RetrievalConfig::default(),
            vector_store: VectorStoreConfig::default(),
            execution: ExecutionConfig::default(),
            webhook: WebhookConfig::default(),
            catalog_path: default_catalog_path(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Failed to write {path}: {reason}")]
    WriteError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retrieval.top_k, 30);
        assert_eq!(config.retrieval.concurrency, 10);
        assert_eq!(config.execution.keepalive(), Duration::from_secs(10));
        assert_eq!(config.webhook.timeout(), Duration::from_secs(30));
        assert_eq!(config.retrieval.failure_policy, FailurePolicy::Degrade);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let toml_str = r#"
default_provider = "openrouter"

[retrieval]
failure_policy = "fail_fast"
concurrency = 4

[execution]
keepalive_secs = 3
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.default_provider, "openrouter");
        assert_eq!(config.retrieval.failure_policy, FailurePolicy::FailFast);
        assert_eq!(config.retrieval.concurrency, 4);
        assert_eq!(config.retrieval.embedding_model, "text-embedding-3-small");
        assert_eq!(config.execution.keepalive_secs, 3);
        assert_eq!(config.execution.max_tool_iterations, 25);
    }

    #[test]
    fn zero_concurrency_rejected() {
        let mut config = AppConfig::default();
        config.retrieval.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.default_provider, "openai");
    }

    #[test]
    fn load_from_file_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[webhook]\ntimeout_secs = 0\n").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = AppConfig {
            api_key: Some("sk-very-secret".into()),
            ..AppConfig::default()
        };
        config.vector_store.api_key = Some("qdrant-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-very-secret"));
        assert!(!debug.contains("qdrant-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("text-embedding-3-small"));
        assert!(toml_str.contains("keepalive_secs"));
    }
}
