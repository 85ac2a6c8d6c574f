//! Configuration loading, validation, and management for cogloop.
//!
//! Loads configuration from `~/.cogloop/config.toml` (optional) and then
//! applies environment variable overrides. Every setting has a literal
//! fallback, so an empty environment yields a runnable configuration.
//!
//! Environment overrides:
//! - `OPENAI_BASE_URL`, `OPENAI_API_KEY`, `MODEL_NAME`
//! - `SYSTEM_PROMPT_PATH`
//! - `HTTP_HOST`, `HTTP_PORT`

use std::path::{Path, PathBuf};
use std::time::Duration;

use cogloop_core::QueueDepths;
use serde::{Deserialize, Serialize};

/// API key value meaning "send no Authorization header".
pub const NO_API_KEY: &str = "not-needed";

/// The root configuration structure. Maps directly to `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,

    /// File holding the system prompt
    #[serde(default = "default_system_prompt_path")]
    pub system_prompt_path: PathBuf,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub agent_loop: LoopConfig,

    #[serde(default)]
    pub queues: QueueConfig,

    #[serde(default)]
    pub shell: ShellConfig,
}

fn default_system_prompt_path() -> PathBuf {
    PathBuf::from("/app/SYSTEM_PROMPT.md")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            system_prompt_path: default_system_prompt_path(),
            gateway: GatewayConfig::default(),
            agent_loop: LoopConfig::default(),
            queues: QueueConfig::default(),
            shell: ShellConfig::default(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// OpenAI-compatible API base (without `/chat/completions`)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_api_key")]
    pub api_key: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Timeout of the one-shot model metadata lookup at startup
    #[serde(default = "default_metadata_timeout")]
    pub metadata_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080/api".into()
}
fn default_api_key() -> String {
    NO_API_KEY.into()
}
fn default_model() -> String {
    "gpt-oss:120b".into()
}
fn default_request_timeout() -> u64 {
    120
}
fn default_metadata_timeout() -> u64 {
    5
}

impl ProviderConfig {
    /// The key to send, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        (!self.api_key.is_empty() && self.api_key != NO_API_KEY).then_some(self.api_key.as_str())
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: default_api_key(),
            model: default_model(),
            temperature: None,
            max_tokens: None,
            request_timeout_secs: default_request_timeout(),
            metadata_timeout_secs: default_metadata_timeout(),
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let key = if self.bearer_token().is_some() {
            "[REDACTED]"
        } else {
            NO_API_KEY
        };
        f.debug_struct("ProviderConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &key)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("metadata_timeout_secs", &self.metadata_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// How long a stream session waits for a primary event before a heartbeat
    #[serde(default = "default_stream_idle_timeout")]
    pub stream_idle_timeout_ms: u64,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8000
}
fn default_stream_idle_timeout() -> u64 {
    500
}

impl GatewayConfig {
    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.stream_idle_timeout_ms)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            stream_idle_timeout_ms: default_stream_idle_timeout(),
        }
    }
}

/// Timings and limits of the cognitive loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// History length that triggers consolidation
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,

    /// Non-system turns kept by consolidation
    #[serde(default = "default_history_keep")]
    pub history_keep: usize,

    #[serde(default = "default_inbound_poll")]
    pub inbound_poll_ms: u64,

    #[serde(default = "default_idle_sleep")]
    pub idle_sleep_ms: u64,

    #[serde(default = "default_pause_poll")]
    pub pause_poll_ms: u64,

    #[serde(default = "default_fault_backoff")]
    pub fault_backoff_ms: u64,

    /// Model/tool round-trips allowed in one decision pass
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Default wait for an answer to `request_user_input`
    #[serde(default = "default_input_timeout")]
    pub input_timeout_secs: u64,
}

fn default_heartbeat_interval() -> u64 {
    30
}
fn default_history_cap() -> usize {
    50
}
fn default_history_keep() -> usize {
    40
}
fn default_inbound_poll() -> u64 {
    500
}
fn default_idle_sleep() -> u64 {
    100
}
fn default_pause_poll() -> u64 {
    1000
}
fn default_fault_backoff() -> u64 {
    1000
}
fn default_max_iterations() -> u32 {
    25
}
fn default_input_timeout() -> u64 {
    300
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval(),
            history_cap: default_history_cap(),
            history_keep: default_history_keep(),
            inbound_poll_ms: default_inbound_poll(),
            idle_sleep_ms: default_idle_sleep(),
            pause_poll_ms: default_pause_poll(),
            fault_backoff_ms: default_fault_backoff(),
            max_iterations: default_max_iterations(),
            input_timeout_secs: default_input_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_primary_depth")]
    pub primary: usize,

    #[serde(default = "default_side_depth")]
    pub side: usize,

    #[serde(default = "default_inbound_depth")]
    pub text: usize,

    #[serde(default = "default_inbound_depth")]
    pub responses: usize,
}

fn default_primary_depth() -> usize {
    100
}
fn default_side_depth() -> usize {
    200
}
fn default_inbound_depth() -> usize {
    10
}

impl QueueConfig {
    pub fn depths(&self) -> QueueDepths {
        QueueDepths {
            primary: self.primary,
            side: self.side,
            text: self.text,
            responses: self.responses,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            primary: default_primary_depth(),
            side: default_side_depth(),
            text: default_inbound_depth(),
            responses: default_inbound_depth(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellConfig {
    #[serde(default = "default_shell_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_output")]
    pub max_output_chars: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

fn default_shell_timeout() -> u64 {
    60
}
fn default_max_output() -> usize {
    5000
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_shell_timeout(),
            max_output_chars: default_max_output(),
            working_dir: None,
        }
    }
}

impl AppConfig {
    /// Load from the default path, then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::config_dir().join("config.toml"))?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path (defaults if absent).
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

    /// Apply overrides from `lookup` (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.provider.base_url = url;
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.provider.api_key = key;
        }
        if let Some(model) = lookup("MODEL_NAME") {
            self.provider.model = model;
        }
        if let Some(path) = lookup("SYSTEM_PROMPT_PATH") {
            self.system_prompt_path = PathBuf::from(path);
        }
        if let Some(host) = lookup("HTTP_HOST") {
            self.gateway.host = host;
        }
        if let Some(port) = lookup("HTTP_PORT") {
            self.gateway.port = port.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("HTTP_PORT is not a valid port: {port}"))
            })?;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
            .join(".cogloop")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.port == 0 {
            return Err(ConfigError::ValidationError("gateway.port must be non-zero".into()));
        }
        let q = &self.queues;
        if q.primary == 0 || q.side == 0 || q.text == 0 || q.responses == 0 {
            return Err(ConfigError::ValidationError(
                "queue depths must be greater than zero".into(),
            ));
        }
        let l = &self.agent_loop;
        if l.history_cap < 2 {
            return Err(ConfigError::ValidationError(
                "agent_loop.history_cap must be at least 2".into(),
            ));
        }
        if l.history_keep == 0 || l.history_keep >= l.history_cap {
            return Err(ConfigError::ValidationError(
                "agent_loop.history_keep must be between 1 and history_cap - 1".into(),
            ));
        }
        if l.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent_loop.max_iterations must be at least 1".into(),
            ));
        }
        if let Some(t) = self.provider.temperature
            && !(0.0..=2.0).contains(&t)
        {
            return Err(ConfigError::ValidationError(
                "provider.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        Ok(())
    }

    /// Render the configuration as TOML (for `cogloop config`).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_matches_literal_fallbacks() {
        let config = AppConfig::default();
        assert_eq!(config.provider.model, "gpt-oss:120b");
        assert_eq!(config.provider.api_key, NO_API_KEY);
        assert_eq!(config.gateway.port, 8000);
        assert_eq!(config.agent_loop.heartbeat_interval_secs, 30);
        assert_eq!(config.agent_loop.history_cap, 50);
        assert_eq!(config.agent_loop.history_keep, 40);
        assert_eq!(config.queues.depths(), QueueDepths::default());
        assert_eq!(
            config.system_prompt_path,
            PathBuf::from("/app/SYSTEM_PROMPT.md")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_file_keeps_prompt_fallback() {
        let config = AppConfig::load_from(Path::new("/nonexistent/cogloop/config.toml")).unwrap();
        assert_eq!(
            config.system_prompt_path,
            PathBuf::from("/app/SYSTEM_PROMPT.md")
        );
    }

    #[test]
    fn environment_overrides_apply() {
        let mut config = AppConfig::default();
        config
            .apply_overrides(env(&[
                ("OPENAI_BASE_URL", "http://llm.local/v1"),
                ("OPENAI_API_KEY", "sk-test"),
                ("MODEL_NAME", "qwen3"),
                ("SYSTEM_PROMPT_PATH", "/tmp/prompt.md"),
                ("HTTP_PORT", "9100"),
            ]))
            .unwrap();
        assert_eq!(config.provider.base_url, "http://llm.local/v1");
        assert_eq!(config.provider.bearer_token(), Some("sk-test"));
        assert_eq!(config.provider.model, "qwen3");
        assert_eq!(config.system_prompt_path, PathBuf::from("/tmp/prompt.md"));
        assert_eq!(config.gateway.port, 9100);
    }

    #[test]
    fn bad_port_override_is_rejected() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(env(&[("HTTP_PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn placeholder_key_sends_no_token() {
        let config = AppConfig::default();
        assert_eq!(config.provider.bearer_token(), None);
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut config = AppConfig::default();
        config.provider.api_key = "sk-very-secret".into();
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-very-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn keep_must_be_below_cap() {
        let mut config = AppConfig::default();
        config.agent_loop.history_keep = 50;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_depth_rejected() {
        let mut config = AppConfig::default();
        config.queues.side = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.gateway.port, 8000);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[agent_loop]
heartbeat_interval_secs = 5

[queues]
primary = 3
"#,
        )
        .unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.agent_loop.heartbeat_interval_secs, 5);
        assert_eq!(config.agent_loop.history_cap, 50);
        assert_eq!(config.queues.primary, 3);
        assert_eq!(config.queues.side, 200);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[gateway\nport = ").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn toml_rendering_roundtrips() {
        let config = AppConfig::default();
        let parsed: AppConfig = toml::from_str(&config.to_toml()).unwrap();
        assert_eq!(parsed.gateway.port, config.gateway.port);
        assert_eq!(parsed.provider.model, config.provider.model);
    }
}
