//! Configuration loading, validation, and management for npcmind.
//!
//! Loads configuration from `~/.npcmind/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.npcmind/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Per-request timeout towards the backend
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Model allow-list and default
    #[serde(default)]
    pub models: ModelsConfig,

    /// Diagnostic transcript settings
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_request_timeout_secs() -> u64 {
    60
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
            .field("api_url", &self.api_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("models", &self.models)
            .field("diagnostics", &self.diagnostics)
            .finish()
    }
}

/// Which model identifiers the pipeline accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Used when a request names no model or an unsupported one
    #[serde(default = "default_model")]
    pub default: String,

    /// The allow-list
    #[serde(default = "default_supported_models")]
    pub supported: Vec<String>,
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_supported_models() -> Vec<String> {
    vec![
        "gpt-4o-mini".into(),
        "gpt-4o".into(),
        "gpt-4.1-mini".into(),
        "gpt-4.1".into(),
        "gpt-3.5-turbo".into(),
    ]
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            default: default_model(),
            supported: default_supported_models(),
        }
    }
}

impl ModelsConfig {
    /// Whether `model` is on the allow-list.
    pub fn is_supported(&self, model: &str) -> bool {
        self.supported.iter().any(|m| m == model)
    }

    /// Resolve a requested model, falling back to the default.
    ///
    /// Unsupported identifiers are not an error; they are logged and replaced.
    pub fn resolve<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        match requested {
            Some(model) if self.is_supported(model) => model,
            Some(model) => {
                tracing::warn!(
                    requested = %model,
                    fallback = %self.default,
                    "Unsupported model, falling back to default"
                );
                &self.default
            }
            None => &self.default,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// Emit per-attempt transcripts through the tracing sink
    #[serde(default)]
    pub transcripts: bool,

    /// Longest a single transcript write may hold up a request
    #[serde(default = "default_sink_timeout_ms")]
    pub sink_timeout_ms: u64,
}

fn default_sink_timeout_ms() -> u64 {
    200
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            transcripts: false,
            sink_timeout_ms: default_sink_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.npcmind/config.toml).
    ///
    /// Also checks environment variables:
    /// - `NPCMIND_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `NPCMIND_API_URL`
    /// - `NPCMIND_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
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

    /// Apply environment overrides through a lookup function.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("NPCMIND_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            self.api_key = Some(key);
        }

        if let Some(url) = lookup("NPCMIND_API_URL") {
            self.api_url = url;
        }

        if let Some(model) = lookup("NPCMIND_MODEL") {
            self.models.default = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".npcmind")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.models.supported.is_empty() {
            return Err(ConfigError::ValidationError(
                "models.supported must list at least one model".into(),
            ));
        }

        if !self.models.is_supported(&self.models.default) {
            return Err(ConfigError::ValidationError(format!(
                "default model '{}' is not in models.supported",
                self.models.default
            )));
        }

        if self.diagnostics.sink_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "diagnostics.sink_timeout_ms must be > 0".into(),
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "request_timeout_secs must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Render the configuration as TOML with the API key removed.
    pub fn to_redacted_toml(&self) -> String {
        let redacted = Self {
            api_key: None,
            ..self.clone()
        };
        toml::to_string_pretty(&redacted).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            request_timeout_secs: default_request_timeout_secs(),
            models: ModelsConfig::default(),
            diagnostics: DiagnosticsConfig::default(),
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

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
