//! Configuration loading, validation, and management for Blossom.
//!
//! Loads configuration from `~/.blossom/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.blossom/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Directory holding the FAQ source, provider directory and index files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Custom model pricing overrides (model name → pricing)
    #[serde(default)]
    pub pricing: HashMap<String, PricingOverrideConfig>,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_data_dir() -> PathBuf {
    AppConfig::config_dir().join("data")
}

/// Redact a secret for Debug output.
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
            .field("data_dir", &self.data_dir)
            .field("models", &self.models)
            .field("limits", &self.limits)
            .field("history", &self.history)
            .field("retrieval", &self.retrieval)
            .field("assistant", &self.assistant)
            .field("pricing", &self.pricing)
            .finish()
    }
}

/// Which model serves which role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Customer-facing model
    #[serde(default = "default_primary_model")]
    pub primary: String,

    /// Model for rephrasing, classification and slot filling
    #[serde(default = "default_auxiliary_model")]
    pub auxiliary: String,

    #[serde(default = "default_embedding_model")]
    pub embedding: String,
}

fn default_primary_model() -> String {
    "gpt-4o".into()
}
fn default_auxiliary_model() -> String {
    "gpt-4o-mini".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            primary: default_primary_model(),
            auxiliary: default_auxiliary_model(),
            embedding: default_embedding_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Context window of the chat models
    #[serde(default = "default_chat_context_tokens")]
    pub chat_context_tokens: usize,

    /// Input limit of the embedding model
    #[serde(default = "default_embedding_tokens")]
    pub embedding_tokens: usize,

    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: usize,

    /// Model calls allowed in one orchestrated turn
    #[serde(default = "default_max_tool_steps")]
    pub max_tool_steps: u32,
}

fn default_chat_context_tokens() -> usize {
    128_000
}
fn default_embedding_tokens() -> usize {
    8191
}
fn default_embedding_dimensions() -> usize {
    1536
}
fn default_max_tool_steps() -> u32 {
    16
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            chat_context_tokens: default_chat_context_tokens(),
            embedding_tokens: default_embedding_tokens(),
            embedding_dimensions: default_embedding_dimensions(),
            max_tool_steps: default_max_tool_steps(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Maximum retained user/assistant/tool entries (unset = unbounded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_messages: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Minimum inner-product score for a FAQ match
    #[serde(default = "default_threshold")]
    pub threshold: f32,
}

fn default_top_k() -> usize {
    3
}
fn default_threshold() -> f32 {
    0.4
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            threshold: default_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    #[serde(default = "default_assistant_name")]
    pub name: String,

    #[serde(default = "default_centre")]
    pub centre: String,

    /// Replace the built-in persona prompt entirely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_override: Option<String>,
}

fn default_assistant_name() -> String {
    "Tan".into()
}
fn default_centre() -> String {
    "Psychology Blossom".into()
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: default_assistant_name(),
            centre: default_centre(),
            system_prompt_override: None,
        }
    }
}

/// Custom per-million-token pricing for a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingOverrideConfig {
    /// Price per 1M input tokens in USD
    pub input_per_m: f64,
    /// Price per 1M output tokens in USD
    #[serde(default)]
    pub output_per_m: f64,
}

impl AppConfig {
    /// Load configuration from the default path (~/.blossom/config.toml).
    ///
    /// Also checks environment variables:
    /// - `BLOSSOM_API_KEY`, then `OPENAI_API_KEY`
    /// - `BLOSSOM_DATA_DIR`
    /// - `BLOSSOM_MODEL` (primary model)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply environment-style overrides read through `var`.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = var("BLOSSOM_API_KEY").or_else(|| var("OPENAI_API_KEY"));
        }

        if let Some(dir) = var("BLOSSOM_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }

        if let Some(model) = var("BLOSSOM_MODEL") {
            self.models.primary = model;
        }
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

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".blossom")
    }

    /// FAQ source mapping (question → answer).
    pub fn faq_path(&self) -> PathBuf {
        self.data_dir.join("faq.json")
    }

    /// Provider directory.
    pub fn therapists_path(&self) -> PathBuf {
        self.data_dir.join("therapists.json")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, name) in [
            ("models.primary", &self.models.primary),
            ("models.auxiliary", &self.models.auxiliary),
            ("models.embedding", &self.models.embedding),
        ] {
            if name.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!("{key} must not be empty")));
            }
        }

        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError("data_dir must not be empty".into()));
        }

        if self.retrieval.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.top_k must be at least 1".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.retrieval.threshold) {
            return Err(ConfigError::ValidationError(
                "retrieval.threshold must be between 0.0 and 1.0".into(),
            ));
        }

        if self.limits.max_tool_steps == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_tool_steps must be at least 1".into(),
            ));
        }

        if self.limits.embedding_dimensions == 0 {
            return Err(ConfigError::ValidationError(
                "limits.embedding_dimensions must be > 0".into(),
            ));
        }

        if self.history.max_messages == Some(0) {
            return Err(ConfigError::ValidationError(
                "history.max_messages must be at least 1 when set".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }

    /// Write the default configuration to `path` unless a file is already
    /// there. Returns whether a file was written.
    pub fn write_default(path: &Path) -> Result<bool, ConfigError> {
        if path.exists() {
            return Ok(false);
        }

        let write_error = |e: std::io::Error| ConfigError::WriteError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_error)?;
        }
        std::fs::write(path, Self::default_toml()).map_err(write_error)?;

        tracing::info!("Wrote default config to {}", path.display());
        Ok(true)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            data_dir: default_data_dir(),
            models: ModelsConfig::default(),
            limits: LimitsConfig::default(),
            history: HistoryConfig::default(),
            retrieval: RetrievalConfig::default(),
            assistant: AssistantConfig::default(),
            pricing: HashMap::new(),
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

    #[error("Failed to write config file at {path}: {reason}")]
    WriteError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
