//! Configuration management for Ensemble
//!
//! Supports environment variables, config files, and runtime overrides.
//!
//! Config file location: ~/.config/ensemble/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::{EnsembleError, Result};

/// Main configuration for Ensemble
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Gemini API configuration
    pub gemini: GeminiConfig,
    /// Model configuration
    pub models: ModelConfig,
    /// Agent configuration
    pub agent: AgentConfig,
    /// Streaming configuration
    #[serde(default)]
    pub streaming: StreamingConfig,
}

/// Gemini API endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Base URL of the generateContent endpoint
    pub api_base: String,
    /// API key (read from GEMINI_API_KEY if not set here)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Model configuration - interchangeable models
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model used by worker agents
    /// Default: gemini-2.0-flash
    pub worker: String,
    /// Alternative models that can be switched to
    #[serde(default)]
    pub alternatives: Vec<String>,
}

/// Agent behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum tool-dispatch turns per agent invocation before the run
    /// fails with a turn-limit error
    /// Default: 10
    pub max_turns: usize,
    /// Default iteration cap for Loop nodes built by the CLI pipeline
    /// Default: 3
    pub default_loop_iterations: usize,
    /// Whether to show debug output
    pub debug: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: 10,
            default_loop_iterations: 3,
            debug: env::var("ENSEMBLE_DEBUG")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }
}

/// Streaming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Whether to stream the final response in real-time
    pub enabled: bool,
    /// Print tokens as they arrive (vs buffering)
    pub print_tokens: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini: GeminiConfig::default(),
            models: ModelConfig::default(),
            agent: AgentConfig::default(),
            streaming: StreamingConfig::default(),
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_base: env::var("GEMINI_API_BASE")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".to_string()),
            api_key: env::var("GEMINI_API_KEY").ok(),
            timeout_secs: 120,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            worker: env::var("ENSEMBLE_WORKER_MODEL")
                .unwrap_or_else(|_| "gemini-2.0-flash".to_string()),
            alternatives: vec![
                "gemini-2.0-flash-exp".to_string(),
                "gemini-1.5-pro".to_string(),
                "gemini-1.5-flash".to_string(),
            ],
        }
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            enabled: env::var("ENSEMBLE_STREAMING")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
            print_tokens: true,
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ensemble")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load() -> Self {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        // Try to load from config file
        if let Ok(config) = Self::load_from_file() {
            return config;
        }

        // Fall back to defaults (which respect env vars)
        Self::default()
    }

    /// Load configuration from file only
    pub fn load_from_file() -> Result<Self> {
        let config_path = Self::config_file();

        if !config_path.exists() {
            return Err(EnsembleError::config("Config file not found"));
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|e| EnsembleError::config(format!("Failed to read config: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| EnsembleError::config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to the default config file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file())
    }

    /// Save configuration to a specific path, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| EnsembleError::config(format!("Failed to create config dir: {}", e)))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| EnsembleError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, content)
            .map_err(|e| EnsembleError::config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Validate and return the configured API base URL
    pub fn api_base_url(&self) -> Result<url::Url> {
        url::Url::parse(&self.gemini.api_base)
            .map_err(|e| EnsembleError::config(format!("Invalid API base URL: {}", e)))
    }

    /// Resolve the API key from config or environment
    pub fn api_key(&self) -> Result<String> {
        self.gemini
            .api_key
            .clone()
            .or_else(|| env::var("GEMINI_API_KEY").ok())
            .ok_or_else(|| EnsembleError::config("GEMINI_API_KEY not set"))
    }

    /// Update the worker model
    pub fn set_worker_model(&mut self, model: impl Into<String>) {
        self.models.worker = model.into();
    }

    /// Check if a model is in the known alternatives
    pub fn is_known_model(&self, model: &str) -> bool {
        self.models.alternatives.iter().any(|m| m == model) || model == self.models.worker
    }

    /// Generate a default config file content for display
    pub fn default_config_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config)
            .unwrap_or_else(|_| String::from("# Error generating config"))
    }
}
