//! Shell configuration.
//!
//! [`ShellConfig`] is the file-backed counterpart of
//! [`EngineBuilder`](crate::EngineBuilder). Every field has a default, so an
//! empty file is a valid configuration:
//!
//! ```yaml
//! prompt: "ops> "
//! help_header: "Commands:"
//! output_level: verbose
//! history_file: ~/.ops_history
//! history_limit: 500
//! timing: true
//! logging:
//!   level: debug
//!   format: json
//! ```
//!
//! YAML (`.yaml`, `.yml`) and JSON (`.json`) files are supported.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::output::OutputLevel;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid yaml config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid json config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported config format: {} (expected .yaml, .yml or .json)", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("invalid log filter: {0}")]
    InvalidFilter(String),

    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Diagnostic logging. Output always goes to stderr.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// A level (`warn`) or a full filter directive (`burrow=debug,info`).
    pub level: String,
    pub format: LogFormat,
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Text,
            ansi: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    pub prompt: String,
    pub help_header: String,
    pub output_level: OutputLevel,
    pub history_file: Option<PathBuf>,
    pub history_limit: usize,
    /// Installs the timing middleware.
    pub timing: bool,
    pub logging: LoggingConfig,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: "> ".to_string(),
            help_header: "Available commands:".to_string(),
            output_level: OutputLevel::Normal,
            history_file: None,
            history_limit: 1000,
            timing: false,
            logging: LoggingConfig::default(),
        }
    }
}

impl ShellConfig {
    /// Reads a config file, picking the format from its extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        if !matches!(ext.as_deref(), Some("yaml" | "yml" | "json")) {
            return Err(ConfigError::UnsupportedFormat(path.to_path_buf()));
        }

        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        match ext.as_deref() {
            Some("json") => Self::from_json(&text),
            _ => Self::from_yaml(&text),
        }
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }
}
