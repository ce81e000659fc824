use std::path::PathBuf;
use thiserror::Error;

/// Where a configuration layer came from when none is reported.
const UNKNOWN_ORIGIN: &str = "merged configuration";

/// Errors that can occur during configuration loading and validation
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A layer could not be read or merged. `origin` names the file, the
    /// built-in defaults, or the merged result when the layer is unknown.
    #[error("Failed to load configuration from {origin}: {message}")]
    LoadError { origin: String, message: String },

    #[error("Configuration file not found at path: {0}")]
    FileNotFound(PathBuf),

    /// A value has the wrong type. `origin` is the file path, or
    /// "the environment" for `DISCLOSURE_*` variables.
    #[error("Invalid value for `{key}` from {origin}: {message}")]
    ParseError {
        key: String,
        origin: String,
        message: String,
    },

    #[error("Invalid configuration value: {0}")]
    ValidationError(String),
}

/// Type alias for Results using ConfigError
pub type Result<T> = std::result::Result<T, ConfigError>;

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        match &err {
            config::ConfigError::Type { origin, key, .. } => ConfigError::ParseError {
                key: key.clone().unwrap_or_else(|| "<root>".to_string()),
                origin: origin.clone().unwrap_or_else(|| UNKNOWN_ORIGIN.to_string()),
                message: err.to_string(),
            },
            config::ConfigError::FileParse { uri, cause } => ConfigError::LoadError {
                origin: uri.clone().unwrap_or_else(|| "config file".to_string()),
                message: cause.to_string(),
            },
            _ => ConfigError::LoadError {
                origin: UNKNOWN_ORIGIN.to_string(),
                message: err.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::LoadError {
            origin: "built-in defaults".to_string(),
            message: err.to_string(),
        }
    }
}
