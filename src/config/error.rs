//! Errors raised while loading or validating configuration.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// `waypoint-config.yaml` is missing from the configuration directory
    #[error("Base configuration file not found at {}", path.display())]
    ConfigFileNotFound { path: PathBuf },

    /// A file or variable source could not be read or merged
    #[error("Failed to merge configuration sources from {}: {source}", directory.display())]
    Merge {
        directory: PathBuf,
        #[source]
        source: config::ConfigError,
    },

    /// The merged sources do not deserialize into [`super::WaypointConfig`]
    #[error("Configuration for environment '{environment}' is malformed: {source}")]
    Malformed {
        environment: String,
        #[source]
        source: config::ConfigError,
    },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidValue {
        field: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigurationError {
    pub fn invalid_value(field: &'static str, value: impl ToString, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Dotted path of the offending field, for validation failures
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::InvalidValue { field, .. } => Some(field),
            _ => None,
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;
