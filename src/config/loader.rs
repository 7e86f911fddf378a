//! Configuration Loader
//!
//! Environment-aware configuration loading: base YAML file, optional
//! environment overlay, then `WAYPOINT__` environment variables.

use config::{Config, Environment, File, FileFormat, Map};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::error::{ConfigResult, ConfigurationError};
use super::WaypointConfig;

const BASE_FILE_NAME: &str = "waypoint-config.yaml";
const ENV_PREFIX: &str = "WAYPOINT";

/// Loaded, validated configuration plus the environment it was loaded for
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: WaypointConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::load_with_overrides(config_dir, environment, None)
    }

    /// Load with an explicit set of `WAYPOINT__*` variables instead of the
    /// process environment, which keeps tests free of global state
    pub fn load_with_overrides(
        config_dir: Option<PathBuf>,
        environment: &str,
        env_vars: Option<Map<String, String>>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            environment = %environment,
            directory = %config_directory.display(),
            "Loading configuration"
        );

        let config = Self::load_and_merge_config(&config_directory, environment, env_vars)?;
        config.validate()?;

        info!(
            environment = %environment,
            proximity_threshold_meters = config.gate.proximity_threshold_meters,
            max_retry_attempts = config.sync.max_retry_attempts,
            database_path = %config.queue.database_path.display(),
            "⚙️ Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already-built configuration, validating it first
    pub fn from_config(config: WaypointConfig, environment: &str) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: Self::default_config_directory(),
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &WaypointConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Pretty JSON rendering of the effective configuration
    pub fn debug_config(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or(serde_json::Value::Null)
    }

    fn load_and_merge_config(
        config_directory: &Path,
        environment: &str,
        env_vars: Option<Map<String, String>>,
    ) -> ConfigResult<WaypointConfig> {
        let base_path = config_directory.join(BASE_FILE_NAME);
        if !base_path.is_file() {
            return Err(ConfigurationError::ConfigFileNotFound { path: base_path });
        }

        let overlay_path = config_directory.join(format!("waypoint-config.{environment}.yaml"));
        if overlay_path.is_file() {
            debug!(overlay = %overlay_path.display(), "Applying environment overlay");
        }

        let environment_source = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("notifications.operations_recipients")
            .source(env_vars);

        let merged = Config::builder()
            .add_source(File::from(base_path.clone()).format(FileFormat::Yaml).required(true))
            .add_source(
                File::from(overlay_path)
                    .format(FileFormat::Yaml)
                    .required(false),
            )
            .add_source(environment_source)
            .build()
            .map_err(|source| ConfigurationError::Merge {
                directory: config_directory.to_path_buf(),
                source,
            })?;

        merged
            .try_deserialize::<WaypointConfig>()
            .map_err(|source| ConfigurationError::Malformed {
                environment: environment.to_string(),
                source,
            })
    }

    /// Detect the environment from WAYPOINT_ENV, then APP_ENV
    pub fn detect_environment() -> String {
        env::var("WAYPOINT_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    /// WAYPOINT_CONFIG_DIR when set, otherwise `./config`
    fn default_config_directory() -> PathBuf {
        env::var("WAYPOINT_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }
}
