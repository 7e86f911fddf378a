//! # Waypoint Configuration System
//!
//! YAML-based configuration with environment overlays and environment-variable
//! overrides, deserialized into strongly typed sections and validated before
//! use.
//!
//! ## Sources (later wins)
//!
//! 1. `config/waypoint-config.yaml`
//! 2. `config/waypoint-config.{environment}.yaml`, when present
//! 3. `WAYPOINT__SECTION__KEY` environment variables, e.g.
//!    `WAYPOINT__GATE__PROXIMITY_THRESHOLD_METERS=150`
//!
//! Every field has a default, so a partial file only overrides what it names.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use waypoint_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let threshold = manager.config().gate.proximity_threshold_meters;
//! let backoff = manager.config().sync.backoff.base_delay();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::defaults;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring waypoint-config.yaml
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WaypointConfig {
    /// Proximity gating of the check-in affordance
    pub gate: GateConfig,

    /// Location sampling and live position publishing
    pub location: LocationConfig,

    /// Drain pass timeouts and retry/backoff policy
    pub sync: SyncConfig,

    /// Local durable storage
    pub queue: QueueConfig,

    /// Outbound notification settings
    pub notifications: NotificationConfig,

    /// Best-effort cost recompute after skipped stops
    pub routing: RoutingConfig,

    /// Event bus sizing
    pub events: EventsConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GateConfig {
    pub proximity_threshold_meters: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            proximity_threshold_meters: defaults::PROXIMITY_THRESHOLD_METERS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Minimum movement in meters before a new sample is kept
    pub distance_filter_meters: f64,
    pub publish_interval_seconds: u64,
    pub publish_enabled: bool,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            distance_filter_meters: defaults::DISTANCE_FILTER_METERS,
            publish_interval_seconds: defaults::PUBLISH_INTERVAL_SECONDS,
            publish_enabled: true,
        }
    }
}

impl LocationConfig {
    pub fn publish_interval(&self) -> Duration {
        Duration::from_secs(self.publish_interval_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Timeout applied to every authoritative store call
    pub store_timeout_ms: u64,
    /// Automatic retries after a transient halt before waiting for a trigger
    pub max_retry_attempts: u32,
    /// Request a drain whenever the operator opens a route view
    pub drain_on_route_activation: bool,
    pub backoff: BackoffConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            store_timeout_ms: defaults::STORE_TIMEOUT_MS,
            max_retry_attempts: defaults::MAX_RETRY_ATTEMPTS,
            drain_on_route_activation: true,
            backoff: BackoffConfig::default(),
        }
    }
}

impl SyncConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

/// Exponential backoff between automatic drain retries
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    pub jitter_enabled: bool,
    /// Maximum jitter as a fraction of the delay (0.0 to 1.0)
    pub max_jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: defaults::BACKOFF_BASE_DELAY_MS,
            max_delay_ms: defaults::BACKOFF_MAX_DELAY_MS,
            multiplier: defaults::BACKOFF_MULTIPLIER,
            jitter_enabled: true,
            max_jitter: 0.1,
        }
    }
}

impl BackoffConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    /// SQLite file holding the offline queue and the route cache
    pub database_path: PathBuf,
    pub busy_timeout_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("waypoint-offline.db"),
            busy_timeout_ms: 5_000,
        }
    }
}

impl QueueConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub timeout_ms: u64,
    /// Back-office recipients told when an operator starts a route
    pub operations_recipients: Vec<String>,
    pub notify_on_start: bool,
    pub notify_on_completion: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            timeout_ms: defaults::NOTIFICATION_TIMEOUT_MS,
            operations_recipients: Vec::new(),
            notify_on_start: true,
            notify_on_completion: true,
        }
    }
}

impl NotificationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub recompute_on_skip: bool,
    pub optimize_waypoints: bool,
    pub timeout_ms: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            recompute_on_skip: true,
            optimize_waypoints: false,
            timeout_ms: defaults::ROUTING_TIMEOUT_MS,
        }
    }
}

impl RoutingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EventsConfig {
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: defaults::EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl WaypointConfig {
    /// Reject values that would make the core misbehave
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let threshold = self.gate.proximity_threshold_meters;
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(ConfigurationError::invalid_value(
                "gate.proximity_threshold_meters",
                threshold.to_string(),
                "threshold must be a positive number of meters",
            ));
        }

        let filter = self.location.distance_filter_meters;
        if !filter.is_finite() || filter < 0.0 {
            return Err(ConfigurationError::invalid_value(
                "location.distance_filter_meters",
                filter.to_string(),
                "distance filter cannot be negative",
            ));
        }

        if self.location.publish_interval_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "location.publish_interval_seconds",
                "0",
                "publish interval must be greater than 0",
            ));
        }

        if self.sync.store_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "sync.store_timeout_ms",
                "0",
                "store timeout must be greater than 0",
            ));
        }

        let backoff = &self.sync.backoff;
        if backoff.base_delay_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "sync.backoff.base_delay_ms",
                "0",
                "base delay must be greater than 0",
            ));
        }

        if backoff.max_delay_ms < backoff.base_delay_ms {
            return Err(ConfigurationError::invalid_value(
                "sync.backoff.max_delay_ms",
                backoff.max_delay_ms.to_string(),
                format!(
                    "max delay must be at least the base delay ({}ms)",
                    backoff.base_delay_ms
                ),
            ));
        }

        if !backoff.multiplier.is_finite() || backoff.multiplier < 1.0 {
            return Err(ConfigurationError::invalid_value(
                "sync.backoff.multiplier",
                backoff.multiplier.to_string(),
                "multiplier must be at least 1.0",
            ));
        }

        if !(0.0..=1.0).contains(&backoff.max_jitter) {
            return Err(ConfigurationError::invalid_value(
                "sync.backoff.max_jitter",
                backoff.max_jitter.to_string(),
                "jitter must be a fraction between 0.0 and 1.0",
            ));
        }

        if self.queue.database_path.as_os_str().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "queue.database_path",
                "",
                "database path cannot be empty",
            ));
        }

        if self.notifications.timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "notifications.timeout_ms",
                "0",
                "notification timeout must be greater than 0",
            ));
        }

        if self.routing.timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "routing.timeout_ms",
                "0",
                "routing timeout must be greater than 0",
            ));
        }

        if self.events.channel_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "events.channel_capacity",
                "0",
                "channel capacity must be greater than 0",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = WaypointConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.gate.proximity_threshold_meters, 200.0);
        assert_eq!(config.location.publish_interval(), Duration::from_secs(5));
        assert_eq!(config.location.distance_filter_meters, 10.0);
    }

    #[test]
    fn test_validation_rejects_bad_backoff() {
        let mut config = WaypointConfig::default();
        config.sync.backoff.max_delay_ms = 10;
        config.sync.backoff.base_delay_ms = 100;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sync.backoff.max_delay_ms"));

        let mut config = WaypointConfig::default();
        config.gate.proximity_threshold_meters = 0.0;
        assert!(config.validate().is_err());
    }
}
