//! # System Constants
//!
//! Event names, notification kinds and operational defaults shared across the
//! route execution core.

// Re-export state types for convenience
pub use crate::state_machine::{ExecutionStatus as RouteStatus, StopStatus};

/// Lifecycle and synchronization event names published on the event bus
pub mod events {
    // Stop lifecycle events
    pub const STOP_COMPLETED: &str = "stop.completed";
    pub const STOP_SKIPPED: &str = "stop.skipped";

    // Route lifecycle events
    pub const ROUTE_STARTED: &str = "route.started";
    pub const ROUTE_FINISHED: &str = "route.finished";
    pub const ROUTE_CANCELLED: &str = "route.cancelled";
    pub const ROUTE_COST_RECOMPUTED: &str = "route.cost_recomputed";

    // Checkpoint synchronization events
    pub const CHECKPOINT_QUEUED_OFFLINE: &str = "checkpoint.queued_offline";
    pub const CHECKPOINT_COMMITTED: &str = "checkpoint.committed";
    pub const CHECKPOINT_ALREADY_APPLIED: &str = "checkpoint.already_applied";
    pub const CHECKPOINT_CONFLICT_DROPPED: &str = "checkpoint.conflict_dropped";
    pub const CHECKPOINT_NOT_FOUND_DROPPED: &str = "checkpoint.not_found_dropped";
    pub const CHECKPOINT_ROUTE_CLOSED_DROPPED: &str = "checkpoint.route_closed_dropped";
    pub const CHECKPOINT_SYNC_FAILED: &str = "checkpoint.sync_failed";
    pub const CHECKPOINT_RETRACTED: &str = "checkpoint.retracted";

    // Drain pass events
    pub const SYNC_DRAIN_STARTED: &str = "sync.drain_started";
    pub const SYNC_DRAIN_FINISHED: &str = "sync.drain_finished";
}

/// Notification kinds understood by the downstream notification service
pub mod notifications {
    pub const ROUTE_START: &str = "routeStart";
    pub const ROUTE_COMPLETION: &str = "routeCompletion";
}

/// Operational defaults, overridable through configuration
pub mod defaults {
    /// Mean Earth radius used by the haversine formula
    pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

    /// Check-in is disabled beyond this distance from the next stop
    pub const PROXIMITY_THRESHOLD_METERS: f64 = 200.0;

    /// Minimum movement before a new location sample is kept
    pub const DISTANCE_FILTER_METERS: f64 = 10.0;

    pub const PUBLISH_INTERVAL_SECONDS: u64 = 5;

    pub const STORE_TIMEOUT_MS: u64 = 10_000;
    pub const NOTIFICATION_TIMEOUT_MS: u64 = 5_000;
    pub const ROUTING_TIMEOUT_MS: u64 = 15_000;

    pub const MAX_RETRY_ATTEMPTS: u32 = 5;
    pub const BACKOFF_BASE_DELAY_MS: u64 = 1_000;
    pub const BACKOFF_MAX_DELAY_MS: u64 = 60_000;
    pub const BACKOFF_MULTIPLIER: f64 = 2.0;

    pub const EVENT_CHANNEL_CAPACITY: usize = 1_000;
}
