#![allow(clippy::doc_markdown)] // Allow technical terms like SQLite, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Waypoint Core Rust
//!
//! Offline-first execution engine for delivery routes worked by field
//! operators.
//!
//! ## Overview
//!
//! A route is an ordered list of stops (one origin, any number of
//! intermediate stops, one destination). The operator confirms or skips each
//! stop from the road, often without connectivity. Every action is written to
//! a durable local queue first and replayed against the authoritative route
//! store in order, exactly once in effect, when the device is back online.
//!
//! ## Architecture
//!
//! ```text
//! operator action
//!     │
//!     ▼
//! CheckpointSubmitter ──▶ CheckpointQueue (SQLite, FIFO, idempotent)
//!     │                        │
//!     │ online                 │ drain on reconnect / route view / retry
//!     ▼                        ▼
//! SyncCoordinator ──▶ CheckpointApplier ──▶ RouteStore
//!                          │
//!                          ▼
//!                     RouteFinalizer (client notification, cost recompute)
//! ```
//!
//! ## Module Organization
//!
//! - [`models`] - Routes, stops, confirmations and queued checkpoints
//! - [`state_machine`] - Stop and route lifecycles plus confirmation forms
//! - [`queue`] - Durable offline queue and route cache
//! - [`sync`] - Applier, drain coordinator, scheduler and submitter
//! - [`route`] - Route projections and post-finish side effects
//! - [`orchestration`] - Several active routes per operator
//! - [`geo`] - Distance, proximity gate, sampling and live position
//! - [`services`] - Seams to the store, notifications, routing and location
//! - [`config`] - YAML configuration with environment overrides
//! - [`events`] - Execution status events
//! - [`runtime`] - Wiring for one operator session
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use waypoint_core::config::ConfigManager;
//! use waypoint_core::models::OperatorId;
//! use waypoint_core::runtime::{RuntimeOptions, RuntimeServices, WaypointRuntime};
//!
//! # async fn example(services: RuntimeServices) -> waypoint_core::Result<()> {
//! waypoint_core::logging::init_structured_logging();
//!
//! let config = ConfigManager::load()?;
//! let runtime = WaypointRuntime::bootstrap(
//!     config,
//!     OperatorId::new("driver-1"),
//!     services,
//!     RuntimeOptions::default(),
//! )
//! .await?;
//!
//! let status = runtime.status();
//! println!("{} routes active, {} checkpoints queued", status.active_routes, status.pending_checkpoints);
//!
//! runtime.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and integration tests
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod geo;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod queue;
pub mod route;
pub mod runtime;
pub mod services;
pub mod state_machine;
pub mod sync;

/// In-memory fakes and fixtures shared by unit and integration tests
pub mod test_helpers;

pub use config::{ConfigManager, WaypointConfig};
pub use error::{Result, WaypointError};
pub use events::{EventPublisher, ExecutionEvent};
pub use models::{
    CheckpointId, CheckpointOutcome, OperatorId, PendingCheckpoint, Route, RouteId, SkipReason,
    Stop, StopId, StopType,
};
pub use orchestration::{MultiRouteOrchestrator, RouteView};
pub use runtime::{RuntimeOptions, RuntimeServices, RuntimeStatus, WaypointRuntime};
pub use state_machine::{ConfirmationForm, ExecutionStatus, StopStatus};
pub use sync::{CheckpointSubmitter, SubmitOutcome, SyncCoordinator, SyncTrigger};
