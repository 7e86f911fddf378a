//! # Test Helpers
//!
//! In-memory stand-ins for the external seams plus route fixtures, shared by
//! the unit tests and the integration tests under `tests/`.
//!
//! - [`fakes`] - route store, notifier, routing, location sink and provider
//! - [`fixtures`] - routes, filled confirmation forms and checkpoints
//! - [`harness`] - a fully wired sync stack over the fakes

pub mod fakes;
pub mod fixtures;
pub mod harness;

pub use fakes::{
    ChannelLocationProvider, InMemoryRouteStore, RecordingLocationSink, RecordingNotifier,
    StaticRoutingService,
};
pub use fixtures::{
    completed_checkpoint, destination_form, filled_form, in_progress_route, intermediate_form,
    origin_form, sample_route, skipped_checkpoint, three_stop_route, OPERATOR,
};
pub use harness::SyncHarness;
