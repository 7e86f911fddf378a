//! # Event Bus
//!
//! Typed lifecycle and synchronization events fanned out over a tokio
//! broadcast channel. UI layers subscribe to surface status messages; the core
//! never blocks on a slow or missing subscriber.

pub mod publisher;
pub mod types;

pub use publisher::{EventPublisher, PublishedEvent};
pub use types::{DrainSummary, ExecutionEvent};
