//! # Multi-Route Orchestration
//!
//! Observed state of the operator's concurrently active routes and the
//! orchestrator that feeds it from the route subscription.

pub mod multi_route;
pub mod observed_state;

pub use multi_route::{MultiRouteOrchestrator, OrchestrationError, RouteView};
pub use observed_state::{ObservedState, SelectionChange};
