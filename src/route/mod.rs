//! # Route Aggregate
//!
//! Derived views over a route's ordered stops (current stop pointer, progress,
//! completion, offline projection) and the side effects that follow a finish.

pub mod aggregate;
pub mod finalizer;

pub use aggregate::{ProjectedRoute, RouteProgress};
pub use finalizer::{FinalizationReport, RouteFinalizer};
