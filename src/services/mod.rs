//! # External Collaborators
//!
//! Boundaries to everything the core does not own: the authoritative route
//! store, the routing provider, notification delivery, device location and
//! network connectivity. Each boundary is a trait so hosts plug in their own
//! implementations; in-process fakes live in [`crate::test_helpers`].

pub mod connectivity;
pub mod location;
pub mod notifications;
pub mod routing;
pub mod store;

pub use connectivity::Connectivity;
pub use location::{LiveLocationSink, LocationError, LocationProvider};
pub use notifications::{
    dispatch_best_effort, Notification, NotificationDispatcher, NotificationError,
    NotificationSeverity,
};
pub use routing::{RouteEstimate, RoutingError, RoutingService};
pub use store::{
    RouteFilter, RouteSnapshot, RouteStore, RouteSubscription, RouteUpdate, StoreError,
};
