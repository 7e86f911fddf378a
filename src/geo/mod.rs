//! # Geo
//!
//! Distance math, the proximity gate for check-in, location sampling and the
//! operator's live position record.

pub mod distance;
pub mod gate;
pub mod publisher;
pub mod sampler;

pub use distance::{haversine_distance_m, initial_bearing_deg};
pub use gate::{GateDecision, GeoGate};
pub use publisher::{LiveLocationPublisher, PublishOutcome, PublisherHandle};
pub use sampler::{DistanceFilter, LocationSampler, PositionFeed};
