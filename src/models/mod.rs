//! # Domain Models
//!
//! Plain data types for route execution: routes and their ordered stops, the
//! type-specific confirmation payloads recorded at each stop, queued checkpoints,
//! and location samples.
//!
//! Models carry no I/O. Persistence lives behind [`crate::services::RouteStore`]
//! (authoritative) and [`crate::queue::CheckpointQueue`] (local, durable).

pub mod checkpoint;
pub mod confirmation;
pub mod identifiers;
pub mod location;
pub mod route;
pub mod stop;

pub use checkpoint::{CheckpointId, CheckpointOutcome, PendingCheckpoint};
pub use confirmation::{
    Confirmation, ConfirmationAnswer, DestinationConfirmation, EncodedImage,
    IntermediateConfirmation, OriginConfirmation, SkipReason, UnloadingAnswer,
};
pub use identifiers::{ClientId, OperatorId, RouteId, StopId};
pub use location::{GeoPoint, LiveLocationRecord, LocationSample};
pub use route::{Route, RouteCost, RouteLayoutError};
pub use stop::{Address, Stop, StopType};
