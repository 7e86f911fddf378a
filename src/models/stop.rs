use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::checkpoint::CheckpointId;
use super::confirmation::{Confirmation, SkipReason};
use super::identifiers::StopId;
use super::location::GeoPoint;
use crate::state_machine::StopStatus;

/// Position of a stop within its route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopType {
    Origin,
    Intermediate,
    Destination,
}

impl fmt::Display for StopType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Origin => write!(f, "origin"),
            Self::Intermediate => write!(f, "intermediate"),
            Self::Destination => write!(f, "destination"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub description: String,
    /// Missing when the address was never geocoded
    pub coordinates: Option<GeoPoint>,
}

impl Address {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            coordinates: None,
        }
    }

    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.coordinates = Some(GeoPoint::new(latitude, longitude));
        self
    }
}

/// A single addressed checkpoint within a route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub id: StopId,
    pub name: Option<String>,
    pub stop_type: StopType,
    pub address: Address,
    pub planned_time: Option<DateTime<Utc>>,
    pub status: StopStatus,
    pub checked_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    /// Proof of completion; present only on completed stops
    pub confirmation: Option<Confirmation>,
    /// Present only on skipped stops
    pub skip_reason: Option<SkipReason>,
    /// The checkpoint that moved this stop into its terminal state
    pub checkpoint_id: Option<CheckpointId>,
}

impl Stop {
    pub fn new(id: impl Into<StopId>, stop_type: StopType, address: Address) -> Self {
        Self {
            id: id.into(),
            name: None,
            stop_type,
            address,
            planned_time: None,
            status: StopStatus::Pending,
            checked_at: None,
            notes: None,
            confirmation: None,
            skip_reason: None,
            checkpoint_id: None,
        }
    }

    pub fn origin(id: impl Into<StopId>, address: Address) -> Self {
        Self::new(id, StopType::Origin, address)
    }

    pub fn intermediate(id: impl Into<StopId>, address: Address) -> Self {
        Self::new(id, StopType::Intermediate, address)
    }

    pub fn destination(id: impl Into<StopId>, address: Address) -> Self {
        Self::new(id, StopType::Destination, address)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_planned_time(mut self, planned_time: DateTime<Utc>) -> Self {
        self.planned_time = Some(planned_time);
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == StopStatus::Pending
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn coordinates(&self) -> Option<GeoPoint> {
        self.address.coordinates
    }
}
