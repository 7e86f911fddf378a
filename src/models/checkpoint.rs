//! Queued checkpoint events.
//!
//! A [`PendingCheckpoint`] is the self-contained record of an operator completing
//! or skipping a stop. It is written to the offline queue before any network
//! attempt and replayed against the authoritative store until it commits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::confirmation::{Confirmation, SkipReason};
use super::identifiers::{OperatorId, RouteId, StopId};
use crate::state_machine::StopStatus;

/// Stable checkpoint identifier derived from route, stop and creation time.
///
/// The same checkpoint keeps the same id across every retry, which is what lets
/// the store recognise a replay. Route and stop ids are length-prefixed
/// (`{len}:{route}.{len}:{stop}.{micros}`) because either may contain any
/// separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckpointId(String);

impl CheckpointId {
    /// Derive the id for a checkpoint created at `created_at`
    pub fn derive(route_id: &RouteId, stop_id: &StopId, created_at: DateTime<Utc>) -> Self {
        let route = route_id.as_str();
        let stop = stop_id.as_str();
        Self(format!(
            "{}:{route}.{}:{stop}.{}",
            route.len(),
            stop.len(),
            created_at.timestamp_micros()
        ))
    }

    /// Wrap an id read back from storage
    pub fn from_raw(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CheckpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the checkpoint does to its stop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckpointOutcome {
    Completed { confirmation: Confirmation },
    Skipped { reason: SkipReason },
}

impl CheckpointOutcome {
    /// Stop status this outcome leads to
    pub fn target_status(&self) -> StopStatus {
        match self {
            Self::Completed { .. } => StopStatus::Completed,
            Self::Skipped { .. } => StopStatus::Skipped,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Skipped { .. } => "skipped",
        }
    }
}

/// A checkpoint accepted from the operator and awaiting authoritative commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingCheckpoint {
    pub id: CheckpointId,
    pub route_id: RouteId,
    pub stop_id: StopId,
    pub operator_id: OperatorId,
    pub outcome: CheckpointOutcome,
    /// Free-text notes typed by the operator on completion
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PendingCheckpoint {
    pub fn new(
        route_id: RouteId,
        stop_id: StopId,
        operator_id: OperatorId,
        outcome: CheckpointOutcome,
        notes: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: CheckpointId::derive(&route_id, &stop_id, created_at),
            route_id,
            stop_id,
            operator_id,
            outcome,
            notes,
            created_at,
        }
    }

    pub fn completed(
        route_id: RouteId,
        stop_id: StopId,
        operator_id: OperatorId,
        confirmation: Confirmation,
        notes: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self::new(
            route_id,
            stop_id,
            operator_id,
            CheckpointOutcome::Completed { confirmation },
            notes,
            created_at,
        )
    }

    pub fn skipped(
        route_id: RouteId,
        stop_id: StopId,
        operator_id: OperatorId,
        reason: SkipReason,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self::new(
            route_id,
            stop_id,
            operator_id,
            CheckpointOutcome::Skipped { reason },
            None,
            created_at,
        )
    }

    /// Whether the id still matches its derivation from route, stop and time
    pub fn has_consistent_id(&self) -> bool {
        self.id == CheckpointId::derive(&self.route_id, &self.stop_id, self.created_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_checkpoint_id_derivation_is_stable() {
        let at = Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap();
        let route = RouteId::new("order-1");
        let stop = StopId::new("origin");

        let first = CheckpointId::derive(&route, &stop, at);
        let second = CheckpointId::derive(&route, &stop, at);
        assert_eq!(first, second);
        assert_eq!(
            first.as_str(),
            format!("7:order-1.6:origin.{}", at.timestamp_micros())
        );
    }

    #[test]
    fn test_dashed_ids_do_not_collide() {
        let at = Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap();
        let split_late = CheckpointId::derive(&RouteId::new("a-b"), &StopId::new("c"), at);
        let split_early = CheckpointId::derive(&RouteId::new("a"), &StopId::new("b-c"), at);
        assert_ne!(split_late, split_early);

        let dotted = CheckpointId::derive(&RouteId::new("a.1:b"), &StopId::new("c"), at);
        let shifted = CheckpointId::derive(&RouteId::new("a"), &StopId::new("1:b.1:c"), at);
        assert_ne!(dotted, shifted);
    }

    #[test]
    fn test_tampered_id_is_detected() {
        let mut checkpoint = PendingCheckpoint::skipped(
            RouteId::new("order-1"),
            StopId::new("stop-2"),
            OperatorId::new("driver-7"),
            SkipReason::ClientAbsent,
            Utc::now(),
        );
        assert!(checkpoint.has_consistent_id());

        checkpoint.stop_id = StopId::new("stop-3");
        assert!(!checkpoint.has_consistent_id());
    }

    #[test]
    fn test_outcome_serializes_with_tag() {
        let outcome = CheckpointOutcome::Skipped {
            reason: SkipReason::AddressProblem,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "skipped");
        assert_eq!(json["reason"], "address_problem");
        assert_eq!(outcome.target_status(), StopStatus::Skipped);
    }
}
