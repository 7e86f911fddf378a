use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::constants::events;
use crate::models::{CheckpointId, OperatorId, RouteCost, RouteId, SkipReason, StopId};
use crate::state_machine::{ExecutionStatus, StopStatus};
use crate::sync::ErrorCategory;

/// Counters reported when a drain pass ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainSummary {
    pub committed: usize,
    pub dropped: usize,
    pub failed: usize,
    pub remaining: usize,
}

/// Everything the core announces to observers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExecutionEvent {
    StopCompleted {
        route_id: RouteId,
        stop_id: StopId,
        checkpoint_id: CheckpointId,
    },
    StopSkipped {
        route_id: RouteId,
        stop_id: StopId,
        checkpoint_id: CheckpointId,
        reason: SkipReason,
    },
    RouteStarted {
        route_id: RouteId,
        operator_id: OperatorId,
        started_at: DateTime<Utc>,
    },
    RouteFinished {
        route_id: RouteId,
        completed_at: DateTime<Utc>,
    },
    RouteCancelled {
        route_id: RouteId,
    },
    RouteCostRecomputed {
        route_id: RouteId,
        cost: RouteCost,
    },
    /// Accepted locally; will commit when connectivity allows
    CheckpointQueuedOffline {
        checkpoint_id: CheckpointId,
        route_id: RouteId,
        stop_id: StopId,
    },
    CheckpointCommitted {
        checkpoint_id: CheckpointId,
        route_id: RouteId,
        stop_id: StopId,
    },
    CheckpointAlreadyApplied {
        checkpoint_id: CheckpointId,
        route_id: RouteId,
        stop_id: StopId,
    },
    ConflictDropped {
        checkpoint_id: CheckpointId,
        route_id: RouteId,
        stop_id: StopId,
        current_status: StopStatus,
    },
    /// `stop_id` is `None` when the whole route no longer exists
    NotFoundDropped {
        checkpoint_id: CheckpointId,
        route_id: RouteId,
        stop_id: Option<StopId>,
    },
    RouteClosedDropped {
        checkpoint_id: CheckpointId,
        route_id: RouteId,
        status: ExecutionStatus,
    },
    SyncFailed {
        checkpoint_id: CheckpointId,
        route_id: RouteId,
        category: ErrorCategory,
        message: String,
        permanent: bool,
    },
    CheckpointRetracted {
        checkpoint_id: CheckpointId,
        route_id: RouteId,
    },
    DrainStarted {
        trigger: String,
        queued: usize,
    },
    DrainFinished(DrainSummary),
}

impl ExecutionEvent {
    /// Stable event name, as listed in [`crate::constants::events`]
    pub fn name(&self) -> &'static str {
        match self {
            Self::StopCompleted { .. } => events::STOP_COMPLETED,
            Self::StopSkipped { .. } => events::STOP_SKIPPED,
            Self::RouteStarted { .. } => events::ROUTE_STARTED,
            Self::RouteFinished { .. } => events::ROUTE_FINISHED,
            Self::RouteCancelled { .. } => events::ROUTE_CANCELLED,
            Self::RouteCostRecomputed { .. } => events::ROUTE_COST_RECOMPUTED,
            Self::CheckpointQueuedOffline { .. } => events::CHECKPOINT_QUEUED_OFFLINE,
            Self::CheckpointCommitted { .. } => events::CHECKPOINT_COMMITTED,
            Self::CheckpointAlreadyApplied { .. } => events::CHECKPOINT_ALREADY_APPLIED,
            Self::ConflictDropped { .. } => events::CHECKPOINT_CONFLICT_DROPPED,
            Self::NotFoundDropped { .. } => events::CHECKPOINT_NOT_FOUND_DROPPED,
            Self::RouteClosedDropped { .. } => events::CHECKPOINT_ROUTE_CLOSED_DROPPED,
            Self::SyncFailed { .. } => events::CHECKPOINT_SYNC_FAILED,
            Self::CheckpointRetracted { .. } => events::CHECKPOINT_RETRACTED,
            Self::DrainStarted { .. } => events::SYNC_DRAIN_STARTED,
            Self::DrainFinished(_) => events::SYNC_DRAIN_FINISHED,
        }
    }

    /// Route the event concerns, if any
    pub fn route_id(&self) -> Option<&RouteId> {
        match self {
            Self::StopCompleted { route_id, .. }
            | Self::StopSkipped { route_id, .. }
            | Self::RouteStarted { route_id, .. }
            | Self::RouteFinished { route_id, .. }
            | Self::RouteCancelled { route_id }
            | Self::RouteCostRecomputed { route_id, .. }
            | Self::CheckpointQueuedOffline { route_id, .. }
            | Self::CheckpointCommitted { route_id, .. }
            | Self::CheckpointAlreadyApplied { route_id, .. }
            | Self::ConflictDropped { route_id, .. }
            | Self::NotFoundDropped { route_id, .. }
            | Self::RouteClosedDropped { route_id, .. }
            | Self::SyncFailed { route_id, .. }
            | Self::CheckpointRetracted { route_id, .. } => Some(route_id),
            Self::DrainStarted { .. } | Self::DrainFinished(_) => None,
        }
    }
}
