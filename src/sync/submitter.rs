//! # Checkpoint Submitter
//!
//! Entry point for operator actions on a stop. Every accepted checkpoint is
//! validated, written to the local queue and only then offered to the
//! authoritative store:
//!
//! ```text
//! form / skip reason
//!     │ validate (ConfirmationForm::build + StopStateMachine::apply)
//!     ▼
//! queue.enqueue ──offline──────────────────────────▶ QueuedOffline
//!     │ online
//!     ├─ older entries for the route ── request drain ▶ QueuedOffline
//!     ▼
//! SyncCoordinator::commit_single
//!     ├─ committed ─────────────────────────────────▶ Committed
//!     ├─ dropped (conflict, not found, closed) ─────▶ Dropped
//!     ├─ transient failure ─────────────────────────▶ QueuedOffline
//!     └─ permanent failure ─────────────────────────▶ NeedsAttention
//! ```

use chrono::Utc;
use dashmap::DashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::applier::{ApplyError, ApplyOutcome};
use super::coordinator::{SyncCoordinator, SyncTrigger};
use super::scheduler::SyncHandle;
use crate::events::{EventPublisher, ExecutionEvent};
use crate::logging;
use crate::models::{
    CheckpointId, CheckpointOutcome, OperatorId, PendingCheckpoint, Route, RouteId, SkipReason,
    StopId,
};
use crate::queue::{CheckpointQueue, EnqueueOutcome, QueueError};
use crate::services::Connectivity;
use crate::state_machine::{ConfirmationForm, StateMachineError, StopStateMachine, ValidationError};

/// What happened to a submitted checkpoint
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Committed {
        checkpoint_id: CheckpointId,
        route_finished: bool,
    },
    /// Durably queued; commits on a later drain
    QueuedOffline { checkpoint_id: CheckpointId },
    /// The store made the checkpoint moot and it was removed from the queue
    Dropped {
        checkpoint_id: CheckpointId,
        outcome: ApplyOutcome,
    },
    /// Kept in the queue after a permanent failure
    NeedsAttention {
        checkpoint_id: CheckpointId,
        error: ApplyError,
    },
}

impl SubmitOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Committed { .. } => "committed",
            Self::QueuedOffline { .. } => "queued_offline",
            Self::Dropped { .. } => "dropped",
            Self::NeedsAttention { .. } => "needs_attention",
        }
    }

    pub fn checkpoint_id(&self) -> &CheckpointId {
        match self {
            Self::Committed { checkpoint_id, .. }
            | Self::QueuedOffline { checkpoint_id }
            | Self::Dropped { checkpoint_id, .. }
            | Self::NeedsAttention { checkpoint_id, .. } => checkpoint_id,
        }
    }
}

/// Rejections before anything was queued
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Stop {stop_id} is not part of route {route_id}")]
    UnknownStop { route_id: RouteId, stop_id: StopId },

    #[error("Stop {stop_id} already has a submission in flight")]
    StopBusy { stop_id: StopId },

    #[error("Invalid confirmation: {0}")]
    Validation(#[from] ValidationError),

    #[error("Transition rejected: {0}")]
    Transition(#[from] StateMachineError),

    #[error("Failed to queue checkpoint: {0}")]
    Queue(#[from] QueueError),
}

/// Removes the stop from the busy set when dropped
struct BusyStop<'a> {
    busy: &'a DashSet<(RouteId, StopId)>,
    key: (RouteId, StopId),
}

impl Drop for BusyStop<'_> {
    fn drop(&mut self) {
        self.busy.remove(&self.key);
    }
}

pub struct CheckpointSubmitter {
    queue: Arc<dyn CheckpointQueue>,
    coordinator: Arc<SyncCoordinator>,
    connectivity: Connectivity,
    event_publisher: EventPublisher,
    sync_handle: Option<SyncHandle>,
    busy: DashSet<(RouteId, StopId)>,
}

impl CheckpointSubmitter {
    pub fn new(
        queue: Arc<dyn CheckpointQueue>,
        coordinator: Arc<SyncCoordinator>,
        connectivity: Connectivity,
        event_publisher: EventPublisher,
    ) -> Self {
        Self {
            queue,
            coordinator,
            connectivity,
            event_publisher,
            sync_handle: None,
            busy: DashSet::new(),
        }
    }

    /// Route drain requests for checkpoints queued behind older entries
    pub fn with_sync_handle(mut self, handle: SyncHandle) -> Self {
        self.sync_handle = Some(handle);
        self
    }

    /// Whether a submission for this stop is outstanding
    pub fn is_busy(&self, route_id: &RouteId, stop_id: &StopId) -> bool {
        self.busy.contains(&(route_id.clone(), stop_id.clone()))
    }

    /// Complete a stop with the answers collected in `form`
    pub async fn submit_completion(
        &self,
        route: &Route,
        stop_id: &StopId,
        operator_id: &OperatorId,
        form: &ConfirmationForm,
        notes: Option<String>,
    ) -> Result<SubmitOutcome, SubmitError> {
        let stop = route.stop(stop_id).ok_or_else(|| SubmitError::UnknownStop {
            route_id: route.id.clone(),
            stop_id: stop_id.clone(),
        })?;
        let confirmation = form.build(stop.stop_type)?;

        self.submit(
            route,
            stop_id,
            operator_id,
            CheckpointOutcome::Completed { confirmation },
            notes.filter(|text| !text.trim().is_empty()),
        )
        .await
    }

    /// Skip a stop for `reason`
    pub async fn submit_skip(
        &self,
        route: &Route,
        stop_id: &StopId,
        operator_id: &OperatorId,
        reason: SkipReason,
    ) -> Result<SubmitOutcome, SubmitError> {
        self.submit(
            route,
            stop_id,
            operator_id,
            CheckpointOutcome::Skipped { reason },
            None,
        )
        .await
    }

    async fn submit(
        &self,
        route: &Route,
        stop_id: &StopId,
        operator_id: &OperatorId,
        outcome: CheckpointOutcome,
        notes: Option<String>,
    ) -> Result<SubmitOutcome, SubmitError> {
        let stop = route.stop(stop_id).ok_or_else(|| SubmitError::UnknownStop {
            route_id: route.id.clone(),
            stop_id: stop_id.clone(),
        })?;

        let _busy = self.mark_busy(&route.id, stop_id)?;

        let checkpoint = PendingCheckpoint::new(
            route.id.clone(),
            stop_id.clone(),
            operator_id.clone(),
            outcome,
            notes,
            Utc::now(),
        );
        StopStateMachine::apply(stop, &checkpoint)?;

        if self.queue.enqueue(&checkpoint).await? == EnqueueOutcome::AlreadyQueued {
            debug!(checkpoint_id = %checkpoint.id, "Checkpoint was already queued");
        }
        if let Err(error) = self.coordinator.refresh_pending_count().await {
            warn!(error = %error, "⚠️ Failed to refresh pending checkpoint count");
        }

        if !self.connectivity.is_online() {
            return Ok(self.queued_offline(&checkpoint));
        }

        if self.has_older_entries(&checkpoint).await? {
            debug!(
                checkpoint_id = %checkpoint.id,
                route_id = %checkpoint.route_id,
                "Older checkpoints queued for route, deferring to drain"
            );
            if let Some(handle) = &self.sync_handle {
                handle.request(SyncTrigger::Submission);
            }
            return Ok(self.queued_offline(&checkpoint));
        }

        let result = match self.coordinator.commit_single(&checkpoint).await {
            Ok(None) => self.queued_offline(&checkpoint),
            Ok(Some(ApplyOutcome::Applied { route_finished })) => SubmitOutcome::Committed {
                checkpoint_id: checkpoint.id.clone(),
                route_finished,
            },
            Ok(Some(ApplyOutcome::AlreadyApplied)) => SubmitOutcome::Committed {
                checkpoint_id: checkpoint.id.clone(),
                route_finished: false,
            },
            Ok(Some(outcome)) => SubmitOutcome::Dropped {
                checkpoint_id: checkpoint.id.clone(),
                outcome,
            },
            Err(error) if error.is_transient() => self.queued_offline(&checkpoint),
            Err(error) => SubmitOutcome::NeedsAttention {
                checkpoint_id: checkpoint.id.clone(),
                error,
            },
        };

        if matches!(result, SubmitOutcome::Committed { .. } | SubmitOutcome::Dropped { .. }) {
            self.request_drain_if_route_queued(&checkpoint.route_id).await;
        }

        logging::log_checkpoint_operation(
            "submit",
            Some(checkpoint.id.as_str()),
            Some(checkpoint.route_id.as_str()),
            Some(checkpoint.stop_id.as_str()),
            result.label(),
            Some(checkpoint.outcome.kind()),
        );

        Ok(result)
    }

    fn mark_busy(&self, route_id: &RouteId, stop_id: &StopId) -> Result<BusyStop<'_>, SubmitError> {
        let key = (route_id.clone(), stop_id.clone());
        if !self.busy.insert(key.clone()) {
            return Err(SubmitError::StopBusy {
                stop_id: stop_id.clone(),
            });
        }
        Ok(BusyStop {
            busy: &self.busy,
            key,
        })
    }

    async fn has_older_entries(&self, checkpoint: &PendingCheckpoint) -> Result<bool, QueueError> {
        let queued = self.queue.list_for_route(&checkpoint.route_id).await?;
        Ok(queued
            .first()
            .is_some_and(|oldest| oldest.id != checkpoint.id))
    }

    /// Entries queued behind this commit were deferred by any concurrent pass
    async fn request_drain_if_route_queued(&self, route_id: &RouteId) {
        let Some(handle) = &self.sync_handle else {
            return;
        };
        match self.queue.list_for_route(route_id).await {
            Ok(queued) if !queued.is_empty() => {
                debug!(route_id = %route_id, queued = queued.len(), "Route still has queued checkpoints");
                handle.request(SyncTrigger::Submission);
            }
            Ok(_) => {}
            Err(error) => warn!(error = %error, "⚠️ Failed to read queued checkpoints for route"),
        }
    }

    fn queued_offline(&self, checkpoint: &PendingCheckpoint) -> SubmitOutcome {
        info!(
            checkpoint_id = %checkpoint.id,
            route_id = %checkpoint.route_id,
            stop_id = %checkpoint.stop_id,
            "📥 Checkpoint queued for later sync"
        );
        self.event_publisher
            .publish(ExecutionEvent::CheckpointQueuedOffline {
                checkpoint_id: checkpoint.id.clone(),
                route_id: checkpoint.route_id.clone(),
                stop_id: checkpoint.stop_id.clone(),
            });

        SubmitOutcome::QueuedOffline {
            checkpoint_id: checkpoint.id.clone(),
        }
    }
}
