//! # Sync Coordinator
//!
//! Drains the offline checkpoint queue against the authoritative store, one
//! entry at a time, oldest first.
//!
//! ## Drain pass
//!
//! - At most one pass runs at a time. A second request while a pass is running
//!   returns [`SyncError::AlreadyDraining`].
//! - Each entry goes through [`CheckpointApplier::apply`]. Every
//!   [`ApplyOutcome`] removes the entry; committed outcomes and drop decisions
//!   publish their own status event.
//! - A transient failure halts the pass with the entry still queued, so the
//!   replay order is preserved for the next trigger.
//! - A permanent failure keeps the entry for manual intervention and blocks the
//!   remaining entries of the same route for the rest of the pass. Other routes
//!   continue.
//! - An entry whose online commit is still in flight is left to that commit,
//!   and later entries of its route wait for the next pass.
//!
//! ## Retraction
//!
//! A queued checkpoint may be retracted only while no pass is running and no
//! online commit of that checkpoint is in flight.

use dashmap::DashSet;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::applier::{ApplyError, ApplyOutcome, CheckpointApplier};
use super::error_classifier::{ErrorClassification, ErrorClassifier, StandardErrorClassifier};
use crate::events::{DrainSummary, EventPublisher, ExecutionEvent};
use crate::logging;
use crate::models::{CheckpointId, PendingCheckpoint, RouteId};
use crate::queue::{CheckpointQueue, QueueError};
use crate::services::Connectivity;

/// Why a drain pass was requested
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncTrigger {
    ConnectivityRestored,
    RouteViewActivated(RouteId),
    Manual,
    /// Automatic retry after a transient halt; `attempt` starts at 1
    Retry { attempt: u32 },
    /// A checkpoint was queued behind older entries of its route
    Submission,
}

impl fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectivityRestored => write!(f, "connectivity_restored"),
            Self::RouteViewActivated(route_id) => write!(f, "route_view_activated:{route_id}"),
            Self::Manual => write!(f, "manual"),
            Self::Retry { attempt } => write!(f, "retry:{attempt}"),
            Self::Submission => write!(f, "submission"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("A drain pass is already running")]
    AlreadyDraining,

    #[error("Device is offline")]
    Offline,

    #[error("Checkpoint {0} is not queued")]
    NotQueued(CheckpointId),

    #[error("Checkpoint {0} is being committed")]
    CommitInFlight(CheckpointId),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

/// A queued entry that failed permanently in a pass
#[derive(Debug, Clone, PartialEq)]
pub struct PermanentFailure {
    pub checkpoint_id: CheckpointId,
    pub route_id: RouteId,
    pub classification: ErrorClassification,
}

/// What one drain pass did
#[derive(Debug, Clone, PartialEq)]
pub struct DrainReport {
    pub trigger: SyncTrigger,
    pub summary: DrainSummary,
    /// Set when the pass stopped early on a transient failure
    pub halted_by: Option<ErrorClassification>,
    pub permanent_failures: Vec<PermanentFailure>,
    pub finished_routes: Vec<RouteId>,
}

impl DrainReport {
    pub fn halted_on_transient(&self) -> bool {
        self.halted_by.is_some()
    }
}

/// Releases the busy flag when dropped
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SyncCoordinator {
    queue: Arc<dyn CheckpointQueue>,
    applier: Arc<CheckpointApplier>,
    classifier: Box<dyn ErrorClassifier>,
    connectivity: Connectivity,
    event_publisher: EventPublisher,
    busy: AtomicBool,
    in_flight: DashSet<CheckpointId>,
    pending_count: watch::Sender<usize>,
}

impl SyncCoordinator {
    pub fn new(
        queue: Arc<dyn CheckpointQueue>,
        applier: Arc<CheckpointApplier>,
        connectivity: Connectivity,
        event_publisher: EventPublisher,
    ) -> Self {
        let (pending_count, _) = watch::channel(0);
        Self {
            queue,
            applier,
            classifier: Box::new(StandardErrorClassifier::new()),
            connectivity,
            event_publisher,
            busy: AtomicBool::new(false),
            in_flight: DashSet::new(),
            pending_count,
        }
    }

    pub fn with_classifier(mut self, classifier: Box<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn queue(&self) -> &Arc<dyn CheckpointQueue> {
        &self.queue
    }

    pub fn is_draining(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Number of queued checkpoints, updated after every queue change
    pub fn pending_count(&self) -> watch::Receiver<usize> {
        self.pending_count.subscribe()
    }

    /// Re-read the queue length and publish it
    pub async fn refresh_pending_count(&self) -> Result<usize, SyncError> {
        let count = self.queue.len().await?;
        self.pending_count.send_replace(count);
        Ok(count)
    }

    /// Run one drain pass
    pub async fn drain(&self, trigger: SyncTrigger) -> Result<DrainReport, SyncError> {
        let _guard = self.try_acquire()?;

        if !self.connectivity.is_online() {
            debug!(trigger = %trigger, "Skipping drain while offline");
            return Err(SyncError::Offline);
        }

        let started = std::time::Instant::now();
        let entries = self.queue.list().await?;
        info!(trigger = %trigger, queued = entries.len(), "🔄 Drain pass started");
        self.event_publisher.publish(ExecutionEvent::DrainStarted {
            trigger: trigger.to_string(),
            queued: entries.len(),
        });

        let mut summary = DrainSummary::default();
        let mut halted_by = None;
        let mut permanent_failures = Vec::new();
        let mut finished_routes = Vec::new();
        let mut blocked_routes: HashSet<RouteId> = HashSet::new();

        for checkpoint in &entries {
            if blocked_routes.contains(&checkpoint.route_id) {
                debug!(
                    checkpoint_id = %checkpoint.id,
                    route_id = %checkpoint.route_id,
                    "Route blocked earlier in this pass"
                );
                continue;
            }
            if !self.in_flight.insert(checkpoint.id.clone()) {
                debug!(
                    checkpoint_id = %checkpoint.id,
                    route_id = %checkpoint.route_id,
                    "Online commit in flight, deferring the rest of the route"
                );
                blocked_routes.insert(checkpoint.route_id.clone());
                continue;
            }

            let result = self.applier.apply(checkpoint).await;
            self.in_flight.remove(&checkpoint.id);

            match result {
                Ok(outcome) => {
                    if outcome.is_committed() {
                        summary.committed += 1;
                    } else {
                        summary.dropped += 1;
                    }
                    if matches!(outcome, ApplyOutcome::Applied { route_finished: true }) {
                        finished_routes.push(checkpoint.route_id.clone());
                    }
                    self.settle(checkpoint, &outcome).await;
                }
                Err(apply_error) => {
                    let classification = self.report_failure(checkpoint, &apply_error);
                    if classification.is_transient {
                        halted_by = Some(classification);
                        break;
                    }
                    summary.failed += 1;
                    blocked_routes.insert(checkpoint.route_id.clone());
                    permanent_failures.push(PermanentFailure {
                        checkpoint_id: checkpoint.id.clone(),
                        route_id: checkpoint.route_id.clone(),
                        classification,
                    });
                }
            }
        }

        summary.remaining = self.refresh_pending_count().await?;

        info!(
            trigger = %trigger,
            committed = summary.committed,
            dropped = summary.dropped,
            failed = summary.failed,
            remaining = summary.remaining,
            halted = halted_by.is_some(),
            "🔄 Drain pass finished"
        );
        logging::log_sync_operation(
            "drain",
            Some(&trigger.to_string()),
            Some(entries.len()),
            if halted_by.is_some() { "halted" } else { "completed" },
            Some(started.elapsed().as_millis() as u64),
            None,
        );
        self.event_publisher
            .publish(ExecutionEvent::DrainFinished(summary));

        Ok(DrainReport {
            trigger,
            summary,
            halted_by,
            permanent_failures,
            finished_routes,
        })
    }

    /// Commit one freshly queued checkpoint through the same path as the drain.
    ///
    /// The entry is removed on any [`ApplyOutcome`]; on error it stays queued.
    /// Returns `Ok(None)` when a drain pass is already applying the entry.
    pub async fn commit_single(
        &self,
        checkpoint: &PendingCheckpoint,
    ) -> Result<Option<ApplyOutcome>, ApplyError> {
        if !self.in_flight.insert(checkpoint.id.clone()) {
            debug!(checkpoint_id = %checkpoint.id, "Entry already being applied");
            return Ok(None);
        }
        let result = self.applier.apply(checkpoint).await;
        self.in_flight.remove(&checkpoint.id);

        match &result {
            Ok(outcome) => self.settle(checkpoint, outcome).await,
            Err(apply_error) => {
                let classification = self.classifier.classify(apply_error);
                if classification.is_transient {
                    debug!(
                        checkpoint_id = %checkpoint.id,
                        error = %apply_error,
                        "Online commit failed transiently, entry stays queued"
                    );
                } else {
                    self.report_failure(checkpoint, apply_error);
                }
            }
        }

        if let Err(queue_error) = self.refresh_pending_count().await {
            warn!(error = %queue_error, "⚠️ Failed to refresh pending checkpoint count");
        }

        result.map(Some)
    }

    /// Withdraw a queued checkpoint that has not committed yet
    pub async fn retract(&self, checkpoint_id: &CheckpointId) -> Result<PendingCheckpoint, SyncError> {
        let _guard = self.try_acquire()?;

        if self.in_flight.contains(checkpoint_id) {
            return Err(SyncError::CommitInFlight(checkpoint_id.clone()));
        }

        let checkpoint = self
            .queue
            .get(checkpoint_id)
            .await?
            .ok_or_else(|| SyncError::NotQueued(checkpoint_id.clone()))?;

        if !self.queue.remove(checkpoint_id).await? {
            return Err(SyncError::NotQueued(checkpoint_id.clone()));
        }

        info!(
            checkpoint_id = %checkpoint.id,
            route_id = %checkpoint.route_id,
            "↩️ Checkpoint retracted"
        );
        self.event_publisher.publish(ExecutionEvent::CheckpointRetracted {
            checkpoint_id: checkpoint.id.clone(),
            route_id: checkpoint.route_id.clone(),
        });
        self.refresh_pending_count().await?;

        Ok(checkpoint)
    }

    fn try_acquire(&self) -> Result<BusyGuard<'_>, SyncError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SyncError::AlreadyDraining)?;
        Ok(BusyGuard(&self.busy))
    }

    /// Publish the outcome and remove the entry
    async fn settle(&self, checkpoint: &PendingCheckpoint, outcome: &ApplyOutcome) {
        let checkpoint_id = checkpoint.id.clone();
        let route_id = checkpoint.route_id.clone();
        let stop_id = checkpoint.stop_id.clone();

        let event = match outcome {
            ApplyOutcome::Applied { .. } => ExecutionEvent::CheckpointCommitted {
                checkpoint_id,
                route_id,
                stop_id,
            },
            ApplyOutcome::AlreadyApplied => {
                debug!(checkpoint_id = %checkpoint.id, "Replay of an applied checkpoint");
                ExecutionEvent::CheckpointAlreadyApplied {
                    checkpoint_id,
                    route_id,
                    stop_id,
                }
            }
            ApplyOutcome::Conflict { current_status } => {
                warn!(
                    checkpoint_id = %checkpoint.id,
                    stop_id = %checkpoint.stop_id,
                    current_status = %current_status,
                    "⚠️ Stop already terminal, dropping queued checkpoint"
                );
                ExecutionEvent::ConflictDropped {
                    checkpoint_id,
                    route_id,
                    stop_id,
                    current_status: *current_status,
                }
            }
            ApplyOutcome::RouteNotFound => {
                warn!(checkpoint_id = %checkpoint.id, route_id = %checkpoint.route_id, "⚠️ Route not found, dropping queued checkpoint");
                ExecutionEvent::NotFoundDropped {
                    checkpoint_id,
                    route_id,
                    stop_id: None,
                }
            }
            ApplyOutcome::StopNotFound => {
                warn!(checkpoint_id = %checkpoint.id, stop_id = %checkpoint.stop_id, "⚠️ Stop not found, dropping queued checkpoint");
                ExecutionEvent::NotFoundDropped {
                    checkpoint_id,
                    route_id,
                    stop_id: Some(stop_id),
                }
            }
            ApplyOutcome::RouteClosed { status } => {
                warn!(
                    checkpoint_id = %checkpoint.id,
                    route_id = %checkpoint.route_id,
                    status = %status,
                    "⚠️ Route closed, dropping queued checkpoint"
                );
                ExecutionEvent::RouteClosedDropped {
                    checkpoint_id,
                    route_id,
                    status: *status,
                }
            }
        };

        if let Err(queue_error) = self.queue.remove(&checkpoint.id).await {
            error!(
                checkpoint_id = %checkpoint.id,
                error = %queue_error,
                "❌ Failed to remove settled checkpoint; it will replay as a no-op"
            );
        }

        self.event_publisher.publish(event);
    }

    fn report_failure(
        &self,
        checkpoint: &PendingCheckpoint,
        apply_error: &ApplyError,
    ) -> ErrorClassification {
        let classification = self.classifier.classify(apply_error);

        if classification.is_transient {
            warn!(
                checkpoint_id = %checkpoint.id,
                category = %classification.category,
                error = %apply_error,
                "📴 Transient sync failure, halting pass"
            );
        } else {
            error!(
                checkpoint_id = %checkpoint.id,
                route_id = %checkpoint.route_id,
                category = %classification.category,
                error_code = classification.error_code,
                error = %apply_error,
                "❌ Permanent sync failure, entry kept for manual intervention"
            );
        }

        self.event_publisher.publish(ExecutionEvent::SyncFailed {
            checkpoint_id: checkpoint.id.clone(),
            route_id: checkpoint.route_id.clone(),
            category: classification.category,
            message: classification.message.clone(),
            permanent: !classification.is_transient,
        });

        classification
    }
}

impl fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("draining", &self.is_draining())
            .field("classifier", &self.classifier.classifier_name())
            .finish()
    }
}
