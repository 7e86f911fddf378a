//! # Checkpoint Applier
//!
//! The single path through which a queued checkpoint reaches the authoritative
//! store. The online submitter and the drain both call
//! [`CheckpointApplier::apply`], so a checkpoint commits the same way whether it
//! was taken with or without connectivity.
//!
//! ## Decision order
//!
//! 1. Route missing → [`ApplyOutcome::RouteNotFound`]
//! 2. Stop missing → [`ApplyOutcome::StopNotFound`]
//! 3. Stop already carries this checkpoint id → [`ApplyOutcome::AlreadyApplied`]
//! 4. Route completed or cancelled → [`ApplyOutcome::RouteClosed`]
//! 5. Route not started, or caller not the assigned operator → error
//! 6. Stop no longer pending → [`ApplyOutcome::Conflict`]
//! 7. Otherwise the stop transition (and the route finish when it was the last
//!    pending stop) is written in one update
//!
//! Every `ApplyOutcome` is final for the entry; only an [`ApplyError`] keeps it
//! queued.
//!
//! Applies for the same route are serialized, so the read-modify-write of one
//! checkpoint never interleaves with another on that route and the finish
//! transition is observed by exactly one of them.

use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::models::{OperatorId, PendingCheckpoint, Route, RouteId, Stop};
use crate::route::RouteFinalizer;
use crate::services::{RouteStore, RouteUpdate, StoreError};
use crate::state_machine::{
    ExecutionStatus, RouteEvent, RouteStateMachine, RouteTransition, StateMachineError,
    StopStateMachine, StopStatus,
};

/// Final result of applying one checkpoint
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// Committed; `route_finished` when this was the last pending stop
    Applied { route_finished: bool },
    /// The stop already records this checkpoint
    AlreadyApplied,
    /// The stop was made terminal by someone else
    Conflict { current_status: StopStatus },
    RouteNotFound,
    StopNotFound,
    RouteClosed { status: ExecutionStatus },
}

impl ApplyOutcome {
    /// Whether the checkpoint's effect is now in the store
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Applied { .. } | Self::AlreadyApplied)
    }
}

/// Failures that leave the checkpoint in the queue
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApplyError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Operator {operator_id} is not assigned to route {route_id}")]
    NotAssignedOperator {
        route_id: RouteId,
        operator_id: OperatorId,
    },

    #[error("Route {route_id} has not been started")]
    RouteNotStarted { route_id: RouteId },

    #[error("Checkpoint rejected: {0}")]
    Rejected(#[from] StateMachineError),
}

impl ApplyError {
    /// Transient errors are retried on the next trigger
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Store(error) if error.is_transient())
    }
}

pub struct CheckpointApplier {
    store: Arc<dyn RouteStore>,
    stop_machine: StopStateMachine,
    route_machine: RouteStateMachine,
    finalizer: Arc<RouteFinalizer>,
    store_timeout: Duration,
    route_locks: DashMap<RouteId, Arc<Mutex<()>>>,
}

impl CheckpointApplier {
    pub fn new(
        store: Arc<dyn RouteStore>,
        stop_machine: StopStateMachine,
        route_machine: RouteStateMachine,
        finalizer: Arc<RouteFinalizer>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            stop_machine,
            route_machine,
            finalizer,
            store_timeout,
            route_locks: DashMap::new(),
        }
    }

    pub fn finalizer(&self) -> &Arc<RouteFinalizer> {
        &self.finalizer
    }

    /// Commit `checkpoint` against the authoritative store
    pub async fn apply(&self, checkpoint: &PendingCheckpoint) -> Result<ApplyOutcome, ApplyError> {
        let route_lock = self
            .route_locks
            .entry(checkpoint.route_id.clone())
            .or_default()
            .clone();
        let _route_guard = route_lock.lock().await;

        self.apply_locked(checkpoint).await
    }

    async fn apply_locked(
        &self,
        checkpoint: &PendingCheckpoint,
    ) -> Result<ApplyOutcome, ApplyError> {
        let Some(mut route) = self
            .with_timeout(self.store.fetch_route(&checkpoint.route_id))
            .await?
        else {
            return Ok(ApplyOutcome::RouteNotFound);
        };

        let Some(stop) = route.stop(&checkpoint.stop_id) else {
            return Ok(ApplyOutcome::StopNotFound);
        };

        if stop.checkpoint_id.as_ref() == Some(&checkpoint.id) {
            debug!(checkpoint_id = %checkpoint.id, "Checkpoint already recorded on stop");
            return Ok(ApplyOutcome::AlreadyApplied);
        }

        match route.execution_status {
            ExecutionStatus::Completed | ExecutionStatus::Cancelled => {
                return Ok(ApplyOutcome::RouteClosed {
                    status: route.execution_status,
                });
            }
            ExecutionStatus::Pending => {
                return Err(ApplyError::RouteNotStarted {
                    route_id: route.id.clone(),
                });
            }
            ExecutionStatus::InProgress => {}
        }

        if !route.is_assigned_to(&checkpoint.operator_id) {
            return Err(ApplyError::NotAssignedOperator {
                route_id: route.id.clone(),
                operator_id: checkpoint.operator_id.clone(),
            });
        }

        if !stop.is_pending() {
            return Ok(ApplyOutcome::Conflict {
                current_status: stop.status,
            });
        }

        let stop_transition = StopStateMachine::apply(stop, checkpoint)?;
        route.replace_stop(stop_transition.stop.clone());

        let route_transition = if route.is_finished() {
            Some(RouteStateMachine::apply(
                &mut route,
                RouteEvent::Finish,
                checkpoint.created_at,
            )?)
        } else {
            None
        };

        let update = Self::build_update(checkpoint, &stop_transition.stop, &route, &route_transition);
        match self.with_timeout(self.store.update_route(update)).await {
            Ok(()) => {}
            Err(ApplyError::Store(StoreError::RouteNotFound(_))) => {
                return Ok(ApplyOutcome::RouteNotFound)
            }
            Err(ApplyError::Store(StoreError::StopNotFound { .. })) => {
                return Ok(ApplyOutcome::StopNotFound)
            }
            Err(error) => return Err(error),
        }

        info!(
            checkpoint_id = %checkpoint.id,
            route_id = %route.id,
            stop_id = %checkpoint.stop_id,
            outcome = checkpoint.outcome.kind(),
            "✅ Checkpoint committed"
        );

        if let Err(error) = self.stop_machine.execute_actions(&stop_transition).await {
            warn!(checkpoint_id = %checkpoint.id, error = %error, "⚠️ Stop transition action failed");
        }

        let route_finished = route_transition.is_some();
        if let Some(transition) = &route_transition {
            self.finish_route(&route, transition).await;
        }

        Ok(ApplyOutcome::Applied { route_finished })
    }

    fn build_update(
        checkpoint: &PendingCheckpoint,
        stop: &Stop,
        route: &Route,
        route_transition: &Option<RouteTransition>,
    ) -> RouteUpdate {
        let mut update = RouteUpdate::new(route.id.clone())
            .with_stop(stop.clone())
            .updated_by(checkpoint.operator_id.clone())
            .with_updated_at(checkpoint.created_at);

        if route_transition.is_some() {
            update = update.with_execution_status(route.execution_status);
            if let Some(completed_at) = route.completed_at {
                update = update.with_completed_at(completed_at);
            }
        }

        update
    }

    async fn finish_route(&self, route: &Route, transition: &RouteTransition) {
        info!(
            route_id = %route.id,
            completed_at = %transition.at,
            "🏁 Route finished"
        );

        if let Err(error) = self.route_machine.execute_actions(transition).await {
            warn!(route_id = %route.id, error = %error, "⚠️ Route transition action failed");
        }

        self.finalizer.finalize(route).await;
    }

    async fn with_timeout<T>(
        &self,
        operation: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, ApplyError> {
        match tokio::time::timeout(self.store_timeout, operation).await {
            Ok(result) => result.map_err(ApplyError::from),
            Err(_) => Err(ApplyError::Store(StoreError::Timeout(self.store_timeout))),
        }
    }
}

impl std::fmt::Debug for CheckpointApplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckpointApplier")
            .field("store_timeout", &self.store_timeout)
            .finish()
    }
}
