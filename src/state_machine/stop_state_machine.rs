use chrono::{DateTime, Utc};

use super::{
    actions::{PublishTransitionEventAction, StateAction},
    errors::{StateMachineError, StateMachineResult, ValidationError},
    events::StopEvent,
    guards::{ConfirmationMatchesStopGuard, StateGuard, StopIsPendingGuard},
    states::StopStatus,
};
use crate::events::EventPublisher;
use crate::models::{CheckpointId, PendingCheckpoint, RouteId, Stop};

/// Result of applying a checkpoint to a stop, before it is persisted
#[derive(Debug, Clone, PartialEq)]
pub struct StopTransition {
    pub route_id: RouteId,
    /// The stop as it must be stored after the transition
    pub stop: Stop,
    pub from: StopStatus,
    pub to: StopStatus,
    pub event: StopEvent,
    pub checkpoint_id: CheckpointId,
    pub checked_at: DateTime<Utc>,
}

/// Stop lifecycle: `pending -> completed` and `pending -> skipped`, nothing else.
///
/// Transitions are computed without side effects so the exact same logic backs
/// the online commit, the queue drain and the local offline projection. Actions
/// run only after the caller has persisted the transition.
#[derive(Debug, Clone)]
pub struct StopStateMachine {
    event_publisher: EventPublisher,
}

impl StopStateMachine {
    pub fn new(event_publisher: EventPublisher) -> Self {
        Self { event_publisher }
    }

    /// Determine the target state based on current state and event
    pub fn determine_target_state(
        current_state: StopStatus,
        event: &StopEvent,
    ) -> StateMachineResult<StopStatus> {
        let target = match (current_state, event) {
            (StopStatus::Pending, StopEvent::Complete(_)) => StopStatus::Completed,
            (StopStatus::Pending, StopEvent::Skip(_)) => StopStatus::Skipped,
            (from_state, _) => {
                return Err(StateMachineError::InvalidTransition {
                    from: Some(from_state.to_string()),
                    event: event.event_type().to_string(),
                })
            }
        };

        Ok(target)
    }

    /// Check guard conditions for the transition
    pub fn check_guards(stop: &Stop, event: &StopEvent) -> StateMachineResult<()> {
        StopIsPendingGuard.check(stop)?;

        if let StopEvent::Complete(confirmation) = event {
            ConfirmationMatchesStopGuard::new(confirmation).check(stop)?;
        }

        Ok(())
    }

    /// Compute the stop produced by applying `checkpoint` to `stop`.
    ///
    /// Fails when the checkpoint is malformed, the stop is not pending, or the
    /// confirmation variant does not match the stop type.
    pub fn apply(stop: &Stop, checkpoint: &PendingCheckpoint) -> StateMachineResult<StopTransition> {
        if !checkpoint.has_consistent_id() {
            return Err(ValidationError::InconsistentCheckpointId {
                id: checkpoint.id.clone(),
            }
            .into());
        }

        let event = StopEvent::from(&checkpoint.outcome);
        if let StopEvent::Complete(confirmation) = &event {
            confirmation.validate()?;
        }

        Self::check_guards(stop, &event)?;
        let target = Self::determine_target_state(stop.status, &event)?;

        let mut updated = stop.clone();
        updated.status = target;
        updated.checked_at = Some(checkpoint.created_at);
        updated.checkpoint_id = Some(checkpoint.id.clone());
        match &event {
            StopEvent::Complete(confirmation) => {
                updated.confirmation = Some(confirmation.clone());
                updated.skip_reason = None;
                updated.notes = checkpoint.notes.clone();
            }
            StopEvent::Skip(reason) => {
                updated.confirmation = None;
                updated.skip_reason = Some(*reason);
                updated.notes = Some(reason.label().to_string());
            }
        }

        Ok(StopTransition {
            route_id: checkpoint.route_id.clone(),
            stop: updated,
            from: stop.status,
            to: target,
            event,
            checkpoint_id: checkpoint.id.clone(),
            checked_at: checkpoint.created_at,
        })
    }

    /// Execute actions after the transition has been persisted
    pub async fn execute_actions(&self, transition: &StopTransition) -> StateMachineResult<()> {
        let actions: Vec<Box<dyn StateAction<StopTransition> + Send + Sync>> = vec![Box::new(
            PublishTransitionEventAction::new(self.event_publisher.clone()),
        )];

        for action in actions {
            action.execute(transition).await?;
        }

        tracing::debug!(
            route_id = %transition.route_id,
            stop_id = %transition.stop.id,
            from = %transition.from,
            to = %transition.to,
            "🔄 Stop transition actions executed"
        );

        Ok(())
    }
}
