use chrono::{DateTime, Utc};

use super::{
    actions::{PublishTransitionEventAction, StateAction},
    errors::{StateMachineError, StateMachineResult},
    events::RouteEvent,
    guards::{AllStopsTerminalGuard, StateGuard},
    states::ExecutionStatus,
};
use crate::events::EventPublisher;
use crate::models::{OperatorId, Route, RouteId};

/// Route execution transition, computed before persistence
#[derive(Debug, Clone, PartialEq)]
pub struct RouteTransition {
    pub route_id: RouteId,
    pub operator_id: OperatorId,
    pub from: ExecutionStatus,
    pub to: ExecutionStatus,
    pub event: RouteEvent,
    pub at: DateTime<Utc>,
}

/// Route lifecycle: `pending -> in-progress -> completed`, with cancellation
/// from either non-terminal state.
#[derive(Debug, Clone)]
pub struct RouteStateMachine {
    event_publisher: EventPublisher,
}

impl RouteStateMachine {
    pub fn new(event_publisher: EventPublisher) -> Self {
        Self { event_publisher }
    }

    /// Determine the target state based on current state and event
    pub fn determine_target_state(
        current_state: ExecutionStatus,
        event: RouteEvent,
    ) -> StateMachineResult<ExecutionStatus> {
        let target = match (current_state, event) {
            (ExecutionStatus::Pending, RouteEvent::Start) => ExecutionStatus::InProgress,
            (ExecutionStatus::InProgress, RouteEvent::Finish) => ExecutionStatus::Completed,
            (ExecutionStatus::Pending, RouteEvent::Cancel) => ExecutionStatus::Cancelled,
            (ExecutionStatus::InProgress, RouteEvent::Cancel) => ExecutionStatus::Cancelled,
            (from_state, _) => {
                return Err(StateMachineError::InvalidTransition {
                    from: Some(from_state.to_string()),
                    event: event.event_type().to_string(),
                })
            }
        };

        Ok(target)
    }

    /// Apply `event` to `route` in place.
    ///
    /// `started_at` and `completed_at` are only ever written once.
    pub fn apply(
        route: &mut Route,
        event: RouteEvent,
        at: DateTime<Utc>,
    ) -> StateMachineResult<RouteTransition> {
        let from = route.execution_status;
        let target = Self::determine_target_state(from, event)?;

        if event == RouteEvent::Finish {
            AllStopsTerminalGuard.check(route)?;
        }

        route.execution_status = target;
        match event {
            RouteEvent::Start => {
                route.started_at.get_or_insert(at);
            }
            RouteEvent::Finish => {
                route.completed_at.get_or_insert(at);
            }
            RouteEvent::Cancel => {}
        }

        Ok(RouteTransition {
            route_id: route.id.clone(),
            operator_id: route.assigned_operator_id.clone(),
            from,
            to: target,
            event,
            at,
        })
    }

    /// Execute actions after the transition has been persisted
    pub async fn execute_actions(&self, transition: &RouteTransition) -> StateMachineResult<()> {
        let actions: Vec<Box<dyn StateAction<RouteTransition> + Send + Sync>> = vec![Box::new(
            PublishTransitionEventAction::new(self.event_publisher.clone()),
        )];

        for action in actions {
            action.execute(transition).await?;
        }

        Ok(())
    }
}
