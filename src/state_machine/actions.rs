use async_trait::async_trait;

use super::errors::ActionResult;
use super::events::{RouteEvent, StopEvent};
use super::route_state_machine::RouteTransition;
use super::stop_state_machine::StopTransition;
use crate::events::{EventPublisher, ExecutionEvent};

/// Trait for implementing state transition actions.
///
/// Actions run after the transition is durably committed; a failing action
/// never rolls the transition back.
#[async_trait]
pub trait StateAction<T> {
    /// Execute the action
    async fn execute(&self, transition: &T) -> ActionResult<()>;

    /// Get a description of this action for logging
    fn description(&self) -> &'static str;
}

/// Action to publish lifecycle events when state transitions occur
pub struct PublishTransitionEventAction {
    event_publisher: EventPublisher,
}

impl PublishTransitionEventAction {
    pub fn new(event_publisher: EventPublisher) -> Self {
        Self { event_publisher }
    }
}

#[async_trait]
impl StateAction<StopTransition> for PublishTransitionEventAction {
    async fn execute(&self, transition: &StopTransition) -> ActionResult<()> {
        let event = match &transition.event {
            StopEvent::Complete(_) => ExecutionEvent::StopCompleted {
                route_id: transition.route_id.clone(),
                stop_id: transition.stop.id.clone(),
                checkpoint_id: transition.checkpoint_id.clone(),
            },
            StopEvent::Skip(reason) => ExecutionEvent::StopSkipped {
                route_id: transition.route_id.clone(),
                stop_id: transition.stop.id.clone(),
                checkpoint_id: transition.checkpoint_id.clone(),
                reason: *reason,
            },
        };

        self.event_publisher.publish(event);
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Publish lifecycle event for stop transition"
    }
}

#[async_trait]
impl StateAction<RouteTransition> for PublishTransitionEventAction {
    async fn execute(&self, transition: &RouteTransition) -> ActionResult<()> {
        let event = match transition.event {
            RouteEvent::Start => ExecutionEvent::RouteStarted {
                route_id: transition.route_id.clone(),
                operator_id: transition.operator_id.clone(),
                started_at: transition.at,
            },
            RouteEvent::Finish => ExecutionEvent::RouteFinished {
                route_id: transition.route_id.clone(),
                completed_at: transition.at,
            },
            RouteEvent::Cancel => ExecutionEvent::RouteCancelled {
                route_id: transition.route_id.clone(),
            },
        };

        self.event_publisher.publish(event);
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Publish lifecycle event for route transition"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OperatorId, RouteId};
    use crate::state_machine::ExecutionStatus;
    use chrono::Utc;

    #[tokio::test]
    async fn test_route_finish_publishes_route_finished() {
        let publisher = EventPublisher::new(4);
        let mut receiver = publisher.subscribe();
        let action = PublishTransitionEventAction::new(publisher);

        let transition = RouteTransition {
            route_id: RouteId::new("order-9"),
            operator_id: OperatorId::new("driver-1"),
            from: ExecutionStatus::InProgress,
            to: ExecutionStatus::Completed,
            event: RouteEvent::Finish,
            at: Utc::now(),
        };
        action.execute(&transition).await.unwrap();

        let published = receiver.recv().await.unwrap();
        assert_eq!(published.name(), "route.finished");
    }
}
