//! Broadcast publisher for [`ExecutionEvent`]s.
//!
//! ```rust
//! use waypoint_core::events::{EventPublisher, ExecutionEvent};
//! use waypoint_core::models::RouteId;
//!
//! # tokio_test::block_on(async {
//! let publisher = EventPublisher::new(16);
//! let mut receiver = publisher.subscribe();
//!
//! publisher.publish(ExecutionEvent::RouteCancelled {
//!     route_id: RouteId::new("order-1"),
//! });
//!
//! let received = receiver.recv().await.unwrap();
//! assert_eq!(received.name(), "route.cancelled");
//! # });
//! ```

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use super::types::ExecutionEvent;
use crate::constants::defaults;

/// Fan-out publisher for execution events
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

/// Event that has been published
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub event: ExecutionEvent,
    pub published_at: DateTime<Utc>,
}

impl PublishedEvent {
    pub fn name(&self) -> &'static str {
        self.event.name()
    }
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event, returning how many subscribers received it.
    ///
    /// Having no subscribers is normal; the event is simply discarded.
    pub fn publish(&self, event: ExecutionEvent) -> usize {
        tracing::trace!(event = event.name(), "📣 Publishing execution event");

        let published = PublishedEvent {
            event,
            published_at: Utc::now(),
        };

        self.sender.send(published).unwrap_or(0)
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(defaults::EVENT_CHANNEL_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RouteId;

    #[tokio::test]
    async fn test_publish_without_subscribers_is_not_an_error() {
        let publisher = EventPublisher::new(8);
        let delivered = publisher.publish(ExecutionEvent::RouteCancelled {
            route_id: RouteId::new("order-1"),
        });
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_subscribers_receive_events_in_order() {
        let publisher = EventPublisher::default();
        let mut receiver = publisher.subscribe();
        assert_eq!(publisher.subscriber_count(), 1);

        publisher.publish(ExecutionEvent::RouteCancelled {
            route_id: RouteId::new("order-1"),
        });
        publisher.publish(ExecutionEvent::RouteCancelled {
            route_id: RouteId::new("order-2"),
        });

        let first = receiver.recv().await.unwrap();
        let second = receiver.recv().await.unwrap();
        assert_eq!(first.name(), "route.cancelled");
        assert_eq!(first.event.route_id(), Some(&RouteId::new("order-1")));
        assert_eq!(second.event.route_id(), Some(&RouteId::new("order-2")));
    }
}
