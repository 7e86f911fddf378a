//! # Route Finalizer
//!
//! Side effects that follow a route reaching `completed`: the client
//! notification and the best-effort cost recompute when stops were skipped.
//!
//! Neither step can fail the finish. The completion itself has already been
//! committed by the time the finalizer runs; everything here only logs on
//! failure and keeps the previously stored values.

use dashmap::DashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{NotificationConfig, RoutingConfig};
use crate::constants::notifications;
use crate::events::{EventPublisher, ExecutionEvent};
use crate::models::{Route, RouteCost, RouteId};
use crate::services::{
    dispatch_best_effort, Notification, NotificationDispatcher, NotificationSeverity, RouteStore,
    RouteUpdate, RoutingService,
};

/// What the finalizer managed to do for one finished route
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinalizationReport {
    pub client_notified: bool,
    pub recomputed_cost: Option<RouteCost>,
}

pub struct RouteFinalizer {
    store: Arc<dyn RouteStore>,
    notifier: Arc<dyn NotificationDispatcher>,
    routing: Option<Arc<dyn RoutingService>>,
    event_publisher: EventPublisher,
    notification_config: NotificationConfig,
    routing_config: RoutingConfig,
    store_timeout: Duration,
    /// Routes whose completion notification has already gone out in this process
    notified: DashSet<RouteId>,
}

impl RouteFinalizer {
    pub fn new(
        store: Arc<dyn RouteStore>,
        notifier: Arc<dyn NotificationDispatcher>,
        routing: Option<Arc<dyn RoutingService>>,
        event_publisher: EventPublisher,
        notification_config: NotificationConfig,
        routing_config: RoutingConfig,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            notifier,
            routing,
            event_publisher,
            notification_config,
            routing_config,
            store_timeout,
            notified: DashSet::new(),
        }
    }

    /// Run the post-finish side effects for `route`
    pub async fn finalize(&self, route: &Route) -> FinalizationReport {
        let client_notified = self.notify_client(route).await;
        let recomputed_cost = self.recompute_cost(route).await;

        info!(
            route_id = %route.id,
            client_notified = client_notified,
            cost_recomputed = recomputed_cost.is_some(),
            "🏁 Route finalized"
        );

        FinalizationReport {
            client_notified,
            recomputed_cost,
        }
    }

    /// Whether the completion notification was already sent for `route_id`
    pub fn was_notified(&self, route_id: &RouteId) -> bool {
        self.notified.contains(route_id)
    }

    async fn notify_client(&self, route: &Route) -> bool {
        if !self.notification_config.notify_on_completion {
            return false;
        }

        if !self.notified.insert(route.id.clone()) {
            debug!(route_id = %route.id, "Completion notification already sent");
            return false;
        }

        let short_id: String = route.id.as_str().chars().take(8).collect();
        let notification = Notification::new(
            route.client_id.as_str(),
            "Your delivery is complete!",
            format!("Order No. {short_id} was completed successfully."),
            NotificationSeverity::Success,
            notifications::ROUTE_COMPLETION,
        )
        .with_metadata("routeId", route.id.as_str());

        dispatch_best_effort(
            self.notifier.as_ref(),
            notification,
            self.notification_config.timeout(),
        )
        .await
    }

    async fn recompute_cost(&self, route: &Route) -> Option<RouteCost> {
        if !self.routing_config.recompute_on_skip || !route.has_skipped_stops() {
            return None;
        }
        let routing = self.routing.as_ref()?;

        let addresses = route.completed_addresses();
        if addresses.len() < 2 {
            debug!(
                route_id = %route.id,
                completed = addresses.len(),
                "Not enough completed stops to recompute route cost"
            );
            return None;
        }

        let estimate = match tokio::time::timeout(
            self.routing_config.timeout(),
            routing.compute_route(&addresses, self.routing_config.optimize_waypoints),
        )
        .await
        {
            Ok(Ok(estimate)) => estimate,
            Ok(Err(error)) => {
                warn!(route_id = %route.id, error = %error, "⚠️ Route cost recompute failed, keeping prior values");
                return None;
            }
            Err(_) => {
                warn!(route_id = %route.id, "⏰ Route cost recompute timed out, keeping prior values");
                return None;
            }
        };

        let cost = RouteCost::from(&estimate);
        let update = RouteUpdate::new(route.id.clone()).with_cost(cost.clone());

        match tokio::time::timeout(self.store_timeout, self.store.update_route(update)).await {
            Ok(Ok(())) => {
                self.event_publisher.publish(ExecutionEvent::RouteCostRecomputed {
                    route_id: route.id.clone(),
                    cost: cost.clone(),
                });
                Some(cost)
            }
            Ok(Err(error)) => {
                warn!(route_id = %route.id, error = %error, "⚠️ Failed to store recomputed route cost");
                None
            }
            Err(_) => {
                warn!(route_id = %route.id, "⏰ Storing recomputed route cost timed out");
                None
            }
        }
    }
}

impl std::fmt::Debug for RouteFinalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteFinalizer")
            .field("routing_enabled", &self.routing.is_some())
            .field("notified_routes", &self.notified.len())
            .finish()
    }
}
