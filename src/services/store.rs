//! # Authoritative Route Store
//!
//! Boundary to the shared document store that owns routes. The store supports
//! three things: reading one route, writing a field-group update to it, and
//! pushing snapshots of every route matching a filter.
//!
//! Updates are last-writer-wins per field group. A stop replacement only touches
//! the stop with the same id, so two operators finishing different stops never
//! clobber each other's work.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::models::{OperatorId, Route, RouteCost, RouteId, Stop, StopId};
use crate::state_machine::ExecutionStatus;

/// Immutable view of every route matching a subscription filter
pub type RouteSnapshot = Arc<Vec<Route>>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Route {0} not found")]
    RouteNotFound(RouteId),

    #[error("Stop {stop_id} not found on route {route_id}")]
    StopNotFound { route_id: RouteId, stop_id: StopId },

    #[error("Update rejected: {0}")]
    Rejected(String),
}

impl StoreError {
    /// Errors worth retrying later without any change on our side
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout(_) | Self::Unavailable(_)
        )
    }
}

/// Selects the routes a subscription follows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteFilter {
    pub assigned_operator_id: Option<OperatorId>,
    pub execution_status: Option<ExecutionStatus>,
}

impl RouteFilter {
    /// Routes currently being driven by `operator_id`
    pub fn in_progress_for(operator_id: OperatorId) -> Self {
        Self {
            assigned_operator_id: Some(operator_id),
            execution_status: Some(ExecutionStatus::InProgress),
        }
    }

    pub fn matches(&self, route: &Route) -> bool {
        let operator_matches = self
            .assigned_operator_id
            .as_ref()
            .map_or(true, |operator| route.is_assigned_to(operator));
        let status_matches = self
            .execution_status
            .map_or(true, |status| route.execution_status == status);
        operator_matches && status_matches
    }
}

/// A field-group update to one route
#[derive(Debug, Clone, PartialEq)]
pub struct RouteUpdate {
    pub route_id: RouteId,
    /// Stops replaced by id; every other stop is left as stored
    pub stop_replacements: Vec<Stop>,
    pub execution_status: Option<ExecutionStatus>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cost: Option<RouteCost>,
    pub updated_by: Option<OperatorId>,
    pub updated_at: DateTime<Utc>,
}

impl RouteUpdate {
    pub fn new(route_id: RouteId) -> Self {
        Self {
            route_id,
            stop_replacements: Vec::new(),
            execution_status: None,
            started_at: None,
            completed_at: None,
            cost: None,
            updated_by: None,
            updated_at: Utc::now(),
        }
    }

    pub fn with_stop(mut self, stop: Stop) -> Self {
        self.stop_replacements.push(stop);
        self
    }

    pub fn with_execution_status(mut self, status: ExecutionStatus) -> Self {
        self.execution_status = Some(status);
        self
    }

    pub fn with_started_at(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = Some(at);
        self
    }

    pub fn with_completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.completed_at = Some(at);
        self
    }

    pub fn with_cost(mut self, cost: RouteCost) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn updated_by(mut self, operator_id: OperatorId) -> Self {
        self.updated_by = Some(operator_id);
        self
    }

    pub fn with_updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = at;
        self
    }

    /// Apply this update to a stored route copy.
    ///
    /// Fails without modifying `route` when a replacement names an unknown stop.
    pub fn apply_to(&self, route: &mut Route) -> Result<(), StoreError> {
        if let Some(missing) = self
            .stop_replacements
            .iter()
            .find(|stop| route.stop(&stop.id).is_none())
        {
            return Err(StoreError::StopNotFound {
                route_id: route.id.clone(),
                stop_id: missing.id.clone(),
            });
        }

        for stop in &self.stop_replacements {
            route.replace_stop(stop.clone());
        }
        if let Some(status) = self.execution_status {
            route.execution_status = status;
        }
        if let Some(started_at) = self.started_at {
            route.started_at = Some(started_at);
        }
        if let Some(completed_at) = self.completed_at {
            route.completed_at = Some(completed_at);
        }
        if let Some(cost) = &self.cost {
            route.cost = cost.clone();
        }
        if self.updated_by.is_some() {
            route.updated_by = self.updated_by.clone();
        }
        route.updated_at = Some(self.updated_at);
        Ok(())
    }
}

/// Live feed of snapshots for one filter.
///
/// Dropping the subscription unsubscribes; [`RouteSubscription::unsubscribe`]
/// does the same explicitly.
pub struct RouteSubscription {
    receiver: mpsc::UnboundedReceiver<RouteSnapshot>,
    on_unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl RouteSubscription {
    pub fn new(
        receiver: mpsc::UnboundedReceiver<RouteSnapshot>,
        on_unsubscribe: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        Self {
            receiver,
            on_unsubscribe: Some(Box::new(on_unsubscribe)),
        }
    }

    /// Wait for the next snapshot; `None` once the store closed the feed
    pub async fn next_snapshot(&mut self) -> Option<RouteSnapshot> {
        self.receiver.recv().await
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(callback) = self.on_unsubscribe.take() {
            callback();
        }
        self.receiver.close();
    }
}

impl Drop for RouteSubscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for RouteSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteSubscription")
            .field("active", &self.on_unsubscribe.is_some())
            .finish()
    }
}

/// The authoritative route store
#[async_trait]
pub trait RouteStore: Send + Sync + 'static {
    /// Read one route; `Ok(None)` when it does not exist
    async fn fetch_route(&self, route_id: &RouteId) -> Result<Option<Route>, StoreError>;

    /// Write a field-group update
    async fn update_route(&self, update: RouteUpdate) -> Result<(), StoreError>;

    /// Follow every route matching `filter`; the current snapshot is emitted first
    async fn subscribe(&self, filter: RouteFilter) -> Result<RouteSubscription, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Address;
    use crate::state_machine::StopStatus;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn route() -> Route {
        Route::new(
            "order-1",
            "driver-1",
            "client-1",
            Stop::origin("o", Address::new("Depot")),
            vec![Stop::intermediate("i1", Address::new("Shop"))],
            Stop::destination("d", Address::new("Warehouse")),
        )
        .unwrap()
    }

    #[test]
    fn test_update_replaces_only_named_stops() {
        let mut stored = route();
        let mut stop = stored.stops[1].clone();
        stop.status = StopStatus::Skipped;

        let update = RouteUpdate::new(stored.id.clone())
            .with_stop(stop)
            .updated_by(OperatorId::new("driver-1"));
        update.apply_to(&mut stored).unwrap();

        assert_eq!(stored.stops[1].status, StopStatus::Skipped);
        assert_eq!(stored.stops[0].status, StopStatus::Pending);
        assert_eq!(stored.updated_by, Some(OperatorId::new("driver-1")));
        assert!(stored.updated_at.is_some());
    }

    #[test]
    fn test_update_with_unknown_stop_is_rejected_atomically() {
        let mut stored = route();
        let update = RouteUpdate::new(stored.id.clone())
            .with_stop(Stop::intermediate("ghost", Address::new("Nowhere")))
            .with_execution_status(ExecutionStatus::Completed);

        let err = update.apply_to(&mut stored).unwrap_err();
        assert!(matches!(err, StoreError::StopNotFound { .. }));
        assert_eq!(stored.execution_status, ExecutionStatus::Pending);
    }

    #[test]
    fn test_filter_matching() {
        let mut stored = route();
        let filter = RouteFilter::in_progress_for(OperatorId::new("driver-1"));
        assert!(!filter.matches(&stored));

        stored.execution_status = ExecutionStatus::InProgress;
        assert!(filter.matches(&stored));
        assert!(!RouteFilter::in_progress_for(OperatorId::new("driver-2")).matches(&stored));
        assert!(RouteFilter::default().matches(&stored));
    }

    #[test]
    fn test_transient_classification() {
        assert!(StoreError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(StoreError::Network("reset".into()).is_transient());
        assert!(!StoreError::Unauthorized("expired".into()).is_transient());
        assert!(!StoreError::RouteNotFound(RouteId::new("x")).is_transient());
    }

    #[tokio::test]
    async fn test_subscription_unsubscribes_on_drop() {
        let released = Arc::new(AtomicBool::new(false));
        let flag = released.clone();
        let (sender, receiver) = mpsc::unbounded_channel();

        let mut subscription = RouteSubscription::new(receiver, move || {
            flag.store(true, Ordering::SeqCst);
        });
        sender.send(Arc::new(vec![route()])).unwrap();
        assert_eq!(subscription.next_snapshot().await.unwrap().len(), 1);

        drop(subscription);
        assert!(released.load(Ordering::SeqCst));
        assert!(sender.send(Arc::new(vec![])).is_err());
    }
}
