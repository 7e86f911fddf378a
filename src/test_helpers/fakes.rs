//! In-memory implementations of the service traits.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::models::{Address, LiveLocationRecord, LocationSample, OperatorId, Route, RouteId};
use crate::services::{
    LiveLocationSink, LocationError, LocationProvider, Notification, NotificationDispatcher,
    NotificationError, RouteEstimate, RouteFilter, RouteSnapshot, RouteStore, RouteSubscription,
    RouteUpdate, RoutingError, RoutingService, StoreError,
};

struct Subscriber {
    id: u64,
    filter: RouteFilter,
    sender: mpsc::UnboundedSender<RouteSnapshot>,
}

/// Route store keeping routes in insertion order.
///
/// Failures queued with [`InMemoryRouteStore::fail_next`] are returned by the
/// next store calls, one per call, before any real work happens.
#[derive(Default)]
pub struct InMemoryRouteStore {
    routes: RwLock<Vec<Route>>,
    failures: Mutex<VecDeque<StoreError>>,
    unreachable: AtomicBool,
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
    next_subscriber: AtomicU64,
    fetch_calls: AtomicUsize,
    fetch_delay_ms: AtomicU64,
    updates: Mutex<Vec<RouteUpdate>>,
}

impl InMemoryRouteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_routes(routes: impl IntoIterator<Item = Route>) -> Self {
        let store = Self::new();
        *store.routes.write() = routes.into_iter().collect();
        store
    }

    /// Insert or replace a route and notify matching subscribers
    pub fn put_route(&self, route: Route) {
        {
            let mut routes = self.routes.write();
            match routes.iter_mut().find(|stored| stored.id == route.id) {
                Some(stored) => *stored = route,
                None => routes.push(route),
            }
        }
        self.broadcast();
    }

    pub fn remove_route(&self, route_id: &RouteId) -> bool {
        let removed = {
            let mut routes = self.routes.write();
            let before = routes.len();
            routes.retain(|route| &route.id != route_id);
            routes.len() != before
        };
        if removed {
            self.broadcast();
        }
        removed
    }

    pub fn route(&self, route_id: &RouteId) -> Option<Route> {
        self.routes
            .read()
            .iter()
            .find(|route| &route.id == route_id)
            .cloned()
    }

    pub fn fail_next(&self, error: StoreError) {
        self.failures.lock().push_back(error);
    }

    /// Fail every call with a network error until reset
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Hold every fetched route for `delay` before returning it
    pub fn set_fetch_delay(&self, delay: std::time::Duration) {
        self.fetch_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Every update accepted so far, in order
    pub fn updates(&self) -> Vec<RouteUpdate> {
        self.updates.lock().clone()
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    fn injected_failure(&self) -> Result<(), StoreError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(StoreError::Network("connection refused".into()));
        }
        match self.failures.lock().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn snapshot_for(&self, filter: &RouteFilter) -> RouteSnapshot {
        Arc::new(
            self.routes
                .read()
                .iter()
                .filter(|route| filter.matches(route))
                .cloned()
                .collect(),
        )
    }

    fn broadcast(&self) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|subscriber| {
            subscriber
                .sender
                .send(self.snapshot_for(&subscriber.filter))
                .is_ok()
        });
    }
}

#[async_trait]
impl RouteStore for InMemoryRouteStore {
    async fn fetch_route(&self, route_id: &RouteId) -> Result<Option<Route>, StoreError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.injected_failure()?;
        let route = self.route(route_id);
        let delay_ms = self.fetch_delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
        }
        Ok(route)
    }

    async fn update_route(&self, update: RouteUpdate) -> Result<(), StoreError> {
        self.injected_failure()?;
        {
            let mut routes = self.routes.write();
            let route = routes
                .iter_mut()
                .find(|route| route.id == update.route_id)
                .ok_or_else(|| StoreError::RouteNotFound(update.route_id.clone()))?;
            update.apply_to(route)?;
        }
        self.updates.lock().push(update);
        self.broadcast();
        Ok(())
    }

    async fn subscribe(&self, filter: RouteFilter) -> Result<RouteSubscription, StoreError> {
        self.injected_failure()?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let _ = sender.send(self.snapshot_for(&filter));

        let id = self.next_subscriber.fetch_add(1, Ordering::SeqCst);
        self.subscribers.lock().push(Subscriber {
            id,
            filter,
            sender,
        });

        let subscribers = self.subscribers.clone();
        Ok(RouteSubscription::new(receiver, move || {
            subscribers.lock().retain(|subscriber| subscriber.id != id);
        }))
    }
}

/// Notifier that records every notification it accepts
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    pub fn sent_of_kind(&self, kind: &str) -> Vec<Notification> {
        self.sent
            .lock()
            .iter()
            .filter(|notification| notification.kind == kind)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotificationError::Delivery("push gateway down".into()));
        }
        self.sent.lock().push(notification);
        Ok(())
    }
}

/// Routing provider answering every request with the same result
#[derive(Debug)]
pub struct StaticRoutingService {
    result: Mutex<Result<RouteEstimate, RoutingError>>,
    requests: Mutex<Vec<(Vec<Address>, bool)>>,
}

impl StaticRoutingService {
    pub fn new(estimate: RouteEstimate) -> Self {
        Self {
            result: Mutex::new(Ok(estimate)),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: RoutingError) -> Self {
        Self {
            result: Mutex::new(Err(error)),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Address lists and optimize flags received so far
    pub fn requests(&self) -> Vec<(Vec<Address>, bool)> {
        self.requests.lock().clone()
    }
}

impl Default for StaticRoutingService {
    fn default() -> Self {
        Self::new(RouteEstimate {
            distance_km: 42.5,
            duration_minutes: 61.0,
            toll_cost: Some(8.9),
            optimized_waypoint_order: None,
        })
    }
}

#[async_trait]
impl RoutingService for StaticRoutingService {
    async fn compute_route(
        &self,
        addresses: &[Address],
        optimize: bool,
    ) -> Result<RouteEstimate, RoutingError> {
        self.requests.lock().push((addresses.to_vec(), optimize));
        self.result.lock().clone()
    }
}

/// Live location sink that keeps every published record
#[derive(Debug, Default)]
pub struct RecordingLocationSink {
    records: Mutex<Vec<(OperatorId, LiveLocationRecord)>>,
    failing: AtomicBool,
}

impl RecordingLocationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<(OperatorId, LiveLocationRecord)> {
        self.records.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.records.lock().len()
    }
}

#[async_trait]
impl LiveLocationSink for RecordingLocationSink {
    async fn publish(
        &self,
        operator_id: &OperatorId,
        record: LiveLocationRecord,
    ) -> Result<(), LocationError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LocationError::PublishFailed("write rejected".into()));
        }
        self.records.lock().push((operator_id.clone(), record));
        Ok(())
    }
}

/// Location provider fed from a channel; it can be watched once
pub struct ChannelLocationProvider {
    receiver: Mutex<Option<mpsc::UnboundedReceiver<LocationSample>>>,
    denied: bool,
}

impl ChannelLocationProvider {
    pub fn new() -> (Self, mpsc::UnboundedSender<LocationSample>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                receiver: Mutex::new(Some(receiver)),
                denied: false,
            },
            sender,
        )
    }

    /// Provider whose permission was refused by the operator
    pub fn denied() -> Self {
        Self {
            receiver: Mutex::new(None),
            denied: true,
        }
    }
}

impl LocationProvider for ChannelLocationProvider {
    fn watch(&self) -> Result<BoxStream<'static, LocationSample>, LocationError> {
        if self.denied {
            return Err(LocationError::PermissionDenied);
        }
        let receiver = self
            .receiver
            .lock()
            .take()
            .ok_or_else(|| LocationError::Unavailable("already being watched".into()))?;

        Ok(stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|sample| (sample, receiver))
        })
        .boxed())
    }
}
