//! A sync stack wired over the in-memory fakes.

use std::sync::Arc;
use std::time::Duration;

use super::fakes::{InMemoryRouteStore, RecordingNotifier, StaticRoutingService};
use crate::config::WaypointConfig;
use crate::events::EventPublisher;
use crate::models::Route;
use crate::queue::{CheckpointQueue, InMemoryCheckpointQueue};
use crate::route::RouteFinalizer;
use crate::services::{Connectivity, RoutingService};
use crate::state_machine::{RouteStateMachine, StopStateMachine};
use crate::sync::{CheckpointApplier, CheckpointSubmitter, SyncCoordinator};

pub struct SyncHarness {
    pub config: WaypointConfig,
    pub store: Arc<InMemoryRouteStore>,
    pub queue: Arc<dyn CheckpointQueue>,
    pub notifier: Arc<RecordingNotifier>,
    pub routing: Arc<StaticRoutingService>,
    pub events: EventPublisher,
    pub connectivity: Connectivity,
    pub finalizer: Arc<RouteFinalizer>,
    pub applier: Arc<CheckpointApplier>,
    pub coordinator: Arc<SyncCoordinator>,
    pub submitter: Arc<CheckpointSubmitter>,
}

impl SyncHarness {
    /// Online harness over an in-memory queue
    pub fn new(routes: impl IntoIterator<Item = Route>) -> Self {
        Self::with_queue(routes, Arc::new(InMemoryCheckpointQueue::new()))
    }

    pub fn with_queue(
        routes: impl IntoIterator<Item = Route>,
        queue: Arc<dyn CheckpointQueue>,
    ) -> Self {
        let mut config = WaypointConfig::default();
        config.sync.store_timeout_ms = 500;
        config.notifications.timeout_ms = 200;
        config.routing.timeout_ms = 200;
        config.notifications.operations_recipients = vec!["ops-desk".to_string()];

        let store = Arc::new(InMemoryRouteStore::with_routes(routes));
        let notifier = Arc::new(RecordingNotifier::new());
        let routing = Arc::new(StaticRoutingService::default());
        let events = EventPublisher::new(256);
        let connectivity = Connectivity::new(true);
        let store_timeout = Duration::from_millis(config.sync.store_timeout_ms);

        let finalizer = Arc::new(RouteFinalizer::new(
            store.clone(),
            notifier.clone(),
            Some(routing.clone() as Arc<dyn RoutingService>),
            events.clone(),
            config.notifications.clone(),
            config.routing.clone(),
            store_timeout,
        ));
        let applier = Arc::new(CheckpointApplier::new(
            store.clone(),
            StopStateMachine::new(events.clone()),
            RouteStateMachine::new(events.clone()),
            finalizer.clone(),
            store_timeout,
        ));
        let coordinator = Arc::new(SyncCoordinator::new(
            queue.clone(),
            applier.clone(),
            connectivity.clone(),
            events.clone(),
        ));
        let submitter = Arc::new(CheckpointSubmitter::new(
            queue.clone(),
            coordinator.clone(),
            connectivity.clone(),
            events.clone(),
        ));

        Self {
            config,
            store,
            queue,
            notifier,
            routing,
            events,
            connectivity,
            finalizer,
            applier,
            coordinator,
            submitter,
        }
    }

    pub fn offline(self) -> Self {
        self.connectivity.set_online(false);
        self
    }

    pub async fn queued(&self) -> usize {
        self.queue.len().await.unwrap_or(usize::MAX)
    }
}
