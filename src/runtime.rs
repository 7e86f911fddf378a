//! # Waypoint Runtime Bootstrap
//!
//! Wires every component for one operator session from a loaded
//! [`ConfigManager`] plus the host-provided adapters:
//!
//! ```text
//! RuntimeServices (store, notifier, routing, location)
//!     │
//!     ▼
//! OfflineDatabase ─▶ CheckpointQueue + RouteCache
//!     │
//!     ├─▶ CheckpointApplier ─▶ SyncCoordinator ─▶ SyncScheduler (task)
//!     ├─▶ CheckpointSubmitter
//!     ├─▶ MultiRouteOrchestrator ─▶ active route subscription (task)
//!     └─▶ LocationSampler (task) ─▶ PositionFeed ─▶ LiveLocationPublisher (task)
//! ```
//!
//! [`WaypointRuntime::shutdown`] stops the background tasks and closes the
//! offline database.

use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::{ConfigManager, LocationConfig};
use crate::error::Result;
use crate::events::EventPublisher;
use crate::geo::{GeoGate, LiveLocationPublisher, LocationSampler, PositionFeed, PublisherHandle};
use crate::logging;
use crate::models::{OperatorId, RouteId};
use crate::orchestration::{MultiRouteOrchestrator, ObservedState};
use crate::queue::{
    CheckpointQueue, InMemoryCheckpointQueue, InMemoryRouteCache, OfflineDatabase, RouteCache,
};
use crate::route::RouteFinalizer;
use crate::services::{
    Connectivity, LiveLocationSink, LocationProvider, NotificationDispatcher, RouteStore,
    RoutingService,
};
use crate::state_machine::{RouteStateMachine, StopStateMachine};
use crate::sync::{
    BackoffCalculator, CheckpointApplier, CheckpointSubmitter, SyncCoordinator, SyncHandle,
    SyncScheduler, SyncTrigger,
};

/// Adapters supplied by the host platform
#[derive(Clone)]
pub struct RuntimeServices {
    pub store: Arc<dyn RouteStore>,
    pub notifier: Arc<dyn NotificationDispatcher>,
    /// Cost recompute is skipped without a routing provider
    pub routing: Option<Arc<dyn RoutingService>>,
    pub location_provider: Option<Arc<dyn LocationProvider>>,
    pub location_sink: Option<Arc<dyn LiveLocationSink>>,
}

/// Where the offline queue and the route cache live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageMode {
    /// SQLite file at `queue.database_path`
    #[default]
    Durable,
    /// Process memory only
    InMemory,
}

#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub storage: StorageMode,
    pub initially_online: bool,
    /// Subscribe to the operator's in-progress routes during bootstrap
    pub follow_routes: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            storage: StorageMode::Durable,
            initially_online: true,
            follow_routes: true,
        }
    }
}

impl RuntimeOptions {
    pub fn for_testing() -> Self {
        Self {
            storage: StorageMode::InMemory,
            initially_online: true,
            follow_routes: true,
        }
    }
}

/// Point-in-time view of the runtime
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuntimeStatus {
    pub environment: String,
    pub operator_id: String,
    pub online: bool,
    pub draining: bool,
    pub pending_checkpoints: usize,
    pub active_routes: usize,
    pub selected_route: Option<String>,
}

pub struct WaypointRuntime {
    config_manager: Arc<ConfigManager>,
    operator_id: OperatorId,
    event_publisher: EventPublisher,
    connectivity: Connectivity,
    feed: PositionFeed,
    coordinator: Arc<SyncCoordinator>,
    submitter: Arc<CheckpointSubmitter>,
    orchestrator: Arc<MultiRouteOrchestrator>,
    finalizer: Arc<RouteFinalizer>,
    sync_handle: SyncHandle,
    database: Option<OfflineDatabase>,
    scheduler_task: Option<JoinHandle<()>>,
    background_tasks: Vec<(&'static str, JoinHandle<()>)>,
    publisher: Option<PublisherHandle>,
}

impl WaypointRuntime {
    /// Build and start every component for `operator_id`
    pub async fn bootstrap(
        config_manager: Arc<ConfigManager>,
        operator_id: OperatorId,
        services: RuntimeServices,
        options: RuntimeOptions,
    ) -> Result<Self> {
        let config = config_manager.config().clone();
        info!(
            environment = %config_manager.environment(),
            operator_id = %operator_id,
            storage = ?options.storage,
            "🚀 BOOTSTRAP: Starting waypoint runtime"
        );

        let event_publisher = EventPublisher::new(config.events.channel_capacity);
        let store_timeout = config.sync.store_timeout();

        let (database, queue, cache): (
            Option<OfflineDatabase>,
            Arc<dyn CheckpointQueue>,
            Arc<dyn RouteCache>,
        ) = match options.storage {
            StorageMode::Durable => {
                let database =
                    OfflineDatabase::open(&config.queue.database_path, config.queue.busy_timeout())
                        .await?;
                let queue = Arc::new(database.checkpoint_queue());
                let cache = Arc::new(database.route_cache());
                (Some(database), queue, cache)
            }
            StorageMode::InMemory => (
                None,
                Arc::new(InMemoryCheckpointQueue::new()),
                Arc::new(InMemoryRouteCache::new()),
            ),
        };

        let connectivity = Connectivity::new(options.initially_online);
        let route_machine = RouteStateMachine::new(event_publisher.clone());

        let finalizer = Arc::new(RouteFinalizer::new(
            services.store.clone(),
            services.notifier.clone(),
            services.routing.clone(),
            event_publisher.clone(),
            config.notifications.clone(),
            config.routing.clone(),
            store_timeout,
        ));
        let applier = Arc::new(CheckpointApplier::new(
            services.store.clone(),
            StopStateMachine::new(event_publisher.clone()),
            route_machine.clone(),
            finalizer.clone(),
            store_timeout,
        ));

        let coordinator = Arc::new(SyncCoordinator::new(
            queue.clone(),
            applier,
            connectivity.clone(),
            event_publisher.clone(),
        ));
        let pending = coordinator.refresh_pending_count().await?;

        let (sync_handle, scheduler_task) = SyncScheduler::new(
            coordinator.clone(),
            connectivity.clone(),
            BackoffCalculator::new(config.sync.backoff.clone()),
            config.sync.max_retry_attempts,
        )
        .spawn();
        info!("✅ BOOTSTRAP: Sync scheduler running");

        let submitter = Arc::new(
            CheckpointSubmitter::new(
                queue.clone(),
                coordinator.clone(),
                connectivity.clone(),
                event_publisher.clone(),
            )
            .with_sync_handle(sync_handle.clone()),
        );

        let state = Arc::new(ObservedState::new());
        let feed = PositionFeed::new();
        let orchestrator = Arc::new(
            MultiRouteOrchestrator::new(
                operator_id.clone(),
                services.store.clone(),
                queue,
                cache,
                services.notifier.clone(),
                state.clone(),
                feed.clone(),
                GeoGate::from_config(&config.gate),
                route_machine,
                config.notifications.clone(),
                store_timeout,
            )
            .with_sync_handle(sync_handle.clone(), config.sync.drain_on_route_activation),
        );

        let mut runtime = Self {
            config_manager,
            operator_id,
            event_publisher,
            connectivity,
            feed,
            coordinator,
            submitter,
            orchestrator,
            finalizer,
            sync_handle,
            database,
            scheduler_task: Some(scheduler_task),
            background_tasks: Vec::new(),
            publisher: None,
        };

        runtime.orchestrator.restore_from_cache().await?;
        if options.follow_routes {
            runtime.follow_active_routes().await;
        }
        runtime.start_location(&services, &config.location);

        if pending > 0 {
            info!(pending = pending, "📥 Queued checkpoints found at startup");
            runtime.sync_handle.request(SyncTrigger::Manual);
        }

        info!(
            operator_id = %runtime.operator_id,
            "✅ BOOTSTRAP: Waypoint runtime ready"
        );
        Ok(runtime)
    }

    /// Subscribe to the operator's active routes.
    ///
    /// A failed subscription leaves the cached routes in place; call again
    /// once the store is reachable.
    pub async fn follow_active_routes(&mut self) -> bool {
        match self.orchestrator.follow_active_routes().await {
            Ok(task) => {
                self.background_tasks.push(("route_subscription", task));
                true
            }
            Err(error) => {
                logging::log_error(
                    "runtime",
                    "follow_active_routes",
                    &error.to_string(),
                    Some("continuing with cached routes"),
                );
                false
            }
        }
    }

    fn start_location(&mut self, services: &RuntimeServices, config: &LocationConfig) {
        if let Some(provider) = &services.location_provider {
            let sampler = LocationSampler::new(
                provider.clone(),
                config.distance_filter_meters,
                self.feed.clone(),
            );
            match sampler.spawn() {
                Ok(task) => self.background_tasks.push(("location_sampler", task)),
                Err(error) => logging::log_error(
                    "runtime",
                    "start_location_sampler",
                    &error.to_string(),
                    Some("check-in gating stays open without a position"),
                ),
            }
        }

        match &services.location_sink {
            Some(sink) if config.publish_enabled => {
                let publisher = LiveLocationPublisher::new(
                    self.operator_id.clone(),
                    sink.clone(),
                    self.feed.clone(),
                    self.connectivity.clone(),
                    self.orchestrator.state().active_count(),
                    config.publish_interval(),
                );
                self.publisher = Some(publisher.spawn());
            }
            Some(_) => info!("📡 Live location publishing disabled by configuration"),
            None => {}
        }
    }

    pub fn config_manager(&self) -> &Arc<ConfigManager> {
        &self.config_manager
    }

    pub fn operator_id(&self) -> &OperatorId {
        &self.operator_id
    }

    pub fn event_publisher(&self) -> &EventPublisher {
        &self.event_publisher
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn position_feed(&self) -> &PositionFeed {
        &self.feed
    }

    pub fn coordinator(&self) -> &Arc<SyncCoordinator> {
        &self.coordinator
    }

    pub fn submitter(&self) -> &Arc<CheckpointSubmitter> {
        &self.submitter
    }

    pub fn orchestrator(&self) -> &Arc<MultiRouteOrchestrator> {
        &self.orchestrator
    }

    pub fn finalizer(&self) -> &Arc<RouteFinalizer> {
        &self.finalizer
    }

    pub fn sync_handle(&self) -> &SyncHandle {
        &self.sync_handle
    }

    /// Feed a platform connectivity change into the runtime
    pub fn set_online(&self, online: bool) -> bool {
        self.connectivity.set_online(online)
    }

    /// Ask the scheduler for a drain pass
    pub fn request_sync(&self) -> bool {
        self.sync_handle.request(SyncTrigger::Manual)
    }

    pub fn status(&self) -> RuntimeStatus {
        let state = self.orchestrator.state();
        RuntimeStatus {
            environment: self.config_manager.environment().to_string(),
            operator_id: self.operator_id.to_string(),
            online: self.connectivity.is_online(),
            draining: self.coordinator.is_draining(),
            pending_checkpoints: *self.coordinator.pending_count().borrow(),
            active_routes: state.active_routes().len(),
            selected_route: state.selected_id().map(|id: RouteId| id.to_string()),
        }
    }

    /// Stop every background task and close local storage
    pub async fn shutdown(mut self) {
        info!(operator_id = %self.operator_id, "🛑 Waypoint runtime shutting down");

        self.sync_handle.shutdown();
        if let Some(task) = self.scheduler_task.take() {
            if let Err(error) = task.await {
                logging::log_error("runtime", "stop_sync_scheduler", &error.to_string(), None);
            }
        }

        if let Some(publisher) = self.publisher.take() {
            publisher.stop().await;
        }

        for (name, task) in self.background_tasks.drain(..) {
            task.abort();
            match task.await {
                Ok(()) => {}
                Err(error) if error.is_cancelled() => {}
                Err(error) => {
                    logging::log_error("runtime", name, &error.to_string(), Some("task panicked"))
                }
            }
        }

        if let Some(database) = self.database.take() {
            database.close().await;
        }

        info!("🛑 Waypoint runtime stopped");
    }
}

impl Drop for WaypointRuntime {
    fn drop(&mut self) {
        if self.scheduler_task.is_some() {
            warn!("Waypoint runtime dropped without shutdown, stopping background tasks");
            self.sync_handle.shutdown();
            for (_, task) in &self.background_tasks {
                task.abort();
            }
        }
    }
}

impl std::fmt::Debug for WaypointRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaypointRuntime")
            .field("operator_id", &self.operator_id)
            .field("environment", &self.config_manager.environment())
            .field("online", &self.connectivity.is_online())
            .field("background_tasks", &self.background_tasks.len())
            .finish()
    }
}
