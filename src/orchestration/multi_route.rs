//! # Multi-Route Orchestrator
//!
//! Lets one operator hold several in-progress routes at once. Each route keeps
//! its own stop pointer and progress; all of them share one location feed and
//! one live position record.
//!
//! ## Data flow
//!
//! ```text
//! RouteStore::subscribe(assigned = operator, status = in-progress)
//!     │ immutable snapshots
//!     ▼
//! ObservedState ──▶ RouteCache (last known state for offline restarts)
//!     │
//!     ▼
//! route_view(): snapshot + queued checkpoints + proximity gate
//! ```
//!
//! Selecting a route only changes which view the operator is looking at; it
//! never writes to the store.

use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::observed_state::{ObservedState, SelectionChange};
use crate::config::NotificationConfig;
use crate::constants::notifications;
use crate::geo::{GateDecision, GeoGate, PositionFeed};
use crate::models::{OperatorId, Route, RouteId, StopId};
use crate::queue::{CheckpointQueue, QueueError, RouteCache};
use crate::route::RouteProgress;
use crate::services::{
    dispatch_best_effort, Notification, NotificationDispatcher, NotificationSeverity, RouteFilter,
    RouteStore, RouteUpdate, StoreError,
};
use crate::state_machine::{
    AssignedOperatorGuard, ExecutionStatus, RouteEvent, RouteStateMachine, RouteTransition,
    StateGuard, StateMachineError,
};
use crate::sync::{SyncHandle, SyncTrigger};

#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("Route {0} is not active for this operator")]
    RouteNotActive(RouteId),

    #[error("Route {0} not found")]
    RouteNotFound(RouteId),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Local storage error: {0}")]
    Queue(#[from] QueueError),

    #[error("Transition rejected: {0}")]
    Transition(#[from] StateMachineError),
}

/// Everything the route screen shows for one route
#[derive(Debug, Clone, PartialEq)]
pub struct RouteView {
    /// Stored route overlaid with checkpoints still waiting in the queue
    pub route: Route,
    pub pending_stop_ids: Vec<StopId>,
    pub progress: RouteProgress,
    pub current_stop_index: Option<usize>,
    pub gate: GateDecision,
    pub selected: bool,
}

pub struct MultiRouteOrchestrator {
    operator_id: OperatorId,
    store: Arc<dyn RouteStore>,
    queue: Arc<dyn CheckpointQueue>,
    cache: Arc<dyn RouteCache>,
    notifier: Arc<dyn NotificationDispatcher>,
    state: Arc<ObservedState>,
    feed: PositionFeed,
    gate: GeoGate,
    route_machine: RouteStateMachine,
    notification_config: NotificationConfig,
    store_timeout: Duration,
    drain_on_activation: bool,
    sync_handle: Option<SyncHandle>,
}

impl MultiRouteOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        operator_id: OperatorId,
        store: Arc<dyn RouteStore>,
        queue: Arc<dyn CheckpointQueue>,
        cache: Arc<dyn RouteCache>,
        notifier: Arc<dyn NotificationDispatcher>,
        state: Arc<ObservedState>,
        feed: PositionFeed,
        gate: GeoGate,
        route_machine: RouteStateMachine,
        notification_config: NotificationConfig,
        store_timeout: Duration,
    ) -> Self {
        Self {
            operator_id,
            store,
            queue,
            cache,
            notifier,
            state,
            feed,
            gate,
            route_machine,
            notification_config,
            store_timeout,
            drain_on_activation: false,
            sync_handle: None,
        }
    }

    /// Request a drain whenever a route view is activated
    pub fn with_sync_handle(mut self, handle: SyncHandle, drain_on_activation: bool) -> Self {
        self.sync_handle = Some(handle);
        self.drain_on_activation = drain_on_activation;
        self
    }

    pub fn operator_id(&self) -> &OperatorId {
        &self.operator_id
    }

    pub fn state(&self) -> &Arc<ObservedState> {
        &self.state
    }

    /// Seed the observed state from the local cache, for starting offline
    pub async fn restore_from_cache(&self) -> Result<usize, OrchestrationError> {
        let cached: Vec<Route> = self
            .cache
            .load_all()
            .await?
            .into_iter()
            .filter(|route| {
                route.is_assigned_to(&self.operator_id)
                    && route.execution_status == ExecutionStatus::InProgress
            })
            .collect();

        self.state.apply_snapshot(&cached);
        info!(
            operator_id = %self.operator_id,
            restored = cached.len(),
            "💾 Active routes restored from cache"
        );
        Ok(cached.len())
    }

    /// Subscribe to the operator's in-progress routes and keep the observed
    /// state and the cache current until the subscription ends
    pub async fn follow_active_routes(&self) -> Result<JoinHandle<()>, OrchestrationError> {
        let mut subscription = self
            .store
            .subscribe(RouteFilter::in_progress_for(self.operator_id.clone()))
            .await?;

        let state = self.state.clone();
        let cache = self.cache.clone();
        let operator_id = self.operator_id.clone();

        // Routes cached by earlier sessions are evicted once the store no
        // longer lists them as active
        let mut cached_ids = self.cached_route_ids().await;

        info!(
            operator_id = %operator_id,
            cached = cached_ids.len(),
            "👀 Following active routes"
        );

        Ok(tokio::spawn(async move {

            while let Some(snapshot) = subscription.next_snapshot().await {
                if let SelectionChange::Moved { from, to } = state.apply_snapshot(&snapshot) {
                    debug!(from = %from, to = ?to, "Selection moved after snapshot");
                }

                let current: HashSet<RouteId> = snapshot.iter().map(|r| r.id.clone()).collect();
                for route in snapshot.iter() {
                    if let Err(error) = cache.save_route(route).await {
                        warn!(route_id = %route.id, error = %error, "⚠️ Failed to cache route");
                    }
                }
                for stale in cached_ids.difference(&current) {
                    if let Err(error) = cache.remove_route(stale).await {
                        warn!(route_id = %stale, error = %error, "⚠️ Failed to evict cached route");
                    }
                }
                cached_ids = current;
            }

            info!(operator_id = %operator_id, "👀 Active route subscription ended");
        }))
    }

    async fn cached_route_ids(&self) -> HashSet<RouteId> {
        match self.cache.load_all().await {
            Ok(routes) => routes
                .into_iter()
                .filter(|route| route.is_assigned_to(&self.operator_id))
                .map(|route| route.id)
                .collect(),
            Err(error) => {
                warn!(error = %error, "⚠️ Failed to read cached routes");
                HashSet::new()
            }
        }
    }

    /// Make `route_id` the route on screen
    pub fn select_route(&self, route_id: &RouteId) -> Result<(), OrchestrationError> {
        if !self.state.select(route_id) {
            return Err(OrchestrationError::RouteNotActive(route_id.clone()));
        }

        debug!(route_id = %route_id, "Route selected");
        if self.drain_on_activation {
            if let Some(handle) = &self.sync_handle {
                handle.request(SyncTrigger::RouteViewActivated(route_id.clone()));
            }
        }
        Ok(())
    }

    /// View of one active route including queued checkpoints and the gate
    pub async fn route_view(&self, route_id: &RouteId) -> Result<RouteView, OrchestrationError> {
        let route = self
            .state
            .route(route_id)
            .ok_or_else(|| OrchestrationError::RouteNotActive(route_id.clone()))?;

        let queued = self.queue.list_for_route(route_id).await?;
        let projected = route.project_pending(&queued);
        let gate = self
            .gate
            .evaluate_route(self.feed.position(), &projected.route);

        Ok(RouteView {
            progress: projected.route.progress_summary(),
            current_stop_index: projected.route.current_stop_index(),
            selected: self.state.selected_id().as_ref() == Some(route_id),
            pending_stop_ids: projected.pending_stop_ids,
            route: projected.route,
            gate,
        })
    }

    pub async fn selected_view(&self) -> Result<Option<RouteView>, OrchestrationError> {
        match self.state.selected_id() {
            Some(route_id) => self.route_view(&route_id).await.map(Some),
            None => Ok(None),
        }
    }

    /// Views of every active route, in snapshot order
    pub async fn all_views(&self) -> Result<Vec<RouteView>, OrchestrationError> {
        let mut views = Vec::new();
        for route in self.state.active_routes() {
            views.push(self.route_view(&route.id).await?);
        }
        Ok(views)
    }

    /// Start a pending route assigned to this operator
    pub async fn start_route(&self, route_id: &RouteId) -> Result<RouteTransition, OrchestrationError> {
        let mut route = self
            .timed(self.store.fetch_route(route_id))
            .await?
            .ok_or_else(|| OrchestrationError::RouteNotFound(route_id.clone()))?;

        AssignedOperatorGuard::new(&self.operator_id)
            .check(&route)
            .map_err(StateMachineError::from)?;

        let transition = RouteStateMachine::apply(&mut route, RouteEvent::Start, Utc::now())?;

        let mut update = RouteUpdate::new(route.id.clone())
            .with_execution_status(route.execution_status)
            .updated_by(self.operator_id.clone())
            .with_updated_at(transition.at);
        if let Some(started_at) = route.started_at {
            update = update.with_started_at(started_at);
        }
        self.timed(self.store.update_route(update)).await?;

        info!(
            route_id = %route.id,
            operator_id = %self.operator_id,
            "🚚 Route started"
        );

        if let Err(error) = self.route_machine.execute_actions(&transition).await {
            warn!(route_id = %route.id, error = %error, "⚠️ Route start action failed");
        }
        self.notify_route_started(&route).await;

        Ok(transition)
    }

    async fn notify_route_started(&self, route: &Route) {
        if !self.notification_config.notify_on_start {
            return;
        }

        let party = route.name.as_deref().unwrap_or(route.client_id.as_str());
        for recipient in &self.notification_config.operations_recipients {
            let notification = Notification::new(
                recipient.as_str(),
                format!("Route started by {}", self.operator_id),
                format!("The route for {party} has started."),
                NotificationSeverity::Info,
                notifications::ROUTE_START,
            )
            .with_metadata("routeId", route.id.as_str());

            dispatch_best_effort(
                self.notifier.as_ref(),
                notification,
                self.notification_config.timeout(),
            )
            .await;
        }
    }

    async fn timed<T>(
        &self,
        operation: impl std::future::Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.store_timeout, operation)
            .await
            .unwrap_or(Err(StoreError::Timeout(self.store_timeout)))
    }
}

impl std::fmt::Debug for MultiRouteOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiRouteOrchestrator")
            .field("operator_id", &self.operator_id)
            .field("active_routes", &self.state.active_routes().len())
            .finish()
    }
}
