#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use waypoint_core::events::PublishedEvent;
use waypoint_core::geo::{GeoGate, PositionFeed};
use waypoint_core::models::OperatorId;
use waypoint_core::orchestration::{MultiRouteOrchestrator, ObservedState};
use waypoint_core::queue::InMemoryRouteCache;
use waypoint_core::state_machine::RouteStateMachine;
use waypoint_core::test_helpers::SyncHarness;

/// Orchestrator for `operator` sharing the harness store, queue and notifier
pub fn orchestrator_for(harness: &SyncHarness, operator: &str) -> MultiRouteOrchestrator {
    MultiRouteOrchestrator::new(
        OperatorId::new(operator),
        harness.store.clone(),
        harness.queue.clone(),
        Arc::new(InMemoryRouteCache::new()),
        harness.notifier.clone(),
        Arc::new(ObservedState::new()),
        PositionFeed::new(),
        GeoGate::from_config(&harness.config.gate),
        RouteStateMachine::new(harness.events.clone()),
        harness.config.notifications.clone(),
        Duration::from_millis(harness.config.sync.store_timeout_ms),
    )
}

/// Names of every event received so far
pub fn event_names(receiver: &mut broadcast::Receiver<PublishedEvent>) -> Vec<&'static str> {
    let mut names = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        names.push(event.name());
    }
    names
}

/// Poll `condition` until it holds or the deadline passes
pub async fn eventually<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
