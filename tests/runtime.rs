//! Runtime bootstrap, status and restart with a durable queue.

mod common;

use std::sync::Arc;

use tempfile::TempDir;

use waypoint_core::config::{ConfigManager, WaypointConfig};
use waypoint_core::models::{OperatorId, StopId};
use waypoint_core::runtime::StorageMode;
use waypoint_core::services::{LiveLocationSink, LocationProvider, NotificationDispatcher, RouteStore};
use waypoint_core::state_machine::StopStatus;
use waypoint_core::test_helpers::{
    in_progress_route, origin_form, ChannelLocationProvider, InMemoryRouteStore,
    RecordingLocationSink, RecordingNotifier, OPERATOR,
};
use waypoint_core::{RuntimeOptions, RuntimeServices, SubmitOutcome, WaypointRuntime};

fn services(store: Arc<InMemoryRouteStore>) -> RuntimeServices {
    RuntimeServices {
        store: store as Arc<dyn RouteStore>,
        notifier: Arc::new(RecordingNotifier::new()) as Arc<dyn NotificationDispatcher>,
        routing: None,
        location_provider: None,
        location_sink: None,
    }
}

fn config_manager(config: WaypointConfig) -> Arc<ConfigManager> {
    ConfigManager::from_config(config, "test").unwrap()
}

#[tokio::test]
async fn bootstrap_follows_routes_and_reports_status() {
    let store = Arc::new(InMemoryRouteStore::with_routes([in_progress_route(
        "order-1", OPERATOR,
    )]));
    let runtime = WaypointRuntime::bootstrap(
        config_manager(WaypointConfig::default()),
        OperatorId::new(OPERATOR),
        services(store.clone()),
        RuntimeOptions::for_testing(),
    )
    .await
    .unwrap();

    let state = runtime.orchestrator().state().clone();
    assert!(common::eventually(|| state.active_routes().len() == 1).await);

    let status = runtime.status();
    assert_eq!(status.environment, "test");
    assert_eq!(status.operator_id, OPERATOR);
    assert!(status.online);
    assert_eq!(status.pending_checkpoints, 0);
    assert_eq!(status.selected_route.as_deref(), Some("order-1"));

    runtime.shutdown().await;
    assert_eq!(store.subscriber_count(), 0);
}

#[tokio::test]
async fn reconnect_through_runtime_commits_offline_work() {
    let route = in_progress_route("order-1", OPERATOR);
    let store = Arc::new(InMemoryRouteStore::with_routes([route.clone()]));
    let options = RuntimeOptions {
        initially_online: false,
        ..RuntimeOptions::for_testing()
    };
    let runtime = WaypointRuntime::bootstrap(
        config_manager(WaypointConfig::default()),
        OperatorId::new(OPERATOR),
        services(store.clone()),
        options,
    )
    .await
    .unwrap();

    let outcome = runtime
        .submitter()
        .submit_completion(
            &route,
            &StopId::new("o"),
            runtime.operator_id(),
            &origin_form(),
            None,
        )
        .await
        .unwrap();
    assert!(matches!(outcome, SubmitOutcome::QueuedOffline { .. }));
    assert_eq!(runtime.status().pending_checkpoints, 1);

    runtime.set_online(true);
    assert!(common::eventually(|| store.update_count() == 1).await);
    assert!(common::eventually(|| runtime.status().pending_checkpoints == 0).await);

    let stored = store.route(&route.id).unwrap();
    assert_eq!(stored.stops[0].status, StopStatus::Completed);

    runtime.shutdown().await;
}

#[tokio::test]
async fn queued_work_survives_restart_and_drains_on_startup() {
    let dir = TempDir::new().unwrap();
    let mut config = WaypointConfig::default();
    config.queue.database_path = dir.path().join("offline.db");

    let route = in_progress_route("order-1", OPERATOR);
    let store = Arc::new(InMemoryRouteStore::with_routes([route.clone()]));

    let offline = RuntimeOptions {
        storage: StorageMode::Durable,
        initially_online: false,
        follow_routes: false,
    };
    let first = WaypointRuntime::bootstrap(
        config_manager(config.clone()),
        OperatorId::new(OPERATOR),
        services(store.clone()),
        offline,
    )
    .await
    .unwrap();
    first
        .submitter()
        .submit_completion(
            &route,
            &StopId::new("o"),
            first.operator_id(),
            &origin_form(),
            None,
        )
        .await
        .unwrap();
    first.shutdown().await;
    assert_eq!(store.update_count(), 0);

    let second = WaypointRuntime::bootstrap(
        config_manager(config),
        OperatorId::new(OPERATOR),
        services(store.clone()),
        RuntimeOptions {
            storage: StorageMode::Durable,
            initially_online: true,
            follow_routes: false,
        },
    )
    .await
    .unwrap();

    assert!(common::eventually(|| store.update_count() == 1).await);
    assert!(common::eventually(|| second.status().pending_checkpoints == 0).await);
    second.shutdown().await;
}

#[tokio::test]
async fn denied_location_permission_does_not_block_bootstrap() {
    let store = Arc::new(InMemoryRouteStore::with_routes([in_progress_route(
        "order-1", OPERATOR,
    )]));
    let sink = Arc::new(RecordingLocationSink::new());
    let mut services = services(store);
    services.location_provider =
        Some(Arc::new(ChannelLocationProvider::denied()) as Arc<dyn LocationProvider>);
    services.location_sink = Some(sink.clone() as Arc<dyn LiveLocationSink>);

    let runtime = WaypointRuntime::bootstrap(
        config_manager(WaypointConfig::default()),
        OperatorId::new(OPERATOR),
        services,
        RuntimeOptions::for_testing(),
    )
    .await
    .unwrap();

    assert!(runtime.position_feed().position().is_none());
    let view = runtime
        .orchestrator()
        .all_views()
        .await
        .unwrap();
    assert!(view.iter().all(|view| view.gate.check_in_enabled));
    assert_eq!(sink.count(), 0);

    runtime.shutdown().await;
}
