//! Drain pass behaviour of the sync coordinator.

mod common;

use std::time::Duration;

use waypoint_core::models::{RouteId, SkipReason};
use waypoint_core::queue::CheckpointQueue;
use waypoint_core::services::StoreError;
use waypoint_core::state_machine::{ExecutionStatus, StopStatus};
use waypoint_core::sync::{ApplyOutcome, ErrorCategory, SyncError, SyncTrigger};
use waypoint_core::test_helpers::{
    completed_checkpoint, in_progress_route, sample_route, skipped_checkpoint, SyncHarness,
    OPERATOR,
};

/// Three-stop route, started, origin already done
fn route_awaiting_last_two(id: &str) -> waypoint_core::models::Route {
    let mut route = in_progress_route(id, OPERATOR);
    route.stops.retain(|stop| stop.id.as_str() != "i2");
    route.stops[0].status = StopStatus::Completed;
    route
}

#[tokio::test]
async fn drain_replays_entries_oldest_first() {
    let route = in_progress_route("order-1", OPERATOR);
    let harness = SyncHarness::new([route.clone()]);

    let later = completed_checkpoint(&route, "i1", 20);
    let earlier = completed_checkpoint(&route, "o", 10);
    harness.queue.enqueue(&earlier).await.unwrap();
    harness.queue.enqueue(&later).await.unwrap();

    let report = harness.coordinator.drain(SyncTrigger::Manual).await.unwrap();
    assert_eq!(report.summary.committed, 2);

    let updates = harness.store.updates();
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].stop_replacements[0].id.as_str(), "o");
    assert_eq!(updates[1].stop_replacements[0].id.as_str(), "i1");
    assert_eq!(updates[0].updated_at, earlier.created_at);
}

#[tokio::test]
async fn replaying_a_committed_checkpoint_is_a_no_op() {
    let route = in_progress_route("order-1", OPERATOR);
    let harness = SyncHarness::new([route.clone()]);
    let checkpoint = completed_checkpoint(&route, "o", 5);

    let first = harness.applier.apply(&checkpoint).await.unwrap();
    assert_eq!(first, ApplyOutcome::Applied { route_finished: false });

    // entry survived a crash between commit and removal
    harness.queue.enqueue(&checkpoint).await.unwrap();
    let report = harness.coordinator.drain(SyncTrigger::Manual).await.unwrap();

    assert_eq!(report.summary.committed, 1);
    assert_eq!(harness.store.update_count(), 1);
    assert_eq!(harness.queued().await, 0);
}

#[tokio::test]
async fn entries_for_missing_routes_and_stops_are_dropped() {
    let route = in_progress_route("order-1", OPERATOR);
    let ghost = sample_route("order-gone", OPERATOR);
    let harness = SyncHarness::new([route.clone()]);
    let mut events = harness.events.subscribe();

    harness
        .queue
        .enqueue(&completed_checkpoint(&ghost, "o", 1))
        .await
        .unwrap();
    harness
        .queue
        .enqueue(&skipped_checkpoint(&route, "i9", SkipReason::Other, 2))
        .await
        .unwrap();

    let report = harness.coordinator.drain(SyncTrigger::Manual).await.unwrap();
    assert_eq!(report.summary.dropped, 2);
    assert_eq!(report.summary.remaining, 0);
    assert_eq!(harness.store.update_count(), 0);

    let names = common::event_names(&mut events);
    assert_eq!(
        names
            .iter()
            .filter(|name| **name == "checkpoint.not_found_dropped")
            .count(),
        2
    );
}

#[tokio::test]
async fn closed_route_drops_entry() {
    let mut route = in_progress_route("order-1", OPERATOR);
    route.execution_status = ExecutionStatus::Cancelled;
    let harness = SyncHarness::new([route.clone()]);

    let checkpoint = completed_checkpoint(&route, "o", 1);
    let outcome = harness.applier.apply(&checkpoint).await.unwrap();
    assert_eq!(
        outcome,
        ApplyOutcome::RouteClosed {
            status: ExecutionStatus::Cancelled
        }
    );
}

#[tokio::test]
async fn transient_failure_halts_pass_and_keeps_order() {
    let route = in_progress_route("order-1", OPERATOR);
    let harness = SyncHarness::new([route.clone()]);

    let first = completed_checkpoint(&route, "o", 1);
    let second = completed_checkpoint(&route, "i1", 2);
    harness.queue.enqueue(&first).await.unwrap();
    harness.queue.enqueue(&second).await.unwrap();

    harness
        .store
        .fail_next(StoreError::Unavailable("maintenance".into()));
    let report = harness.coordinator.drain(SyncTrigger::Manual).await.unwrap();

    assert!(report.halted_on_transient());
    assert_eq!(
        report.halted_by.as_ref().map(|c| c.category),
        Some(ErrorCategory::Unavailable)
    );
    assert_eq!(report.summary.committed, 0);
    assert_eq!(report.summary.remaining, 2);

    let queued = harness.queue.list().await.unwrap();
    assert_eq!(queued[0].id, first.id);

    let retry = harness
        .coordinator
        .drain(SyncTrigger::Retry { attempt: 1 })
        .await
        .unwrap();
    assert_eq!(retry.summary.committed, 2);
    assert_eq!(retry.summary.remaining, 0);
}

#[tokio::test]
async fn permanent_failure_blocks_only_its_route() {
    let mut blocked = in_progress_route("order-blocked", OPERATOR);
    blocked.assigned_operator_id = "driver-2".into();
    let open = in_progress_route("order-open", OPERATOR);
    let harness = SyncHarness::new([blocked.clone(), open.clone()]);

    // queued by driver-1 before the route was reassigned
    let rejected = completed_checkpoint(&in_progress_route("order-blocked", OPERATOR), "o", 1);
    let behind = completed_checkpoint(&in_progress_route("order-blocked", OPERATOR), "i1", 2);
    let other = completed_checkpoint(&open, "o", 3);
    for checkpoint in [&rejected, &behind, &other] {
        harness.queue.enqueue(checkpoint).await.unwrap();
    }

    let report = harness.coordinator.drain(SyncTrigger::Manual).await.unwrap();

    assert!(!report.halted_on_transient());
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.committed, 1);
    assert_eq!(report.summary.remaining, 2);
    assert_eq!(report.permanent_failures.len(), 1);
    assert_eq!(report.permanent_failures[0].checkpoint_id, rejected.id);
    assert_eq!(
        report.permanent_failures[0].classification.category,
        ErrorCategory::Authorization
    );

    let open_stored = harness.store.route(&open.id).unwrap();
    assert_eq!(open_stored.stops[0].status, StopStatus::Completed);
}

#[tokio::test]
async fn pending_route_is_a_permanent_failure() {
    let route = sample_route("order-1", OPERATOR);
    let harness = SyncHarness::new([route.clone()]);
    harness
        .queue
        .enqueue(&completed_checkpoint(&route, "o", 1))
        .await
        .unwrap();

    let report = harness.coordinator.drain(SyncTrigger::Manual).await.unwrap();
    assert_eq!(report.summary.failed, 1);
    assert_eq!(
        report.permanent_failures[0].classification.error_code,
        "ROUTE_NOT_STARTED"
    );
    assert_eq!(harness.queued().await, 1);
}

#[tokio::test]
async fn drain_refuses_to_run_offline() {
    let harness = SyncHarness::new([in_progress_route("order-1", OPERATOR)]).offline();
    let result = harness.coordinator.drain(SyncTrigger::Manual).await;
    assert!(matches!(result, Err(SyncError::Offline)));
    assert!(!harness.coordinator.is_draining());
}

#[tokio::test]
async fn finishing_route_through_drain_is_reported() {
    let mut route = in_progress_route("order-1", OPERATOR);
    for stop in route.stops.iter_mut().take(3) {
        stop.status = StopStatus::Completed;
    }
    let harness = SyncHarness::new([route.clone()]);
    harness
        .queue
        .enqueue(&completed_checkpoint(&route, "d", 1))
        .await
        .unwrap();

    let report = harness.coordinator.drain(SyncTrigger::Manual).await.unwrap();
    assert_eq!(report.finished_routes, vec![RouteId::new("order-1")]);
    assert!(harness.finalizer.was_notified(&route.id));
}

#[tokio::test]
async fn retraction_removes_queued_entry() {
    let route = in_progress_route("order-1", OPERATOR);
    let harness = SyncHarness::new([route.clone()]).offline();
    let checkpoint = completed_checkpoint(&route, "o", 1);
    harness.queue.enqueue(&checkpoint).await.unwrap();

    let retracted = harness.coordinator.retract(&checkpoint.id).await.unwrap();
    assert_eq!(retracted.id, checkpoint.id);
    assert_eq!(harness.queued().await, 0);
    assert_eq!(*harness.coordinator.pending_count().borrow(), 0);

    let again = harness.coordinator.retract(&checkpoint.id).await;
    assert!(matches!(again, Err(SyncError::NotQueued(_))));
}

#[tokio::test]
async fn drain_waits_behind_an_online_commit_of_the_same_route() {
    let route = route_awaiting_last_two("order-1");
    let harness = SyncHarness::new([route.clone()]);
    harness.store.set_fetch_delay(Duration::from_millis(50));

    let intermediate = completed_checkpoint(&route, "i1", 10);
    let destination = completed_checkpoint(&route, "d", 20);
    harness.queue.enqueue(&intermediate).await.unwrap();
    harness.queue.enqueue(&destination).await.unwrap();

    let coordinator = harness.coordinator.clone();
    let online_commit = {
        let intermediate = intermediate.clone();
        tokio::spawn(async move { coordinator.commit_single(&intermediate).await })
    };
    // let the online commit reach the store
    tokio::time::sleep(Duration::from_millis(10)).await;

    let report = harness
        .coordinator
        .drain(SyncTrigger::Submission)
        .await
        .unwrap();
    assert_eq!(report.summary.committed, 0);
    assert_eq!(report.summary.remaining, 2);

    let single = online_commit.await.unwrap().unwrap();
    assert_eq!(single, Some(ApplyOutcome::Applied { route_finished: false }));

    let report = harness.coordinator.drain(SyncTrigger::Submission).await.unwrap();
    assert_eq!(report.summary.committed, 1);
    assert_eq!(report.finished_routes, vec![route.id.clone()]);

    let stored = harness.store.route(&route.id).unwrap();
    assert!(stored.stops.iter().all(|stop| stop.status == StopStatus::Completed));
    assert_eq!(stored.execution_status, ExecutionStatus::Completed);
    assert_eq!(harness.notifier.sent_of_kind("routeCompletion").len(), 1);
}

#[tokio::test]
async fn concurrent_applies_on_one_route_finish_it_once() {
    let route = route_awaiting_last_two("order-1");
    let harness = SyncHarness::new([route.clone()]);
    harness.store.set_fetch_delay(Duration::from_millis(50));

    let intermediate = completed_checkpoint(&route, "i1", 10);
    let destination = completed_checkpoint(&route, "d", 20);
    let (first, second) = tokio::join!(
        harness.applier.apply(&intermediate),
        harness.applier.apply(&destination)
    );

    let finished = [first.unwrap(), second.unwrap()]
        .into_iter()
        .filter(|outcome| *outcome == ApplyOutcome::Applied { route_finished: true })
        .count();
    assert_eq!(finished, 1);

    let stored = harness.store.route(&route.id).unwrap();
    assert_eq!(stored.execution_status, ExecutionStatus::Completed);
    assert!(stored.completed_at.is_some());
    assert_eq!(harness.notifier.sent_of_kind("routeCompletion").len(), 1);
}
