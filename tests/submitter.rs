//! Submission path: validation, write-ahead queueing and online commit.

use waypoint_core::models::{EncodedImage, OperatorId, StopId, StopType, UnloadingAnswer};
use waypoint_core::queue::CheckpointQueue;
use waypoint_core::services::StoreError;
use waypoint_core::state_machine::{ConfirmationForm, DestinationForm, StopStatus, ValidationError};
use waypoint_core::sync::{ApplyOutcome, SubmitError, SubmitOutcome};
use waypoint_core::test_helpers::{
    completed_checkpoint, in_progress_route, intermediate_form, origin_form, SyncHarness, OPERATOR,
};

fn operator() -> OperatorId {
    OperatorId::new(OPERATOR)
}

#[tokio::test]
async fn incomplete_form_is_rejected_before_queueing() {
    let route = in_progress_route("order-1", OPERATOR);
    let harness = SyncHarness::new([route.clone()]);

    let result = harness
        .submitter
        .submit_completion(
            &route,
            &StopId::new("o"),
            &operator(),
            &ConfirmationForm::empty(StopType::Origin),
            None,
        )
        .await;

    match result {
        Err(SubmitError::Validation(ValidationError::MissingFields { fields, .. })) => {
            assert_eq!(fields, vec!["loading_confirmed"]);
        }
        other => panic!("expected missing fields, got {other:?}"),
    }
    assert_eq!(harness.queued().await, 0);
}

#[tokio::test]
async fn signature_without_unloading_is_rejected() {
    let mut route = in_progress_route("order-1", OPERATOR);
    for stop in route.stops.iter_mut().take(3) {
        stop.status = StopStatus::Completed;
    }
    let harness = SyncHarness::new([route.clone()]);

    let form = ConfirmationForm::Destination(DestinationForm {
        unloading_confirmed: Some(UnloadingAnswer::Postponed),
        unloading_photos: Vec::new(),
        signature: Some(EncodedImage::new("c2lnbmF0dXJl")),
    });
    let result = harness
        .submitter
        .submit_completion(&route, &StopId::new("d"), &operator(), &form, None)
        .await;

    assert!(matches!(
        result,
        Err(SubmitError::Validation(
            ValidationError::SignatureWithoutUnloading { .. }
        ))
    ));
    assert_eq!(harness.store.update_count(), 0);
}

#[tokio::test]
async fn form_for_wrong_stop_type_is_rejected() {
    let route = in_progress_route("order-1", OPERATOR);
    let harness = SyncHarness::new([route.clone()]);

    let result = harness
        .submitter
        .submit_completion(&route, &StopId::new("i1"), &operator(), &origin_form(), None)
        .await;

    assert!(matches!(
        result,
        Err(SubmitError::Validation(ValidationError::FormMismatch { .. }))
    ));
}

#[tokio::test]
async fn unknown_stop_is_rejected() {
    let route = in_progress_route("order-1", OPERATOR);
    let harness = SyncHarness::new([route.clone()]);

    let result = harness
        .submitter
        .submit_completion(&route, &StopId::new("nowhere"), &operator(), &origin_form(), None)
        .await;

    assert!(matches!(result, Err(SubmitError::UnknownStop { .. })));
    assert_eq!(harness.queued().await, 0);
}

#[tokio::test]
async fn terminal_stop_cannot_be_resubmitted() {
    let mut route = in_progress_route("order-1", OPERATOR);
    route.stops[0].status = StopStatus::Completed;
    let harness = SyncHarness::new([route.clone()]);

    let result = harness
        .submitter
        .submit_completion(&route, &StopId::new("o"), &operator(), &origin_form(), None)
        .await;

    assert!(matches!(result, Err(SubmitError::Transition(_))));
    assert_eq!(harness.queued().await, 0);
}

#[tokio::test]
async fn online_commit_removes_entry_and_keeps_notes() {
    let route = in_progress_route("order-1", OPERATOR);
    let harness = SyncHarness::new([route.clone()]);

    let outcome = harness
        .submitter
        .submit_completion(
            &route,
            &StopId::new("o"),
            &operator(),
            &origin_form(),
            Some("Dock 4".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(outcome.label(), "committed");
    assert_eq!(harness.queued().await, 0);

    let stored = harness.store.route(&route.id).unwrap();
    assert_eq!(stored.stops[0].notes.as_deref(), Some("Dock 4"));
    assert!(stored.stops[0].confirmation.is_some());
    assert_eq!(stored.stops[0].checkpoint_id.as_ref(), Some(outcome.checkpoint_id()));
}

#[tokio::test]
async fn blank_notes_are_not_stored() {
    let route = in_progress_route("order-1", OPERATOR);
    let harness = SyncHarness::new([route.clone()]);

    harness
        .submitter
        .submit_completion(
            &route,
            &StopId::new("o"),
            &operator(),
            &origin_form(),
            Some("   \n".to_string()),
        )
        .await
        .unwrap();

    let stored = harness.store.route(&route.id).unwrap();
    assert_eq!(stored.stops[0].notes, None);
}

#[tokio::test]
async fn submission_defers_to_older_queued_entries() {
    let route = in_progress_route("order-1", OPERATOR);
    let harness = SyncHarness::new([route.clone()]);
    harness
        .queue
        .enqueue(&completed_checkpoint(&route, "o", 1))
        .await
        .unwrap();

    let outcome = harness
        .submitter
        .submit_completion(
            &route,
            &StopId::new("i1"),
            &operator(),
            &intermediate_form(),
            None,
        )
        .await
        .unwrap();

    assert!(matches!(outcome, SubmitOutcome::QueuedOffline { .. }));
    assert_eq!(harness.queued().await, 2);
    assert_eq!(harness.store.update_count(), 0);
}

#[tokio::test]
async fn transient_store_failure_leaves_entry_queued() {
    let route = in_progress_route("order-1", OPERATOR);
    let harness = SyncHarness::new([route.clone()]);
    harness
        .store
        .fail_next(StoreError::Unavailable("maintenance".into()));

    let outcome = harness
        .submitter
        .submit_completion(&route, &StopId::new("o"), &operator(), &origin_form(), None)
        .await
        .unwrap();

    assert!(matches!(outcome, SubmitOutcome::QueuedOffline { .. }));
    assert_eq!(harness.queued().await, 1);
    assert_eq!(*harness.coordinator.pending_count().borrow(), 1);
}

#[tokio::test]
async fn permanent_failure_needs_attention_and_stays_queued() {
    let mut stored = in_progress_route("order-1", OPERATOR);
    stored.assigned_operator_id = "driver-2".into();
    let harness = SyncHarness::new([stored]);

    // operator still holds the snapshot from before the reassignment
    let route = in_progress_route("order-1", OPERATOR);
    let outcome = harness
        .submitter
        .submit_completion(&route, &StopId::new("o"), &operator(), &origin_form(), None)
        .await
        .unwrap();

    match outcome {
        SubmitOutcome::NeedsAttention { error, .. } => assert!(!error.is_transient()),
        other => panic!("expected needs attention, got {other:?}"),
    }
    assert_eq!(harness.queued().await, 1);
}

#[tokio::test]
async fn stale_snapshot_conflict_is_dropped() {
    let mut stored = in_progress_route("order-1", OPERATOR);
    stored.stops[0].status = StopStatus::Skipped;
    let harness = SyncHarness::new([stored]);

    let route = in_progress_route("order-1", OPERATOR);
    let outcome = harness
        .submitter
        .submit_completion(&route, &StopId::new("o"), &operator(), &origin_form(), None)
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        SubmitOutcome::Dropped {
            outcome: ApplyOutcome::Conflict { .. },
            ..
        }
    ));
    assert_eq!(harness.queued().await, 0);
    assert_eq!(harness.store.update_count(), 0);
}

#[tokio::test]
async fn stop_is_not_busy_after_submission() {
    let route = in_progress_route("order-1", OPERATOR);
    let harness = SyncHarness::new([route.clone()]).offline();

    harness
        .submitter
        .submit_completion(&route, &StopId::new("o"), &operator(), &origin_form(), None)
        .await
        .unwrap();

    assert!(!harness.submitter.is_busy(&route.id, &StopId::new("o")));
}
