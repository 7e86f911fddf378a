//! Property tests for the route aggregate.

use proptest::prelude::*;

use waypoint_core::models::{Address, Route, Stop};
use waypoint_core::state_machine::StopStatus;

fn status_strategy() -> impl Strategy<Value = StopStatus> {
    prop_oneof![
        Just(StopStatus::Pending),
        Just(StopStatus::Completed),
        Just(StopStatus::Skipped),
    ]
}

/// Origin, 0..6 intermediates and a destination with arbitrary statuses
fn route_strategy() -> impl Strategy<Value = Route> {
    prop::collection::vec(status_strategy(), 2..8).prop_map(|statuses| {
        let last = statuses.len() - 1;
        let stops: Vec<Stop> = statuses
            .iter()
            .enumerate()
            .map(|(index, status)| {
                let address = Address::new(format!("Stop {index}"));
                let mut stop = match index {
                    0 => Stop::origin("o", address),
                    i if i == last => Stop::destination("d", address),
                    i => Stop::intermediate(format!("i{i}"), address),
                };
                stop.status = *status;
                stop
            })
            .collect();
        Route::from_stops("order-p", "driver-1", "client-1", stops).unwrap()
    })
}

proptest! {
    /// The current stop is the lowest-indexed pending stop
    #[test]
    fn current_stop_is_first_pending(route in route_strategy()) {
        let expected = route.stops.iter().position(|s| s.status == StopStatus::Pending);
        prop_assert_eq!(route.current_stop_index(), expected);
        if let Some(index) = expected {
            prop_assert!(route.stops[..index].iter().all(|s| s.status.is_terminal()));
        }
    }

    /// Finished exactly when no stop is pending
    #[test]
    fn finished_iff_every_stop_terminal(route in route_strategy()) {
        prop_assert_eq!(route.is_finished(), route.current_stop_index().is_none());
    }

    #[test]
    fn progress_counts_add_up(route in route_strategy()) {
        let progress = route.progress_summary();
        prop_assert_eq!(progress.total, route.stops.len());
        prop_assert_eq!(progress.completed + progress.skipped + progress.pending, progress.total);
        prop_assert!((0.0..=1.0).contains(&progress.ratio));
        prop_assert_eq!(
            progress.ratio == 1.0,
            route.is_finished()
        );
    }

    /// Only completed stops feed the cost recompute, in route order
    #[test]
    fn completed_addresses_follow_route_order(route in route_strategy()) {
        let expected: Vec<String> = route
            .stops
            .iter()
            .filter(|s| s.status == StopStatus::Completed)
            .map(|s| s.address.description.clone())
            .collect();
        let actual: Vec<String> = route
            .completed_addresses()
            .into_iter()
            .map(|a| a.description)
            .collect();
        prop_assert_eq!(actual, expected);
    }
}
