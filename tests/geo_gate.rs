//! Property tests for proximity gating and distance math.

use proptest::prelude::*;

use waypoint_core::geo::{haversine_distance_m, GeoGate};
use waypoint_core::models::{Address, GeoPoint, Stop};

fn point_strategy() -> impl Strategy<Value = GeoPoint> {
    (-80.0f64..80.0, -179.0f64..179.0).prop_map(|(lat, lng)| GeoPoint::new(lat, lng))
}

fn stop_at(point: GeoPoint) -> Stop {
    Stop::intermediate(
        "i1",
        Address::new("Shop").with_coordinates(point.latitude, point.longitude),
    )
}

proptest! {
    /// Check-in is enabled exactly when the stop is within the threshold
    #[test]
    fn gate_enables_iff_within_threshold(
        position in point_strategy(),
        target in point_strategy(),
        threshold in 1.0f64..5_000_000.0,
    ) {
        let gate = GeoGate::new(threshold);
        let decision = gate.evaluate(Some(position), &stop_at(target));
        let distance = haversine_distance_m(position, target);

        prop_assert_eq!(decision.distance_meters, Some(distance));
        prop_assert_eq!(decision.check_in_enabled, distance <= threshold);
    }

    /// Unknown position or unknown coordinates never block check-in
    #[test]
    fn gate_fails_open_without_both_ends(
        position in point_strategy(),
        threshold in 0.0f64..1_000.0,
    ) {
        let gate = GeoGate::new(threshold);
        let uncoded = Stop::intermediate("i1", Address::new("Somewhere"));

        let no_coordinates = gate.evaluate(Some(position), &uncoded);
        prop_assert!(no_coordinates.check_in_enabled);
        prop_assert!(no_coordinates.distance_meters.is_none());

        let no_position = gate.evaluate(None, &stop_at(position));
        prop_assert!(no_position.check_in_enabled);
        prop_assert!(no_position.distance_meters.is_none());
    }

    #[test]
    fn distance_is_symmetric_and_non_negative(a in point_strategy(), b in point_strategy()) {
        let there = haversine_distance_m(a, b);
        let back = haversine_distance_m(b, a);
        prop_assert!(there >= 0.0);
        prop_assert!((there - back).abs() < 1e-3);
    }

    #[test]
    fn distance_to_self_is_zero(a in point_strategy()) {
        prop_assert!(haversine_distance_m(a, a) < 1e-6);
    }
}

#[test]
fn same_position_is_always_enabled_even_at_zero_threshold() {
    let point = GeoPoint::new(-28.6775, -49.3697);
    let gate = GeoGate::new(0.0);
    assert!(gate.evaluate(Some(point), &stop_at(point)).check_in_enabled);
}

#[test]
fn invalid_coordinates_fail_open() {
    let gate = GeoGate::new(10.0);
    let stop = stop_at(GeoPoint::new(-28.6775, -49.3697));
    let decision = gate.evaluate(Some(GeoPoint::new(f64::NAN, 0.0)), &stop);
    assert!(decision.check_in_enabled);
}
