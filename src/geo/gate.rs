//! Proximity gating of the check-in affordance.
//!
//! The gate fails open: check-in is only disabled when both the operator
//! position and the stop coordinates are known and the distance between them
//! exceeds the threshold.

use serde::Serialize;

use super::distance::haversine_distance_m;
use crate::config::GateConfig;
use crate::models::{GeoPoint, Route, Stop};

/// Gate result for one stop
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GateDecision {
    pub check_in_enabled: bool,
    /// Meters to the stop, when both ends are known
    pub distance_meters: Option<f64>,
}

impl GateDecision {
    fn open() -> Self {
        Self {
            check_in_enabled: true,
            distance_meters: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoGate {
    threshold_meters: f64,
}

impl GeoGate {
    pub fn new(threshold_meters: f64) -> Self {
        Self { threshold_meters }
    }

    pub fn from_config(config: &GateConfig) -> Self {
        Self::new(config.proximity_threshold_meters)
    }

    pub fn threshold_meters(&self) -> f64 {
        self.threshold_meters
    }

    /// Distance from `position` to `stop`, when both are known and valid
    pub fn distance_to(&self, position: Option<GeoPoint>, stop: &Stop) -> Option<f64> {
        let position = position.filter(GeoPoint::is_valid)?;
        let target = stop.coordinates().filter(GeoPoint::is_valid)?;
        Some(haversine_distance_m(position, target))
    }

    pub fn evaluate(&self, position: Option<GeoPoint>, stop: &Stop) -> GateDecision {
        match self.distance_to(position, stop) {
            Some(distance) => GateDecision {
                check_in_enabled: distance <= self.threshold_meters,
                distance_meters: Some(distance),
            },
            None => GateDecision::open(),
        }
    }

    /// Gate for the route's current stop; open when every stop is terminal
    pub fn evaluate_route(&self, position: Option<GeoPoint>, route: &Route) -> GateDecision {
        route
            .current_stop()
            .map_or_else(GateDecision::open, |stop| self.evaluate(position, stop))
    }
}

impl Default for GeoGate {
    fn default() -> Self {
        Self::from_config(&GateConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Address;

    fn stop_at(lat: f64, lng: f64) -> Stop {
        Stop::intermediate("i1", Address::new("Shop").with_coordinates(lat, lng))
    }

    #[test]
    fn test_threshold_boundary() {
        let gate = GeoGate::new(200.0);
        let stop = stop_at(-28.4774, -49.0079);

        let near = gate.evaluate(Some(GeoPoint::new(-28.4780, -49.0079)), &stop);
        assert!(near.check_in_enabled);
        assert!(near.distance_meters.unwrap() < 100.0);

        let far = gate.evaluate(Some(GeoPoint::new(-28.4900, -49.0079)), &stop);
        assert!(!far.check_in_enabled);
        assert!(far.distance_meters.unwrap() > 1_000.0);
    }

    #[test]
    fn test_unknown_inputs_fail_open() {
        let gate = GeoGate::default();
        let located = stop_at(-28.4774, -49.0079);
        let unlocated = Stop::intermediate("i2", Address::new("Somewhere"));

        assert_eq!(gate.evaluate(None, &located), GateDecision::open());
        assert_eq!(
            gate.evaluate(Some(GeoPoint::new(-27.0, -48.0)), &unlocated),
            GateDecision::open()
        );
        assert_eq!(
            gate.evaluate(Some(GeoPoint::new(f64::NAN, 0.0)), &located),
            GateDecision::open()
        );
    }
}
