use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use super::identifiers::{ClientId, OperatorId, RouteId, StopId};
use super::stop::{Stop, StopType};
use crate::state_machine::ExecutionStatus;

/// Errors raised when a stop list does not form a valid route
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RouteLayoutError {
    #[error("Route must contain at least an origin and a destination")]
    TooFewStops,

    #[error("First stop must be the origin, found {found}")]
    MissingOrigin { found: StopType },

    #[error("Last stop must be the destination, found {found}")]
    MissingDestination { found: StopType },

    #[error("Stop {stop_id} of type {stop_type} is misplaced at index {index}")]
    MisplacedStop {
        stop_id: StopId,
        stop_type: StopType,
        index: usize,
    },

    #[error("Duplicate stop id {0}")]
    DuplicateStopId(StopId),
}

/// Distance, duration and toll figures attached to a route
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteCost {
    pub distance_km: Option<f64>,
    pub duration_minutes: Option<f64>,
    pub toll_cost: Option<f64>,
}

/// An order being executed: an ordered list of stops assigned to one operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,
    pub name: Option<String>,
    /// Origin first, destination last, intermediates in visiting order between
    pub stops: Vec<Stop>,
    pub execution_status: ExecutionStatus,
    pub assigned_operator_id: OperatorId,
    pub client_id: ClientId,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cost: RouteCost,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<OperatorId>,
}

impl Route {
    /// Build a route from its origin, intermediates and destination
    pub fn new(
        id: impl Into<RouteId>,
        operator_id: impl Into<OperatorId>,
        client_id: impl Into<ClientId>,
        origin: Stop,
        intermediates: Vec<Stop>,
        destination: Stop,
    ) -> Result<Self, RouteLayoutError> {
        let mut stops = Vec::with_capacity(intermediates.len() + 2);
        stops.push(origin);
        stops.extend(intermediates);
        stops.push(destination);
        Self::from_stops(id, operator_id, client_id, stops)
    }

    /// Build a route from an already ordered stop list, validating the layout
    pub fn from_stops(
        id: impl Into<RouteId>,
        operator_id: impl Into<OperatorId>,
        client_id: impl Into<ClientId>,
        stops: Vec<Stop>,
    ) -> Result<Self, RouteLayoutError> {
        Self::validate_layout(&stops)?;

        Ok(Self {
            id: id.into(),
            name: None,
            stops,
            execution_status: ExecutionStatus::Pending,
            assigned_operator_id: operator_id.into(),
            client_id: client_id.into(),
            started_at: None,
            completed_at: None,
            cost: RouteCost::default(),
            updated_at: None,
            updated_by: None,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_cost(mut self, cost: RouteCost) -> Self {
        self.cost = cost;
        self
    }

    /// Check ordering and uniqueness of a stop list
    pub fn validate_layout(stops: &[Stop]) -> Result<(), RouteLayoutError> {
        if stops.len() < 2 {
            return Err(RouteLayoutError::TooFewStops);
        }

        let first = &stops[0];
        if first.stop_type != StopType::Origin {
            return Err(RouteLayoutError::MissingOrigin {
                found: first.stop_type,
            });
        }

        let last_index = stops.len() - 1;
        let last = &stops[last_index];
        if last.stop_type != StopType::Destination {
            return Err(RouteLayoutError::MissingDestination {
                found: last.stop_type,
            });
        }

        for (index, stop) in stops.iter().enumerate().take(last_index).skip(1) {
            if stop.stop_type != StopType::Intermediate {
                return Err(RouteLayoutError::MisplacedStop {
                    stop_id: stop.id.clone(),
                    stop_type: stop.stop_type,
                    index,
                });
            }
        }

        let mut seen = HashSet::with_capacity(stops.len());
        for stop in stops {
            if !seen.insert(&stop.id) {
                return Err(RouteLayoutError::DuplicateStopId(stop.id.clone()));
            }
        }

        Ok(())
    }

    /// Look a stop up by id; positions are never used to address stops
    pub fn stop(&self, stop_id: &StopId) -> Option<&Stop> {
        self.stops.iter().find(|stop| &stop.id == stop_id)
    }

    pub fn stop_index(&self, stop_id: &StopId) -> Option<usize> {
        self.stops.iter().position(|stop| &stop.id == stop_id)
    }

    /// Replace the stop carrying the same id. Returns false when no such stop exists.
    pub fn replace_stop(&mut self, replacement: Stop) -> bool {
        match self.stops.iter_mut().find(|stop| stop.id == replacement.id) {
            Some(slot) => {
                *slot = replacement;
                true
            }
            None => false,
        }
    }

    pub fn is_assigned_to(&self, operator_id: &OperatorId) -> bool {
        &self.assigned_operator_id == operator_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Address;

    fn stop(id: &str, stop_type: StopType) -> Stop {
        Stop::new(id, stop_type, Address::new(format!("{id} street")))
    }

    #[test]
    fn test_route_layout_accepts_origin_intermediates_destination() {
        let route = Route::new(
            "order-1",
            "driver-1",
            "client-1",
            stop("o", StopType::Origin),
            vec![stop("i1", StopType::Intermediate), stop("i2", StopType::Intermediate)],
            stop("d", StopType::Destination),
        )
        .unwrap();

        assert_eq!(route.stops.len(), 4);
        assert_eq!(route.execution_status, ExecutionStatus::Pending);
        assert_eq!(route.stop_index(&StopId::new("i2")), Some(2));
    }

    #[test]
    fn test_route_layout_rejections() {
        let misplaced = Route::from_stops(
            "order-1",
            "driver-1",
            "client-1",
            vec![
                stop("o", StopType::Origin),
                stop("x", StopType::Origin),
                stop("d", StopType::Destination),
            ],
        );
        assert!(matches!(
            misplaced,
            Err(RouteLayoutError::MisplacedStop { index: 1, .. })
        ));

        let duplicate = Route::from_stops(
            "order-1",
            "driver-1",
            "client-1",
            vec![stop("o", StopType::Origin), stop("o", StopType::Destination)],
        );
        assert!(matches!(duplicate, Err(RouteLayoutError::DuplicateStopId(_))));

        let reversed = Route::from_stops(
            "order-1",
            "driver-1",
            "client-1",
            vec![stop("d", StopType::Destination), stop("o", StopType::Origin)],
        );
        assert!(matches!(reversed, Err(RouteLayoutError::MissingOrigin { .. })));

        let single = Route::from_stops("order-1", "driver-1", "client-1", vec![stop("o", StopType::Origin)]);
        assert_eq!(single.unwrap_err(), RouteLayoutError::TooFewStops);
    }

    #[test]
    fn test_replace_stop_addresses_by_id() {
        let mut route = Route::new(
            "order-1",
            "driver-1",
            "client-1",
            stop("o", StopType::Origin),
            vec![],
            stop("d", StopType::Destination),
        )
        .unwrap();

        let mut replacement = stop("d", StopType::Destination);
        replacement.notes = Some("gate code 1234".to_string());
        assert!(route.replace_stop(replacement));
        assert_eq!(route.stops[1].notes.as_deref(), Some("gate code 1234"));

        assert!(!route.replace_stop(stop("missing", StopType::Intermediate)));
    }
}
