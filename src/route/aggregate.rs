use serde::Serialize;

use crate::models::{Address, PendingCheckpoint, Route, Stop, StopId};
use crate::state_machine::{StopStateMachine, StopStatus};

/// Stop counts for a route
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RouteProgress {
    pub total: usize,
    pub completed: usize,
    pub skipped: usize,
    pub pending: usize,
    /// Terminal stops over total stops; 0 for an empty route
    pub ratio: f64,
}

/// A route overlaid with checkpoints that are still waiting in the local queue
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedRoute {
    pub route: Route,
    /// Stops whose displayed state comes from a queued checkpoint
    pub pending_stop_ids: Vec<StopId>,
}

impl Route {
    /// Index of the lowest-indexed pending stop
    pub fn current_stop_index(&self) -> Option<usize> {
        self.stops.iter().position(Stop::is_pending)
    }

    pub fn current_stop(&self) -> Option<&Stop> {
        self.current_stop_index().map(|index| &self.stops[index])
    }

    pub fn terminal_count(&self) -> usize {
        self.stops.iter().filter(|stop| stop.is_terminal()).count()
    }

    pub fn progress(&self) -> f64 {
        if self.stops.is_empty() {
            return 0.0;
        }
        self.terminal_count() as f64 / self.stops.len() as f64
    }

    pub fn progress_summary(&self) -> RouteProgress {
        let count = |status: StopStatus| self.stops.iter().filter(|s| s.status == status).count();
        RouteProgress {
            total: self.stops.len(),
            completed: count(StopStatus::Completed),
            skipped: count(StopStatus::Skipped),
            pending: count(StopStatus::Pending),
            ratio: self.progress(),
        }
    }

    /// Every stop is terminal. An empty stop list is never finished.
    pub fn is_finished(&self) -> bool {
        !self.stops.is_empty() && self.stops.iter().all(Stop::is_terminal)
    }

    pub fn has_skipped_stops(&self) -> bool {
        self.stops.iter().any(|stop| stop.status == StopStatus::Skipped)
    }

    /// Addresses of completed stops in route order
    pub fn completed_addresses(&self) -> Vec<Address> {
        self.stops
            .iter()
            .filter(|stop| stop.status == StopStatus::Completed)
            .map(|stop| stop.address.clone())
            .collect()
    }

    /// Overlay queued checkpoints for display without touching stored state.
    ///
    /// Checkpoints for other routes, unknown stops or stops that are no longer
    /// pending are ignored, exactly as the drain would drop them.
    pub fn project_pending(&self, queued: &[PendingCheckpoint]) -> ProjectedRoute {
        let mut route = self.clone();
        let mut pending_stop_ids = Vec::new();

        for checkpoint in queued.iter().filter(|c| c.route_id == self.id) {
            let Some(stop) = route.stop(&checkpoint.stop_id) else {
                continue;
            };
            if let Ok(transition) = StopStateMachine::apply(stop, checkpoint) {
                pending_stop_ids.push(transition.stop.id.clone());
                route.replace_stop(transition.stop);
            }
        }

        ProjectedRoute {
            route,
            pending_stop_ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OperatorId, RouteId, SkipReason};
    use chrono::Utc;

    fn route() -> Route {
        Route::new(
            "order-1",
            "driver-1",
            "client-1",
            Stop::origin("o", Address::new("Depot")),
            vec![
                Stop::intermediate("i1", Address::new("Shop A")),
                Stop::intermediate("i2", Address::new("Shop B")),
            ],
            Stop::destination("d", Address::new("Warehouse")),
        )
        .unwrap()
    }

    #[test]
    fn test_pointer_follows_first_pending_stop() {
        let mut route = route();
        assert_eq!(route.current_stop_index(), Some(0));

        route.stops[0].status = StopStatus::Completed;
        route.stops[2].status = StopStatus::Skipped;
        assert_eq!(route.current_stop_index(), Some(1));
        assert_eq!(route.progress(), 0.5);

        route.stops[1].status = StopStatus::Completed;
        route.stops[3].status = StopStatus::Completed;
        assert_eq!(route.current_stop_index(), None);
        assert!(route.is_finished());

        let summary = route.progress_summary();
        assert_eq!(summary.completed, 3);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.ratio, 1.0);
    }

    #[test]
    fn test_empty_route_has_zero_progress() {
        let mut route = route();
        route.stops.clear();
        assert_eq!(route.progress(), 0.0);
        assert!(!route.is_finished());
        assert_eq!(route.current_stop_index(), None);
    }

    #[test]
    fn test_projection_does_not_mutate_stored_route() {
        let stored = route();
        let queued = vec![
            PendingCheckpoint::skipped(
                RouteId::new("order-1"),
                StopId::new("i1"),
                OperatorId::new("driver-1"),
                SkipReason::LocationClosed,
                Utc::now(),
            ),
            PendingCheckpoint::skipped(
                RouteId::new("order-2"),
                StopId::new("i2"),
                OperatorId::new("driver-1"),
                SkipReason::LocationClosed,
                Utc::now(),
            ),
        ];

        let projected = stored.project_pending(&queued);
        assert_eq!(projected.pending_stop_ids, vec![StopId::new("i1")]);
        assert_eq!(projected.route.stops[1].status, StopStatus::Skipped);
        assert_eq!(stored.stops[1].status, StopStatus::Pending);
    }
}
