//! Observed state of an operator's active routes.
//!
//! The route subscription writes snapshots here; views read from here. The
//! object is created by the runtime and injected wherever it is needed, so
//! there is exactly one per operator session.

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::models::{Route, RouteId};

/// How the selection changed after a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionChange {
    Unchanged,
    Selected(RouteId),
    /// The previously selected route left the active set
    Moved { from: RouteId, to: Option<RouteId> },
}

#[derive(Debug)]
pub struct ObservedState {
    routes: RwLock<Vec<Route>>,
    selected: RwLock<Option<RouteId>>,
    active_count: watch::Sender<usize>,
}

impl ObservedState {
    pub fn new() -> Self {
        let (active_count, _) = watch::channel(0);
        Self {
            routes: RwLock::new(Vec::new()),
            selected: RwLock::new(None),
            active_count,
        }
    }

    /// Replace the active set with `routes`, keeping the snapshot order
    pub fn apply_snapshot(&self, routes: &[Route]) -> SelectionChange {
        *self.routes.write() = routes.to_vec();
        self.active_count.send_replace(routes.len());

        let mut selected = self.selected.write();
        let change = match selected.clone() {
            Some(current) if routes.iter().any(|route| route.id == current) => {
                SelectionChange::Unchanged
            }
            Some(current) => {
                let next = routes.first().map(|route| route.id.clone());
                info!(
                    from = %current,
                    to = ?next.as_ref().map(RouteId::as_str),
                    "🔀 Selected route left the active set"
                );
                *selected = next.clone();
                SelectionChange::Moved {
                    from: current,
                    to: next,
                }
            }
            None => match routes.first() {
                Some(first) => {
                    *selected = Some(first.id.clone());
                    SelectionChange::Selected(first.id.clone())
                }
                None => SelectionChange::Unchanged,
            },
        };

        debug!(active_routes = routes.len(), "Observed state updated");
        change
    }

    /// Select an active route; false when it is not in the active set
    pub fn select(&self, route_id: &RouteId) -> bool {
        if !self.routes.read().iter().any(|route| &route.id == route_id) {
            return false;
        }
        *self.selected.write() = Some(route_id.clone());
        true
    }

    pub fn selected_id(&self) -> Option<RouteId> {
        self.selected.read().clone()
    }

    pub fn selected_route(&self) -> Option<Route> {
        let selected = self.selected.read().clone()?;
        self.route(&selected)
    }

    pub fn route(&self, route_id: &RouteId) -> Option<Route> {
        self.routes
            .read()
            .iter()
            .find(|route| &route.id == route_id)
            .cloned()
    }

    pub fn active_routes(&self) -> Vec<Route> {
        self.routes.read().clone()
    }

    /// Live count of active routes
    pub fn active_count(&self) -> watch::Receiver<usize> {
        self.active_count.subscribe()
    }
}

impl Default for ObservedState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Address, Stop};

    fn route(id: &str) -> Route {
        Route::new(
            id,
            "driver-1",
            "client-1",
            Stop::origin("o", Address::new("Depot")),
            vec![],
            Stop::destination("d", Address::new("Warehouse")),
        )
        .unwrap()
    }

    #[test]
    fn test_selection_moves_when_selected_route_leaves() {
        let state = ObservedState::new();
        assert_eq!(
            state.apply_snapshot(&[route("a"), route("b")]),
            SelectionChange::Selected(RouteId::new("a"))
        );

        assert!(state.select(&RouteId::new("b")));
        assert!(!state.select(&RouteId::new("zzz")));
        assert_eq!(state.selected_id(), Some(RouteId::new("b")));

        let change = state.apply_snapshot(&[route("a"), route("c")]);
        assert_eq!(
            change,
            SelectionChange::Moved {
                from: RouteId::new("b"),
                to: Some(RouteId::new("a")),
            }
        );

        let change = state.apply_snapshot(&[]);
        assert_eq!(
            change,
            SelectionChange::Moved {
                from: RouteId::new("a"),
                to: None,
            }
        );
        assert_eq!(*state.active_count().borrow(), 0);
    }
}
