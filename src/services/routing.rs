use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Address, RouteCost};

/// Figures returned by the routing provider for an ordered address list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteEstimate {
    pub distance_km: f64,
    pub duration_minutes: f64,
    pub toll_cost: Option<f64>,
    /// Visiting order of the intermediate waypoints when optimization was requested
    pub optimized_waypoint_order: Option<Vec<usize>>,
}

impl From<&RouteEstimate> for RouteCost {
    fn from(estimate: &RouteEstimate) -> Self {
        Self {
            distance_km: Some(estimate.distance_km),
            duration_minutes: Some(estimate.duration_minutes),
            toll_cost: estimate.toll_cost,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoutingError {
    #[error("Routing provider unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid routing request: {0}")]
    InvalidRequest(String),

    #[error("No route found between the given addresses")]
    NoRoute,
}

/// Distance/duration provider
#[async_trait]
pub trait RoutingService: Send + Sync + 'static {
    async fn compute_route(
        &self,
        addresses: &[Address],
        optimize: bool,
    ) -> Result<RouteEstimate, RoutingError>;
}
