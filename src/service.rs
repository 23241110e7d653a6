//! Per-entity route computation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use jiff::Timestamp;

use crate::error::{RouteError, SourceError};
use crate::model::{Coordinate, Route};
use crate::planner::{nearest_neighbor_order, tour_cost};
use crate::traits::{PathCostProvider, PositionSource, StopSource};

/// Default bound on each external call.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches an entity's position and open stops and plans a route over them.
///
/// Holds no mutable state, so `compute_route` may run concurrently for any
/// number of entities.
#[derive(Clone)]
pub struct RouteService {
    stops: Arc<dyn StopSource>,
    positions: Arc<dyn PositionSource>,
    costs: Arc<dyn PathCostProvider>,
    fetch_timeout: Duration,
}

impl RouteService {
    pub fn new(
        stops: Arc<dyn StopSource>,
        positions: Arc<dyn PositionSource>,
        costs: Arc<dyn PathCostProvider>,
    ) -> Self {
        Self {
            stops,
            positions,
            costs,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    pub async fn compute_route(&self, entity_id: &str) -> Result<Route, RouteError> {
        let anchor = self
            .bounded(self.positions.fetch_current_position(entity_id))
            .await?
            .ok_or_else(|| RouteError::NoPosition(entity_id.to_string()))?;

        let stops = self.bounded(self.stops.fetch_open_stops(entity_id)).await?;

        let points: Vec<Coordinate> = std::iter::once(anchor)
            .chain(stops.iter().map(|stop| stop.coordinate))
            .collect();

        let (order, total_distance_km) = if stops.is_empty() {
            (Vec::new(), Some(0.0))
        } else {
            let matrix = self.bounded(self.costs.cost_matrix(&points)).await?;
            if matrix.len() != points.len() || matrix.iter().any(|row| row.len() != points.len()) {
                return Err(SourceError::IncompleteResponse.into());
            }
            let cost = |from: usize, to: usize| matrix[from][to];
            let order = nearest_neighbor_order(points.len(), cost);
            // Unreachable legs still get visited, but the length is unknown.
            let total = tour_cost(&order, cost);
            (order, total.is_finite().then_some(total))
        };

        tracing::debug!(
            entity_id,
            stops = stops.len(),
            total_distance_km = ?total_distance_km,
            "computed route"
        );

        Ok(Route {
            entity_id: entity_id.to_string(),
            ordered_stops: std::iter::once(anchor)
                .chain(order.iter().map(|&index| points[index]))
                .collect(),
            stop_ids: order.iter().map(|&index| stops[index - 1].id.clone()).collect(),
            total_distance_km,
            computed_at: Timestamp::now(),
        })
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, RouteError>
    where
        F: Future<Output = Result<T, SourceError>>,
    {
        match tokio::time::timeout(self.fetch_timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(SourceError::Timeout(self.fetch_timeout).into()),
        }
    }
}
