//! Haversine distance and the default path-cost provider.
//!
//! Uses great-circle distance. Less accurate than OSRM (ignores roads) but
//! always available and free of network calls.

use async_trait::async_trait;
use rayon::prelude::*;

use crate::error::SourceError;
use crate::model::Coordinate;
use crate::traits::{CostMatrix, PathCostProvider};

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points in kilometers.
pub fn distance(a: Coordinate, b: Coordinate) -> f64 {
    let lat1_rad = a.lat().to_radians();
    let lat2_rad = b.lat().to_radians();
    let delta_lat = (b.lat() - a.lat()).to_radians();
    let delta_lng = (b.lng() - a.lng()).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    // Rounding can push h a hair past 1.0 for antipodal points.
    let c = 2.0 * h.min(1.0).sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Haversine-based cost matrix provider.
#[derive(Debug, Clone, Default)]
pub struct HaversineMatrix;

impl HaversineMatrix {
    pub fn matrix_for(&self, points: &[Coordinate]) -> CostMatrix {
        points
            .par_iter()
            .map(|from| points.iter().map(|to| distance(*from, *to)).collect())
            .collect()
    }
}

#[async_trait]
impl PathCostProvider for HaversineMatrix {
    async fn cost_matrix(&self, points: &[Coordinate]) -> Result<CostMatrix, SourceError> {
        Ok(self.matrix_for(points))
    }
}
