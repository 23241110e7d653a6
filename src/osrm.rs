//! OSRM HTTP adapter for road-network cost matrices.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::SourceError;
use crate::model::Coordinate;
use crate::traits::{CostMatrix, PathCostProvider};

#[derive(Debug, Clone)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "car".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn table_url(&self, points: &[Coordinate]) -> String {
        let coords = points
            .iter()
            .map(|point| format!("{:.6},{:.6}", point.lng(), point.lat()))
            .collect::<Vec<_>>()
            .join(";");

        format!(
            "{}/table/v1/{}/{}?annotations=distance",
            self.config.base_url.trim_end_matches('/'),
            self.config.profile,
            coords
        )
    }
}

#[async_trait]
impl PathCostProvider for OsrmClient {
    async fn cost_matrix(&self, points: &[Coordinate]) -> Result<CostMatrix, SourceError> {
        if points.is_empty() {
            return Ok(Vec::new());
        }

        let body = self
            .client
            .get(self.table_url(points))
            .send()
            .await?
            .error_for_status()?
            .json::<OsrmTableResponse>()
            .await?;

        tracing::debug!(points = points.len(), code = %body.code, "OSRM table response");
        body.into_matrix(points.len())
    }
}

#[derive(Debug, Deserialize)]
struct OsrmTableResponse {
    code: String,
    /// Meters; `null` where no route exists.
    distances: Option<Vec<Vec<Option<f64>>>>,
}

impl OsrmTableResponse {
    fn into_matrix(self, expected: usize) -> Result<CostMatrix, SourceError> {
        if self.code != "Ok" {
            return Err(SourceError::Unavailable(format!("OSRM returned {}", self.code)));
        }

        let rows = self.distances.ok_or(SourceError::IncompleteResponse)?;
        if rows.len() != expected || rows.iter().any(|row| row.len() != expected) {
            return Err(SourceError::IncompleteResponse);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|meters| meters.map_or(f64::INFINITY, |m| m / 1000.0))
                    .collect()
            })
            .collect())
    }
}
