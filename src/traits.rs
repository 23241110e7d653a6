//! Collaborator interfaces.
//!
//! The surrounding application (assignment store, location store, real-time
//! transport, routing service) implements these. Everything is injected
//! explicitly; there is no ambient client.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::SourceError;
use crate::model::{Coordinate, LiveEntityPosition, Motion, RawPositionEvent, Stop};

/// Travel cost matrix in kilometers, indexed by input point order.
pub type CostMatrix = Vec<Vec<f64>>;

/// Source of currently open stops (not completed or cancelled).
#[async_trait]
pub trait StopSource: Send + Sync {
    async fn fetch_open_stops(&self, entity_id: &str) -> Result<Vec<Stop>, SourceError>;
}

/// Pull access to an entity's last known position, independent of the push feed.
#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn fetch_current_position(&self, entity_id: &str)
    -> Result<Option<Coordinate>, SourceError>;
}

/// Push feed of position and online-state changes.
///
/// Dropping the returned stream releases the subscription.
#[async_trait]
pub trait PositionFeed: Send + Sync {
    /// Snapshot of the currently online entities among `entity_ids`.
    async fn bulk_fetch_online_positions(
        &self,
        entity_ids: &[String],
    ) -> Result<HashMap<String, LiveEntityPosition>, SourceError>;

    async fn subscribe_position_feed(
        &self,
        entity_ids: &[String],
    ) -> Result<BoxStream<'static, RawPositionEvent>, SourceError>;
}

/// Receives position reports from entities themselves.
#[async_trait]
pub trait PositionSink: Send + Sync {
    async fn report_position(
        &self,
        entity_id: &str,
        coordinate: Coordinate,
        motion: Motion,
    ) -> Result<(), SourceError>;

    async fn report_offline(&self, entity_id: &str) -> Result<(), SourceError>;
}

/// Provides point-to-point travel cost for a set of locations.
///
/// The matrix is indexed by the provided location order.
#[async_trait]
pub trait PathCostProvider: Send + Sync {
    async fn cost_matrix(&self, points: &[Coordinate]) -> Result<CostMatrix, SourceError>;
}
