//! Error types for route computation and collaborator access.

use std::time::Duration;

use thiserror::Error;

/// Failure reported by an external collaborator (stop store, position
/// store, push feed or path-cost provider).
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("incomplete response")]
    IncompleteResponse,
}

#[derive(Debug, Error)]
pub enum RouteError {
    /// Latitude outside [-90, 90] or longitude outside [-180, 180].
    #[error("invalid coordinate ({lat}, {lng})")]
    InvalidCoordinate { lat: f64, lng: f64 },

    /// The entity has no known position; recomputation is deferred.
    #[error("no known position for entity {0}")]
    NoPosition(String),

    /// An upstream source failed or timed out; retried on the next refresh.
    #[error("upstream fetch failed: {0}")]
    FetchFailed(#[from] SourceError),

    #[error("malformed position event: {0}")]
    MalformedEvent(String),
}

impl RouteError {
    /// Whether the failure is transient and the last route should be kept.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RouteError::FetchFailed(_) | RouteError::NoPosition(_))
    }
}
