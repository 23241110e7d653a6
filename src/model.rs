//! Value types shared by the planner, tracker and coordinator.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::error::RouteError;

/// A validated WGS84 position.
///
/// Construction fails for latitude outside [-90, 90], longitude outside
/// [-180, 180] or NaN components, so every `Coordinate` in the system is
/// safe to feed into the distance estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CoordinateRepr")]
pub struct Coordinate {
    lat: f64,
    lng: f64,
}

#[derive(Deserialize)]
struct CoordinateRepr {
    #[serde(alias = "latitude")]
    lat: f64,
    #[serde(alias = "longitude")]
    lng: f64,
}

impl TryFrom<CoordinateRepr> for Coordinate {
    type Error = RouteError;

    fn try_from(repr: CoordinateRepr) -> Result<Self, Self::Error> {
        Coordinate::new(repr.lat, repr.lng)
    }
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Result<Self, RouteError> {
        if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng) {
            Ok(Self { lat, lng })
        } else {
            Err(RouteError::InvalidCoordinate { lat, lng })
        }
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }
}

/// A point requiring a visit. Owned by the assignment system; read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub id: String,
    pub coordinate: Coordinate,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Stop {
    pub fn new(id: impl Into<String>, coordinate: Coordinate) -> Self {
        Self {
            id: id.into(),
            coordinate,
            metadata: serde_json::Value::Null,
        }
    }
}

/// Optional movement data reported alongside a position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Motion {
    /// Degrees clockwise from north.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

/// Last known live position of a tracked entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveEntityPosition {
    pub entity_id: String,
    pub coordinate: Coordinate,
    #[serde(flatten)]
    pub motion: Motion,
    pub last_updated: Timestamp,
    pub online: bool,
}

/// Unvalidated push-feed payload.
///
/// Accepts both the camelCase names used here and the column names of the
/// driver location table (`driverId`, `latitude`, `longitude`, `lastUpdate`,
/// `isOnline`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPositionEvent {
    #[serde(alias = "driverId")]
    pub entity_id: Option<String>,
    #[serde(alias = "latitude")]
    pub lat: Option<f64>,
    #[serde(alias = "longitude")]
    pub lng: Option<f64>,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    #[serde(alias = "lastUpdate")]
    pub last_updated: Option<Timestamp>,
    #[serde(alias = "isOnline")]
    pub online: Option<bool>,
}

/// A push-feed event that passed shape validation.
#[derive(Debug, Clone, PartialEq)]
pub enum PositionEvent {
    Online(LiveEntityPosition),
    Offline { entity_id: String },
}

impl PositionEvent {
    pub fn entity_id(&self) -> &str {
        match self {
            PositionEvent::Online(position) => &position.entity_id,
            PositionEvent::Offline { entity_id } => entity_id,
        }
    }
}

impl TryFrom<RawPositionEvent> for PositionEvent {
    type Error = RouteError;

    fn try_from(raw: RawPositionEvent) -> Result<Self, Self::Error> {
        let entity_id = match raw.entity_id {
            Some(id) if !id.trim().is_empty() => id,
            _ => return Err(RouteError::MalformedEvent("missing entity id".into())),
        };
        let online = raw.online.ok_or_else(|| {
            RouteError::MalformedEvent(format!("missing online flag for {entity_id}"))
        })?;

        // Offline transitions may carry stale or empty coordinates.
        if !online {
            return Ok(PositionEvent::Offline { entity_id });
        }

        let (Some(lat), Some(lng)) = (raw.lat, raw.lng) else {
            return Err(RouteError::MalformedEvent(format!(
                "missing coordinates for {entity_id}"
            )));
        };
        let coordinate = Coordinate::new(lat, lng)
            .map_err(|err| RouteError::MalformedEvent(format!("{entity_id}: {err}")))?;

        Ok(PositionEvent::Online(LiveEntityPosition {
            entity_id,
            coordinate,
            motion: Motion {
                heading: raw.heading,
                speed: raw.speed,
            },
            last_updated: raw.last_updated.unwrap_or_else(Timestamp::now),
            online,
        }))
    }
}

/// A planned visiting order for one entity.
///
/// `ordered_stops[0]` is the anchor (the entity's position when the route was
/// computed); `stop_ids[i]` names `ordered_stops[i + 1]`. `total_distance_km`
/// is `None` when a leg of the order has no known cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub entity_id: String,
    pub ordered_stops: Vec<Coordinate>,
    pub stop_ids: Vec<String>,
    pub total_distance_km: Option<f64>,
    pub computed_at: Timestamp,
}

impl Route {
    pub fn anchor(&self) -> Option<&Coordinate> {
        self.ordered_stops.first()
    }
}
