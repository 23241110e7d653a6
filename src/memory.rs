//! In-memory fleet store.
//!
//! Implements every collaborator trait over process-local state, with a
//! `broadcast` channel standing in for the real-time transport. Used by the
//! demo binary and by tests.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use jiff::Timestamp;
use parking_lot::RwLock;
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::error::SourceError;
use crate::model::{Coordinate, LiveEntityPosition, Motion, RawPositionEvent, Stop};
use crate::traits::{PositionFeed, PositionSink, PositionSource, StopSource};

const FEED_CAPACITY: usize = 1024;

/// JSON seed for [`InMemoryFleet::from_seed`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FleetSeed {
    pub drivers: Vec<DriverSeed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DriverSeed {
    pub id: String,
    #[serde(default)]
    pub position: Option<Coordinate>,
    #[serde(default)]
    pub stops: Vec<Stop>,
}

#[derive(Debug, Default)]
struct FleetState {
    positions: HashMap<String, LiveEntityPosition>,
    stops: HashMap<String, Vec<Stop>>,
}

#[derive(Debug)]
pub struct InMemoryFleet {
    state: RwLock<FleetState>,
    events: broadcast::Sender<RawPositionEvent>,
}

impl Default for InMemoryFleet {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryFleet {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            state: RwLock::new(FleetState::default()),
            events,
        }
    }

    pub fn from_seed(seed: FleetSeed) -> Self {
        let fleet = Self::new();
        {
            let mut state = fleet.state.write();
            for driver in seed.drivers {
                if let Some(coordinate) = driver.position {
                    state.positions.insert(
                        driver.id.clone(),
                        LiveEntityPosition {
                            entity_id: driver.id.clone(),
                            coordinate,
                            motion: Motion::default(),
                            last_updated: Timestamp::now(),
                            online: true,
                        },
                    );
                }
                state.stops.insert(driver.id, driver.stops);
            }
        }
        fleet
    }

    pub fn driver_ids(&self) -> Vec<String> {
        let state = self.state.read();
        let mut ids: Vec<String> = state
            .stops
            .keys()
            .chain(state.positions.keys())
            .cloned()
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn assign_stop(&self, entity_id: &str, stop: Stop) {
        self.state
            .write()
            .stops
            .entry(entity_id.to_string())
            .or_default()
            .push(stop);
    }

    /// Marks a stop as done so it no longer appears among open stops.
    pub fn complete_stop(&self, entity_id: &str, stop_id: &str) -> bool {
        let mut state = self.state.write();
        let Some(stops) = state.stops.get_mut(entity_id) else {
            return false;
        };
        let before = stops.len();
        stops.retain(|stop| stop.id != stop_id);
        stops.len() != before
    }

    pub fn update_position(&self, entity_id: &str, coordinate: Coordinate) {
        self.record_position(entity_id, coordinate, Motion::default());
    }

    /// Records a position, marks the entity online and pushes a feed event.
    pub fn record_position(&self, entity_id: &str, coordinate: Coordinate, motion: Motion) {
        let now = Timestamp::now();
        self.state.write().positions.insert(
            entity_id.to_string(),
            LiveEntityPosition {
                entity_id: entity_id.to_string(),
                coordinate,
                motion,
                last_updated: now,
                online: true,
            },
        );
        self.push(RawPositionEvent {
            entity_id: Some(entity_id.to_string()),
            lat: Some(coordinate.lat()),
            lng: Some(coordinate.lng()),
            heading: motion.heading,
            speed: motion.speed,
            last_updated: Some(now),
            online: Some(true),
        });
    }

    /// Marks the entity offline. Its last position stays readable through
    /// [`PositionSource`], mirroring a location table that keeps the row.
    pub fn set_offline(&self, entity_id: &str) {
        let now = Timestamp::now();
        let last = {
            let mut state = self.state.write();
            state.positions.get_mut(entity_id).map(|position| {
                position.online = false;
                position.last_updated = now;
                position.coordinate
            })
        };
        self.push(RawPositionEvent {
            entity_id: Some(entity_id.to_string()),
            lat: last.map(|c| c.lat()),
            lng: last.map(|c| c.lng()),
            heading: None,
            speed: None,
            last_updated: Some(now),
            online: Some(false),
        });
    }

    /// Removes the stored position entirely.
    pub fn forget_position(&self, entity_id: &str) {
        self.state.write().positions.remove(entity_id);
    }

    /// Number of open feed subscriptions.
    pub fn feed_subscribers(&self) -> usize {
        self.events.receiver_count()
    }

    /// Publishes a raw event as-is, bypassing the stored state.
    pub fn push(&self, event: RawPositionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl StopSource for InMemoryFleet {
    async fn fetch_open_stops(&self, entity_id: &str) -> Result<Vec<Stop>, SourceError> {
        Ok(self
            .state
            .read()
            .stops
            .get(entity_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl PositionSource for InMemoryFleet {
    async fn fetch_current_position(
        &self,
        entity_id: &str,
    ) -> Result<Option<Coordinate>, SourceError> {
        Ok(self
            .state
            .read()
            .positions
            .get(entity_id)
            .map(|position| position.coordinate))
    }
}

#[async_trait]
impl PositionFeed for InMemoryFleet {
    async fn bulk_fetch_online_positions(
        &self,
        entity_ids: &[String],
    ) -> Result<HashMap<String, LiveEntityPosition>, SourceError> {
        let state = self.state.read();
        Ok(entity_ids
            .iter()
            .filter_map(|id| state.positions.get(id))
            .filter(|position| position.online)
            .map(|position| (position.entity_id.clone(), position.clone()))
            .collect())
    }

    async fn subscribe_position_feed(
        &self,
        entity_ids: &[String],
    ) -> Result<BoxStream<'static, RawPositionEvent>, SourceError> {
        let receiver = self.events.subscribe();
        let wanted: Vec<String> = entity_ids.to_vec();

        let events = stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => return Some((event, receiver)),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "position feed subscriber lagged");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        })
        .filter(move |event| {
            // Events without an id pass through so the tracker can reject them.
            let keep = event
                .entity_id
                .as_ref()
                .is_none_or(|id| wanted.contains(id));
            async move { keep }
        });

        Ok(events.boxed())
    }
}

#[async_trait]
impl PositionSink for InMemoryFleet {
    async fn report_position(
        &self,
        entity_id: &str,
        coordinate: Coordinate,
        motion: Motion,
    ) -> Result<(), SourceError> {
        self.record_position(entity_id, coordinate, motion);
        Ok(())
    }

    async fn report_offline(&self, entity_id: &str) -> Result<(), SourceError> {
        self.set_offline(entity_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng).unwrap()
    }

    #[tokio::test]
    async fn test_completed_stops_are_not_open() {
        let fleet = InMemoryFleet::new();
        fleet.assign_stop("d1", Stop::new("s1", coord(1.0, 1.0)));
        fleet.assign_stop("d1", Stop::new("s2", coord(2.0, 2.0)));

        assert!(fleet.complete_stop("d1", "s1"));
        assert!(!fleet.complete_stop("d1", "s1"));

        let open = fleet.fetch_open_stops("d1").await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, "s2");
    }

    #[tokio::test]
    async fn test_bulk_fetch_returns_only_online() {
        let fleet = InMemoryFleet::new();
        fleet.update_position("d1", coord(1.0, 1.0));
        fleet.update_position("d2", coord(2.0, 2.0));
        fleet.set_offline("d2");

        let ids = vec!["d1".to_string(), "d2".to_string(), "d3".to_string()];
        let online = fleet.bulk_fetch_online_positions(&ids).await.unwrap();

        assert_eq!(online.keys().collect::<Vec<_>>(), vec!["d1"]);
        // Offline drivers keep their last known position for the pull path.
        assert!(fleet.fetch_current_position("d2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_feed_filters_by_entity() {
        let fleet = InMemoryFleet::new();
        let mut feed = fleet
            .subscribe_position_feed(&["d1".to_string()])
            .await
            .unwrap();

        fleet.update_position("d2", coord(2.0, 2.0));
        fleet.update_position("d1", coord(1.0, 1.0));

        let event = feed.next().await.unwrap();
        assert_eq!(event.entity_id.as_deref(), Some("d1"));
        assert_eq!(event.online, Some(true));
    }

    #[test]
    fn test_seed_loads_positions_and_stops() {
        let seed: FleetSeed = serde_json::from_str(
            r#"{"drivers":[
                {"id":"d1","position":{"lat":36.1,"lng":-115.1},
                 "stops":[{"id":"s1","coordinate":{"lat":36.2,"lng":-115.2}}]},
                {"id":"d2"}
            ]}"#,
        )
        .unwrap();

        let fleet = InMemoryFleet::from_seed(seed);

        assert_eq!(fleet.driver_ids(), vec!["d1", "d2"]);
    }
}
