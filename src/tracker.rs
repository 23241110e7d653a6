//! Live location tracking.
//!
//! [`PositionTable`] holds the entity → position mapping and the per-entity
//! throttle. [`LocationTracker`] seeds it from a bulk snapshot, then drives it
//! from the push feed on a background task and publishes read-only snapshots
//! through a `watch` channel.
//!
//! # Throttling
//!
//! An online update is dropped (not delayed) when fewer than
//! `min_update_interval` have elapsed since that entity's last *applied*
//! update. Offline transitions are always applied immediately. They do not
//! reset the entity's throttle entry.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::RouteError;
use crate::model::{LiveEntityPosition, PositionEvent};
use crate::traits::PositionFeed;

/// Snapshot of every online tracked entity, keyed by entity id.
pub type PositionMap = BTreeMap<String, LiveEntityPosition>;

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Minimum interval between applied online updates for one entity.
    pub min_update_interval: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            min_update_interval: Duration::from_secs(5),
        }
    }
}

/// Result of applying a single event to a [`PositionTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Applied,
    Removed,
    Throttled,
    /// Untracked entity, or offline event for an entity already absent.
    Ignored,
}

impl EventOutcome {
    pub fn changed(self) -> bool {
        matches!(self, EventOutcome::Applied | EventOutcome::Removed)
    }
}

#[derive(Debug)]
pub struct PositionTable {
    tracked: HashSet<String>,
    positions: PositionMap,
    last_applied: HashMap<String, Instant>,
    min_update_interval: Duration,
}

impl PositionTable {
    pub fn new<I>(entity_ids: I, min_update_interval: Duration) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            tracked: entity_ids.into_iter().collect(),
            positions: PositionMap::new(),
            last_applied: HashMap::new(),
            min_update_interval,
        }
    }

    /// Loads the initial snapshot. Offline and untracked entries are skipped.
    pub fn seed<I>(&mut self, snapshot: I, now: Instant)
    where
        I: IntoIterator<Item = LiveEntityPosition>,
    {
        for position in snapshot {
            if !position.online || !self.tracked.contains(&position.entity_id) {
                continue;
            }
            self.last_applied.insert(position.entity_id.clone(), now);
            self.positions.insert(position.entity_id.clone(), position);
        }
    }

    pub fn apply(&mut self, event: PositionEvent, now: Instant) -> EventOutcome {
        if !self.tracked.contains(event.entity_id()) {
            return EventOutcome::Ignored;
        }

        match event {
            PositionEvent::Offline { entity_id } => {
                match self.positions.remove(&entity_id) {
                    Some(_) => EventOutcome::Removed,
                    None => EventOutcome::Ignored,
                }
            }
            PositionEvent::Online(position) => {
                if let Some(last) = self.last_applied.get(&position.entity_id) {
                    if now.saturating_duration_since(*last) < self.min_update_interval {
                        return EventOutcome::Throttled;
                    }
                }
                self.last_applied.insert(position.entity_id.clone(), now);
                self.positions.insert(position.entity_id.clone(), position);
                EventOutcome::Applied
            }
        }
    }

    pub fn positions(&self) -> &PositionMap {
        &self.positions
    }

    /// Number of entities with throttle state.
    pub fn throttled_entities(&self) -> usize {
        self.last_applied.len()
    }
}

/// Starts tracking sessions against an injected position feed.
#[derive(Clone)]
pub struct LocationTracker {
    feed: Arc<dyn PositionFeed>,
    config: TrackerConfig,
}

impl LocationTracker {
    pub fn new(feed: Arc<dyn PositionFeed>) -> Self {
        Self::with_config(feed, TrackerConfig::default())
    }

    pub fn with_config(feed: Arc<dyn PositionFeed>, config: TrackerConfig) -> Self {
        Self { feed, config }
    }

    /// Opens the push feed, seeds the mapping from a bulk fetch, then follows
    /// the feed.
    ///
    /// Events that arrive while the bulk fetch is running are buffered by the
    /// open feed and applied on top of the snapshot. A failed feed
    /// subscription is returned as `FetchFailed`; a failed bulk fetch leaves
    /// the mapping empty until events arrive.
    pub async fn subscribe(&self, entity_ids: Vec<String>) -> Result<TrackerHandle, RouteError> {
        let mut table = PositionTable::new(entity_ids.iter().cloned(), self.config.min_update_interval);

        let mut events = self.feed.subscribe_position_feed(&entity_ids).await?;

        match self.feed.bulk_fetch_online_positions(&entity_ids).await {
            Ok(snapshot) => table.seed(snapshot.into_values(), Instant::now()),
            Err(err) => {
                tracing::warn!(error = %err, "initial position fetch failed, starting empty");
            }
        }

        let (tx, rx) = watch::channel(Arc::new(table.positions().clone()));

        tracing::info!(
            entities = entity_ids.len(),
            online = table.positions().len(),
            "location tracker subscribed"
        );

        let task = tokio::spawn(async move {
            while let Some(raw) = events.next().await {
                let event = match PositionEvent::try_from(raw) {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(error = %err, "dropping position event");
                        continue;
                    }
                };

                let entity_id = event.entity_id().to_string();
                let outcome = table.apply(event, Instant::now());
                if outcome.changed() {
                    tracing::debug!(entity_id = %entity_id, ?outcome, "position mapping changed");
                    tx.send_replace(Arc::new(table.positions().clone()));
                } else if outcome == EventOutcome::Throttled {
                    tracing::trace!(entity_id = %entity_id, "position update throttled");
                }

                if tx.is_closed() {
                    break;
                }
            }
            tracing::debug!("position feed closed");
        });

        Ok(TrackerHandle { positions: rx, task })
    }
}

/// A running tracking session.
///
/// Dropping the handle (or calling [`TrackerHandle::unsubscribe`]) stops the
/// session, releasing the feed subscription and all throttle state.
pub struct TrackerHandle {
    positions: watch::Receiver<Arc<PositionMap>>,
    task: JoinHandle<()>,
}

impl TrackerHandle {
    pub fn snapshot(&self) -> Arc<PositionMap> {
        self.positions.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Arc<PositionMap>> {
        self.positions.clone()
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for TrackerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
