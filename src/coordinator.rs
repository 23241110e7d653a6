//! Keeps per-entity routes in step with live positions.
//!
//! The coordinator watches a tracker snapshot channel. Whenever the snapshot
//! content changes it recomputes routes for the entities whose position
//! changed (or that just came online), drops routes for entities that went
//! away, and publishes both a full [`RouteSet`] snapshot and a stream of
//! [`RouteDiff`]s for render-handle reconciliation.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::RouteError;
use crate::model::Route;
use crate::service::RouteService;
use crate::tracker::PositionMap;

const DIFF_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// How often failed computations are retried.
    pub refresh_interval: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(30),
        }
    }
}

/// A route as shown to consumers. `stale` is set when the latest attempt to
/// recompute it failed and this is the last good result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedRoute {
    pub route: Route,
    pub stale: bool,
}

pub type RouteSet = BTreeMap<String, PublishedRoute>;

/// Change to the published route set.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteDiff {
    Upserted {
        entity_id: String,
        route: PublishedRoute,
    },
    MarkedStale {
        entity_id: String,
    },
    /// No route could be computed and none was published before.
    Unavailable {
        entity_id: String,
        reason: String,
    },
    /// The consumer should release anything it holds for this entity.
    Removed {
        entity_id: String,
    },
}

impl RouteDiff {
    pub fn entity_id(&self) -> &str {
        match self {
            RouteDiff::Upserted { entity_id, .. }
            | RouteDiff::MarkedStale { entity_id }
            | RouteDiff::Unavailable { entity_id, .. }
            | RouteDiff::Removed { entity_id } => entity_id,
        }
    }
}

/// Identifies one requested computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub entity_id: String,
    pub generation: u64,
}

#[derive(Debug, Default)]
pub struct Observation {
    pub compute: Vec<Ticket>,
    pub diffs: Vec<RouteDiff>,
}

/// Decides which entities need a computation and which results may land.
///
/// Every requested computation gets a fresh generation number. A result is
/// applied only if it carries the latest generation for an entity that is
/// still tracked, so late or superseded results never overwrite newer state
/// or resurrect a removed entry.
#[derive(Debug, Default)]
pub struct RouteReconciler {
    last_content: Option<Vec<u8>>,
    last_seen: PositionMap,
    generations: HashMap<String, u64>,
    next_generation: u64,
    retry: BTreeSet<String>,
    routes: RouteSet,
}

impl RouteReconciler {
    pub fn observe(&mut self, positions: &PositionMap) -> Observation {
        let content = match serde_json::to_vec(positions) {
            Ok(content) => Some(content),
            Err(err) => {
                tracing::warn!(error = %err, "could not serialize position snapshot");
                None
            }
        };
        if content.is_some() && content == self.last_content {
            return Observation::default();
        }
        self.last_content = content;

        let mut observation = Observation::default();

        let gone: Vec<String> = self
            .last_seen
            .keys()
            .filter(|id| !positions.contains_key(*id))
            .cloned()
            .collect();
        for entity_id in gone {
            self.generations.remove(&entity_id);
            self.retry.remove(&entity_id);
            if self.routes.remove(&entity_id).is_some() {
                observation.diffs.push(RouteDiff::Removed { entity_id });
            }
        }

        for (entity_id, position) in positions {
            if self.last_seen.get(entity_id) != Some(position) {
                observation.compute.push(self.issue(entity_id));
            }
        }

        self.last_seen = positions.clone();
        observation
    }

    /// Tickets for tracked entities whose last computation failed.
    pub fn retry_due(&mut self) -> Vec<Ticket> {
        let due: Vec<String> = std::mem::take(&mut self.retry)
            .into_iter()
            .filter(|entity_id| self.last_seen.contains_key(entity_id))
            .collect();
        due.iter().map(|entity_id| self.issue(entity_id)).collect()
    }

    pub fn complete(&mut self, ticket: Ticket, result: Result<Route, RouteError>) -> Option<RouteDiff> {
        if self.generations.get(&ticket.entity_id) != Some(&ticket.generation) {
            tracing::debug!(
                entity_id = %ticket.entity_id,
                generation = ticket.generation,
                "discarding superseded route computation"
            );
            return None;
        }
        let entity_id = ticket.entity_id;

        let err = match result {
            Ok(route) => {
                let published = PublishedRoute { route, stale: false };
                self.routes.insert(entity_id.clone(), published.clone());
                return Some(RouteDiff::Upserted {
                    entity_id,
                    route: published,
                });
            }
            Err(err) => err,
        };

        tracing::warn!(entity_id = %entity_id, error = %err, "route unavailable");
        if err.is_retryable() {
            self.retry.insert(entity_id.clone());
        }

        if matches!(err, RouteError::NoPosition(_)) {
            if self.routes.remove(&entity_id).is_some() {
                return Some(RouteDiff::Removed { entity_id });
            }
        } else if let Some(existing) = self.routes.get_mut(&entity_id) {
            existing.stale = true;
            return Some(RouteDiff::MarkedStale { entity_id });
        }

        Some(RouteDiff::Unavailable {
            entity_id,
            reason: err.to_string(),
        })
    }

    pub fn routes(&self) -> &RouteSet {
        &self.routes
    }

    fn issue(&mut self, entity_id: &str) -> Ticket {
        self.next_generation += 1;
        self.generations
            .insert(entity_id.to_string(), self.next_generation);
        self.retry.remove(entity_id);
        Ticket {
            entity_id: entity_id.to_string(),
            generation: self.next_generation,
        }
    }
}

/// Runs a [`RouteReconciler`] against a tracker's snapshot channel.
#[derive(Clone)]
pub struct RouteCoordinator {
    service: Arc<RouteService>,
    config: CoordinatorConfig,
}

impl RouteCoordinator {
    pub fn new(service: Arc<RouteService>) -> Self {
        Self::with_config(service, CoordinatorConfig::default())
    }

    pub fn with_config(service: Arc<RouteService>, config: CoordinatorConfig) -> Self {
        Self { service, config }
    }

    /// Spawns the coordination loop.
    ///
    /// The loop ends when the position channel closes or the handle is dropped.
    pub fn spawn(&self, positions: watch::Receiver<Arc<PositionMap>>) -> CoordinatorHandle {
        let (routes_tx, routes_rx) = watch::channel(Arc::new(RouteSet::new()));
        let (diff_tx, _) = broadcast::channel(DIFF_CHANNEL_CAPACITY);

        let session = Session {
            service: self.service.clone(),
            reconciler: RouteReconciler::default(),
            in_flight: JoinSet::new(),
            routes_tx,
            diff_tx: diff_tx.clone(),
        };
        let task = tokio::spawn(session.run(positions, self.config.refresh_interval));

        CoordinatorHandle {
            routes: routes_rx,
            diffs: diff_tx,
            task,
        }
    }
}

struct Session {
    service: Arc<RouteService>,
    reconciler: RouteReconciler,
    in_flight: JoinSet<(Ticket, Result<Route, RouteError>)>,
    routes_tx: watch::Sender<Arc<RouteSet>>,
    diff_tx: broadcast::Sender<RouteDiff>,
}

impl Session {
    async fn run(mut self, mut positions: watch::Receiver<Arc<PositionMap>>, refresh: Duration) {
        let mut ticker = tokio::time::interval_at(Instant::now() + refresh, refresh);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let initial = positions.borrow_and_update().clone();
        self.observe(&initial);

        loop {
            tokio::select! {
                changed = positions.changed() => {
                    if changed.is_err() {
                        tracing::debug!("position channel closed, stopping coordinator");
                        break;
                    }
                    let snapshot = positions.borrow_and_update().clone();
                    self.observe(&snapshot);
                }
                _ = ticker.tick() => {
                    let tickets = self.reconciler.retry_due();
                    if !tickets.is_empty() {
                        tracing::info!(entities = tickets.len(), "retrying failed routes");
                    }
                    self.launch(tickets);
                }
                Some(joined) = self.in_flight.join_next() => match joined {
                    Ok((ticket, result)) => {
                        if let Some(diff) = self.reconciler.complete(ticket, result) {
                            self.publish(vec![diff]);
                        }
                    }
                    Err(err) => tracing::error!(error = %err, "route computation task failed"),
                },
            }
        }
    }

    fn observe(&mut self, snapshot: &PositionMap) {
        let observation = self.reconciler.observe(snapshot);
        self.publish(observation.diffs);
        self.launch(observation.compute);
    }

    fn launch(&mut self, tickets: Vec<Ticket>) {
        for ticket in tickets {
            let service = self.service.clone();
            self.in_flight.spawn(async move {
                let result = service.compute_route(&ticket.entity_id).await;
                (ticket, result)
            });
        }
    }

    fn publish(&self, diffs: Vec<RouteDiff>) {
        if diffs.is_empty() {
            return;
        }
        self.routes_tx
            .send_replace(Arc::new(self.reconciler.routes().clone()));
        for diff in diffs {
            // No subscribers is fine; the snapshot channel still has the state.
            let _ = self.diff_tx.send(diff);
        }
    }
}

/// A running coordinator. Dropping it stops the loop and aborts in-flight
/// computations.
pub struct CoordinatorHandle {
    routes: watch::Receiver<Arc<RouteSet>>,
    diffs: broadcast::Sender<RouteDiff>,
    task: JoinHandle<()>,
}

impl CoordinatorHandle {
    pub fn snapshot(&self) -> Arc<RouteSet> {
        self.routes.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Arc<RouteSet>> {
        self.routes.clone()
    }

    pub fn subscribe_diffs(&self) -> broadcast::Receiver<RouteDiff> {
        self.diffs.subscribe()
    }

    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for CoordinatorHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
