//! A stop source that wraps [`InMemoryFleet`] and can be told to fail or
//! stall per entity, while counting calls.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use fleet_router::error::SourceError;
use fleet_router::memory::InMemoryFleet;
use fleet_router::model::Stop;
use fleet_router::traits::StopSource;

pub struct ScriptedStops {
    fleet: Arc<InMemoryFleet>,
    calls: Mutex<HashMap<String, usize>>,
    completed: Mutex<HashMap<String, usize>>,
    failing: Mutex<HashSet<String>>,
    held: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl ScriptedStops {
    pub fn new(fleet: Arc<InMemoryFleet>) -> Self {
        Self {
            fleet,
            calls: Mutex::default(),
            completed: Mutex::default(),
            failing: Mutex::default(),
            held: Mutex::default(),
        }
    }

    pub fn calls(&self, entity_id: &str) -> usize {
        self.calls.lock().unwrap().get(entity_id).copied().unwrap_or(0)
    }

    pub fn completed(&self, entity_id: &str) -> usize {
        self.completed.lock().unwrap().get(entity_id).copied().unwrap_or(0)
    }

    pub fn fail(&self, entity_id: &str, failing: bool) {
        let mut set = self.failing.lock().unwrap();
        if failing {
            set.insert(entity_id.to_string());
        } else {
            set.remove(entity_id);
        }
    }

    /// Stalls fetches for `entity_id` until the returned gate gets a permit.
    pub fn hold(&self, entity_id: &str) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.held
            .lock()
            .unwrap()
            .insert(entity_id.to_string(), gate.clone());
        gate
    }
}

#[async_trait]
impl StopSource for ScriptedStops {
    async fn fetch_open_stops(&self, entity_id: &str) -> Result<Vec<Stop>, SourceError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(entity_id.to_string())
            .or_default() += 1;

        let gate = self.held.lock().unwrap().get(entity_id).cloned();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await.unwrap();
        }

        let failing = self.failing.lock().unwrap().contains(entity_id);
        let result = if failing {
            Err(SourceError::Unavailable("stop store offline".into()))
        } else {
            self.fleet.fetch_open_stops(entity_id).await
        };

        *self
            .completed
            .lock()
            .unwrap()
            .entry(entity_id.to_string())
            .or_default() += 1;
        result
    }
}
