//! A position feed that wraps [`InMemoryFleet`] and can fail either half of
//! a subscription, or take an entity offline right after the snapshot read.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use fleet_router::error::SourceError;
use fleet_router::memory::InMemoryFleet;
use fleet_router::model::{LiveEntityPosition, RawPositionEvent};
use fleet_router::traits::PositionFeed;

#[derive(Default)]
pub struct FeedScript {
    pub fail_bulk: bool,
    pub fail_subscribe: bool,
    pub offline_after_snapshot: Option<String>,
}

pub struct ScriptedFeed {
    fleet: Arc<InMemoryFleet>,
    script: FeedScript,
}

impl ScriptedFeed {
    pub fn new(fleet: Arc<InMemoryFleet>, script: FeedScript) -> Self {
        Self { fleet, script }
    }
}

#[async_trait]
impl PositionFeed for ScriptedFeed {
    async fn bulk_fetch_online_positions(
        &self,
        entity_ids: &[String],
    ) -> Result<HashMap<String, LiveEntityPosition>, SourceError> {
        if self.script.fail_bulk {
            return Err(SourceError::Unavailable("location table offline".into()));
        }
        let snapshot = self.fleet.bulk_fetch_online_positions(entity_ids).await?;
        if let Some(entity_id) = &self.script.offline_after_snapshot {
            self.fleet.set_offline(entity_id);
        }
        Ok(snapshot)
    }

    async fn subscribe_position_feed(
        &self,
        entity_ids: &[String],
    ) -> Result<BoxStream<'static, RawPositionEvent>, SourceError> {
        if self.script.fail_subscribe {
            return Err(SourceError::Unavailable("realtime channel refused".into()));
        }
        self.fleet.subscribe_position_feed(entity_ids).await
    }
}
