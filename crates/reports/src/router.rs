//! Router state and source selection.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use rollup_core::{EventStore, Result, RollupStore};
use tracing::debug;

/// Cache TTL for the rollup availability probe.
const AVAILABILITY_CACHE_TTL: Duration = Duration::from_secs(30);

/// Read-only query surface over the two stores.
///
/// Stateless apart from a short-lived memo of whether any rollups exist;
/// safe to share and call concurrently with ingestion and sweeping.
#[derive(Clone)]
pub struct QueryRouter {
    pub(crate) events: Arc<dyn EventStore>,
    pub(crate) rollups: Arc<dyn RollupStore>,
    availability: Cache<(), bool>,
}

impl QueryRouter {
    pub fn new(events: Arc<dyn EventStore>, rollups: Arc<dyn RollupStore>) -> Self {
        Self {
            events,
            rollups,
            availability: Cache::builder()
                .max_capacity(1)
                .time_to_live(AVAILABILITY_CACHE_TTL)
                .build(),
        }
    }

    /// Whether the rollup store has any data, memoized for a short window.
    /// A rollup-preferring query falls back to raw events when this is
    /// false (e.g. before the first daily build has ever run).
    pub(crate) async fn rollups_available(&self) -> Result<bool> {
        if let Some(available) = self.availability.get(&()).await {
            debug!(available, "Rollup availability cache hit");
            return Ok(available);
        }

        let available = self.rollups.has_rollups().await?;
        self.availability.insert((), available).await;

        Ok(available)
    }
}
