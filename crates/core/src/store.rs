//! Store contracts for the two owned tables.
//!
//! The engine is storage-agnostic: the batch job and the query router only
//! see these traits. The ClickHouse crate provides the production
//! implementation; tests run against in-memory implementations.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::Result;
use crate::event::RawEvent;
use crate::rollup::RollupRow;

/// Raw-event lookup for a selector detail view.
#[derive(Debug, Clone)]
pub struct SelectorEventsQuery {
    /// Exact `target_selector` match.
    pub selector: String,
    /// Only events with `timestamp >= from`.
    pub from: DateTime<Utc>,
    /// Optional substring filter on `page_url`.
    pub url_contains: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

/// Append-only raw sample log with time-range and selector lookup.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append validated samples. The out-of-scope intake endpoint is the
    /// producer; inserts never mutate existing rows.
    async fn insert_events(&self, events: Vec<RawEvent>) -> Result<usize>;

    /// All events with `from <= timestamp < to`, in no particular order.
    async fn events_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<RawEvent>>;

    /// Matching events ordered by timestamp descending (most recent first).
    async fn selector_events(&self, query: &SelectorEventsQuery) -> Result<Vec<RawEvent>>;

    /// Delete events with `timestamp < cutoff`; returns the deleted count.
    /// A no-op on an already-pruned store.
    async fn delete_events_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// Store-native day aggregation, when the engine has an ordered
    /// percentile primitive. Must reproduce the canonical nearest-rank rule
    /// of [`crate::percentile`] exactly. `Ok(None)` means unsupported; the
    /// rollup builder then aggregates in memory instead.
    async fn aggregate_day(&self, _day: NaiveDate) -> Result<Option<Vec<RollupRow>>> {
        Ok(None)
    }
}

/// Keyed daily aggregate table with replace-by-key upsert.
#[async_trait]
pub trait RollupStore: Send + Sync {
    /// Insert or replace rows by their composite key. Re-writing a key
    /// replaces the prior values; counts are never summed across writes.
    async fn upsert_rollups(&self, rows: Vec<RollupRow>) -> Result<usize>;

    /// All rows with `from <= day < to`.
    async fn rollups_in_range(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<RollupRow>>;

    /// Whether any rollup row exists at all. The query router uses this to
    /// decide if a rollup-preferring query can be served from aggregates.
    async fn has_rollups(&self) -> Result<bool>;

    /// Delete rows with `day < cutoff`; returns the deleted count.
    async fn delete_rollups_before(&self, cutoff: NaiveDate) -> Result<u64>;
}
