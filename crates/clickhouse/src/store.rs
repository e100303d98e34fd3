//! Store contract implementations for the ClickHouse client.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rollup_core::{
    EventStore, RawEvent, Result, RollupRow, RollupStore, SelectorEventsQuery,
};

use crate::client::ClickHouseClient;
use crate::{insert, query};

#[async_trait]
impl EventStore for ClickHouseClient {
    async fn insert_events(&self, events: Vec<RawEvent>) -> Result<usize> {
        insert::insert_event_rows(self, events).await
    }

    async fn events_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<RawEvent>> {
        query::events_in_range(self, from, to).await
    }

    async fn selector_events(&self, q: &SelectorEventsQuery) -> Result<Vec<RawEvent>> {
        query::selector_events(self, q).await
    }

    async fn delete_events_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        query::delete_events_before(self, cutoff).await
    }

    /// ClickHouse can aggregate a day server-side; the SQL reproduces the
    /// canonical nearest-rank rule exactly.
    async fn aggregate_day(&self, day: NaiveDate) -> Result<Option<Vec<RollupRow>>> {
        query::aggregate_day(self, day).await.map(Some)
    }
}

#[async_trait]
impl RollupStore for ClickHouseClient {
    async fn upsert_rollups(&self, rows: Vec<RollupRow>) -> Result<usize> {
        insert::insert_rollup_rows(self, rows).await
    }

    async fn rollups_in_range(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<RollupRow>> {
        query::rollups_in_range(self, from, to).await
    }

    async fn has_rollups(&self) -> Result<bool> {
        query::has_rollups(self).await
    }

    async fn delete_rollups_before(&self, cutoff: NaiveDate) -> Result<u64> {
        query::delete_rollups_before(self, cutoff).await
    }
}
