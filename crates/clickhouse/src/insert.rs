//! Batch insert helpers for ClickHouse.

use crate::client::ClickHouseClient;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use clickhouse::Row;
use rollup_core::{DeviceClass, RawEvent, Result, RollupRow};
use serde::{Deserialize, Serialize};
use telemetry::{metrics, MetricsSnapshot};
use tracing::debug;
use uuid::Uuid;

/// `DateTime` columns travel as epoch seconds (u32), `Date` columns as epoch
/// days (u16) — ClickHouse's own wire representation, timezone-free.
pub(crate) fn secs_of(ts: DateTime<Utc>) -> u32 {
    ts.timestamp().clamp(0, i64::from(u32::MAX)) as u32
}

pub(crate) fn datetime_of(secs: u32) -> DateTime<Utc> {
    // u32 seconds top out in 2106, always representable.
    DateTime::from_timestamp(i64::from(secs), 0).unwrap_or(DateTime::UNIX_EPOCH)
}

pub(crate) fn days_of(day: NaiveDate) -> u16 {
    (day - NaiveDate::default()).num_days().clamp(0, i64::from(u16::MAX)) as u16
}

pub(crate) fn date_of(days: u16) -> NaiveDate {
    NaiveDate::default() + Duration::days(i64::from(days))
}

/// Flattened raw sample row for the `events` table.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct EventRow {
    pub event_id: String,
    pub ts: u32, // DateTime as epoch seconds
    pub page_url: String,
    pub interaction_type: String,
    pub target_selector: String,
    pub inp_ms: u32,
    pub long_task_ms: Option<u32>,
    pub script_url: Option<String>,
    pub device_class: String,
    pub sample_rate: u8,
}

impl From<RawEvent> for EventRow {
    fn from(event: RawEvent) -> Self {
        Self {
            event_id: event.event_id.to_string(),
            ts: secs_of(event.timestamp),
            page_url: event.page_url,
            interaction_type: event.interaction_type,
            target_selector: event.target_selector,
            inp_ms: event.inp_ms,
            long_task_ms: event.long_task_ms,
            script_url: event.script_url,
            device_class: event.device_class.as_str().to_string(),
            sample_rate: event.sample_rate,
        }
    }
}

impl From<EventRow> for RawEvent {
    fn from(row: EventRow) -> Self {
        Self {
            event_id: Uuid::parse_str(&row.event_id).unwrap_or_default(),
            timestamp: datetime_of(row.ts),
            page_url: row.page_url,
            interaction_type: row.interaction_type,
            target_selector: row.target_selector,
            inp_ms: row.inp_ms,
            long_task_ms: row.long_task_ms,
            script_url: row.script_url,
            device_class: DeviceClass::coerce(&row.device_class),
            sample_rate: row.sample_rate,
        }
    }
}

/// Aggregate row for the `rollups` table. `built_at` is the
/// ReplacingMergeTree version column; the latest build of a key wins.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct RollupRecord {
    pub day: u16, // Date as epoch days
    pub page_path: String,
    pub target_selector: String,
    pub device_class: String,
    pub p50: u32,
    pub p75: u32,
    pub p95: u32,
    pub cnt: u64,
    pub worst: u32,
    pub built_at: u32,
}

impl RollupRecord {
    pub(crate) fn from_row(row: RollupRow, built_at: u32) -> Self {
        Self {
            day: days_of(row.day),
            page_path: row.page_path,
            target_selector: row.target_selector,
            device_class: row.device_class.as_str().to_string(),
            p50: row.p50,
            p75: row.p75,
            p95: row.p95,
            cnt: row.count,
            worst: row.worst,
            built_at,
        }
    }

    pub(crate) fn into_row(self) -> RollupRow {
        RollupRow {
            day: date_of(self.day),
            page_path: self.page_path,
            target_selector: self.target_selector,
            device_class: DeviceClass::coerce(&self.device_class),
            p50: self.p50,
            p75: self.p75,
            p95: self.p95,
            count: self.cnt,
            worst: self.worst,
        }
    }
}

/// Insert raw samples into the events table.
pub async fn insert_event_rows(client: &ClickHouseClient, events: Vec<RawEvent>) -> Result<usize> {
    if events.is_empty() {
        return Ok(0);
    }

    let count = events.len();
    let start = std::time::Instant::now();

    let mut insert = client.inner().insert("events").map_err(|e| {
        metrics().insert_errors.inc();
        rollup_core::Error::storage(format!("Insert error: {}", e))
    })?;

    for event in events {
        let row = EventRow::from(event);
        insert.write(&row).await.map_err(|e| {
            metrics().insert_errors.inc();
            rollup_core::Error::storage(format!("Write error: {}", e))
        })?;
    }

    insert.end().await.map_err(|e| {
        metrics().insert_errors.inc();
        rollup_core::Error::storage(format!("End error: {}", e))
    })?;

    let elapsed = start.elapsed();
    metrics().insert_latency_ms.observe(elapsed.as_millis() as u64);
    metrics().events_inserted.inc_by(count as u64);

    debug!(
        count = count,
        latency_ms = %elapsed.as_millis(),
        "Inserted events to ClickHouse"
    );

    Ok(count)
}

/// Insert rollup rows, all stamped with one `built_at` version so a rebuild
/// of a day replaces every key it touches consistently.
pub async fn insert_rollup_rows(client: &ClickHouseClient, rows: Vec<RollupRow>) -> Result<usize> {
    if rows.is_empty() {
        return Ok(0);
    }

    let count = rows.len();
    let built_at = secs_of(Utc::now());

    let mut insert = client
        .inner()
        .insert("rollups")
        .map_err(|e| rollup_core::Error::storage(format!("Insert error: {}", e)))?;

    for row in rows {
        let record = RollupRecord::from_row(row, built_at);
        insert
            .write(&record)
            .await
            .map_err(|e| rollup_core::Error::storage(format!("Write error: {}", e)))?;
    }

    insert
        .end()
        .await
        .map_err(|e| rollup_core::Error::storage(format!("End error: {}", e)))?;

    debug!(count = count, "Upserted rollup rows");

    Ok(count)
}

/// Metrics snapshot row for the internal metrics table.
#[derive(Debug, Clone, Row, Serialize)]
struct MetricsRow {
    timestamp: u32,
    events_inserted: u64,
    insert_errors: u64,
    rollup_runs: u64,
    rollup_run_errors: u64,
    rollup_rows_written: u64,
    rollup_events_scanned: u64,
    rollup_native_runs: u64,
    prune_runs: u64,
    prune_errors: u64,
    raw_events_pruned: u64,
    rollups_pruned: u64,
    offender_queries: u64,
    selector_queries: u64,
    query_errors: u64,
    insert_latency_mean_ms: f64,
    rollup_build_latency_mean_ms: f64,
    query_latency_mean_ms: f64,
}

/// Flush a metrics snapshot to the internal metrics table.
pub async fn insert_metrics(client: &ClickHouseClient, snapshot: MetricsSnapshot) -> Result<()> {
    let row = MetricsRow {
        timestamp: secs_of(snapshot.timestamp),
        events_inserted: snapshot.events_inserted,
        insert_errors: snapshot.insert_errors,
        rollup_runs: snapshot.rollup_runs,
        rollup_run_errors: snapshot.rollup_run_errors,
        rollup_rows_written: snapshot.rollup_rows_written,
        rollup_events_scanned: snapshot.rollup_events_scanned,
        rollup_native_runs: snapshot.rollup_native_runs,
        prune_runs: snapshot.prune_runs,
        prune_errors: snapshot.prune_errors,
        raw_events_pruned: snapshot.raw_events_pruned,
        rollups_pruned: snapshot.rollups_pruned,
        offender_queries: snapshot.offender_queries,
        selector_queries: snapshot.selector_queries,
        query_errors: snapshot.query_errors,
        insert_latency_mean_ms: snapshot.insert_latency_mean_ms,
        rollup_build_latency_mean_ms: snapshot.rollup_build_latency_mean_ms,
        query_latency_mean_ms: snapshot.query_latency_mean_ms,
    };

    let mut insert = client
        .inner()
        .insert("internal_metrics")
        .map_err(|e| rollup_core::Error::storage(format!("Insert error: {}", e)))?;

    insert
        .write(&row)
        .await
        .map_err(|e| rollup_core::Error::storage(format!("Write error: {}", e)))?;

    insert
        .end()
        .await
        .map_err(|e| rollup_core::Error::storage(format!("End error: {}", e)))?;

    Ok(())
}
