//! Rollup builder: one calendar day of raw samples in, daily aggregates out.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rollup_core::{
    DailyAggregate, DeviceClass, EventStore, RawEvent, Result, RollupRow, RollupStore,
};
use telemetry::metrics;
use tracing::{debug, info};

/// Outcome of one day's build.
#[derive(Debug, Clone)]
pub struct RollupRunReport {
    pub day: NaiveDate,
    pub rows_written: usize,
    pub events_aggregated: u64,
    /// Whether the store's native aggregation served the run.
    pub native: bool,
}

/// Stateless transformer from the event log to the rollup table.
///
/// Fully idempotent per day: re-running a build replaces the day's rows by
/// key, never duplicating or summing them, so a failed run is retried
/// wholesale. Effectively single-writer — the scheduler invokes it once per
/// day and the upsert tolerates the overlap if it ever doesn't.
pub struct RollupBuilder {
    events: Arc<dyn EventStore>,
    rollups: Arc<dyn RollupStore>,
}

impl RollupBuilder {
    pub fn new(events: Arc<dyn EventStore>, rollups: Arc<dyn RollupStore>) -> Self {
        Self { events, rollups }
    }

    /// Build and upsert every rollup row for `day` (UTC).
    ///
    /// Prefers the store's native aggregation; stores without an ordered
    /// percentile primitive fall back to an in-memory pass that produces
    /// identical rows. Any storage failure aborts the run before rows for
    /// unaggregated partitions could be written.
    pub async fn run_for_day(&self, day: NaiveDate) -> Result<RollupRunReport> {
        let start = std::time::Instant::now();

        let report = match self.build(day).await {
            Ok(report) => report,
            Err(e) => {
                metrics().rollup_run_errors.inc();
                return Err(e);
            }
        };

        metrics().rollup_runs.inc();
        metrics().rollup_rows_written.inc_by(report.rows_written as u64);
        metrics().rollup_events_scanned.inc_by(report.events_aggregated);
        if report.native {
            metrics().rollup_native_runs.inc();
        }
        metrics()
            .rollup_build_latency_ms
            .observe(start.elapsed().as_millis() as u64);

        info!(
            day = %report.day,
            rows = report.rows_written,
            events = report.events_aggregated,
            native = report.native,
            "Rollup build complete"
        );

        Ok(report)
    }

    async fn build(&self, day: NaiveDate) -> Result<RollupRunReport> {
        let (rows, native) = match self.events.aggregate_day(day).await? {
            Some(rows) => (rows, true),
            None => {
                let (from, to) = day_bounds(day);
                let raw = self.events.events_in_range(from, to).await?;
                debug!(day = %day, events = raw.len(), "Aggregating day in memory");
                (build_rollup_rows(day, &raw), false)
            }
        };

        let events_aggregated = rows.iter().map(|r| r.count).sum();

        if rows.is_empty() {
            // A day with zero raw events builds nothing; not an error.
            debug!(day = %day, "No events to roll up");
            return Ok(RollupRunReport {
                day,
                rows_written: 0,
                events_aggregated: 0,
                native,
            });
        }

        let rows_written = self.rollups.upsert_rollups(rows).await?;

        Ok(RollupRunReport {
            day,
            rows_written,
            events_aggregated,
            native,
        })
    }
}

/// UTC bounds of a calendar day: `[day 00:00:00, day+1 00:00:00)`.
pub fn day_bounds(day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = day.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
    (start, start + Duration::days(1))
}

/// Partition one day's events by `(page_path, target_selector, device_class)`
/// and aggregate each partition with the percentile engine. Pure; the store
/// round trips stay in the builder.
///
/// Output is sorted by key so repeated builds of identical input yield an
/// identical row sequence.
pub fn build_rollup_rows(day: NaiveDate, events: &[RawEvent]) -> Vec<RollupRow> {
    let mut partitions: HashMap<(String, String, DeviceClass), Vec<u32>> = HashMap::new();

    for event in events {
        partitions
            .entry((
                rollup_core::page_path_of(&event.page_url),
                event.target_selector.clone(),
                event.device_class,
            ))
            .or_default()
            .push(event.inp_ms);
    }

    let mut rows: Vec<RollupRow> = partitions
        .into_iter()
        .filter_map(|((page_path, target_selector, device_class), values)| {
            DailyAggregate::from_latencies(values).map(|agg| RollupRow {
                day,
                page_path,
                target_selector,
                device_class,
                p50: agg.p50,
                p75: agg.p75,
                p95: agg.p95,
                count: agg.count,
                worst: agg.worst,
            })
        })
        .collect();

    rows.sort_by(|a, b| a.key().cmp(&b.key()));
    rows
}
