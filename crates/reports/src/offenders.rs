//! Top Offenders: selectors ranked by p75 latency over a lookback window.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use rollup_core::limits::{DEFAULT_QUERY_LIMIT, MAX_QUERY_LIMIT};
use rollup_core::{percentile, RawEvent, Result, RollupRow};
use serde::Serialize;
use telemetry::metrics;
use tracing::debug;

use crate::router::QueryRouter;

/// Parameters of a Top Offenders request.
#[derive(Debug, Clone)]
pub struct TopOffendersQuery {
    /// Lookback window in days (>= 1).
    pub lookback_days: u32,
    /// Minimum sample count for a selector to qualify (>= 1).
    pub min_events: u64,
    /// Optional substring filter on the page URL/path.
    pub url_contains: Option<String>,
    pub limit: u32,
    pub offset: u32,
    /// Serve from rollups when any exist.
    pub prefer_rollups: bool,
}

impl Default for TopOffendersQuery {
    fn default() -> Self {
        Self {
            lookback_days: 7,
            min_events: 5,
            url_contains: None,
            limit: DEFAULT_QUERY_LIMIT,
            offset: 0,
            prefer_rollups: true,
        }
    }
}

impl TopOffendersQuery {
    /// Clamp parameters into their contract ranges.
    pub(crate) fn clamped(&self) -> Self {
        Self {
            lookback_days: self.lookback_days.max(1),
            min_events: self.min_events.max(1),
            url_contains: self.url_contains.clone().filter(|s| !s.is_empty()),
            limit: self.limit.clamp(1, MAX_QUERY_LIMIT),
            offset: self.offset,
            prefer_rollups: self.prefer_rollups,
        }
    }
}

/// One ranked offender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OffenderRow {
    pub selector: String,
    pub p75: u32,
    /// Rounded mean latency. On the rollup path this is the count-weighted
    /// mean of daily p50s — rollups do not retain enough information for an
    /// exact average, so this is a deliberate, lossy approximation.
    pub avg_inp: u32,
    pub worst_inp: u32,
    pub events: u64,
    pub example_url: String,
}

impl QueryRouter {
    /// Ranked selectors, worst p75 first, paginated.
    pub async fn top_offenders(&self, query: &TopOffendersQuery) -> Result<Vec<OffenderRow>> {
        let start = std::time::Instant::now();
        metrics().offender_queries.inc();

        let query = query.clamped();
        let result = self.top_offenders_inner(&query).await;

        match result {
            Ok(rows) => {
                metrics()
                    .query_latency_ms
                    .observe(start.elapsed().as_millis() as u64);
                Ok(rows)
            }
            Err(e) => {
                metrics().query_errors.inc();
                Err(e)
            }
        }
    }

    async fn top_offenders_inner(&self, query: &TopOffendersQuery) -> Result<Vec<OffenderRow>> {
        let url_contains = query.url_contains.as_deref();

        let mut rows = if query.prefer_rollups && self.rollups_available().await? {
            let today = Utc::now().date_naive();
            let from = today - Duration::days(i64::from(query.lookback_days));
            let rollups = self.rollups.rollups_in_range(from, today).await?;
            debug!(days = query.lookback_days, rows = rollups.len(), "Ranking offenders from rollups");
            rank_rollup_offenders(&rollups, url_contains, query.min_events)
        } else {
            let now = Utc::now();
            let from = now - Duration::days(i64::from(query.lookback_days));
            let events = self.events.events_in_range(from, now).await?;
            debug!(days = query.lookback_days, events = events.len(), "Ranking offenders from raw events");
            rank_raw_offenders(&events, url_contains, query.min_events)
        };

        let offset = query.offset as usize;
        if offset >= rows.len() {
            return Ok(Vec::new());
        }
        rows.drain(..offset);
        rows.truncate(query.limit as usize);
        Ok(rows)
    }

    /// Number of qualifying selectors for the same query, ignoring
    /// limit/offset.
    pub async fn top_offenders_count(&self, query: &TopOffendersQuery) -> Result<u64> {
        let query = query.clamped();
        let url_contains = query.url_contains.as_deref();

        let count = if query.prefer_rollups && self.rollups_available().await? {
            let today = Utc::now().date_naive();
            let from = today - Duration::days(i64::from(query.lookback_days));
            let rollups = self.rollups.rollups_in_range(from, today).await?;
            count_rollup_offenders(&rollups, url_contains, query.min_events)
        } else {
            let now = Utc::now();
            let from = now - Duration::days(i64::from(query.lookback_days));
            let events = self.events.events_in_range(from, now).await?;
            count_raw_offenders(&events, url_contains, query.min_events)
        };

        Ok(count)
    }
}

/// Rank offenders from raw events: exact p75, exact mean, exact max.
///
/// Empty selectors never qualify — an aggregate over unattributed samples
/// points at nothing actionable.
pub fn rank_raw_offenders(
    events: &[RawEvent],
    url_contains: Option<&str>,
    min_events: u64,
) -> Vec<OffenderRow> {
    struct Group {
        latencies: Vec<u32>,
        sum: u64,
        worst: u32,
        example_url: String,
    }

    let mut groups: HashMap<&str, Group> = HashMap::new();

    for event in events {
        if event.target_selector.is_empty() {
            continue;
        }
        if let Some(needle) = url_contains {
            if !event.page_url.contains(needle) {
                continue;
            }
        }

        let group = groups
            .entry(event.target_selector.as_str())
            .or_insert_with(|| Group {
                latencies: Vec::new(),
                sum: 0,
                worst: 0,
                example_url: event.page_url.clone(),
            });
        group.latencies.push(event.inp_ms);
        group.sum += u64::from(event.inp_ms);
        group.worst = group.worst.max(event.inp_ms);
        if event.page_url < group.example_url {
            group.example_url = event.page_url.clone();
        }
    }

    let mut rows: Vec<OffenderRow> = groups
        .into_iter()
        .filter(|(_, group)| group.latencies.len() as u64 >= min_events)
        .filter_map(|(selector, group)| {
            let events = group.latencies.len() as u64;
            let p75 = percentile(&group.latencies, 0.75)?;
            Some(OffenderRow {
                selector: selector.to_string(),
                p75,
                avg_inp: (group.sum as f64 / events as f64).round() as u32,
                worst_inp: group.worst,
                events,
                example_url: group.example_url,
            })
        })
        .collect();

    sort_offenders(&mut rows);
    rows
}

/// Rank offenders from rollup rows: p75 as the max daily p75, average as the
/// count-weighted mean of daily p50s (documented approximation).
pub fn rank_rollup_offenders(
    rollups: &[RollupRow],
    url_contains: Option<&str>,
    min_events: u64,
) -> Vec<OffenderRow> {
    struct Group {
        p75: u32,
        weighted_p50: u64,
        worst: u32,
        events: u64,
        example_url: String,
    }

    let mut groups: HashMap<&str, Group> = HashMap::new();

    for row in rollups {
        if row.target_selector.is_empty() {
            continue;
        }
        if let Some(needle) = url_contains {
            if !row.page_path.contains(needle) {
                continue;
            }
        }

        let example = example_url_of(&row.page_path);
        let group = groups
            .entry(row.target_selector.as_str())
            .or_insert_with(|| Group {
                p75: 0,
                weighted_p50: 0,
                worst: 0,
                events: 0,
                example_url: example.clone(),
            });
        group.p75 = group.p75.max(row.p75);
        group.weighted_p50 += u64::from(row.p50) * row.count;
        group.worst = group.worst.max(row.worst);
        group.events += row.count;
        if example < group.example_url {
            group.example_url = example;
        }
    }

    let mut rows: Vec<OffenderRow> = groups
        .into_iter()
        .filter(|(_, group)| group.events >= min_events)
        .map(|(selector, group)| OffenderRow {
            selector: selector.to_string(),
            p75: group.p75,
            avg_inp: (group.weighted_p50 as f64 / group.events as f64).round() as u32,
            worst_inp: group.worst,
            events: group.events,
            example_url: group.example_url,
        })
        .collect();

    sort_offenders(&mut rows);
    rows
}

/// Count qualifying selectors from raw events.
pub fn count_raw_offenders(
    events: &[RawEvent],
    url_contains: Option<&str>,
    min_events: u64,
) -> u64 {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for event in events {
        if event.target_selector.is_empty() {
            continue;
        }
        if let Some(needle) = url_contains {
            if !event.page_url.contains(needle) {
                continue;
            }
        }
        *counts.entry(event.target_selector.as_str()).or_default() += 1;
    }
    counts.values().filter(|&&n| n >= min_events).count() as u64
}

/// Count qualifying selectors from rollup rows.
pub fn count_rollup_offenders(
    rollups: &[RollupRow],
    url_contains: Option<&str>,
    min_events: u64,
) -> u64 {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for row in rollups {
        if row.target_selector.is_empty() {
            continue;
        }
        if let Some(needle) = url_contains {
            if !row.page_path.contains(needle) {
                continue;
            }
        }
        *counts.entry(row.target_selector.as_str()).or_default() += row.count;
    }
    counts.values().filter(|&&n| n >= min_events).count() as u64
}

/// Descending by p75; equal p75 breaks by selector so repeated calls return
/// the same order.
fn sort_offenders(rows: &mut [OffenderRow]) {
    rows.sort_by(|a, b| {
        b.p75
            .cmp(&a.p75)
            .then_with(|| a.selector.cmp(&b.selector))
    });
}

/// Rollup keys store bare page paths; the report view presents them with a
/// leading slash.
fn example_url_of(page_path: &str) -> String {
    format!("/{}", page_path.trim_start_matches('/'))
}
