//! Selector detail: recent raw samples for one offender.

use chrono::{Duration, Utc};
use rollup_core::limits::{DEFAULT_QUERY_LIMIT, MAX_QUERY_LIMIT};
use rollup_core::{RawEvent, Result, SelectorEventsQuery};
use telemetry::metrics;

use crate::router::QueryRouter;

/// Parameters of a selector detail request.
#[derive(Debug, Clone)]
pub struct SelectorDetailQuery {
    /// Exact `target_selector` to inspect.
    pub selector: String,
    /// Lookback window in days (>= 1).
    pub lookback_days: u32,
    /// Optional substring filter on the page URL.
    pub url_contains: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

impl SelectorDetailQuery {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            lookback_days: 7,
            url_contains: None,
            limit: DEFAULT_QUERY_LIMIT,
            offset: 0,
        }
    }
}

impl QueryRouter {
    /// Raw samples for one selector, most recent first.
    ///
    /// Always served from the event log: rollups discard per-event identity
    /// and can never answer this view. Returned rows match the queried
    /// selector exactly.
    pub async fn selector_events(&self, query: &SelectorDetailQuery) -> Result<Vec<RawEvent>> {
        metrics().selector_queries.inc();
        let start = std::time::Instant::now();

        let lookback_days = query.lookback_days.max(1);
        let store_query = SelectorEventsQuery {
            selector: query.selector.clone(),
            from: Utc::now() - Duration::days(i64::from(lookback_days)),
            url_contains: query.url_contains.clone().filter(|s| !s.is_empty()),
            limit: query.limit.clamp(1, MAX_QUERY_LIMIT),
            offset: query.offset,
        };

        match self.events.selector_events(&store_query).await {
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
}
