//! Daily rollup row definitions and key normalization.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::event::{truncate_chars, DeviceClass, RawEvent};
use crate::limits::MAX_PAGE_PATH_LEN;
use crate::percentile::DailyAggregate;

/// Normalize a client-reported URL into the `page_path` bucket of a rollup
/// key: strip any query string and truncate to 255 characters. This collapse
/// is what folds many raw URLs into one aggregate row.
pub fn page_path_of(page_url: &str) -> String {
    let stripped = page_url.split('?').next().unwrap_or(page_url);
    truncate_chars(stripped, MAX_PAGE_PATH_LEN)
}

/// Composite key of one daily aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RollupKey {
    pub day: NaiveDate,
    pub page_path: String,
    pub target_selector: String,
    pub device_class: DeviceClass,
}

impl RollupKey {
    /// Bucket a raw event under `day`.
    pub fn for_event(day: NaiveDate, event: &RawEvent) -> Self {
        Self {
            day,
            page_path: page_path_of(&event.page_url),
            target_selector: event.target_selector.clone(),
            device_class: event.device_class,
        }
    }
}

/// One daily aggregate: the percentile summary of every raw sample that
/// shared a `(day, page_path, target_selector, device_class)` bucket.
///
/// Invariant: `p50 <= p75 <= p95 <= worst` (percentiles of one sorted
/// sequence are monotonic and `worst` is its max) and `count >= 1`.
/// Rebuilt-in-place by the rollup job; re-running a day replaces the row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupRow {
    pub day: NaiveDate,
    pub page_path: String,
    pub target_selector: String,
    pub device_class: DeviceClass,
    pub p50: u32,
    pub p75: u32,
    pub p95: u32,
    pub count: u64,
    pub worst: u32,
}

impl RollupRow {
    pub fn new(key: RollupKey, agg: DailyAggregate) -> Self {
        Self {
            day: key.day,
            page_path: key.page_path,
            target_selector: key.target_selector,
            device_class: key.device_class,
            p50: agg.p50,
            p75: agg.p75,
            p95: agg.p95,
            count: agg.count,
            worst: agg.worst,
        }
    }

    pub fn key(&self) -> RollupKey {
        RollupKey {
            day: self.day,
            page_path: self.page_path.clone(),
            target_selector: self.target_selector.clone(),
            device_class: self.device_class,
        }
    }
}
