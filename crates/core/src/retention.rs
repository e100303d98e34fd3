//! Retention policy definitions.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Default raw event retention in days.
pub const DEFAULT_RAW_RETENTION_DAYS: u32 = 30;

/// Default rollup retention in days.
pub const DEFAULT_ROLLUP_RETENTION_DAYS: u32 = 180;

/// Retention horizons for the two stores.
///
/// Passed explicitly into the sweeper at construction so the horizons are
/// injectable in tests; `None` means the default for that store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct RetentionConfig {
    /// Raw event retention override (days)
    pub raw_retention_days: Option<u32>,
    /// Rollup retention override (days)
    pub rollup_retention_days: Option<u32>,
}

impl RetentionConfig {
    /// Returns the effective raw retention in days.
    pub fn effective_raw_retention(&self) -> u32 {
        self.raw_retention_days.unwrap_or(DEFAULT_RAW_RETENTION_DAYS)
    }

    /// Returns the effective rollup retention in days.
    pub fn effective_rollup_retention(&self) -> u32 {
        self.rollup_retention_days
            .unwrap_or(DEFAULT_ROLLUP_RETENTION_DAYS)
    }

    /// Raw events with `timestamp < raw_cutoff(now)` are eligible for deletion.
    pub fn raw_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(i64::from(self.effective_raw_retention()))
    }

    /// Rollup rows with `day < rollup_cutoff(now)` are eligible for deletion.
    pub fn rollup_cutoff(&self, now: DateTime<Utc>) -> NaiveDate {
        now.date_naive() - Duration::days(i64::from(self.effective_rollup_retention()))
    }
}
