//! The once-daily batch job: build yesterday's rollups, then sweep.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rollup_core::{EventStore, Result, RetentionConfig, RollupStore};
use tracing::{error, info};

use crate::retention::{PruneReport, RetentionSweeper};
use crate::rollup::{RollupBuilder, RollupRunReport};

/// Combined outcome of a daily run.
#[derive(Debug, Clone)]
pub struct DailyJobReport {
    pub rollup: RollupRunReport,
    pub prune: PruneReport,
}

/// Builder-then-sweeper sequence for the external scheduler.
///
/// Sweeping after the build guarantees a day's raw data has been rolled up
/// before it can age out. Any failure is fatal to the run and surfaced to
/// the scheduler for retry on its next invocation; nothing is partially
/// committed.
pub struct DailyJob {
    builder: RollupBuilder,
    sweeper: RetentionSweeper,
}

impl DailyJob {
    pub fn new(
        events: Arc<dyn EventStore>,
        rollups: Arc<dyn RollupStore>,
        config: RetentionConfig,
    ) -> Self {
        Self {
            builder: RollupBuilder::new(events.clone(), rollups.clone()),
            sweeper: RetentionSweeper::new(events, rollups, config),
        }
    }

    /// Run for the day before `now` — the scheduler's once-per-24h call.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<DailyJobReport> {
        let yesterday = now.date_naive() - Duration::days(1);
        self.run_for_day(yesterday, now).await
    }

    /// Run the build for a specific day (rebuilds included), then sweep.
    pub async fn run_for_day(&self, day: NaiveDate, now: DateTime<Utc>) -> Result<DailyJobReport> {
        info!(day = %day, "Starting daily batch run");

        let rollup = self.builder.run_for_day(day).await.map_err(|e| {
            error!(day = %day, error = %e, "Rollup build failed");
            e
        })?;

        let prune = self.sweeper.prune(now).await.map_err(|e| {
            error!(error = %e, "Retention sweep failed");
            e
        })?;

        Ok(DailyJobReport { rollup, prune })
    }
}
