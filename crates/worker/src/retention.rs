//! Retention sweeper: age-predicate deletes against both stores.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rollup_core::{EventStore, Result, RetentionConfig, RollupStore};
use telemetry::metrics;
use tracing::info;

/// Outcome of one sweep.
#[derive(Debug, Clone)]
pub struct PruneReport {
    pub raw_cutoff: DateTime<Utc>,
    pub rollup_cutoff: NaiveDate,
    pub raw_deleted: u64,
    pub rollups_deleted: u64,
}

/// Enforces the two retention horizons: a short one for raw events and a
/// long one for rollup rows.
///
/// Safe to call repeatedly (an already-pruned store deletes nothing) and
/// safe before any rollup has ever run. Meant to run right after the rollup
/// builder finishes a day, so raw data is never purged before it has been
/// rolled up.
pub struct RetentionSweeper {
    events: Arc<dyn EventStore>,
    rollups: Arc<dyn RollupStore>,
    config: RetentionConfig,
}

impl RetentionSweeper {
    pub fn new(
        events: Arc<dyn EventStore>,
        rollups: Arc<dyn RollupStore>,
        config: RetentionConfig,
    ) -> Self {
        Self {
            events,
            rollups,
            config,
        }
    }

    /// Delete raw events older than the raw horizon and rollup rows older
    /// than the rollup horizon, both measured from `now`.
    pub async fn prune(&self, now: DateTime<Utc>) -> Result<PruneReport> {
        let raw_cutoff = self.config.raw_cutoff(now);
        let rollup_cutoff = self.config.rollup_cutoff(now);

        let report = async {
            let raw_deleted = self.events.delete_events_before(raw_cutoff).await?;
            let rollups_deleted = self.rollups.delete_rollups_before(rollup_cutoff).await?;
            Ok(PruneReport {
                raw_cutoff,
                rollup_cutoff,
                raw_deleted,
                rollups_deleted,
            })
        }
        .await;

        match report {
            Ok(report) => {
                metrics().prune_runs.inc();
                metrics().raw_events_pruned.inc_by(report.raw_deleted);
                metrics().rollups_pruned.inc_by(report.rollups_deleted);

                info!(
                    raw_cutoff = %report.raw_cutoff,
                    rollup_cutoff = %report.rollup_cutoff,
                    raw_deleted = report.raw_deleted,
                    rollups_deleted = report.rollups_deleted,
                    "Retention sweep complete"
                );
                Ok(report)
            }
            Err(e) => {
                metrics().prune_errors.inc();
                Err(e)
            }
        }
    }
}
