//! End-to-end tests for the daily build and the retention sweep.

use std::sync::Arc;

use chrono::{Duration, Utc};
use integration_tests::fixtures;
use integration_tests::mocks::{MemoryEventStore, MemoryRollupStore};
use rollup_core::{EventStore, RetentionConfig, RollupStore};
use rollup_worker::{DailyJob, RetentionSweeper, RollupBuilder};

fn stores() -> (Arc<MemoryEventStore>, Arc<MemoryRollupStore>) {
    (
        Arc::new(MemoryEventStore::new()),
        Arc::new(MemoryRollupStore::new()),
    )
}

#[tokio::test]
async fn test_rollup_build_aggregates_one_day() {
    let (events, rollups) = stores();
    let day = fixtures::yesterday();

    events
        .insert_events(fixtures::selector_batch(1, "/checkout", "#buy-btn", &[100, 150, 900, 120, 110]))
        .await
        .unwrap();

    let builder = RollupBuilder::new(events.clone(), rollups.clone());
    let report = builder.run_for_day(day).await.unwrap();

    assert_eq!(report.rows_written, 1);
    assert_eq!(report.events_aggregated, 5);
    assert!(!report.native);

    let rows = rollups.all();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.day, day);
    assert_eq!(row.page_path, "/checkout");
    assert_eq!(row.target_selector, "#buy-btn");
    assert_eq!(row.p50, 120);
    assert_eq!(row.p75, 150);
    assert_eq!(row.p95, 900);
    assert_eq!(row.count, 5);
    assert_eq!(row.worst, 900);
}

#[tokio::test]
async fn test_rollup_build_is_idempotent() {
    let (events, rollups) = stores();
    let day = fixtures::yesterday();

    events
        .insert_events(fixtures::selector_batch(1, "/a", "#a", &[50, 60, 70]))
        .await
        .unwrap();
    events
        .insert_events(fixtures::selector_batch(1, "/b?utm=x", "#b", &[200, 300]))
        .await
        .unwrap();

    let builder = RollupBuilder::new(events.clone(), rollups.clone());
    builder.run_for_day(day).await.unwrap();
    let first = rollups.all();

    builder.run_for_day(day).await.unwrap();
    let second = rollups.all();

    assert_eq!(first, second);
    assert_eq!(second.len(), 2);
    // Counts replaced, not summed.
    assert_eq!(second.iter().map(|r| r.count).sum::<u64>(), 5);
}

#[tokio::test]
async fn test_query_string_variants_roll_into_one_key() {
    let (events, rollups) = stores();
    let day = fixtures::yesterday();

    events
        .insert_events(vec![
            fixtures::event_days_ago(1, "/page?x=1", "#a", 100),
            fixtures::event_days_ago(1, "/page", "#a", 200),
        ])
        .await
        .unwrap();

    RollupBuilder::new(events.clone(), rollups.clone())
        .run_for_day(day)
        .await
        .unwrap();

    let rows = rollups.all();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].page_path, "/page");
    assert_eq!(rows[0].count, 2);
}

#[tokio::test]
async fn test_rollup_window_excludes_other_days() {
    let (events, rollups) = stores();
    let day = fixtures::yesterday();

    events
        .insert_events(vec![
            fixtures::event_days_ago(1, "/p", "#a", 100),
            fixtures::event_days_ago(2, "/p", "#a", 100),
            fixtures::event_days_ago(0, "/p", "#a", 100),
        ])
        .await
        .unwrap();

    RollupBuilder::new(events.clone(), rollups.clone())
        .run_for_day(day)
        .await
        .unwrap();

    let rows = rollups.all();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].count, 1);
}

#[tokio::test]
async fn test_empty_day_builds_no_rows() {
    let (events, rollups) = stores();

    let report = RollupBuilder::new(events, rollups.clone())
        .run_for_day(fixtures::yesterday())
        .await
        .unwrap();

    assert_eq!(report.rows_written, 0);
    assert!(rollups.is_empty());
}

#[tokio::test]
async fn test_builder_surfaces_store_failure_and_retry_converges() {
    let (events, rollups) = stores();
    let day = fixtures::yesterday();

    events
        .insert_events(fixtures::selector_batch(1, "/p", "#a", &[10, 20, 30]))
        .await
        .unwrap();

    rollups.set_should_fail(true);
    let builder = RollupBuilder::new(events.clone(), rollups.clone());
    assert!(builder.run_for_day(day).await.is_err());
    assert!(rollups.all().is_empty());

    // Retried wholesale after the store recovers.
    rollups.set_should_fail(false);
    builder.run_for_day(day).await.unwrap();
    assert_eq!(rollups.len(), 1);
}

#[tokio::test]
async fn test_prune_enforces_both_horizons() {
    let (events, rollups) = stores();
    let now = Utc::now();

    events
        .insert_events(vec![
            fixtures::event_days_ago(31, "/old", "#a", 100),
            fixtures::event_days_ago(29, "/fresh", "#a", 100),
        ])
        .await
        .unwrap();

    let today = now.date_naive();
    rollups
        .upsert_rollups(vec![
            fixtures::rollup_row(today - Duration::days(181), "/old", "#a", 100, 5),
            fixtures::rollup_row(today - Duration::days(179), "/fresh", "#a", 100, 5),
        ])
        .await
        .unwrap();

    let sweeper = RetentionSweeper::new(events.clone(), rollups.clone(), RetentionConfig::default());
    let report = sweeper.prune(now).await.unwrap();

    assert_eq!(report.raw_deleted, 1);
    assert_eq!(report.rollups_deleted, 1);

    let surviving_events = events.all();
    assert_eq!(surviving_events.len(), 1);
    assert_eq!(surviving_events[0].page_url, "/fresh");

    let surviving_rollups = rollups.all();
    assert_eq!(surviving_rollups.len(), 1);
    assert_eq!(surviving_rollups[0].page_path, "/fresh");
}

#[tokio::test]
async fn test_prune_is_repeat_safe_and_works_on_empty_stores() {
    let (events, rollups) = stores();
    let sweeper = RetentionSweeper::new(events.clone(), rollups.clone(), RetentionConfig::default());

    // Before any rollup has ever run.
    let report = sweeper.prune(Utc::now()).await.unwrap();
    assert_eq!(report.raw_deleted, 0);
    assert_eq!(report.rollups_deleted, 0);

    events
        .insert_events(vec![fixtures::event_days_ago(40, "/old", "#a", 100)])
        .await
        .unwrap();

    assert_eq!(sweeper.prune(Utc::now()).await.unwrap().raw_deleted, 1);
    assert_eq!(sweeper.prune(Utc::now()).await.unwrap().raw_deleted, 0);
}

#[tokio::test]
async fn test_prune_respects_overridden_horizons() {
    let (events, rollups) = stores();

    events
        .insert_events(vec![
            fixtures::event_days_ago(8, "/old", "#a", 100),
            fixtures::event_days_ago(6, "/fresh", "#a", 100),
        ])
        .await
        .unwrap();

    let config = RetentionConfig {
        raw_retention_days: Some(7),
        rollup_retention_days: None,
    };
    let report = RetentionSweeper::new(events.clone(), rollups, config)
        .prune(Utc::now())
        .await
        .unwrap();

    assert_eq!(report.raw_deleted, 1);
    assert_eq!(events.len(), 1);
}

#[tokio::test]
async fn test_daily_job_builds_then_sweeps() {
    let (events, rollups) = stores();
    let now = Utc::now();

    events
        .insert_events(fixtures::selector_batch(1, "/p", "#a", &[100, 200, 300]))
        .await
        .unwrap();
    events
        .insert_events(vec![fixtures::event_days_ago(45, "/ancient", "#a", 100)])
        .await
        .unwrap();

    let job = DailyJob::new(events.clone(), rollups.clone(), RetentionConfig::default());
    let report = job.run(now).await.unwrap();

    assert_eq!(report.rollup.day, fixtures::yesterday());
    assert_eq!(report.rollup.rows_written, 1);
    assert_eq!(report.prune.raw_deleted, 1);

    // Yesterday's data was rolled up before anything aged out.
    assert_eq!(rollups.len(), 1);
    assert_eq!(events.len(), 3);
}
