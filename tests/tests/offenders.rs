//! End-to-end tests for the Top Offenders query routing.

use std::sync::Arc;

use integration_tests::fixtures;
use integration_tests::mocks::{MemoryEventStore, MemoryRollupStore};
use reports::{QueryRouter, TopOffendersQuery};
use rollup_core::{EventStore, RetentionConfig, RollupStore};
use rollup_worker::DailyJob;

fn setup() -> (Arc<MemoryEventStore>, Arc<MemoryRollupStore>, QueryRouter) {
    let events = Arc::new(MemoryEventStore::new());
    let rollups = Arc::new(MemoryRollupStore::new());
    let router = QueryRouter::new(events.clone(), rollups.clone());
    (events, rollups, router)
}

fn raw_query() -> TopOffendersQuery {
    TopOffendersQuery {
        prefer_rollups: false,
        min_events: 5,
        ..TopOffendersQuery::default()
    }
}

#[tokio::test]
async fn test_buy_btn_reference_scenario() {
    let (events, _, router) = setup();

    events
        .insert_events(fixtures::selector_batch(1, "/checkout", "#buy-btn", &[100, 150, 900, 120, 110]))
        .await
        .unwrap();

    let rows = router.top_offenders(&raw_query()).await.unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.selector, "#buy-btn");
    assert_eq!(row.p75, 150);
    assert_eq!(row.worst_inp, 900);
    assert_eq!(row.events, 5);
}

#[tokio::test]
async fn test_min_events_filters_groups() {
    let (events, _, router) = setup();

    events
        .insert_events(fixtures::selector_batch(1, "/a", "#popular", &[100; 6]))
        .await
        .unwrap();
    events
        .insert_events(fixtures::selector_batch(1, "/b", "#rare", &[9000; 4]))
        .await
        .unwrap();

    let rows = router.top_offenders(&raw_query()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].selector, "#popular");

    assert_eq!(router.top_offenders_count(&raw_query()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_empty_window_returns_no_rows_and_zero_count() {
    let (_, _, router) = setup();

    let rows = router.top_offenders(&raw_query()).await.unwrap();
    assert!(rows.is_empty());
    assert_eq!(router.top_offenders_count(&raw_query()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_prefer_rollups_falls_back_to_raw_when_store_is_empty() {
    let (events, _, router) = setup();

    events
        .insert_events(fixtures::selector_batch(1, "/p", "#a", &[100, 200, 300, 400, 500]))
        .await
        .unwrap();

    let query = TopOffendersQuery {
        prefer_rollups: true,
        min_events: 5,
        ..TopOffendersQuery::default()
    };
    let rows = router.top_offenders(&query).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].selector, "#a");
}

#[tokio::test]
async fn test_prefer_rollups_serves_from_aggregates() {
    let (_, rollups, router) = setup();

    // Only rollups exist; the raw log has nothing.
    rollups
        .upsert_rollups(vec![fixtures::rollup_row(fixtures::yesterday(), "/landing", "#cta", 400, 25)])
        .await
        .unwrap();

    let query = TopOffendersQuery {
        prefer_rollups: true,
        min_events: 5,
        ..TopOffendersQuery::default()
    };
    let rows = router.top_offenders(&query).await.unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.selector, "#cta");
    assert_eq!(row.p75, 400);
    assert_eq!(row.events, 25);
    assert_eq!(row.example_url, "/landing");
}

#[tokio::test]
async fn test_rollup_and_raw_paths_rank_identically() {
    let (events, rollups, _) = setup();

    // Three selectors with clearly separated latency bands, all yesterday.
    events
        .insert_events(fixtures::selector_batch(1, "/p", "#worst", &[400, 410, 420, 430, 440]))
        .await
        .unwrap();
    events
        .insert_events(fixtures::selector_batch(1, "/p", "#middle", &[250, 260, 270, 280, 290]))
        .await
        .unwrap();
    events
        .insert_events(fixtures::selector_batch(1, "/p", "#best", &[90, 91, 92, 93, 94]))
        .await
        .unwrap();

    // Build rollups from the same underlying events.
    DailyJob::new(events.clone(), rollups.clone(), RetentionConfig::default())
        .run(chrono::Utc::now())
        .await
        .unwrap();

    let router = QueryRouter::new(events.clone(), rollups.clone());

    let from_raw = router
        .top_offenders(&TopOffendersQuery {
            prefer_rollups: false,
            min_events: 5,
            ..TopOffendersQuery::default()
        })
        .await
        .unwrap();
    let from_rollups = router
        .top_offenders(&TopOffendersQuery {
            prefer_rollups: true,
            min_events: 5,
            ..TopOffendersQuery::default()
        })
        .await
        .unwrap();

    let raw_order: Vec<_> = from_raw.iter().map(|r| (&r.selector, r.p75)).collect();
    let rollup_order: Vec<_> = from_rollups.iter().map(|r| (&r.selector, r.p75)).collect();

    // Same selectors, same p75 values, same descending order. Averages may
    // differ per the weighted-mean approximation on the rollup path.
    assert_eq!(raw_order, rollup_order);
    assert_eq!(from_raw[0].selector, "#worst");
    assert_eq!(from_raw[2].selector, "#best");
}

#[tokio::test]
async fn test_url_contains_filters_offenders() {
    let (events, _, router) = setup();

    events
        .insert_events(fixtures::selector_batch(1, "/shop/cart", "#in-shop", &[100; 5]))
        .await
        .unwrap();
    events
        .insert_events(fixtures::selector_batch(1, "/blog/post", "#in-blog", &[100; 5]))
        .await
        .unwrap();

    let query = TopOffendersQuery {
        url_contains: Some("shop".to_string()),
        ..raw_query()
    };
    let rows = router.top_offenders(&query).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].selector, "#in-shop");
    assert_eq!(router.top_offenders_count(&query).await.unwrap(), 1);
}

#[tokio::test]
async fn test_pagination_slices_the_ranking() {
    let (events, _, router) = setup();

    for (selector, ms) in [("#s1", 500u32), ("#s2", 400), ("#s3", 300), ("#s4", 200)] {
        events
            .insert_events(fixtures::selector_batch(1, "/p", selector, &[ms; 5]))
            .await
            .unwrap();
    }

    let page = router
        .top_offenders(&TopOffendersQuery {
            limit: 2,
            offset: 1,
            ..raw_query()
        })
        .await
        .unwrap();

    let selectors: Vec<_> = page.iter().map(|r| r.selector.as_str()).collect();
    assert_eq!(selectors, vec!["#s2", "#s3"]);

    // Count ignores pagination.
    assert_eq!(
        router
            .top_offenders_count(&TopOffendersQuery {
                limit: 2,
                offset: 1,
                ..raw_query()
            })
            .await
            .unwrap(),
        4
    );

    // Offset past the end is an empty page, not an error.
    let past_end = router
        .top_offenders(&TopOffendersQuery {
            offset: 100,
            ..raw_query()
        })
        .await
        .unwrap();
    assert!(past_end.is_empty());
}

#[tokio::test]
async fn test_lookback_window_excludes_old_events() {
    let (events, _, router) = setup();

    events
        .insert_events(fixtures::selector_batch(10, "/p", "#old", &[900; 5]))
        .await
        .unwrap();
    events
        .insert_events(fixtures::selector_batch(1, "/p", "#recent", &[100; 5]))
        .await
        .unwrap();

    let rows = router.top_offenders(&raw_query()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].selector, "#recent");
}

#[tokio::test]
async fn test_query_failure_propagates() {
    let (events, _, router) = setup();
    events.set_should_fail(true);

    assert!(router.top_offenders(&raw_query()).await.is_err());
}
