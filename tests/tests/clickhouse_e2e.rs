//! ClickHouse end-to-end tests. Ignored by default; they require Docker (or
//! an external instance via `INPD_TEST_CLICKHOUSE_URL`).

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use clickhouse_store::{health, ClickHouseClient, ClickHouseConfig};
use integration_tests::containers::TestContainers;
use integration_tests::fixtures;
use rollup_core::{EventStore, RollupStore, SelectorEventsQuery};
use rollup_worker::build_rollup_rows;

async fn client() -> ClickHouseClient {
    let containers = TestContainers::start().await;
    let client = ClickHouseClient::new(ClickHouseConfig {
        url: containers.clickhouse_url.clone(),
        database: containers.clickhouse_database.clone(),
        username: containers.clickhouse_username.clone(),
        password: containers.clickhouse_password.clone(),
        ..ClickHouseConfig::default()
    })
    .unwrap();

    health::init_schema(&client).await.unwrap();
    // Leak the container handle so it outlives the test body.
    std::mem::forget(containers);
    client
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_native_aggregation_matches_percentile_engine() {
    let client = client().await;
    let day = chrono::NaiveDate::from_ymd_opt(2026, 8, 4).unwrap();
    let noon = Utc.with_ymd_and_hms(2026, 8, 4, 12, 0, 0).unwrap();

    let mut events = Vec::new();
    for (url, selector, device, latencies) in [
        ("/checkout?step=1", "#buy-btn", "desktop", vec![100, 150, 900, 120, 110]),
        ("/checkout", "#buy-btn", "desktop", vec![75, 80]),
        ("/landing", "#cta", "mobile", vec![300]),
    ] {
        for ms in latencies {
            events.push(fixtures::event_at(noon, url, selector, device, ms));
        }
    }

    client.insert_events(events.clone()).await.unwrap();

    let mut native = client
        .aggregate_day(day)
        .await
        .unwrap()
        .expect("ClickHouse supports native aggregation");
    native.sort_by(|a, b| a.key().cmp(&b.key()));

    let in_memory = build_rollup_rows(day, &events);

    assert_eq!(native, in_memory);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_rollup_upsert_replaces_by_key() {
    let client = client().await;
    let store: Arc<dyn RollupStore> = Arc::new(client);
    let day = chrono::NaiveDate::from_ymd_opt(2026, 8, 4).unwrap();

    let mut row = fixtures::rollup_row(day, "/p", "#a", 100, 10);
    store.upsert_rollups(vec![row.clone()]).await.unwrap();

    row.count = 42;
    store.upsert_rollups(vec![row.clone()]).await.unwrap();

    let rows = store
        .rollups_in_range(day, day + chrono::Duration::days(1))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].count, 42);
    assert!(store.has_rollups().await.unwrap());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_selector_events_query() {
    let client = client().await;
    let noon = Utc.with_ymd_and_hms(2026, 8, 4, 12, 0, 0).unwrap();

    client
        .insert_events(vec![
            fixtures::event_at(noon, "/p", "#wanted", "desktop", 100),
            fixtures::event_at(noon, "/p", "#unwanted", "desktop", 200),
        ])
        .await
        .unwrap();

    let rows = client
        .selector_events(&SelectorEventsQuery {
            selector: "#wanted".to_string(),
            from: noon - chrono::Duration::days(1),
            url_contains: None,
            limit: 10,
            offset: 0,
        })
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].target_selector, "#wanted");
}
