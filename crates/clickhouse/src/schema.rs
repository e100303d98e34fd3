//! ClickHouse table schemas.
//!
//! Two owned tables plus the internal metrics sink:
//! - `events`: append-only raw samples, ordered for selector lookup with
//!   month partitions for time-range pruning.
//! - `rollups`: one row per (day, page_path, target_selector, device_class).
//!   ReplacingMergeTree keyed on the composite key with `built_at` as the
//!   version column gives replace-by-key upsert semantics; readers use
//!   FINAL so the latest build of a key wins.

/// SQL for creating the raw events table.
pub const CREATE_EVENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS events (
    event_id String,
    ts DateTime,
    page_url String,
    interaction_type LowCardinality(String),
    target_selector String,
    inp_ms UInt32,
    long_task_ms Nullable(UInt32),
    script_url Nullable(String),
    device_class LowCardinality(String),
    sample_rate UInt8,

    received_at DateTime DEFAULT now()
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(ts)
ORDER BY (target_selector, ts)
SETTINGS index_granularity = 8192
"#;

/// SQL for creating the daily rollups table.
pub const CREATE_ROLLUPS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS rollups (
    day Date,
    page_path String,
    target_selector String,
    device_class LowCardinality(String),
    p50 UInt32,
    p75 UInt32,
    p95 UInt32,
    cnt UInt64,
    worst UInt32,

    built_at DateTime DEFAULT now()
)
ENGINE = ReplacingMergeTree(built_at)
PARTITION BY toYYYYMM(day)
ORDER BY (day, page_path, target_selector, device_class)
SETTINGS index_granularity = 8192
"#;

/// SQL for creating the internal metrics table (dogfooding).
///
/// Stores a snapshot per batch run for monitoring the engine itself.
pub const CREATE_METRICS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS internal_metrics (
    timestamp DateTime,
    events_inserted UInt64,
    insert_errors UInt64,
    rollup_runs UInt64,
    rollup_run_errors UInt64,
    rollup_rows_written UInt64,
    rollup_events_scanned UInt64,
    rollup_native_runs UInt64,
    prune_runs UInt64,
    prune_errors UInt64,
    raw_events_pruned UInt64,
    rollups_pruned UInt64,
    offender_queries UInt64,
    selector_queries UInt64,
    query_errors UInt64,
    insert_latency_mean_ms Float64,
    rollup_build_latency_mean_ms Float64,
    query_latency_mean_ms Float64
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(timestamp)
ORDER BY timestamp
TTL timestamp + INTERVAL 30 DAY
SETTINGS index_granularity = 8192
"#;

/// All table DDL statements, in creation order.
pub fn all_tables() -> [&'static str; 3] {
    [
        CREATE_EVENTS_TABLE,
        CREATE_ROLLUPS_TABLE,
        CREATE_METRICS_TABLE,
    ]
}
