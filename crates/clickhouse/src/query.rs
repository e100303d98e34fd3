//! Read and delete queries against the two tables.

use crate::client::ClickHouseClient;
use crate::insert::{days_of, secs_of, EventRow, RollupRecord};
use chrono::{DateTime, NaiveDate, Utc};
use clickhouse::Row;
use rollup_core::{Error, RawEvent, Result, RollupRow, SelectorEventsQuery};
use serde::Deserialize;

/// Escape `%`, `_` and `\` in user input destined for a LIKE pattern.
pub(crate) fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

const EVENT_COLUMNS: &str = "event_id, ts, page_url, interaction_type, target_selector, \
     inp_ms, long_task_ms, script_url, device_class, sample_rate";

/// Fetch raw events with `from <= ts < to`.
pub async fn events_in_range(
    client: &ClickHouseClient,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<RawEvent>> {
    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM events WHERE ts >= toDateTime(?) AND ts < toDateTime(?)"
    );
    let rows: Vec<EventRow> = client
        .inner()
        .query(&sql)
        .bind(secs_of(from))
        .bind(secs_of(to))
        .fetch_all()
        .await
        .map_err(|e| Error::query(format!("Query error: {}", e)))?;

    Ok(rows.into_iter().map(RawEvent::from).collect())
}

/// Fetch raw events for one selector, most recent first.
pub async fn selector_events(
    client: &ClickHouseClient,
    query: &SelectorEventsQuery,
) -> Result<Vec<RawEvent>> {
    let mut sql = format!(
        "SELECT {EVENT_COLUMNS} FROM events WHERE target_selector = ? AND ts >= toDateTime(?)"
    );
    if query.url_contains.is_some() {
        sql.push_str(" AND page_url LIKE ?");
    }
    sql.push_str(" ORDER BY ts DESC LIMIT ? OFFSET ?");

    let mut prepared = client
        .inner()
        .query(&sql)
        .bind(query.selector.as_str())
        .bind(secs_of(query.from));
    if let Some(ref needle) = query.url_contains {
        prepared = prepared.bind(like_pattern(needle));
    }

    let rows: Vec<EventRow> = prepared
        .bind(query.limit)
        .bind(query.offset)
        .fetch_all()
        .await
        .map_err(|e| Error::query(format!("Query error: {}", e)))?;

    Ok(rows.into_iter().map(RawEvent::from).collect())
}

/// Delete raw events older than `cutoff`. Returns the number of rows the
/// age predicate matched when the delete was issued.
pub async fn delete_events_before(client: &ClickHouseClient, cutoff: DateTime<Utc>) -> Result<u64> {
    let matched: u64 = client
        .inner()
        .query("SELECT count() FROM events WHERE ts < toDateTime(?)")
        .bind(secs_of(cutoff))
        .fetch_one()
        .await
        .map_err(|e| Error::query(format!("Query error: {}", e)))?;

    if matched == 0 {
        return Ok(0);
    }

    client
        .inner()
        .query("ALTER TABLE events DELETE WHERE ts < toDateTime(?)")
        .bind(secs_of(cutoff))
        .execute()
        .await
        .map_err(|e| Error::storage(format!("Delete error: {}", e)))?;

    Ok(matched)
}

/// Fetch rollup rows with `from <= day < to`. Reads FINAL so the latest
/// build of each key wins over superseded versions.
pub async fn rollups_in_range(
    client: &ClickHouseClient,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<RollupRow>> {
    let rows: Vec<RollupRecord> = client
        .inner()
        .query(
            "SELECT day, page_path, target_selector, device_class, p50, p75, p95, cnt, worst, built_at \
             FROM rollups FINAL WHERE day >= toDate(?) AND day < toDate(?)",
        )
        .bind(days_of(from))
        .bind(days_of(to))
        .fetch_all()
        .await
        .map_err(|e| Error::query(format!("Query error: {}", e)))?;

    Ok(rows.into_iter().map(RollupRecord::into_row).collect())
}

/// Whether any rollup row exists.
pub async fn has_rollups(client: &ClickHouseClient) -> Result<bool> {
    let any: u8 = client
        .inner()
        .query("SELECT count() > 0 FROM rollups")
        .fetch_one()
        .await
        .map_err(|e| Error::query(format!("Query error: {}", e)))?;
    Ok(any != 0)
}

/// Delete rollup rows older than `cutoff`.
pub async fn delete_rollups_before(client: &ClickHouseClient, cutoff: NaiveDate) -> Result<u64> {
    let matched: u64 = client
        .inner()
        .query("SELECT count() FROM rollups FINAL WHERE day < toDate(?)")
        .bind(days_of(cutoff))
        .fetch_one()
        .await
        .map_err(|e| Error::query(format!("Query error: {}", e)))?;

    if matched == 0 {
        return Ok(0);
    }

    client
        .inner()
        .query("ALTER TABLE rollups DELETE WHERE day < toDate(?)")
        .bind(days_of(cutoff))
        .execute()
        .await
        .map_err(|e| Error::storage(format!("Delete error: {}", e)))?;

    Ok(matched)
}

/// Aggregate row produced by the native day aggregation.
#[derive(Debug, Clone, Row, Deserialize)]
struct NativeAggRow {
    page_path: String,
    target_selector: String,
    device_class: String,
    p50: u32,
    p75: u32,
    p95: u32,
    cnt: u64,
    worst: u32,
}

/// In-database day aggregation.
///
/// Indexes the sorted latency array at 1-based rank `ceil(p * n)` — the
/// nearest-rank rule of `rollup_core::percentile` — so this path and the
/// in-memory fallback produce identical rows. The repeated sort expression
/// is collapsed by common-subexpression elimination server-side.
pub async fn aggregate_day(client: &ClickHouseClient, day: NaiveDate) -> Result<Vec<RollupRow>> {
    // Bind the day bounds as epoch seconds so the window is UTC regardless
    // of the server timezone.
    let from = secs_of(day.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc());
    let to = secs_of(
        (day + chrono::Duration::days(1))
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default()
            .and_utc(),
    );

    let sql = "\
        SELECT \
            substringUTF8(substringIndex(page_url, '?', 1), 1, 255) AS page_path, \
            target_selector, \
            device_class, \
            toUInt32(arraySort(groupArray(inp_ms))[toUInt32(ceil(0.50 * count()))]) AS p50, \
            toUInt32(arraySort(groupArray(inp_ms))[toUInt32(ceil(0.75 * count()))]) AS p75, \
            toUInt32(arraySort(groupArray(inp_ms))[toUInt32(ceil(0.95 * count()))]) AS p95, \
            count() AS cnt, \
            max(inp_ms) AS worst \
        FROM events \
        WHERE ts >= toDateTime(?) AND ts < toDateTime(?) \
        GROUP BY page_path, target_selector, device_class";

    let rows: Vec<NativeAggRow> = client
        .inner()
        .query(sql)
        .bind(from)
        .bind(to)
        .fetch_all()
        .await
        .map_err(|e| Error::query(format!("Query error: {}", e)))?;

    Ok(rows
        .into_iter()
        .map(|row| RollupRow {
            day,
            page_path: row.page_path,
            target_selector: row.target_selector,
            device_class: rollup_core::DeviceClass::coerce(&row.device_class),
            p50: row.p50,
            p75: row.p75,
            p95: row.p95,
            count: row.cnt,
            worst: row.worst,
        })
        .collect())
}
