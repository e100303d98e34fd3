//! Discrete percentile computation.
//!
//! Nearest-rank selection: sort ascending and take the value at 1-based rank
//! `ceil(p * n)`. This is the single canonical definition for the whole
//! engine; any store-native computation path must reproduce it exactly.

/// Discrete percentile of `values` for `p` in `[0, 1]`, nearest-rank rule.
///
/// Sorts a private copy; the input is left untouched. Returns `None` for an
/// empty slice — a group with zero samples is never aggregated, so callers
/// normally guarantee non-empty input.
pub fn percentile(values: &[u32], p: f64) -> Option<u32> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    Some(percentile_sorted(&sorted, p))
}

/// Nearest-rank percentile over an already ascending-sorted, non-empty slice.
pub fn percentile_sorted(sorted: &[u32], p: f64) -> u32 {
    debug_assert!(!sorted.is_empty());
    let n = sorted.len();
    // 0-based index ceil(p * n) - 1, clamped to [0, n - 1].
    let rank = (p * n as f64).ceil() as usize;
    let idx = rank.saturating_sub(1).min(n - 1);
    sorted[idx]
}

/// Daily aggregate of one partition's latencies: the stored rollup values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyAggregate {
    pub p50: u32,
    pub p75: u32,
    pub p95: u32,
    pub count: u64,
    pub worst: u32,
}

impl DailyAggregate {
    /// Aggregate a partition in one ordered pass. Consumes the values (the
    /// partition buffer is not needed afterwards) and sorts them in place.
    /// Returns `None` for an empty partition.
    pub fn from_latencies(mut values: Vec<u32>) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        values.sort_unstable();
        let n = values.len();
        Some(Self {
            p50: percentile_sorted(&values, 0.50),
            p75: percentile_sorted(&values, 0.75),
            p95: percentile_sorted(&values, 0.95),
            count: n as u64,
            worst: values[n - 1],
        })
    }
}
