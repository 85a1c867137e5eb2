//! Per-request result aggregation and summary statistics.
//!
//! The collector is an append-only log owned by one run cycle; repeats get a
//! fresh collector. Percentiles use the nearest-rank method over the sorted
//! successful durations: `sorted[ceil(p/100 * n) - 1]`, clamped to index 0.
//! No interpolation, so every reported percentile is an observed sample.

use std::collections::BTreeMap;

/// One completed (or failed) request attempt.
///
/// `status == 0` marks an attempt that never received a response; it is
/// excluded from the status-code histogram, and such results always carry an
/// error so they are also excluded from the duration distribution.
#[derive(Debug, Clone)]
pub struct RequestResult {
    pub duration_ms: f64,
    pub status: u16,
    pub size: String,
    pub error: Option<String>,
}

impl RequestResult {
    #[must_use]
    pub fn success(status: u16, duration_ms: f64, size: String) -> Self {
        Self {
            duration_ms,
            status,
            size,
            error: None,
        }
    }

    #[must_use]
    pub fn failure(status: u16, duration_ms: f64, error: String) -> Self {
        Self {
            duration_ms,
            status,
            size: "0".to_owned(),
            error: Some(error),
        }
    }
}

/// The standard percentile ladder, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PercentileLadder {
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Derived view over the full result set, recomputed on demand.
///
/// `min`/`max`/`mean` and the ladder cover successful results only and are
/// `None` for an empty run. `successful + failed == total` always holds.
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub percentiles: Option<PercentileLadder>,
    pub status_codes: BTreeMap<u16, u64>,
    pub errors: Vec<String>,
    /// Successful durations in seconds, sorted ascending.
    pub durations: Vec<f64>,
}

#[derive(Debug, Default)]
pub struct StatsCollector {
    results: Vec<RequestResult>,
}

impl StatsCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch of settled results. No dedup, no reordering.
    pub fn add_results(&mut self, results: Vec<RequestResult>) {
        self.results.extend(results);
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        let durations = self.durations();
        let total = self.results.len() as u64;
        let successful = durations.len() as u64;

        let mean = if durations.is_empty() {
            None
        } else {
            Some(durations.iter().sum::<f64>() / durations.len() as f64)
        };

        StatsSnapshot {
            total,
            successful,
            failed: total.saturating_sub(successful),
            min: durations.first().copied(),
            max: durations.last().copied(),
            mean,
            percentiles: percentile_ladder(&durations),
            status_codes: self.status_codes(),
            errors: self
                .results
                .iter()
                .filter_map(|result| result.error.clone())
                .collect(),
            durations,
        }
    }

    /// Successful durations converted to seconds, sorted ascending.
    fn durations(&self) -> Vec<f64> {
        let mut durations: Vec<f64> = self
            .results
            .iter()
            .filter(|result| result.error.is_none())
            .map(|result| result.duration_ms / 1000.0)
            .collect();
        durations.sort_by(f64::total_cmp);
        durations
    }

    fn status_codes(&self) -> BTreeMap<u16, u64> {
        let mut breakdown = BTreeMap::new();
        for result in &self.results {
            if result.status == 0 {
                continue;
            }
            *breakdown.entry(result.status).or_insert(0) += 1;
        }
        breakdown
    }
}

/// Nearest-rank percentile over an ascending-sorted sample list.
#[must_use]
pub fn nearest_rank(sorted: &[f64], percentile: u8) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = ((f64::from(percentile) / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted.get(rank.saturating_sub(1)).copied()
}

fn percentile_ladder(sorted: &[f64]) -> Option<PercentileLadder> {
    Some(PercentileLadder {
        p10: nearest_rank(sorted, 10)?,
        p25: nearest_rank(sorted, 25)?,
        p50: nearest_rank(sorted, 50)?,
        p75: nearest_rank(sorted, 75)?,
        p90: nearest_rank(sorted, 90)?,
        p95: nearest_rank(sorted, 95)?,
        p99: nearest_rank(sorted, 99)?,
    })
}
