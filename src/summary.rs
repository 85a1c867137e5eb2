//! Plain-text summary printed after a non-interactive run.
//!
//! Pure presentation over a [`StatsSnapshot`]; carries no state of its own.

use crate::stats::StatsSnapshot;

const HISTOGRAM_BUCKETS: usize = 10;
const HISTOGRAM_BAR_WIDTH: usize = 40;
const HISTOGRAM_GLYPH: &str = "■";

pub fn print_summary(stats: &StatsSnapshot, duration_secs: f64) {
    for line in build_summary_lines(stats, duration_secs) {
        println!("{}", line);
    }
}

#[must_use]
pub fn build_summary_lines(stats: &StatsSnapshot, duration_secs: f64) -> Vec<String> {
    let mut lines = Vec::new();
    lines.extend(totals_lines(stats, duration_secs));
    lines.extend(histogram_lines(stats));
    lines.extend(latency_lines(stats));
    lines.extend(status_code_lines(stats));
    lines
}

fn totals_lines(stats: &StatsSnapshot, duration_secs: f64) -> Vec<String> {
    let requests_per_second = if duration_secs > 0.0 {
        stats.total as f64 / duration_secs
    } else {
        0.0
    };

    vec![
        String::new(),
        "Summary:".to_owned(),
        format!("  Total:         {:.4} secs", duration_secs),
        format!("  Slowest:       {:.4} secs", stats.max.unwrap_or(0.0)),
        format!("  Fastest:       {:.4} secs", stats.min.unwrap_or(0.0)),
        format!("  Average:       {:.4} secs", stats.mean.unwrap_or(0.0)),
        format!("  Requests/sec:  {:.4}", requests_per_second),
    ]
}

fn histogram_lines(stats: &StatsSnapshot) -> Vec<String> {
    let durations = &stats.durations;
    let (Some(min), Some(max)) = (stats.min, stats.max) else {
        return Vec::new();
    };

    let mut buckets = vec![0u64; HISTOGRAM_BUCKETS];
    let bucket_size = (max - min) / HISTOGRAM_BUCKETS as f64;
    for duration in durations {
        let index = if bucket_size > 0.0 {
            (((duration - min) / bucket_size) as usize).min(HISTOGRAM_BUCKETS - 1)
        } else {
            0
        };
        if let Some(slot) = buckets.get_mut(index) {
            *slot += 1;
        }
    }

    let max_count = buckets.iter().copied().max().unwrap_or(0);
    let count_width = max_count.to_string().len();

    let mut lines = vec![String::new(), "Response time histogram:".to_owned()];
    for (index, count) in buckets.iter().enumerate() {
        let bucket_start = min + index as f64 * bucket_size;
        let bar_len = if max_count > 0 {
            ((*count as f64 / max_count as f64) * HISTOGRAM_BAR_WIDTH as f64).round() as usize
        } else {
            0
        };
        lines.push(format!(
            "  {:.3} [{:>width$}]    |{}",
            bucket_start,
            count,
            HISTOGRAM_GLYPH.repeat(bar_len),
            width = count_width
        ));
    }
    lines
}

fn latency_lines(stats: &StatsSnapshot) -> Vec<String> {
    let Some(ladder) = stats.percentiles else {
        return Vec::new();
    };

    vec![
        String::new(),
        "Latency distribution:".to_owned(),
        format!("  10% in {:.4} secs", ladder.p10),
        format!("  25% in {:.4} secs", ladder.p25),
        format!("  50% in {:.4} secs", ladder.p50),
        format!("  75% in {:.4} secs", ladder.p75),
        format!("  90% in {:.4} secs", ladder.p90),
        format!("  95% in {:.4} secs", ladder.p95),
        format!("  99% in {:.4} secs", ladder.p99),
    ]
}

fn status_code_lines(stats: &StatsSnapshot) -> Vec<String> {
    if stats.status_codes.is_empty() {
        return Vec::new();
    }

    let mut lines = vec![String::new(), "Status code distribution:".to_owned()];
    for (code, count) in &stats.status_codes {
        lines.push(format!("  [{}] {} responses", code, count));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{RequestResult, StatsCollector};

    fn sample_snapshot() -> StatsSnapshot {
        let mut collector = StatsCollector::new();
        collector.add_results(
            (1..=10)
                .map(|i| RequestResult::success(200, f64::from(i) * 10.0, "1 KB".to_owned()))
                .collect(),
        );
        collector.snapshot()
    }

    #[test]
    fn summary_covers_every_section() {
        let lines = build_summary_lines(&sample_snapshot(), 2.0);
        let text = lines.join("\n");
        assert!(text.contains("Summary:"));
        assert!(text.contains("Requests/sec:  5.0000"));
        assert!(text.contains("Response time histogram:"));
        assert!(text.contains("Latency distribution:"));
        assert!(text.contains("50% in 0.0500 secs"));
        assert!(text.contains("Status code distribution:"));
        assert!(text.contains("[200] 10 responses"));
    }

    #[test]
    fn histogram_has_ten_buckets() {
        let lines = histogram_lines(&sample_snapshot());
        // Header, blank line, then one line per bucket.
        assert_eq!(lines.len(), 2 + 10);
    }

    #[test]
    fn empty_run_renders_totals_only() {
        let stats = StatsCollector::new().snapshot();
        let lines = build_summary_lines(&stats, 0.0);
        let text = lines.join("\n");
        assert!(text.contains("Summary:"));
        assert!(!text.contains("histogram"));
        assert!(!text.contains("Latency distribution:"));
        assert!(!text.contains("Status code distribution:"));
    }
}
