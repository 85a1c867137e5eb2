//! JSON/CSV serialization of a finished run, external to the dispatch loop.

use std::path::Path;
use std::str::FromStr;

use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::stats::StatsSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl FromStr for ExportFormat {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(AppError::InvalidExportFormat(other.to_owned())),
        }
    }
}

/// Latency figures are rounded to 4 decimal places independently.
fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[must_use]
pub fn format_export(stats: &StatsSnapshot, duration_secs: f64, format: ExportFormat) -> String {
    match format {
        ExportFormat::Json => format_json(stats, duration_secs),
        ExportFormat::Csv => format_csv(stats, duration_secs),
    }
}

fn requests_per_second(stats: &StatsSnapshot, duration_secs: f64) -> f64 {
    if duration_secs > 0.0 {
        stats.total as f64 / duration_secs
    } else {
        0.0
    }
}

fn format_json(stats: &StatsSnapshot, duration_secs: f64) -> String {
    let ladder = stats.percentiles;
    let latency = json!({
        "min": round4(stats.min.unwrap_or(0.0)),
        "max": round4(stats.max.unwrap_or(0.0)),
        "avg": round4(stats.mean.unwrap_or(0.0)),
        "p10": round4(ladder.map_or(0.0, |l| l.p10)),
        "p25": round4(ladder.map_or(0.0, |l| l.p25)),
        "p50": round4(ladder.map_or(0.0, |l| l.p50)),
        "p75": round4(ladder.map_or(0.0, |l| l.p75)),
        "p90": round4(ladder.map_or(0.0, |l| l.p90)),
        "p95": round4(ladder.map_or(0.0, |l| l.p95)),
        "p99": round4(ladder.map_or(0.0, |l| l.p99)),
    });

    let status_codes: serde_json::Map<String, serde_json::Value> = stats
        .status_codes
        .iter()
        .map(|(code, count)| (code.to_string(), json!(count)))
        .collect();

    let payload = json!({
        "summary": {
            "totalRequests": stats.total,
            "successful": stats.successful,
            "failed": stats.failed,
            "duration": round4(duration_secs),
            "requestsPerSecond": round4(requests_per_second(stats, duration_secs)),
        },
        "latency": latency,
        "statusCodes": status_codes,
        "errors": stats.errors,
    });

    serde_json::to_string_pretty(&payload).unwrap_or_else(|_| "{}".to_owned())
}

fn format_csv(stats: &StatsSnapshot, duration_secs: f64) -> String {
    let ladder = stats.percentiles;
    let mut lines = vec![
        "metric,value".to_owned(),
        format!("total_requests,{}", stats.total),
        format!("successful,{}", stats.successful),
        format!("failed,{}", stats.failed),
        format!("duration_secs,{:.4}", duration_secs),
        format!(
            "requests_per_sec,{:.4}",
            requests_per_second(stats, duration_secs)
        ),
        format!("latency_min_secs,{:.4}", stats.min.unwrap_or(0.0)),
        format!("latency_max_secs,{:.4}", stats.max.unwrap_or(0.0)),
        format!("latency_avg_secs,{:.4}", stats.mean.unwrap_or(0.0)),
        format!("latency_p10_secs,{:.4}", ladder.map_or(0.0, |l| l.p10)),
        format!("latency_p25_secs,{:.4}", ladder.map_or(0.0, |l| l.p25)),
        format!("latency_p50_secs,{:.4}", ladder.map_or(0.0, |l| l.p50)),
        format!("latency_p75_secs,{:.4}", ladder.map_or(0.0, |l| l.p75)),
        format!("latency_p90_secs,{:.4}", ladder.map_or(0.0, |l| l.p90)),
        format!("latency_p95_secs,{:.4}", ladder.map_or(0.0, |l| l.p95)),
        format!("latency_p99_secs,{:.4}", ladder.map_or(0.0, |l| l.p99)),
    ];

    for (code, count) in &stats.status_codes {
        lines.push(format!("status_{},{}", code, count));
    }

    lines.join("\n")
}

/// Write the export to `path`, or print it to stdout when no path is given.
///
/// # Errors
///
/// Returns an error if writing the file fails. The caller is expected to
/// surface it as a warning and fall back to the in-memory summary.
pub async fn export_results(
    stats: &StatsSnapshot,
    duration_secs: f64,
    format: ExportFormat,
    path: Option<&Path>,
) -> AppResult<()> {
    let content = format_export(stats, duration_secs, format);

    match path {
        Some(path) => {
            tokio::fs::write(path, &content).await?;
            println!("\nResults exported to {}", path.display());
        }
        None => println!("\n{}", content),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{RequestResult, StatsCollector};

    fn sample_snapshot() -> StatsSnapshot {
        let mut collector = StatsCollector::new();
        collector.add_results(vec![
            RequestResult::success(200, 100.0, "1 KB".to_owned()),
            RequestResult::success(200, 250.0, "1 KB".to_owned()),
            RequestResult::failure(500, 40.0, "HTTP status 500".to_owned()),
        ]);
        collector.snapshot()
    }

    #[test]
    fn json_round_trips_the_summary_totals() -> AppResult<()> {
        let stats = sample_snapshot();
        let exported = format_export(&stats, 1.5, ExportFormat::Json);
        let parsed: serde_json::Value = serde_json::from_str(&exported)?;

        assert_eq!(
            parsed["summary"]["totalRequests"].as_u64(),
            Some(stats.total)
        );
        assert_eq!(parsed["summary"]["successful"].as_u64(), Some(2));
        assert_eq!(parsed["summary"]["failed"].as_u64(), Some(1));
        assert_eq!(parsed["summary"]["duration"].as_f64(), Some(1.5));
        assert_eq!(parsed["statusCodes"]["200"].as_u64(), Some(2));
        assert_eq!(parsed["statusCodes"]["500"].as_u64(), Some(1));
        assert_eq!(
            parsed["errors"]
                .as_array()
                .map_or(0, std::vec::Vec::len),
            1
        );
        Ok(())
    }

    #[test]
    fn csv_is_a_metric_value_table_with_status_rows() {
        let exported = format_export(&sample_snapshot(), 2.0, ExportFormat::Csv);
        let mut lines = exported.lines();
        assert_eq!(lines.next(), Some("metric,value"));
        assert!(exported.contains("total_requests,3"));
        assert!(exported.contains("requests_per_sec,1.5000"));
        assert!(exported.contains("status_200,2"));
        assert!(exported.contains("status_500,1"));
    }

    #[test]
    fn unknown_format_is_rejected_up_front() {
        assert!(ExportFormat::from_str("json").is_ok());
        assert!(ExportFormat::from_str("CSV").is_ok());
        assert!(ExportFormat::from_str("yaml").is_err());
    }

    #[tokio::test]
    async fn export_writes_to_a_file() -> AppResult<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("results.json");
        export_results(&sample_snapshot(), 1.0, ExportFormat::Json, Some(&path)).await?;

        let content = tokio::fs::read_to_string(&path).await?;
        let parsed: serde_json::Value = serde_json::from_str(&content)?;
        assert_eq!(parsed["summary"]["totalRequests"].as_u64(), Some(3));
        Ok(())
    }
}
