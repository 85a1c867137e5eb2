//! The dispatch loop driving a load test.
//!
//! Batches are synchronization barriers: batch k+1 never starts before every
//! request of batch k has settled, which bounds peak concurrency exactly at
//! the configured value and makes concurrency changes take effect at the next
//! batch boundary. Cancelled attempts (operator pause/stop) are dropped
//! entirely; they advance no counter.

use std::sync::Arc;

use futures_util::future::join_all;
use tracing::debug;

use crate::executor::{ExecuteError, RequestConfig, RequestExecutor, RequestOutcome};
use crate::reporter::{Reporter, RunDecision};
use crate::stats::{RequestResult, StatsCollector};

#[derive(Debug, Clone, Copy)]
pub struct LoadConfig {
    pub total_requests: u64,
    pub concurrency: usize,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            total_requests: 200,
            concurrency: 50,
        }
    }
}

/// Final statistics of the last run cycle, for export by the caller.
#[derive(Debug)]
pub struct RunReport {
    pub stats: StatsCollector,
    pub duration_secs: f64,
}

fn classify(settled: Result<RequestOutcome, ExecuteError>) -> Option<RequestResult> {
    match settled {
        Ok(outcome) => {
            if (200..400).contains(&outcome.status) {
                Some(RequestResult::success(
                    outcome.status,
                    outcome.duration_ms,
                    outcome.size,
                ))
            } else {
                Some(RequestResult {
                    duration_ms: outcome.duration_ms,
                    status: outcome.status,
                    size: outcome.size,
                    error: Some(format!("HTTP status {}", outcome.status)),
                })
            }
        }
        Err(ExecuteError::Cancelled) => None,
        Err(ExecuteError::Failed(message)) => Some(RequestResult::failure(0, 0.0, message)),
    }
}

/// Drive the full test: batches until `total_requests` settle or the reporter
/// says stop, then repeat cycles for as long as `on_complete` asks for them.
/// Individual request failures never abort the run.
pub async fn run_load_test(
    executor: Arc<dyn RequestExecutor>,
    target: &str,
    request_config: &RequestConfig,
    load: LoadConfig,
    reporter: &dyn Reporter,
) -> RunReport {
    let total = load.total_requests;
    debug!(
        "Starting load test: {} requests with {} concurrency",
        total, load.concurrency
    );

    let report = loop {
        let mut stats = StatsCollector::new();
        let start = tokio::time::Instant::now();
        let mut completed: u64 = 0;

        while completed < total {
            if !reporter.should_continue().await {
                break;
            }

            let concurrency = reporter.concurrency().max(1);
            let batch_size = (concurrency as u64).min(total - completed);
            let cancel = reporter.cancel_signal();

            let batch = (0..batch_size).map(|_| {
                let executor = Arc::clone(&executor);
                let cancel = cancel.clone();
                async move { executor.execute(target, request_config, cancel).await }
            });
            let settled = join_all(batch).await;

            let results: Vec<RequestResult> = settled.into_iter().filter_map(classify).collect();
            completed += results.len() as u64;

            for result in &results {
                reporter.on_result(result);
            }
            stats.add_results(results);
            reporter.on_batch_complete(completed, total);
        }

        let duration_secs = start.elapsed().as_secs_f64();
        let snapshot = stats.snapshot();
        match reporter.on_complete(&snapshot, duration_secs).await {
            RunDecision::Quit => {
                break RunReport {
                    stats,
                    duration_secs,
                };
            }
            // A repeat gets a brand-new collector; nothing leaks across
            // cycles.
            RunDecision::Repeat => {}
        }
    };

    debug!("Finished load test: {} requests settled", report.stats.snapshot().total);
    reporter.cleanup().await;
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelSignal;
    use crate::stats::StatsSnapshot;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Script {
        Status(u16),
        Transport(&'static str),
        Cancelled,
    }

    struct MockExecutor {
        script: Mutex<VecDeque<Script>>,
        in_flight: AtomicUsize,
        peak_in_flight: AtomicUsize,
    }

    impl MockExecutor {
        fn new(script: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into_iter().collect()),
                in_flight: AtomicUsize::new(0),
                peak_in_flight: AtomicUsize::new(0),
            })
        }

        fn repeating(status: u16, count: usize) -> Arc<Self> {
            Self::new((0..count).map(|_| Script::Status(status)).collect())
        }
    }

    #[async_trait]
    impl RequestExecutor for MockExecutor {
        async fn execute(
            &self,
            _target: &str,
            _config: &RequestConfig,
            _cancel: Option<CancelSignal>,
        ) -> Result<RequestOutcome, ExecuteError> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let step = self
                .script
                .lock()
                .ok()
                .and_then(|mut script| script.pop_front());
            match step {
                Some(Script::Status(status)) => Ok(RequestOutcome {
                    status,
                    duration_ms: 10.0,
                    size: "1 KB".to_owned(),
                }),
                Some(Script::Transport(message)) => {
                    Err(ExecuteError::Failed(message.to_owned()))
                }
                Some(Script::Cancelled) | None => Err(ExecuteError::Cancelled),
            }
        }
    }

    struct TestReporter {
        concurrency: usize,
        batch_marks: Mutex<Vec<u64>>,
        decisions: Mutex<VecDeque<RunDecision>>,
        completions: Mutex<Vec<StatsSnapshot>>,
    }

    impl TestReporter {
        fn new(concurrency: usize, decisions: Vec<RunDecision>) -> Self {
            Self {
                concurrency,
                batch_marks: Mutex::new(Vec::new()),
                decisions: Mutex::new(decisions.into_iter().collect()),
                completions: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Reporter for TestReporter {
        async fn should_continue(&self) -> bool {
            true
        }

        fn concurrency(&self) -> usize {
            self.concurrency
        }

        fn on_result(&self, _result: &RequestResult) {}

        fn on_batch_complete(&self, completed: u64, _total: u64) {
            if let Ok(mut marks) = self.batch_marks.lock() {
                marks.push(completed);
            }
        }

        async fn on_complete(&self, stats: &StatsSnapshot, _duration_secs: f64) -> RunDecision {
            if let Ok(mut completions) = self.completions.lock() {
                completions.push(stats.clone());
            }
            self.decisions
                .lock()
                .ok()
                .and_then(|mut decisions| decisions.pop_front())
                .unwrap_or(RunDecision::Quit)
        }

        async fn cleanup(&self) {}
    }

    #[tokio::test]
    async fn batches_never_exceed_the_concurrency_limit() {
        let executor = MockExecutor::repeating(200, 10);
        let reporter = TestReporter::new(3, vec![]);

        let report = run_load_test(
            Arc::clone(&executor) as Arc<dyn RequestExecutor>,
            "http://localhost",
            &RequestConfig::default(),
            LoadConfig {
                total_requests: 10,
                concurrency: 3,
            },
            &reporter,
        )
        .await;

        let stats = report.stats.snapshot();
        assert_eq!(stats.total, 10);
        assert_eq!(stats.successful, 10);
        assert!(executor.peak_in_flight.load(Ordering::SeqCst) <= 3);

        // completed advances only at batch boundaries: 3, 6, 9, 10.
        let marks = reporter
            .batch_marks
            .lock()
            .map_or_else(|_| Vec::new(), |marks| marks.clone());
        assert_eq!(marks, vec![3, 6, 9, 10]);
    }

    #[tokio::test]
    async fn mixed_statuses_split_into_success_and_failure() {
        let executor = MockExecutor::new(vec![
            Script::Status(200),
            Script::Status(500),
            Script::Status(200),
            Script::Status(500),
            Script::Status(200),
        ]);
        let reporter = TestReporter::new(5, vec![]);

        let report = run_load_test(
            executor,
            "http://localhost",
            &RequestConfig::default(),
            LoadConfig {
                total_requests: 5,
                concurrency: 5,
            },
            &reporter,
        )
        .await;

        let stats = report.stats.snapshot();
        assert_eq!(stats.successful, 3);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.status_codes.get(&200), Some(&3));
        assert_eq!(stats.status_codes.get(&500), Some(&2));
        assert_eq!(stats.errors.len(), 2);
    }

    #[tokio::test]
    async fn transport_failures_are_counted_not_thrown() {
        let executor = MockExecutor::new(vec![
            Script::Status(200),
            Script::Transport("connection refused"),
            Script::Status(200),
        ]);
        let reporter = TestReporter::new(3, vec![]);

        let report = run_load_test(
            executor,
            "http://localhost",
            &RequestConfig::default(),
            LoadConfig {
                total_requests: 3,
                concurrency: 3,
            },
            &reporter,
        )
        .await;

        let stats = report.stats.snapshot();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.errors, vec!["connection refused".to_owned()]);
        // A failure that never reached the network stays out of the
        // status-code histogram.
        assert_eq!(stats.status_codes.get(&200), Some(&2));
        assert_eq!(stats.status_codes.len(), 1);
    }

    #[tokio::test]
    async fn cancelled_attempts_are_excluded_and_redispatched() {
        // First batch of 5: three settle, two are cancelled mid-flight.
        // The dispatcher must redispatch exactly the uncounted remainder.
        let executor = MockExecutor::new(vec![
            Script::Status(200),
            Script::Cancelled,
            Script::Status(200),
            Script::Cancelled,
            Script::Status(200),
            Script::Status(200),
            Script::Status(200),
        ]);
        let reporter = TestReporter::new(5, vec![]);

        let report = run_load_test(
            executor,
            "http://localhost",
            &RequestConfig::default(),
            LoadConfig {
                total_requests: 5,
                concurrency: 5,
            },
            &reporter,
        )
        .await;

        let stats = report.stats.snapshot();
        assert_eq!(stats.total, 5);
        assert_eq!(stats.successful, 5);
        assert_eq!(stats.failed, 0);

        let marks = reporter
            .batch_marks
            .lock()
            .map_or_else(|_| Vec::new(), |marks| marks.clone());
        assert_eq!(marks, vec![3, 5]);
    }

    #[tokio::test]
    async fn repeat_starts_a_fresh_collector() {
        let executor = MockExecutor::repeating(200, 8);
        let reporter = TestReporter::new(4, vec![RunDecision::Repeat]);

        let report = run_load_test(
            executor,
            "http://localhost",
            &RequestConfig::default(),
            LoadConfig {
                total_requests: 4,
                concurrency: 4,
            },
            &reporter,
        )
        .await;

        // Two cycles ran; the report covers only the second one.
        assert_eq!(report.stats.snapshot().total, 4);
        let completions = reporter
            .completions
            .lock()
            .map_or(0, |completions| completions.len());
        assert_eq!(completions, 2);
    }
}
