//! Reporter implementation backed by the interactive dashboard.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::cancel::CancelSignal;
use crate::reporter::{Reporter, RunDecision};
use crate::stats::{RequestResult, StatsSnapshot};

use super::controller::DashboardController;
use super::input::spawn_input_task;
use super::render::spawn_render_task;
use super::state::RunStatus;

pub struct DashboardReporter {
    controller: Arc<DashboardController>,
    tasks: Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl DashboardReporter {
    /// Build the controller and start the tick, input, and render tasks.
    #[must_use]
    pub fn start(target: String, total_requests: u64, concurrency: usize) -> Self {
        let controller = DashboardController::new(target, total_requests, concurrency);
        let tasks = vec![
            controller.spawn_tick_task(),
            spawn_input_task(&controller),
            spawn_render_task(&controller),
        ];
        Self {
            controller,
            tasks: Mutex::new(tasks),
        }
    }

    #[must_use]
    pub fn controller(&self) -> &Arc<DashboardController> {
        &self.controller
    }
}

#[async_trait]
impl Reporter for DashboardReporter {
    /// True while running; suspends (without spinning) while paused; false
    /// once the run is stopped or completed.
    async fn should_continue(&self) -> bool {
        let mut status_rx = self.controller.subscribe_status();
        loop {
            match *status_rx.borrow_and_update() {
                RunStatus::Running => return true,
                RunStatus::Stopped | RunStatus::Completed => return false,
                RunStatus::Paused => {}
            }
            if status_rx.changed().await.is_err() {
                return false;
            }
        }
    }

    fn concurrency(&self) -> usize {
        self.controller.concurrency()
    }

    fn cancel_signal(&self) -> Option<CancelSignal> {
        self.controller.cancel_signal()
    }

    fn on_result(&self, result: &RequestResult) {
        self.controller.record_result(result);
    }

    fn on_batch_complete(&self, _completed: u64, _total: u64) {
        // Every result already published a fresh snapshot.
    }

    /// Mark the run complete, then suspend until the operator either repeats
    /// (`r`) or quits (`q`/ctrl-C).
    async fn on_complete(&self, _stats: &StatsSnapshot, _duration_secs: f64) -> RunDecision {
        self.controller.complete();

        let mut status_rx = self.controller.subscribe_status();
        loop {
            match *status_rx.borrow_and_update() {
                RunStatus::Running => return RunDecision::Repeat,
                RunStatus::Stopped => return RunDecision::Quit,
                RunStatus::Completed | RunStatus::Paused => {}
            }
            if status_rx.changed().await.is_err() {
                return RunDecision::Quit;
            }
        }
    }

    async fn cleanup(&self) {
        self.controller.shutdown();
        let handles = self
            .tasks
            .lock()
            .map_or_else(|_| Vec::new(), |mut tasks| std::mem::take(&mut *tasks));
        for handle in handles {
            drop(handle.await);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    // Controller-only variant so tests never touch the real terminal.
    fn reporter_without_ui() -> DashboardReporter {
        let controller = DashboardController::new("http://localhost".to_owned(), 5, 2);
        DashboardReporter {
            controller,
            tasks: Mutex::new(Vec::new()),
        }
    }

    #[tokio::test]
    async fn should_continue_blocks_while_paused() {
        let reporter = reporter_without_ui();
        reporter.controller().pause();

        let controller = Arc::clone(reporter.controller());
        let waiter = tokio::spawn(async move {
            let controller_reporter = DashboardReporter {
                controller,
                tasks: Mutex::new(Vec::new()),
            };
            controller_reporter.should_continue().await
        });

        // Still blocked after a short grace period.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        reporter.controller().resume();
        assert_eq!(waiter.await.ok(), Some(true));
    }

    #[tokio::test]
    async fn stop_while_paused_resolves_to_do_not_proceed() {
        let reporter = reporter_without_ui();
        reporter.controller().pause();
        reporter.controller().stop();
        assert!(!reporter.should_continue().await);
    }

    #[tokio::test]
    async fn complete_then_repeat_starts_a_new_cycle() {
        let reporter = reporter_without_ui();
        reporter
            .controller()
            .record_result(&RequestResult::success(200, 10.0, "1 KB".to_owned()));

        let controller = Arc::clone(reporter.controller());
        let decision = tokio::spawn(async move {
            let inner = DashboardReporter {
                controller,
                tasks: Mutex::new(Vec::new()),
            };
            let stats = crate::stats::StatsCollector::new().snapshot();
            inner.on_complete(&stats, 1.0).await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        reporter.controller().repeat();

        assert_eq!(decision.await.ok(), Some(RunDecision::Repeat));
        // Repeat reset the dashboard counters for the fresh collector.
        assert_eq!(reporter.controller().snapshot().map(|s| s.completed), Some(0));
    }

    #[tokio::test]
    async fn complete_then_quit() {
        let reporter = reporter_without_ui();

        let controller = Arc::clone(reporter.controller());
        let decision = tokio::spawn(async move {
            let inner = DashboardReporter {
                controller,
                tasks: Mutex::new(Vec::new()),
            };
            let stats = crate::stats::StatsCollector::new().snapshot();
            inner.on_complete(&stats, 1.0).await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        reporter.controller().stop();
        assert_eq!(decision.await.ok(), Some(RunDecision::Quit));
    }
}
