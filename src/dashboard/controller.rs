//! Interactive run state machine.
//!
//! The controller owns [`DashboardState`] behind a mutex and is the only
//! writer. Every mutation publishes a cloned snapshot on a watch channel for
//! the renderer, and status transitions go out on a second watch channel that
//! the reporter blocks on while paused or waiting for a repeat-or-quit
//! decision. Illegal transitions (resume while running, repeat mid-run) are
//! no-ops.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use crate::cancel::{CancelSignal, CancelSource};
use crate::stats::RequestResult;

use super::state::{DashboardState, RunStatus};

/// Wall-clock period of the history sampler.
pub const TICK_INTERVAL: Duration = Duration::from_millis(500);

pub struct DashboardController {
    state: Mutex<DashboardState>,
    updates: watch::Sender<DashboardState>,
    status_tx: watch::Sender<RunStatus>,
    cancel: Mutex<CancelSource>,
    timer_active: watch::Sender<bool>,
    shutdown: watch::Sender<bool>,
}

impl DashboardController {
    #[must_use]
    pub fn new(target: String, total_requests: u64, concurrency: usize) -> Arc<Self> {
        let state = DashboardState::new(target, total_requests, concurrency);
        let (updates, _) = watch::channel(state.clone());
        let (status_tx, _) = watch::channel(state.status);
        let (timer_active, _) = watch::channel(true);
        let (shutdown, _) = watch::channel(false);

        Arc::new(Self {
            state: Mutex::new(state),
            updates,
            status_tx,
            cancel: Mutex::new(CancelSource::new()),
            timer_active,
            shutdown,
        })
    }

    #[must_use]
    pub fn subscribe_updates(&self) -> watch::Receiver<DashboardState> {
        self.updates.subscribe()
    }

    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<RunStatus> {
        self.status_tx.subscribe()
    }

    #[must_use]
    pub fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    #[must_use]
    pub fn status(&self) -> RunStatus {
        self.state
            .lock()
            .map_or(RunStatus::Stopped, |state| state.status)
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.state.lock().map_or(1, |state| state.concurrency)
    }

    /// Copy-on-read snapshot for anything outside the controller.
    #[must_use]
    pub fn snapshot(&self) -> Option<DashboardState> {
        self.state.lock().ok().map(|state| state.clone())
    }

    #[must_use]
    pub fn cancel_signal(&self) -> Option<CancelSignal> {
        self.cancel.lock().ok().map(|source| source.signal())
    }

    /// Abort the in-flight scope and immediately re-arm a fresh source so the
    /// next batch is dispatchable.
    fn abort_in_flight(&self) {
        if let Ok(mut source) = self.cancel.lock() {
            source.abort();
            *source = CancelSource::new();
        }
    }

    /// Record a completed request. No-op while paused or stopped, which
    /// protects against stray completions from requests that were mid-flight
    /// at the moment of a transition.
    pub fn record_result(&self, result: &RequestResult) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if matches!(state.status, RunStatus::Paused | RunStatus::Stopped) {
            return;
        }

        state.completed += 1;
        state.requests_since_last_rps += 1;

        let success = result.error.is_none() && result.status < 400;
        if success {
            state.success_count += 1;
        } else {
            state.error_count += 1;
        }

        if result.error.is_none() {
            state.durations_ms.push(result.duration_ms);
            if result.duration_ms > state.interval_max_latency_ms {
                state.interval_max_latency_ms = result.duration_ms;
            }
        }

        if result.status != 0 {
            *state.status_codes.entry(result.status).or_insert(0) += 1;
        }

        self.publish(&state);
    }

    /// Periodic history sample: requests/sec since the previous tick, and the
    /// max latency observed in the interval.
    pub fn tick(&self) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };

        let now = Instant::now();
        let elapsed = now.duration_since(state.last_rps_time).as_secs_f64();
        if elapsed < 0.5 {
            return;
        }

        let rps = state.requests_since_last_rps as f64 / elapsed;
        state.rps_history.push(rps);
        let interval_max = state.interval_max_latency_ms;
        state.latency_history.push(interval_max);

        state.last_rps_time = now;
        state.requests_since_last_rps = 0;
        state.interval_max_latency_ms = 0.0;

        self.publish(&state);
    }

    /// `running -> paused`. Cancels in-flight requests.
    pub fn pause(&self) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if state.status != RunStatus::Running {
            return;
        }
        state.status = RunStatus::Paused;
        debug!("Load test paused");
        self.abort_in_flight();
        self.publish(&state);
    }

    /// `paused -> running`.
    pub fn resume(&self) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if state.status != RunStatus::Paused {
            return;
        }
        state.status = RunStatus::Running;
        debug!("Load test resumed");
        self.publish(&state);
    }

    /// Terminal. Cancels in-flight requests and stops the history timer.
    /// Also legal from `completed`, where it resolves the repeat-or-quit
    /// wait to "quit".
    pub fn stop(&self) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if state.status == RunStatus::Stopped {
            return;
        }
        state.status = RunStatus::Stopped;
        debug!("Load test stopped");
        self.abort_in_flight();
        drop(self.timer_active.send(false));
        self.publish(&state);
    }

    /// Driver-invoked once all requests finish.
    pub fn complete(&self) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if state.status.is_terminal() {
            return;
        }
        state.status = RunStatus::Completed;
        drop(self.timer_active.send(false));
        self.publish(&state);
    }

    /// Clamped at a floor of 1; legal in every state, takes effect at the
    /// next batch boundary.
    pub fn adjust_concurrency(&self, delta: i64) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        let current = i64::try_from(state.concurrency).unwrap_or(i64::MAX);
        state.concurrency = usize::try_from(current.saturating_add(delta).max(1)).unwrap_or(1);
        self.publish(&state);
    }

    /// Zero the counters and histories without touching `status`.
    pub fn reset_stats(&self) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        state.reset_counters(Instant::now());
        self.publish(&state);
    }

    /// `completed -> running`: full reinitialization plus a fresh cancel
    /// source and a restarted history timer. The only way out of `completed`.
    pub fn repeat(&self) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if state.status != RunStatus::Completed {
            return;
        }
        state.reset_counters(Instant::now());
        state.status = RunStatus::Running;
        if let Ok(mut source) = self.cancel.lock() {
            *source = CancelSource::new();
        }
        drop(self.timer_active.send(true));
        debug!("Load test repeating");
        self.publish(&state);
    }

    /// End the renderer, input, and tick tasks.
    pub fn shutdown(&self) {
        drop(self.timer_active.send(false));
        drop(self.shutdown.send(true));
    }

    fn publish(&self, state: &DashboardState) {
        drop(self.updates.send(state.clone()));
        drop(self.status_tx.send(state.status));
    }

    /// Background task sampling the rolling histories every 500 ms while the
    /// timer is active.
    #[must_use]
    pub fn spawn_tick_task(self: &Arc<Self>) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        let mut active_rx = self.timer_active.subscribe();
        let mut shutdown_rx = self.shutdown.subscribe();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                if *shutdown_rx.borrow_and_update() {
                    break;
                }
                if *active_rx.borrow_and_update() {
                    tokio::select! {
                        _ = interval.tick() => controller.tick(),
                        res = active_rx.changed() => {
                            if res.is_err() {
                                break;
                            }
                        }
                        _ = shutdown_rx.changed() => {}
                    }
                } else {
                    tokio::select! {
                        res = active_rx.changed() => {
                            if res.is_err() {
                                break;
                            }
                        }
                        _ = shutdown_rx.changed() => {}
                    }
                }
            }
        })
    }
}
