use std::collections::{BTreeMap, VecDeque};

use tokio::time::Instant;

/// 60 seconds of history at the 500 ms sampling rate.
pub const HISTORY_CAPACITY: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Paused,
    Completed,
    Stopped,
}

impl RunStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Stopped)
    }
}

/// Fixed-capacity rolling window, oldest sample evicted first.
#[derive(Debug, Clone, Default)]
pub struct History {
    samples: VecDeque<f64>,
}

impl History {
    pub fn push(&mut self, sample: f64) {
        if self.samples.len() == HISTORY_CAPACITY {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub fn latest(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }
}

/// Single source of truth for an interactive run.
///
/// Mutated only by the controller in response to results, ticks, and
/// operator commands; the renderer only ever sees cloned snapshots.
#[derive(Debug, Clone)]
pub struct DashboardState {
    pub status: RunStatus,
    pub target: String,
    pub total_requests: u64,
    pub concurrency: usize,
    pub completed: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub start_time: Instant,
    /// All successful latencies in ms, unbounded for final percentiles.
    pub durations_ms: Vec<f64>,
    pub status_codes: BTreeMap<u16, u64>,
    pub rps_history: History,
    pub latency_history: History,
    pub last_rps_time: Instant,
    pub requests_since_last_rps: u64,
    /// Max latency seen since the previous tick; the chart samples max, not
    /// mean, so short-lived spikes stay visible.
    pub interval_max_latency_ms: f64,
}

impl DashboardState {
    #[must_use]
    pub fn new(target: String, total_requests: u64, concurrency: usize) -> Self {
        let now = Instant::now();
        Self {
            status: RunStatus::Running,
            target,
            total_requests,
            concurrency: concurrency.max(1),
            completed: 0,
            success_count: 0,
            error_count: 0,
            start_time: now,
            durations_ms: Vec::new(),
            status_codes: BTreeMap::new(),
            rps_history: History::default(),
            latency_history: History::default(),
            last_rps_time: now,
            requests_since_last_rps: 0,
            interval_max_latency_ms: 0.0,
        }
    }

    /// Zero every counter and history and restart the clocks. Does not touch
    /// `status` or `concurrency`.
    pub fn reset_counters(&mut self, now: Instant) {
        self.completed = 0;
        self.success_count = 0;
        self.error_count = 0;
        self.durations_ms.clear();
        self.status_codes.clear();
        self.rps_history.clear();
        self.latency_history.clear();
        self.start_time = now;
        self.last_rps_time = now;
        self.requests_since_last_rps = 0;
        self.interval_max_latency_ms = 0.0;
    }

    #[must_use]
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    #[must_use]
    pub fn avg_latency_ms(&self) -> f64 {
        if self.durations_ms.is_empty() {
            0.0
        } else {
            self.durations_ms.iter().sum::<f64>() / self.durations_ms.len() as f64
        }
    }

    #[must_use]
    pub fn overall_rps(&self) -> f64 {
        let elapsed = self.elapsed_secs();
        if elapsed > 0.0 {
            self.completed as f64 / elapsed
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_evicts_oldest_first_at_capacity() {
        let mut history = History::default();
        for sample in 0..150 {
            history.push(f64::from(sample));
        }
        assert_eq!(history.len(), HISTORY_CAPACITY);
        // 0..=29 evicted; the window starts at 30.
        assert_eq!(history.iter().next(), Some(30.0));
        assert_eq!(history.latest(), Some(149.0));
    }

    #[test]
    fn reset_zeroes_counters_but_keeps_status() {
        let mut state = DashboardState::new("http://localhost".to_owned(), 100, 10);
        state.status = RunStatus::Paused;
        state.completed = 42;
        state.durations_ms.push(12.0);
        state.rps_history.push(3.0);
        state.status_codes.insert(200, 42);

        state.reset_counters(Instant::now());

        assert_eq!(state.status, RunStatus::Paused);
        assert_eq!(state.completed, 0);
        assert!(state.durations_ms.is_empty());
        assert!(state.rps_history.is_empty());
        assert!(state.status_codes.is_empty());
    }

    #[test]
    fn concurrency_floor_is_one() {
        let state = DashboardState::new("http://localhost".to_owned(), 10, 0);
        assert_eq!(state.concurrency, 1);
    }
}
