//! The seam between the dispatch loop and how progress is surfaced.
//!
//! The loop is identical whether or not a human is watching: it only ever
//! talks to a [`Reporter`]. The plain implementation draws a single progress
//! line; the dashboard implementation owns the interactive state machine.

mod progress;

pub use progress::ProgressReporter;

use async_trait::async_trait;

use crate::cancel::CancelSignal;
use crate::stats::{RequestResult, StatsSnapshot};

/// What to do once a run cycle finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunDecision {
    Quit,
    /// Start over with a brand-new stats collector, same reporter.
    Repeat,
}

#[async_trait]
pub trait Reporter: Send + Sync {
    /// Whether the dispatcher may launch another batch. The dashboard
    /// implementation suspends here while paused instead of spinning.
    async fn should_continue(&self) -> bool;

    /// Current desired concurrency; may change between batches.
    fn concurrency(&self) -> usize;

    /// Signal used to abort in-flight requests on pause/stop, when the
    /// reporter supports cancellation at all.
    fn cancel_signal(&self) -> Option<CancelSignal> {
        None
    }

    fn on_result(&self, result: &RequestResult);

    fn on_batch_complete(&self, completed: u64, total: u64);

    /// Finalize a run cycle: print a summary or wait for an operator
    /// decision, then say whether to repeat.
    async fn on_complete(&self, stats: &StatsSnapshot, duration_secs: f64) -> RunDecision;

    /// Tear down whatever the reporter set up (terminal modes, background
    /// tasks). Called once, after the final `on_complete`.
    async fn cleanup(&self);
}
