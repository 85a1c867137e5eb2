use std::io::{IsTerminal, Write};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use crossterm::{
    cursor, queue,
    style::Print,
    terminal::{Clear, ClearType},
};

use crate::stats::{RequestResult, StatsSnapshot};
use crate::summary::print_summary;

use super::{Reporter, RunDecision};

const BAR_WIDTH: usize = 20;
const FILLED: &str = "█";
const EMPTY: &str = "░";

/// Non-interactive reporter: a single `[████░░░░] 50/100` line on stderr,
/// redrawn per batch and only when stderr is a terminal, so piped output
/// stays clean.
pub struct ProgressReporter {
    total: u64,
    concurrency: usize,
    completed: AtomicU64,
    success_count: AtomicU64,
    error_count: AtomicU64,
    interactive: bool,
}

impl ProgressReporter {
    #[must_use]
    pub fn new(total: u64, concurrency: usize) -> Self {
        Self {
            total,
            concurrency,
            completed: AtomicU64::new(0),
            success_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            interactive: std::io::stderr().is_terminal(),
        }
    }

    fn render(&self) {
        let completed = self.completed.load(Ordering::Relaxed);
        let progress = if self.total > 0 {
            completed as f64 / self.total as f64
        } else {
            0.0
        };
        let filled = ((progress * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);

        let line = format!(
            "[{}{}] {}/{}",
            FILLED.repeat(filled),
            EMPTY.repeat(BAR_WIDTH - filled),
            completed,
            self.total
        );

        let mut out = std::io::stderr();
        if queue!(
            out,
            cursor::MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print(line)
        )
        .is_err()
        {
            return;
        }
        out.flush().ok();
    }

    fn finish(&self) {
        let mut out = std::io::stderr();
        if queue!(out, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine)).is_err() {
            return;
        }
        out.flush().ok();
    }
}

#[async_trait]
impl Reporter for ProgressReporter {
    async fn should_continue(&self) -> bool {
        true
    }

    fn concurrency(&self) -> usize {
        self.concurrency
    }

    fn on_result(&self, result: &RequestResult) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        let success = result.error.is_none() && (200..400).contains(&result.status);
        if success {
            self.success_count.fetch_add(1, Ordering::Relaxed);
        } else {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn on_batch_complete(&self, _completed: u64, _total: u64) {
        if self.interactive {
            self.render();
        }
    }

    async fn on_complete(&self, stats: &StatsSnapshot, duration_secs: f64) -> RunDecision {
        if self.interactive {
            self.finish();
        }
        print_summary(stats, duration_secs);
        RunDecision::Quit
    }

    async fn cleanup(&self) {}
}
