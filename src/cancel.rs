//! Request-scoped cancellation.
//!
//! A [`CancelSource`] covers the requests currently in flight; aborting it
//! fires every [`CancelSignal`] cloned from it. The dashboard re-arms a fresh
//! source immediately after an abort so the next batch is dispatchable, which
//! keeps cancellation scoped to exactly the in-flight attempts.

use tokio::sync::watch;

#[derive(Debug)]
pub struct CancelSource {
    tx: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
}

#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSource {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx, rx }
    }

    #[must_use]
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.rx.clone(),
        }
    }

    /// Fire the signal for every clone handed out so far.
    pub fn abort(&self) {
        drop(self.tx.send(true));
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelSignal {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the owning source aborts. Never resolves if the source
    /// is dropped without aborting.
    pub async fn cancelled(&mut self) {
        if *self.rx.borrow_and_update() {
            return;
        }
        loop {
            if self.rx.changed().await.is_err() {
                // Source dropped without aborting; park forever so callers
                // racing this future against real work are not woken.
                std::future::pending::<()>().await;
            }
            if *self.rx.borrow_and_update() {
                return;
            }
        }
    }
}
