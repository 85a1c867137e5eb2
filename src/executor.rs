//! The seam between the dispatch loop and whatever performs one request.
//!
//! The engine never inspects how a request is built or sent; it only consumes
//! the outcome. Cancellation is a dedicated variant rather than an error
//! message to sniff, so the dispatcher can drop aborted attempts without
//! counting them as failures.

use std::time::Duration;

use async_trait::async_trait;

use crate::cancel::CancelSignal;

/// One settled request that reached the network.
#[derive(Debug, Clone)]
pub struct RequestOutcome {
    pub status: u16,
    pub duration_ms: f64,
    pub size: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    /// Aborted by an operator pause/stop. Excluded from all statistics.
    #[error("request cancelled")]
    Cancelled,
    /// A genuine transport/timeout failure. Counted as a failed request.
    #[error("{0}")]
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout: Duration,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

#[async_trait]
pub trait RequestExecutor: Send + Sync {
    /// Perform a single request against `target`.
    ///
    /// # Errors
    ///
    /// Returns [`ExecuteError::Cancelled`] if `cancel` fires before the
    /// request settles, and [`ExecuteError::Failed`] for transport or
    /// timeout failures.
    async fn execute(
        &self,
        target: &str,
        config: &RequestConfig,
        cancel: Option<CancelSignal>,
    ) -> Result<RequestOutcome, ExecuteError>;
}
