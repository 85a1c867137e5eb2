//! [`RequestExecutor`] backed by `reqwest`.

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;

use crate::cancel::CancelSignal;
use crate::error::AppResult;
use crate::executor::{ExecuteError, RequestConfig, RequestExecutor, RequestOutcome};

pub struct HttpExecutor {
    client: reqwest::Client,
}

impl HttpExecutor {
    /// # Errors
    ///
    /// Returns an error if the underlying TLS backend cannot be initialized.
    pub fn new() -> AppResult<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client })
    }

    async fn send(
        &self,
        target: &str,
        config: &RequestConfig,
    ) -> Result<RequestOutcome, ExecuteError> {
        let start = Instant::now();
        let response = self
            .client
            .get(target)
            .timeout(config.timeout)
            .send()
            .await
            .map_err(failure)?;
        let status = response.status().as_u16();
        // Timing covers the full body download, not just the headers.
        let body = response.bytes().await.map_err(failure)?;
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        debug!("{} {} in {:.1}ms", status, target, duration_ms);
        Ok(RequestOutcome {
            status,
            duration_ms,
            size: format_size(body.len()),
        })
    }
}

#[async_trait]
impl RequestExecutor for HttpExecutor {
    async fn execute(
        &self,
        target: &str,
        config: &RequestConfig,
        cancel: Option<CancelSignal>,
    ) -> Result<RequestOutcome, ExecuteError> {
        match cancel {
            Some(mut signal) => tokio::select! {
                () = signal.cancelled() => Err(ExecuteError::Cancelled),
                outcome = self.send(target, config) => outcome,
            },
            None => self.send(target, config).await,
        }
    }
}

fn failure(err: reqwest::Error) -> ExecuteError {
    if err.is_timeout() {
        ExecuteError::Failed("request timed out".to_owned())
    } else if err.is_connect() {
        ExecuteError::Failed(format!("connection failed: {err}"))
    } else {
        ExecuteError::Failed(err.to_string())
    }
}

/// Human-readable body size, `512 B` / `1.5 KB` / `2.3 MB`.
#[must_use]
pub fn format_size(bytes: usize) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}
