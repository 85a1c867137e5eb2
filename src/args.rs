//! Command-line surface.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::executor::RequestConfig;
use crate::export::ExportFormat;
use crate::runner::LoadConfig;

#[derive(Debug, Parser, Clone)]
#[clap(
    version,
    about = "Async HTTP load tester with real-time stats and an interactive terminal dashboard."
)]
pub struct CliArgs {
    /// Target URL to load test
    pub url: String,

    /// Total number of requests to send
    #[arg(long = "requests", short = 'n', default_value = "200", value_parser = clap::value_parser!(u64).range(1..))]
    pub requests: u64,

    /// Number of concurrent requests per batch
    #[arg(long, short = 'c', default_value = "50", value_parser = clap::value_parser!(u64).range(1..))]
    pub concurrency: u64,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "30", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,

    /// Show the interactive dashboard instead of the plain progress bar
    #[arg(long)]
    pub tui: bool,

    /// Export results after the run (json or csv)
    #[arg(long)]
    pub export: Option<ExportFormat>,

    /// Write the export to this file instead of stdout
    #[arg(long, requires = "export")]
    pub output: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl CliArgs {
    #[must_use]
    pub fn load_config(&self) -> LoadConfig {
        LoadConfig {
            total_requests: self.requests,
            concurrency: self.concurrency as usize,
        }
    }

    #[must_use]
    pub fn request_config(&self) -> RequestConfig {
        RequestConfig {
            timeout: Duration::from_secs(self.timeout),
        }
    }
}
