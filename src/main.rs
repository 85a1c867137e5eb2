use std::io::IsTerminal;
use std::sync::Arc;

use clap::Parser;
use tracing::warn;

use curload::args::CliArgs;
use curload::dashboard::DashboardReporter;
use curload::error::AppResult;
use curload::executor::RequestExecutor;
use curload::export::export_results;
use curload::http::HttpExecutor;
use curload::logger::init_logging;
use curload::reporter::{ProgressReporter, Reporter};
use curload::runner::run_load_test;
use curload::summary::print_summary;

#[tokio::main]
async fn main() -> AppResult<()> {
    let args = CliArgs::parse();
    init_logging(args.verbose);

    let load = args.load_config();
    let request_config = args.request_config();
    let executor: Arc<dyn RequestExecutor> = Arc::new(HttpExecutor::new()?);

    let dashboard = args.tui && std::io::stdout().is_terminal();
    if args.tui && !dashboard {
        warn!("stdout is not a terminal; falling back to the plain progress bar");
    }

    let reporter: Box<dyn Reporter> = if dashboard {
        Box::new(DashboardReporter::start(
            args.url.clone(),
            load.total_requests,
            load.concurrency,
        ))
    } else {
        Box::new(ProgressReporter::new(load.total_requests, load.concurrency))
    };

    let report = run_load_test(
        executor,
        &args.url,
        &request_config,
        load,
        reporter.as_ref(),
    )
    .await;
    let stats = report.stats.snapshot();

    // The progress reporter prints this itself in on_complete; after the
    // dashboard exits the alternate screen, nothing is on the terminal yet.
    if dashboard {
        print_summary(&stats, report.duration_secs);
    }

    if let Some(format) = args.export {
        if let Err(err) =
            export_results(&stats, report.duration_secs, format, args.output.as_deref()).await
        {
            warn!("export failed: {err}; results are shown in the summary above");
        }
    }

    Ok(())
}
