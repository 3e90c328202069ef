//! cloudfeed CLI: replay an NDJSON changefeed from stdin into cloud storage.

use std::process::ExitCode;

use clap::Parser;
use tracing::info;

use cloudfeed::{CliArgs, init_tracing, run};

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args = CliArgs::parse();
    info!("Loading config from {}", args.config.display());

    match run(args).await {
        Ok(stats) => {
            info!(
                rows = stats.rows,
                resolved = stats.resolved,
                "Replay complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Replay failed: {e}");
            ExitCode::FAILURE
        }
    }
}
