//! clash-merge entrypoint
//! - tracing init
//! - subscription fetch / local inputs
//! - merge, assemble, write-if-changed, JSON summary

use anyhow::Result;
use app::{cli, logging, pipeline};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();
    logging::init_logging(args.verbose, args.log_format);

    let summary = match pipeline::run(&args).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "merge run failed");
            return Err(e);
        }
    };
    let line = serde_json::to_string_pretty(&summary.to_json())?;
    if summary.dry_run {
        // stdout already carries the document
        eprintln!("{line}");
    } else {
        println!("{line}");
    }
    Ok(())
}
