//! Command-line arguments.
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "clash-merge", version)]
#[command(about = "Merge proxy subscriptions into a single rule-based client configuration")]
pub struct Args {
    /// Subscription list, one `FILENAME | URL` per line
    #[arg(short = 'c', long = "config", default_value = "subscriptions.conf")]
    pub config: PathBuf,

    /// Directory for the merged document
    #[arg(short = 'o', long = "output-dir", default_value = "merged-yamls")]
    pub output_dir: PathBuf,

    /// File name of the merged document
    #[arg(short = 'f', long = "output-name", default_value = "merged.yaml")]
    pub output_name: String,

    /// Directory where raw downloaded payloads are kept
    #[arg(short = 'd', long = "download-dir", default_value = "sub-yamls")]
    pub download_dir: PathBuf,

    /// Merge local payload files instead of downloading (repeatable)
    #[arg(short = 'i', long = "input", value_name = "FILE")]
    pub input: Vec<PathBuf>,

    /// Print the document to stdout instead of writing it
    #[arg(short = 'n', long = "dry-run")]
    pub dry_run: bool,

    /// Debug-level logging (ignored when RUST_LOG is set)
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    #[arg(long = "log-format", value_enum, env = "CM_LOG_FORMAT", default_value = "compact")]
    pub log_format: LogFormat,

    /// Per-request timeout in seconds
    #[arg(long = "timeout", default_value_t = 30)]
    pub timeout: u64,

    /// Extra attempts on transient fetch failures
    #[arg(long = "retries", default_value_t = 3)]
    pub retries: u32,
}

impl Args {
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_name)
    }
}
