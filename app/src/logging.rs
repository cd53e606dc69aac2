//! Tracing initialisation.
//! [Chinese] 日志初始化：RUST_LOG 优先，其次 --verbose，默认 info。
use crate::cli::LogFormat;
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

static TRACING: OnceLock<()> = OnceLock::new();

fn filter_directive(rust_log: Option<String>, verbose: bool) -> String {
    match rust_log {
        Some(f) if !f.trim().is_empty() => f,
        _ if verbose => "debug".into(),
        _ => "info".into(),
    }
}

/// Initialise once; later calls are no-ops. Logs go to stderr so stdout
/// stays machine-readable.
pub fn init_logging(verbose: bool, format: LogFormat) {
    TRACING.get_or_init(|| {
        let filter = filter_directive(std::env::var("RUST_LOG").ok(), verbose);
        let builder = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(filter))
            .with_writer(std::io::stderr)
            .with_target(false);
        let _ = match format {
            LogFormat::Json => builder.json().try_init(),
            LogFormat::Compact => builder.compact().try_init(),
        };
        tracing::debug!(json = format == LogFormat::Json, "tracing initialized");
    });
}
