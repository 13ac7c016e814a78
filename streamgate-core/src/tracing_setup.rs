//! Tracing setup for Streamgate
//!
//! Console output at an operator-chosen level, plus a full trace of the last
//! run on disk. Per-request stream outcomes (completed, aborted, backend
//! failure after headers) are logged at debug and warn, so the file log is
//! where truncated responses get diagnosed.

use std::fs::{File, create_dir_all};
use std::path::{Path, PathBuf};

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Name of the per-run log file inside the logs directory.
pub const LOG_FILE_NAME: &str = "streamgate-last-run.log";

/// Console filter directives for `level`.
///
/// HTTP client internals are capped at warn so request logs stay readable.
pub fn console_directives(level: Level) -> String {
    format!("{level},hyper=warn,hyper_util=warn,reqwest=warn,h2=warn")
}

/// Initialize tracing with console output at `console_level` and a trace
/// level log file.
///
/// `RUST_LOG`, when set, replaces the console filter. The file at
/// `<logs_dir>/streamgate-last-run.log` is truncated on every start.
/// Returns the log file path.
///
/// # Errors
///
/// - `std::io::Error` - If the logs directory or log file cannot be created
pub fn init_tracing(console_level: Level, logs_dir: Option<&Path>) -> std::io::Result<PathBuf> {
    let logs_path = logs_dir.unwrap_or_else(|| Path::new("logs"));
    create_dir_all(logs_path)?;

    let log_file_path = logs_path.join(LOG_FILE_NAME);
    let log_file = File::create(&log_file_path)?;

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_directives(console_level)));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_filter(console_filter);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(log_file)
        .with_filter(EnvFilter::new("trace,hyper=debug,h2=info"));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::info!(
        console = %console_level,
        log_file = %log_file_path.display(),
        "Tracing initialized"
    );

    Ok(log_file_path)
}

/// Console verbosity selectable with `--log-level`.
///
/// Parsing and naming come from [`clap::ValueEnum`], so the accepted names
/// are exactly the lowercase variant names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CliLogLevel {
    Error,
    Warn,
    /// Startup, ingest and request summaries
    #[default]
    Info,
    /// Per-stream lifecycle events
    Debug,
    /// Per-chunk fetch progress
    Trace,
}

impl From<CliLogLevel> for Level {
    fn from(level: CliLogLevel) -> Self {
        match level {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_names() {
        use clap::ValueEnum;

        assert_eq!(
            CliLogLevel::from_str("DEBUG", true),
            Ok(CliLogLevel::Debug)
        );
        assert!(CliLogLevel::from_str("verbose", true).is_err());
        assert_eq!(Level::from(CliLogLevel::default()), Level::INFO);
        assert_eq!(Level::from(CliLogLevel::Trace), Level::TRACE);
    }

    #[test]
    fn test_console_directives_parse() {
        let directives = console_directives(Level::DEBUG);
        assert!(directives.starts_with("DEBUG,"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }
}
