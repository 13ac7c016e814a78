//! Streamgate CLI - Command-line interface
//!
//! Runs the streaming gateway in production (Telegram) or development
//! (local directory) mode.

mod commands;

use std::path::PathBuf;

use clap::Parser;
use streamgate_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "streamgate")]
#[command(about = "Range-aware HTTP streaming for files stored in a Telegram channel")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: commands::Commands,

    /// Console log level (RUST_LOG overrides)
    #[arg(long, global = true, value_enum, default_value_t)]
    log_level: CliLogLevel,

    /// Directory for the full trace log of this run
    #[arg(long, global = true)]
    logs_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.into(), cli.logs_dir.as_deref())?;

    commands::handle_command(cli.command).await
}
