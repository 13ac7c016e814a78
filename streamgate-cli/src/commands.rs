//! CLI command implementations

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Subcommand;
use streamgate_core::config::MalformedRangePolicy;
use streamgate_core::telegram::{BotApiClient, TelegramBackend, UpdatePoller};
use streamgate_core::{
    ChunkedFetcher, GatewayConfig, InMemoryMetadataStore, Ingestor, RuntimeMode, StorageBackend,
};
use streamgate_sim::{InMemoryBackend, seed_directory};
use streamgate_web::{AppState, run_server};
use tokio::sync::watch;
use tracing::{info, warn};

/// Available CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Start the streaming server
    Serve {
        /// Host to bind to (overrides STREAMGATE_HOST)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides PORT / STREAMGATE_PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Runtime mode (production or development)
        #[arg(long, default_value = "development")]
        mode: RuntimeMode,

        /// Directory of files to serve (development mode only)
        #[arg(long)]
        files_dir: Option<PathBuf>,

        /// Public base URL used in links (overrides STREAMGATE_PUBLIC_URL)
        #[arg(long)]
        public_url: Option<String>,

        /// Answer malformed Range headers with 400 instead of the whole file
        #[arg(long)]
        strict_ranges: bool,
    },

    /// Show the effective configuration and check it for a mode
    Config {
        /// Runtime mode to validate against
        #[arg(long, default_value = "development")]
        mode: RuntimeMode,
    },
}

/// Options for `serve` after CLI parsing.
struct ServeOptions {
    host: Option<String>,
    port: Option<u16>,
    mode: RuntimeMode,
    files_dir: Option<PathBuf>,
    public_url: Option<String>,
    strict_ranges: bool,
}

/// Dispatches a parsed command.
///
/// # Errors
/// - Invalid configuration for the selected mode
/// - Server bind or runtime failures
pub async fn handle_command(command: Commands) -> Result<()> {
    match command {
        Commands::Serve {
            host,
            port,
            mode,
            files_dir,
            public_url,
            strict_ranges,
        } => {
            serve(ServeOptions {
                host,
                port,
                mode,
                files_dir,
                public_url,
                strict_ranges,
            })
            .await
        }
        Commands::Config { mode } => show_config(mode),
    }
}

fn resolve_config(options: &ServeOptions) -> GatewayConfig {
    let mut config = GatewayConfig::from_env();
    if let Some(host) = &options.host {
        config.server.host = host.clone();
    }
    if let Some(port) = options.port {
        config.server.port = port;
    }
    if let Some(url) = &options.public_url {
        config.server.public_base_url = Some(url.clone());
    }
    if options.strict_ranges {
        config.streaming.malformed_range = MalformedRangePolicy::Reject;
    }
    config
}

async fn serve(options: ServeOptions) -> Result<()> {
    let config = resolve_config(&options);
    config.validate(options.mode)?;

    let store = Arc::new(InMemoryMetadataStore::new());
    let ingestor = Ingestor::new(store.clone(), config.server.public_base_url());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut poller_task = None;
    let backend: Arc<dyn StorageBackend> = match options.mode {
        RuntimeMode::Production => {
            if options.files_dir.is_some() {
                warn!("--files-dir is ignored in production mode");
            }
            let channel_id = config
                .telegram
                .storage_channel_id
                .context("storage channel id is required in production mode")?;
            let client = BotApiClient::new(&config.telegram)?;

            let poller = UpdatePoller::new(client.clone(), ingestor, channel_id);
            poller_task = Some(tokio::spawn(poller.run(shutdown_signal(shutdown_rx.clone()))));

            Arc::new(TelegramBackend::new(client))
        }
        RuntimeMode::Development => {
            let backend = Arc::new(InMemoryBackend::new());
            if let Some(dir) = &options.files_dir {
                let receipts = seed_directory(dir, &ingestor, &backend)
                    .await
                    .with_context(|| format!("failed to seed {}", dir.display()))?;
                for receipt in &receipts {
                    info!(name = %receipt.display_name, url = %receipt.view_url, "Serving file");
                }
            } else {
                warn!("No --files-dir given; the development library is empty");
            }
            backend
        }
    };

    let fetcher = ChunkedFetcher::new(backend, &config.streaming);
    let state = AppState::new(store, fetcher, &config.streaming);

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            return;
        }
        info!("Shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    info!(mode = %options.mode, public_url = %config.server.public_base_url(), "Starting Streamgate");
    run_server(state, &config.server, shutdown_signal(shutdown_rx)).await?;

    if let Some(task) = poller_task {
        task.await.context("update poller panicked")?;
    }
    Ok(())
}

/// Resolves once shutdown has been requested or the sender is gone.
async fn shutdown_signal(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stopped| *stopped).await;
}

fn show_config(mode: RuntimeMode) -> Result<()> {
    let config = GatewayConfig::from_env();

    println!("mode:             {mode}");
    println!("listen:           {}:{}", config.server.host, config.server.port);
    println!("public url:       {}", config.server.public_base_url());
    println!("shutdown grace:   {:?}", config.server.shutdown_grace);
    println!("chunk size:       {} bytes", config.streaming.chunk_size);
    println!("backend timeout:  {:?}", config.streaming.backend_timeout);
    println!("malformed ranges: {:?}", config.streaming.malformed_range);
    println!("download limit:   {} bytes", config.telegram.max_download_bytes);
    println!(
        "bot token:        {}",
        if config.telegram.bot_token.is_some() { "set" } else { "not set" }
    );
    println!(
        "storage channel:  {}",
        config
            .telegram
            .storage_channel_id
            .map_or_else(|| "not set".to_string(), |id| id.to_string())
    );

    config.validate(mode)?;
    println!("configuration is valid for {mode}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_win() {
        let options = ServeOptions {
            host: Some("127.0.0.1".to_string()),
            port: Some(9000),
            mode: RuntimeMode::Development,
            files_dir: None,
            public_url: Some("https://media.example.org".to_string()),
            strict_ranges: true,
        };

        let config = resolve_config(&options);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.public_base_url(), "https://media.example.org");
        assert_eq!(config.streaming.malformed_range, MalformedRangePolicy::Reject);
    }
}
