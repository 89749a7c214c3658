//! Sea Here - sea creature fact cards from the terminal
//!
//! Looks species up in the local cache, then the remote API, then the dataset
//! bundled into the binary, so every command works without a network.

use std::io;
use std::sync::Arc;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use seahere::announce::LogAnnouncer;
use seahere::app::App;
use seahere::cache::CacheEngine;
use seahere::cli::{log_filter, Cli, StartupConfig};
use seahere::data::{BundledDataset, HttpTransport, OfflineTransport, Transport};
use seahere::repository::Repository;
use seahere::store::FileStore;

/// Installs the stderr log subscriber; `RUST_LOG` overrides `--verbose`
fn init_tracing(verbose: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| log_filter(verbose).into()),
        )
        .with_writer(io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = StartupConfig::from_cli(&cli)?;
    init_tracing(config.verbose);
    debug!(
        api_base = %config.api_base,
        cache_dir = %config.cache_dir.display(),
        offline = config.offline,
        retry_wait = ?config.worst_case_retry_wait(),
        "Starting"
    );

    // A broken bundled dataset means there is no offline fallback at all
    let dataset = Arc::new(BundledDataset::load()?);

    let store = Arc::new(FileStore::with_dir(config.cache_dir.clone()));
    let cache = CacheEngine::new(store);

    let transport: Arc<dyn Transport> = if config.offline {
        Arc::new(OfflineTransport)
    } else {
        Arc::new(HttpTransport::new(config.api_base.clone()))
    };

    let repository = Repository::new(cache, transport, dataset).with_backoff(config.backoff);
    let announcer = LogAnnouncer;
    let app = App::new(&repository, &announcer, config.max_entries);

    let mut stdout = io::stdout().lock();
    app.run(&config.command, &mut stdout).await?;
    app.maintain().await;

    Ok(())
}
