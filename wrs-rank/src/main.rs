//! wrs-rank (Word Rank Service) - Main entry point
//!
//! Consumes a stream of JSON envelopes, ranks the words they contain and
//! serves the rankings over HTTP until SIGINT/SIGTERM, then drains and
//! reports final statistics.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wrs_common::config::{resolve_config_path, SourceKind, TomlConfig};
use wrs_common::{MemoryRankStore, RankStore};
use wrs_rank::ingest::source;
use wrs_rank::{log_config_source, Lifecycle};

/// Command-line arguments for wrs-rank
#[derive(Parser, Debug)]
#[command(name = "wrs-rank")]
#[command(about = "Live word frequency rankings over HTTP")]
#[command(version)]
struct Args {
    /// TOML configuration file (default: $WRS_CONFIG, then ~/.config/wrs/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server listen address
    #[arg(long, env = "WRS_LISTEN_ADDR")]
    listen_addr: Option<String>,

    /// Remote stream address (host:port)
    #[arg(long, env = "WRS_REMOTE_ADDR")]
    remote_addr: Option<String>,

    /// Read envelopes from standard input instead of TCP
    #[arg(long, conflicts_with = "remote_addr")]
    stdin: bool,
}

impl Args {
    /// Command-line and environment values override the TOML file
    fn apply(&self, config: &mut TomlConfig) {
        if let Some(addr) = &self.listen_addr {
            config.server.listen_addr = addr.clone();
        }
        if let Some(addr) = &self.remote_addr {
            config.source.kind = SourceKind::Tcp;
            config.source.addr = addr.clone();
        }
        if self.stdin {
            config.source.kind = SourceKind::Stdin;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let mut config =
        TomlConfig::load(config_path.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut config);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting WRS Word Rank Service (wrs-rank) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    // Loading ran before the subscriber existed; report its outcome now
    log_config_source(config_path.as_deref());

    let source = source::connect(&config.source)
        .await
        .context("Failed to open message stream")?;

    let store: Arc<dyn RankStore> = Arc::new(MemoryRankStore::new());
    info!("Rank store backend: {}", store.name());

    let lifecycle = Lifecycle::new(&config, source, store);

    let listener = TcpListener::bind(&config.server.listen_addr)
        .await
        .with_context(|| format!("Could not listen on {}", config.server.listen_addr))?;

    let report = lifecycle
        .run(listener, shutdown_signal())
        .await
        .context("Shutdown did not complete cleanly")?;

    info!("Server stopped ({} events ingested)", report.total_events);
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
