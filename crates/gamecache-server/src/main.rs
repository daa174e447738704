//! gamecache server - hosts the offline worker in front of the game portal.
//!
//! Every request that reaches the server is offered to the worker first;
//! whatever the worker doesn't claim goes straight to the network.

mod handler;
mod server;

use anyhow::Result;
use clap::Parser;
use gamecache::{HttpFetcher, OfflineWorker, WorkerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "gamecache-server")]
#[command(about = "Offline-caching server for the game portal")]
struct Args {
    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value = "0")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Portal origin (overrides the config file)
    #[arg(long)]
    origin: Option<Url>,

    /// Worker configuration JSON file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Keep caches in this SQLite file instead of memory
    #[arg(long)]
    sqlite: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("Starting gamecache server");

    let mut config = match &args.config {
        Some(path) => WorkerConfig::load(path)?,
        None => WorkerConfig::default(),
    };
    if let Some(origin) = args.origin {
        config.origin = origin;
    }
    info!("Portal origin: {}", config.origin);

    let mut builder = OfflineWorker::builder(config.clone());
    if let Some(path) = &args.sqlite {
        builder = builder.with_sqlite_path(path);
    }
    let worker = Arc::new(builder.build()?);
    let upstream = Arc::new(HttpFetcher::with_timeout(config.request_timeout())?);

    let report = worker.start().await?;
    info!(
        "Worker {:?}: {} API entries and {} images precached",
        worker.state(),
        report.precache.api_cached,
        report.precache.images_cached
    );

    let addr = server::start_server(worker, upstream, &args.host, args.port).await?;

    // Print the port for the launching process to read.
    println!("GAMECACHE_PORT={}", addr.port());

    info!("gamecache server running on {}", addr);

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");

    Ok(())
}
