//! Donation Log Server
//!
//! A headless engine that turns clan donation snapshots into deduplicated
//! event records and live channel notifications.

mod config;
mod server;
mod shutdown;
mod sink;
mod state;

use clap::Parser;
use config::{get_database_url, ConfigLoader};
use donlog_core::db;
use donlog_core::events::{recorded_tick_channel, snapshot_batch_channel};
use donlog_core::processors::{BroadcastConfig, BroadcastRouter, SnapshotIngestor};
use donlog_core::recorder::EventRecorder;
use donlog_core::season::SeasonClock;
use server::{build_router, run_server};
use sink::WebhookSink;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Donation Log - clan donation delta and event engine
#[derive(Parser, Debug)]
#[command(name = "donlog-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./donlog-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();

    tracing::info!("Starting donlog-server v{}", env!("CARGO_PKG_VERSION"));

    let config_loader = ConfigLoader::new(&args.config, args.listen);
    let config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    let listen_addr = config.server.listen;
    tracing::info!("Configuration loaded from {:?}", args.config);

    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;

    tracing::info!("Connecting to database...");
    let db_pool = db::connect(&database_url, 10).await.map_err(|e| {
        tracing::error!("Failed to connect to database: {}", e);
        e
    })?;
    db::init_schema(&db_pool).await?;
    tracing::info!("Database connection established");

    // Processor plumbing
    let (batch_tx, batch_rx) = snapshot_batch_channel();
    let (tick_tx, tick_rx) = recorded_tick_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let recorder = EventRecorder::new(db_pool.clone(), config.engine.decrease_policy);
    let clock = SeasonClock::new(db_pool.clone());
    let ingestor = SnapshotIngestor::new(
        recorder,
        clock,
        batch_rx,
        tick_tx,
        shutdown_rx.clone(),
    );
    let ingestor_handle = tokio::spawn(ingestor.run());

    let webhook_sink = WebhookSink::new(
        config.sink.endpoint.clone(),
        std::time::Duration::from_secs(config.sink.timeout_secs),
    );
    let router_config = BroadcastConfig {
        poll_limit: config.engine.broadcast_poll_limit,
        max_attempts: config.engine.max_delivery_attempts,
        sweep_interval: std::time::Duration::from_secs(config.engine.broadcast_interval_secs),
    };
    let broadcast = BroadcastRouter::new(db_pool.clone(), webhook_sink, router_config);
    let broadcast_handle = tokio::spawn(broadcast.run(tick_rx, shutdown_rx));

    // HTTP surface
    let state = AppState::new(db_pool.clone(), batch_tx);
    let router = build_router(state);

    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr).await;

    // Stop the processors and wait for them to drain.
    let _ = shutdown_tx.send(true);
    let _ = ingestor_handle.await;
    let _ = broadcast_handle.await;

    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
