// exporter/src/main.rs

//! Telemetry exporter binary.
//!
//! This binary wires up the `telemetry` crate:
//!
//! - loads the exporter configuration (JSON file + CLI overrides),
//! - serves Prometheus metrics on `/metrics`,
//! - connects to the telemetry feed and dispatches every batch,
//! - serves `GET /health` with the feed connection state.

mod config;
mod routes;
mod state;

use std::sync::Arc;

use axum::{Router, routing::get};
use clap::Parser;
use tokio::signal;
use tokio::sync::Mutex;

use telemetry::{DefaultDispatcher, FeedClient, MetricsRegistry, run_prometheus_http_server};
use config::Cli;
use routes::health;
use state::{AppState, SharedState};

#[tokio::main]
async fn main() {
    // Basic tracing setup.
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "telemetry_exporter=info,telemetry=info".to_string()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let cfg = cli
        .load()
        .map_err(|e| format!("failed to load configuration: {e}"))?;

    tracing::info!(
        chains = cfg.subscribe.chains.len(),
        producers = cfg.subscribe.producers.len(),
        validators = cfg.subscribe.validators.len(),
        "loaded watch-lists"
    );

    // ---------------------------
    // Metrics
    // ---------------------------

    let metrics = Arc::new(
        MetricsRegistry::new()
            .map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    if cfg.metrics.enabled {
        let metrics_clone = metrics.clone();
        let addr = cfg.metrics.listen_addr;
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                tracing::error!("metrics HTTP server error: {e}");
            }
        });
        tracing::info!("metrics exporter listening on http://{}/metrics", addr);
    }

    // ---------------------------
    // Dispatcher + feed client
    // ---------------------------

    let dispatcher = Arc::new(Mutex::new(DefaultDispatcher::from_config(
        &cfg,
        metrics.telemetry.clone(),
    )));

    let feed = FeedClient::new(cfg.feed.clone(), dispatcher.clone());
    let feed_connected = feed.connected_flag();
    tokio::spawn(feed.run());
    tracing::info!("telemetry feed client started for {}", cfg.feed.url);

    // ---------------------------
    // Health endpoint
    // ---------------------------

    let app_state: SharedState = Arc::new(AppState {
        dispatcher,
        feed_connected,
    });

    let app = Router::new()
        .route("/health", get(health::health))
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(cfg.health.listen_addr)
        .await
        .map_err(|e| format!("failed to bind {}: {e}", cfg.health.listen_addr))?;

    tracing::info!("health endpoint listening on http://{}/health", cfg.health.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("health server error: {e}"))?;

    Ok(())
}

/// Waits for Ctrl-C and returns, used for graceful shutdown.
async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
