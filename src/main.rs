//! gaze-nav-daemon: background daemon for gaze-driven navigation
//!
//! This daemon provides:
//! - Gaze feed socket for the vision pipeline
//! - Tick-driven engine (dwell, blink gestures, navigation modes)
//! - IPC server for renderers and controllers
//! - HTTP calls to the calibration and content services

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use gaze_nav::config::Config;
use gaze_nav::engine::Engine;
use gaze_nav::events::EngineEvent;
use gaze_nav::http::HttpBackend;
use gaze_nav::ipc::Server;
use gaze_nav::lifecycle::ShutdownSignal;
use gaze_nav::signal::{GazeFeed, SampleMailbox};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "gaze-nav-daemon starting");

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(
        socket = ?config.socket_path,
        feed = ?config.feed_socket_path,
        api_base = %config.api_base,
        "configuration loaded"
    );

    // Create shutdown signal handler
    let mut shutdown = ShutdownSignal::new()?;

    // Create channels for inter-component communication
    // IPC server -> engine
    let (command_tx, command_rx) = mpsc::channel(32);
    // Engine -> subscribed clients and the log
    let (event_tx, _event_rx) = broadcast::channel::<EngineEvent>(64);
    // Renderer viewport -> gaze feed normalization
    let (viewport_tx, viewport_rx) = watch::channel(config.viewport);
    // Gaze feed -> engine, last value wins
    let (mailbox, samples) = SampleMailbox::new();

    let backend = Arc::new(
        HttpBackend::new(&config.api_base, config.request_timeout)
            .context("failed to build HTTP client")?,
    );

    let engine = Engine::new(
        config.engine,
        samples,
        backend.clone(),
        backend,
        event_tx.clone(),
        viewport_tx,
    );
    let render_rx = engine.render_state();

    let feed = GazeFeed::bind(&config.feed_socket_path, mailbox, viewport_rx)?;
    let server = Server::bind(&config.socket_path, command_tx, render_rx, event_tx.clone())?;

    let mut log_rx = event_tx.subscribe();

    info!("daemon initialized, entering main loop");

    // Main event loop
    tokio::select! {
        // Run the engine (ticks, backend outcomes, commands)
        _ = engine.run(command_rx) => {
            info!("engine exited");
        }

        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Accept gaze producers
        result = feed.run() => {
            if let Err(e) = result {
                error!(?e, "gaze feed error");
            }
        }

        // Log engine events
        _ = async {
            loop {
                match log_rx.recv().await {
                    Ok(event) => info!(%event, "engine event"),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "event log receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        } => {
            info!("event log exited");
        }

        // Wait for shutdown signal
        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    feed.shutdown();
    server.shutdown().await;

    info!("gaze-nav-daemon stopped");

    Ok(())
}
