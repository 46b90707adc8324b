//! Loot Server - Authoritative multiplayer loot collection server
//!
//! This is the main entry point for the game server. It handles:
//! - Loading maps and gameplay defaults from the game config file
//! - Restoring and saving game state across restarts
//! - HTTP endpoints for joining, moving, ticking and the leaderboard
//! - Periodic ticking when the server drives the clock itself

mod app;
mod config;
mod game;
mod http;
mod store;
mod util;

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::{tasks, AppState};
use crate::config::Config;
use crate::game::Game;
use crate::http::build_router;
use crate::store::state_file;
use crate::util::time::init_server_time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    // Initialize server time tracking
    init_server_time();

    info!("Starting Loot Server");
    info!("Server address: {}", config.server_addr);

    let game_config = crate::config::game::load(&config.game_config, config.randomize_spawn_points)?;
    info!(
        maps = game_config.maps.len(),
        path = %config.game_config.display(),
        "Game config loaded"
    );
    let game = Game::new(game_config.maps, game_config.settings);

    if let Some(path) = &config.state_file {
        if let Some(snapshot) = state_file::load(path).await? {
            game.restore(snapshot)?;
        }
    }

    // Create application state
    let (state, record_rx) = AppState::new(config.clone(), game);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Spawn leaderboard writer
    let writer = tokio::spawn(tasks::run_record_writer(state.records.clone(), record_rx));

    // Spawn ticker and autosave
    let mut background = Vec::new();
    if let Some(period) = config.tick_period {
        background.push(tokio::spawn(tasks::run_ticker(
            state.clone(),
            period,
            shutdown_rx.clone(),
        )));

        if let (Some(path), Some(save_period)) = (&config.state_file, config.save_state_period) {
            background.push(tokio::spawn(tasks::run_autosave(
                state.game.clone(),
                path.clone(),
                save_period,
                shutdown_rx.clone(),
            )));
        }
    } else if config.save_state_period.is_some() {
        warn!("SAVE_STATE_PERIOD_MS is ignored without TICK_PERIOD_MS");
    }

    // Build router
    let router = build_router(state.clone());

    // Start server
    let addr: SocketAddr = config.server_addr;
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop background tasks before the final save
    let _ = shutdown_tx.send(true);
    for task in background {
        if let Err(e) = task.await {
            error!(error = %e, "Background task failed");
        }
    }

    if let Some(path) = &config.state_file {
        match tasks::save_state(&state.game, path).await {
            Ok(()) => info!(path = %path.display(), "Game state saved"),
            Err(e) => error!(path = %path.display(), error = %e, "Failed to save game state"),
        }
    }

    // Dropping the last sender lets the writer drain and exit
    drop(state);
    if let Err(e) = writer.await {
        error!(error = %e, "Leaderboard writer failed");
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
