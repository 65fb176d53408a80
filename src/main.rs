use std::sync::Arc;

use anyhow::Context;
use tokio::sync::{broadcast, RwLock};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use horde_server::config::{GameDefinitions, ServerConfig};
use horde_server::game::session::GameSession;
use horde_server::metrics::{self, Metrics};
use horde_server::net::game_session::start_game_loop;

/// Buffered outbound messages per observer before it starts lagging
const OUTBOUND_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Horde Server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::load_or_default();
    config.validate().context("invalid server configuration")?;
    info!(
        "Configuration loaded: {} Hz tick, {} Hz snapshots, seed {:?}",
        config.tick_rate, config.snapshot_rate, config.rng_seed
    );

    let definitions = GameDefinitions::load_or_builtin(config.definitions_path.as_deref())
        .context("failed to load game definitions")?;
    match &config.definitions_path {
        Some(path) => info!("Definitions loaded from {}", path.display()),
        None => info!("Using builtin definitions"),
    }

    let metrics = Arc::new(Metrics::new());
    let metrics_clone = metrics.clone();
    let metrics_port = config.metrics_port;
    tokio::spawn(async move {
        if let Err(e) = metrics::start_metrics_server(metrics_clone, metrics_port).await {
            error!("Metrics server error: {}", e);
        }
    });

    let session = Arc::new(RwLock::new(GameSession::new(Arc::new(definitions), &config)));
    let (outbound, _) = broadcast::channel(OUTBOUND_CAPACITY);
    let game_loop = start_game_loop(session.clone(), config.clone(), metrics.clone(), outbound);

    tokio::select! {
        result = game_loop => {
            if let Err(e) = result {
                error!("Game loop stopped: {}", e);
            }
        }
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for Ctrl+C")?;
            info!("Shutdown signal received");
        }
    }

    let stats = session.read().await.stats();
    info!(
        "Server stopped after {} ticks ({} intents rejected)",
        stats.tick, stats.rejected_intents
    );

    Ok(())
}
