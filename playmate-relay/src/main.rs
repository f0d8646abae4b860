//! `PlayMate` realtime relay -- room-based event fan-out.
//!
//! An axum WebSocket server that multiplexes team chat, match scores, and
//! user notifications over one connection per client. Clients join rooms
//! such as `team-42` or `match-7` and receive every event broadcast into
//! them while connected. Nothing is stored or replayed.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:3001, endpoint /api/socket
//! cargo run --bin playmate-relay
//!
//! # Run on custom address and path
//! cargo run --bin playmate-relay -- --bind 127.0.0.1:8080 --path /ws
//!
//! # Or via environment variables
//! PLAYMATE_RELAY_ADDR=127.0.0.1:8080 cargo run --bin playmate-relay
//! ```

use std::sync::Arc;

use clap::Parser;
use playmate_relay::config::{RelayCliArgs, RelayConfig};
use playmate_relay::relay::{self, RelayState};

#[tokio::main]
async fn main() {
    let cli = RelayCliArgs::parse();

    // Load config from CLI args + config file + env vars + defaults.
    let config = match RelayConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize tracing with the resolved log level.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(
        addr = %config.bind_addr,
        path = %config.path,
        normalize_path = config.normalize_path,
        "starting playmate relay"
    );

    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(RelayState::with_config(config));

    let (bound_addr, mut handle) =
        match relay::start_server_with_state(&bind_addr, Arc::clone(&state)).await {
            Ok(started) => started,
            Err(e) => {
                tracing::error!(error = %e, "failed to start relay server");
                std::process::exit(1);
            }
        };
    tracing::info!(addr = %bound_addr, "relay listening");

    tokio::select! {
        result = &mut handle => {
            if let Err(e) = result {
                tracing::error!(error = %e, "relay server task failed");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!(
                connections = state.hub.connection_count(),
                "shutting down"
            );
            state.hub.close_all();
            tokio::time::sleep(relay::SHUTDOWN_GRACE).await;
            handle.abort();
        }
    }
}
