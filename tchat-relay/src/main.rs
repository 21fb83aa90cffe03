//! tchat relay: serves `/read` and `/send` for local tchat clients.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 127.0.0.1:8080
//! cargo run --bin tchat-relay -- --cookie s3cret
//!
//! # Run on custom address
//! cargo run --bin tchat-relay -- --bind 0.0.0.0:9000 --cookie s3cret
//! ```

use std::sync::Arc;

use clap::Parser;
use tchat_relay::config::{RelayCliArgs, RelayConfig};
use tchat_relay::relay::{self, RelayState};

#[tokio::main]
async fn main() {
    let cli = RelayCliArgs::parse();

    let config = match RelayConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    if config.read_cookie.is_empty() {
        tracing::warn!("no read cookie configured, readers must present an empty cookie");
    }

    tracing::info!(addr = %config.bind_addr, "starting tchat relay");

    let state = Arc::new(RelayState::with_config(
        config.read_cookie.clone(),
        config.broadcast_capacity,
        config.max_form_size,
    ));

    match relay::start_server_with_state(&config.bind_addr, state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "relay listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "relay server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start relay");
            std::process::exit(1);
        }
    }
}
