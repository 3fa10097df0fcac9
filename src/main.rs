//! jitter-relay: a delayed line echo relay
//!
//! Connects to a TCP peer and sends every line it receives straight back,
//! after a uniformly random delay of up to 100 ms. Used to check how a peer
//! copes with jitter on a line-oriented stream.
//!
//! Features:
//! - Single blocking connection, strictly in-order echoes
//! - Per-message delay logging
//! - Configuration via CLI arguments or TOML file

mod config;
mod relay;

use config::Config;
use relay::{Relay, UniformJitter};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        remote = %config.remote,
        nodelay = config.nodelay,
        "Starting jitter-relay"
    );

    let stream = relay::connect(&config.remote, config.nodelay).inspect_err(|e| {
        error!(error = %e, "Connection failed");
    })?;

    let mut relay = Relay::new(stream, UniformJitter::new());
    match relay.run() {
        Ok(never) => match never {},
        Err(e) => {
            error!(
                error = %e,
                state = %relay.state(),
                forwarded = relay.forwarded(),
                "Relay stopped"
            );
            Err(e.into())
        }
    }
}
