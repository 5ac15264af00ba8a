//! # conman-shim
//!
//! Per-container shim binary. See the library documentation.

use clap::Parser;
use conman_shim::config::{ShimArgs, ShimConfig};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let config = ShimConfig::from(ShimArgs::parse());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(config.log_level.as_deref().unwrap_or("info"))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(?config, "shim configuration");
    conman_shim::run(&config)
}
