//! # conman-shim
//!
//! The per-container shim. Invoked with `--action start` it binds its
//! control socket, re-executes itself detached with the listener at fd 3,
//! and prints the socket address. Without `start` it is that detached
//! process: it serves the socket, reaps the container, records its exit
//! code, and stops on `SIGTERM`/`SIGINT`.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod bootstrap;
pub mod config;
pub mod server;
pub mod signals;

use std::io::Write;

use anyhow::Context;

use crate::bootstrap::{RuncShim, Shim};
use crate::config::{Action, ShimConfig};

/// Runs the shim invocation described by `config`.
///
/// # Errors
///
/// Returns an error if bootstrapping or serving fails.
pub fn run(config: &ShimConfig) -> anyhow::Result<()> {
    match config.action {
        Action::Start => {
            let shim = RuncShim::new(config.clone())?;
            let addr = shim.start(&config.id)?;
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(addr.as_str().as_bytes())
                .and_then(|()| stdout.flush())
                .context("cannot report shim address")?;
            Ok(())
        }
        Action::Serve => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("cannot build tokio runtime")?;
            runtime.block_on(async {
                let listener = server::inherited_listener()?;
                server::serve(config, listener).await
            })?;
            Ok(())
        }
    }
}
