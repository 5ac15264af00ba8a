//! Signal delivery for the serving shim.
//!
//! Signals arrive as messages on tokio streams; the loop in
//! [`handle_signals`] turns them into reaping and cancellation.

use std::path::Path;

use conman_common::error::{ConmanError, Result, ResultExt};
use conman_core::reap::{self, Reaped};
use tokio::signal::unix::{Signal, SignalKind, signal};
use tokio::sync::watch;

use crate::config::ShimConfig;

/// Signals the shim reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShimSignal {
    /// `SIGCHLD`: a child changed state.
    Child,
    /// `SIGPIPE`: a peer closed an I/O channel.
    Pipe,
    /// `SIGTERM` or `SIGINT`.
    Terminate,
}

/// Registered signal streams.
pub struct Signals {
    child: Signal,
    pipe: Signal,
    term: Signal,
    int: Signal,
}

impl Signals {
    /// Registers the shim's handlers. Must run inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `Io` if a handler cannot be registered.
    pub fn install() -> Result<Self> {
        let register = |kind: SignalKind| {
            signal(kind).map_err(|e| ConmanError::io("signal handler", e))
        };
        Ok(Self {
            child: register(SignalKind::child())?,
            pipe: register(SignalKind::pipe())?,
            term: register(SignalKind::terminate())?,
            int: register(SignalKind::interrupt())?,
        })
    }

    /// Waits for the next signal.
    pub async fn next(&mut self) -> ShimSignal {
        tokio::select! {
            _ = self.child.recv() => ShimSignal::Child,
            _ = self.pipe.recv() => ShimSignal::Pipe,
            _ = self.term.recv() => ShimSignal::Terminate,
            _ = self.int.recv() => ShimSignal::Terminate,
        }
    }
}

/// Runs until `SIGTERM`/`SIGINT`, then cancels `shutdown`.
///
/// Reaping failures are logged and do not end the loop.
pub async fn handle_signals(
    config: &ShimConfig,
    signals: &mut Signals,
    shutdown: &watch::Sender<bool>,
) {
    tracing::info!("starting signal loop");
    loop {
        match signals.next().await {
            ShimSignal::Child => match reap::reap_children() {
                Ok(children) => {
                    for child in children {
                        if let Err(e) = record_exit(config, child) {
                            tracing::warn!(pid = child.pid, error = %e, "exit status lost");
                        }
                    }
                }
                Err(e) => tracing::warn!(error = %e, "reaping failed"),
            },
            ShimSignal::Pipe => tracing::debug!("ignoring SIGPIPE"),
            ShimSignal::Terminate => {
                tracing::info!("termination requested");
                let _ = shutdown.send(true);
                return;
            }
        }
    }
}

/// Writes `reaped`'s exit code to the exit file if it is the container
/// process named by the pid file.
///
/// # Errors
///
/// Returns `Io` if the exit file cannot be written.
pub fn record_exit(config: &ShimConfig, reaped: Reaped) -> Result<()> {
    let (Some(pid_file), Some(exit_file)) = (&config.pid_file, &config.exit_file) else {
        return Ok(());
    };
    match container_pid(pid_file) {
        Some(pid) if pid == reaped.pid => {}
        _ => return Ok(()),
    }
    conman_core::fs::atomic_write(exit_file, reaped.exit_code.to_string().as_bytes(), 0o644)
        .context("cannot record container exit")?;
    tracing::info!(id = %config.id, pid = reaped.pid, exit_code = reaped.exit_code, "container exited");
    Ok(())
}

fn container_pid(pid_file: &Path) -> Option<i32> {
    std::fs::read_to_string(pid_file).ok()?.trim().parse().ok()
}
