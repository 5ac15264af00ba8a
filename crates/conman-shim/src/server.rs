//! Long-running shim: control socket plus signal loop.

use std::os::fd::OwnedFd;

use conman_common::constants::INHERITED_FD;
use conman_common::error::{ConmanError, Result, ResultExt};
use conman_core::socket;
use tokio::net::UnixListener;
use tokio::sync::watch;

use crate::config::ShimConfig;
use crate::signals::{Signals, handle_signals};

/// Takes over the listener the bootstrapping shim passed as descriptor 3.
///
/// # Errors
///
/// Returns `Io` if the descriptor is missing or is not a usable socket.
pub fn inherited_listener() -> Result<UnixListener> {
    let fd: OwnedFd = conman_core::fd::adopt_fd(INHERITED_FD)
        .map_err(|e| ConmanError::io("inherited listener", e))?;
    from_std(std::os::unix::net::UnixListener::from(fd))
}

/// Converts a blocking listener for use on the tokio runtime.
///
/// # Errors
///
/// Returns `Io` if the listener cannot be made non-blocking.
pub fn from_std(listener: std::os::unix::net::UnixListener) -> Result<UnixListener> {
    listener
        .set_nonblocking(true)
        .map_err(|e| ConmanError::io("listener", e))?;
    UnixListener::from_std(listener).map_err(|e| ConmanError::io("listener", e))
}

/// Serves `listener` and handles signals until asked to terminate.
///
/// The control socket file is removed on the way out.
///
/// # Errors
///
/// Returns `Io` if the signal handlers cannot be installed or the shim pid
/// cannot be recorded.
pub async fn serve(config: &ShimConfig, listener: UnixListener) -> Result<()> {
    let mut signals = Signals::install()?;
    if let Err(e) = conman_core::reap::set_subreaper() {
        tracing::warn!(error = %e, "container will not be reparented to the shim");
    }
    if let Some(path) = &config.shim_pid_file {
        conman_core::fs::atomic_write(path, std::process::id().to_string().as_bytes(), 0o644)
            .context("cannot write shim pid")?;
    }

    let addr = config.address();
    tracing::info!(socket = %addr, id = %config.id, "serving api on socket");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let acceptor = tokio::spawn(accept_loop(listener, shutdown_rx));
    handle_signals(config, &mut signals, &shutdown_tx).await;
    if let Err(e) = acceptor.await {
        tracing::warn!(error = %e, "accept loop panicked");
    }

    socket::remove_socket(&addr)?;
    tracing::info!("shim stopped");
    Ok(())
}

/// Accepts connections until `shutdown` flips. The control API is empty,
/// so every connection is closed straight away.
pub async fn accept_loop(listener: UnixListener, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            conn = listener.accept() => match conn {
                Ok((stream, _)) => {
                    tracing::debug!("control connection accepted");
                    drop(stream);
                }
                Err(e) => tracing::warn!(error = %e, "accept failed"),
            },
        }
    }
    tracing::debug!("accept loop finished");
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn connections_are_accepted_and_closed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ctl.sock");
        let listener =
            from_std(std::os::unix::net::UnixListener::bind(&path).expect("bind")).expect("tokio");
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(accept_loop(listener, rx));

        let client_path = path.clone();
        let read = tokio::task::spawn_blocking(move || {
            let mut stream = std::os::unix::net::UnixStream::connect(client_path).expect("connect");
            let mut buf = Vec::new();
            stream.read_to_end(&mut buf).expect("read")
        })
        .await
        .expect("client");
        assert_eq!(read, 0);

        tx.send(true).expect("shutdown");
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("loop ends")
            .expect("join");
    }

    #[tokio::test]
    async fn dropped_sender_ends_the_loop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let listener = from_std(
            std::os::unix::net::UnixListener::bind(dir.path().join("s")).expect("bind"),
        )
        .expect("tokio");
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(accept_loop(listener, rx));
        drop(tx);
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("loop ends")
            .expect("join");
    }
}
