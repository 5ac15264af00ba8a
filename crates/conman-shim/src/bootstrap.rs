//! `--action start`: launch a detached shim and report its address.
//!
//! The bootstrapping process binds the control socket itself, so the
//! address is known to be live before it is reported, then re-executes
//! the shim binary in a new process group with the listener at fd 3.

use std::os::fd::OwnedFd;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use conman_common::constants::INHERITED_FD;
use conman_common::error::{ConmanError, Result, ResultExt};
use conman_common::types::ContainerId;
use conman_core::socket::{self, ShimAddress};

use crate::config::ShimConfig;

/// Something that can bring up a shim for a container.
pub trait Shim {
    /// Starts a long-running shim for `id` and returns its control address.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket, the address file, or the detached
    /// process cannot be set up. Nothing is left behind on failure.
    fn start(&self, id: &ContainerId) -> Result<ShimAddress>;
}

/// Shim that supervises runc-style containers.
#[derive(Debug, Clone)]
pub struct RuncShim {
    config: ShimConfig,
    executable: PathBuf,
}

impl RuncShim {
    /// Creates a shim that re-executes the running binary.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the current executable cannot be resolved.
    pub fn new(config: ShimConfig) -> Result<Self> {
        let executable =
            std::env::current_exe().map_err(|e| ConmanError::io("current executable", e))?;
        Ok(Self::with_executable(config, executable))
    }

    /// Creates a shim that launches `executable` as the long-running half.
    pub const fn with_executable(config: ShimConfig, executable: PathBuf) -> Self {
        Self { config, executable }
    }

    fn spawn_server(&self, listener: OwnedFd) -> Result<Child> {
        let cwd = std::env::current_dir().map_err(|e| ConmanError::io(".", e))?;
        let mut cmd = Command::new(&self.executable);
        let _ = cmd
            .args(self.config.serve_args())
            .current_dir(cwd)
            .process_group(0)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());
        let _ = conman_core::fd::inherit_fd(&mut cmd, &listener, INHERITED_FD)
            .map_err(|e| ConmanError::io("listener", e))?;
        let child = cmd
            .spawn()
            .map_err(|e| ConmanError::io(&self.executable, e))?;
        tracing::debug!(pid = child.id(), "shim server spawned");
        Ok(child)
    }
}

impl Shim for RuncShim {
    fn start(&self, id: &ContainerId) -> Result<ShimAddress> {
        let addr = ShimConfig {
            id: id.clone(),
            ..self.config.clone()
        }
        .address();
        let listener = socket::listen(&addr).context("create new shim socket")?;

        let launched = self.spawn_server(OwnedFd::from(listener)).and_then(|mut child| {
            match socket::write_address(&self.config.address_file, &addr) {
                Ok(path) => {
                    tracing::info!(socket = %addr, file = %path.display(), "shim started");
                    Ok(())
                }
                Err(e) => {
                    if let Err(kill) = child.kill() {
                        tracing::warn!(error = %kill, "cannot kill shim server");
                    }
                    let _ = child.wait();
                    Err(e)
                }
            }
        });

        if let Err(e) = launched {
            if let Err(rm) = socket::remove_socket(&addr) {
                tracing::warn!(error = %rm, "cannot remove shim socket");
            }
            return Err(e);
        }
        Ok(addr)
    }
}
