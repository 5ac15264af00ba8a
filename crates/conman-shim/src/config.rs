//! Shim command line and the immutable configuration built from it.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;
use conman_common::constants::{SOCKET_NAMESPACE, SOCKET_ROOT};
use conman_common::types::ContainerId;
use conman_core::socket::{self, ShimAddress};

/// Per-container shim for conman.
#[derive(Parser, Debug, Clone)]
#[command(name = "conman-shim", version, about, long_about = None)]
pub struct ShimArgs {
    /// File receiving the long-running shim's pid.
    #[arg(long = "shim-pid")]
    pub shim_pid: Option<PathBuf>,

    /// Path to the OCI runtime binary.
    #[arg(long)]
    pub runtime: Option<PathBuf>,

    /// Path to the container bundle.
    #[arg(long)]
    pub bundle: Option<PathBuf>,

    /// Action to perform; `start` bootstraps a detached shim.
    #[arg(long)]
    pub action: Option<String>,

    /// Container identifier.
    #[arg(long)]
    pub id: String,

    /// File holding the container process pid.
    #[arg(long = "pid-file")]
    pub pid_file: Option<PathBuf>,

    /// Container log file.
    #[arg(long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// File receiving the container's exit code.
    #[arg(long = "exit-file")]
    pub exit_file: Option<PathBuf>,

    /// File the control-socket address is written to.
    #[arg(long = "address-file", default_value = "address")]
    pub address_file: PathBuf,

    /// Directory under which control sockets are created.
    #[arg(long = "socket-root", default_value = SOCKET_ROOT)]
    pub socket_root: PathBuf,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long = "log-level")]
    pub log_level: Option<String>,
}

/// What this shim invocation does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Bootstrap a detached shim and print its address.
    Start,
    /// Serve the control socket and supervise the container.
    Serve,
}

/// Shim configuration, built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShimConfig {
    /// Requested action.
    pub action: Action,
    /// Container identifier.
    pub id: ContainerId,
    /// File receiving the serving shim's pid.
    pub shim_pid_file: Option<PathBuf>,
    /// OCI runtime binary.
    pub runtime: Option<PathBuf>,
    /// Container bundle.
    pub bundle: Option<PathBuf>,
    /// Container pid file.
    pub pid_file: Option<PathBuf>,
    /// Container log file.
    pub log_file: Option<PathBuf>,
    /// Container exit file.
    pub exit_file: Option<PathBuf>,
    /// Address output file.
    pub address_file: PathBuf,
    /// Socket root directory.
    pub socket_root: PathBuf,
    /// Fallback log filter.
    pub log_level: Option<String>,
}

impl From<ShimArgs> for ShimConfig {
    fn from(args: ShimArgs) -> Self {
        let action = match args.action.as_deref() {
            Some("start") => Action::Start,
            _ => Action::Serve,
        };
        Self {
            action,
            id: ContainerId::new(args.id),
            shim_pid_file: args.shim_pid,
            runtime: args.runtime,
            bundle: args.bundle,
            pid_file: args.pid_file,
            log_file: args.log_file,
            exit_file: args.exit_file,
            address_file: args.address_file,
            socket_root: args.socket_root,
            log_level: args.log_level,
        }
    }
}

impl ShimConfig {
    /// Control-socket address of this shim.
    pub fn address(&self) -> ShimAddress {
        socket::derive_address_in(
            &self.socket_root,
            std::path::Path::new(SOCKET_NAMESPACE),
            self.id.as_str(),
        )
    }

    /// Flags for the re-executed, long-running shim: everything this
    /// invocation was given except the action.
    pub fn serve_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["--id".into(), self.id.as_str().into()];
        let optional = [
            ("--shim-pid", &self.shim_pid_file),
            ("--runtime", &self.runtime),
            ("--bundle", &self.bundle),
            ("--pid-file", &self.pid_file),
            ("--log-file", &self.log_file),
            ("--exit-file", &self.exit_file),
        ];
        for (flag, value) in optional {
            if let Some(value) = value {
                args.push(flag.into());
                args.push(value.into());
            }
        }
        if let Some(level) = &self.log_level {
            args.push("--log-level".into());
            args.push(level.into());
        }
        args.push("--address-file".into());
        args.push(self.address_file.clone().into());
        args.push("--socket-root".into());
        args.push(self.socket_root.clone().into());
        args
    }
}
