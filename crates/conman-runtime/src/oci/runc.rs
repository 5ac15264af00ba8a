//! runc-compatible runtime driven through an external launcher.

use std::ffi::OsString;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use conman_common::config::RuntimeConfig;
use conman_common::constants::INHERITED_FD;
use conman_common::error::{ConmanError, Result, ResultExt};
use tracing::level_filters::LevelFilter;

use super::OciRuntime;
use super::exec::{command_line, run_command};
use super::handshake::{Handshake, kill_group};
use crate::handle::Handle;
use crate::instance::{Instance, OciState};

const LAUNCHER_PIDFILE: &str = "shimmy.pid";
const CONTAINER_PIDFILE: &str = "container.pid";

/// OCI runtime backed by a runc-style binary and a launcher executable.
#[derive(Debug, Clone)]
pub struct RuncRuntime {
    shim_path: PathBuf,
    runtime_path: PathBuf,
    runtime_root: PathBuf,
}

impl RuncRuntime {
    /// Creates an adapter from explicit executable and state paths.
    pub fn new(
        shim_path: impl Into<PathBuf>,
        runtime_path: impl Into<PathBuf>,
        runtime_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            shim_path: shim_path.into(),
            runtime_path: runtime_path.into(),
            runtime_root: runtime_root.into(),
        }
    }

    /// Creates an adapter from the service configuration.
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(
            &config.shim_path,
            &config.runtime_path,
            &config.runtime_root,
        )
    }

    /// Arguments handed to the launcher for `handle`, excluding the
    /// handshake descriptor.
    pub fn launcher_args(&self, handle: &Handle, stdin: bool, stdin_once: bool) -> Vec<OsString> {
        let bundle = handle.bundle_dir();
        let mut runtime_arg = OsString::from("--runtime-arg=--root=");
        runtime_arg.push(&self.runtime_root);

        let mut args: Vec<OsString> = vec![
            "--shimmy-pidfile".into(),
            bundle.join(LAUNCHER_PIDFILE).into(),
            "--shimmy-log-level".into(),
            LevelFilter::current().to_string().to_uppercase().into(),
            "--runtime".into(),
            self.runtime_path.clone().into(),
            runtime_arg,
            "--bundle".into(),
            bundle.clone().into(),
            "--container-id".into(),
            handle.id().as_str().into(),
            "--container-pidfile".into(),
            bundle.join(CONTAINER_PIDFILE).into(),
            "--container-logfile".into(),
            handle.log_file().into(),
            "--container-exitfile".into(),
            handle.exit_file().into(),
            "--container-attachfile".into(),
            handle.attach_file().into(),
        ];
        if stdin {
            args.push("--stdin".into());
        }
        if stdin_once {
            args.push("--stdin-once".into());
        }
        args
    }

    fn runtime_command(&self, subcommand: &str, handle: &Handle) -> Command {
        let mut cmd = Command::new(&self.runtime_path);
        let _ = cmd
            .arg("--root")
            .arg(&self.runtime_root)
            .arg(subcommand)
            .arg(handle.id().as_str());
        cmd
    }
}

impl OciRuntime for RuncRuntime {
    fn create_container(
        &self,
        handle: &Handle,
        stdin: bool,
        stdin_once: bool,
        timeout: Duration,
    ) -> Result<Instance> {
        let (read_end, write_end) = nix::unistd::pipe2(nix::fcntl::OFlag::O_CLOEXEC)
            .map_err(|e| ConmanError::io("syncpipe", e.into()))?;

        let mut cmd = Command::new(&self.shim_path);
        let _ = cmd
            .args(self.launcher_args(handle, stdin, stdin_once))
            .arg("--syncpipe-fd")
            .arg(INHERITED_FD.to_string())
            .process_group(0)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let _ = conman_core::fd::inherit_fd(&mut cmd, &write_end, INHERITED_FD)
            .map_err(|e| ConmanError::io("syncpipe", e))?;

        let handshake = Handshake::begin(read_end);
        let line = command_line(&cmd);
        tracing::debug!(id = %handle.id(), "spawning launcher: {line}");
        let child = cmd
            .spawn()
            .map_err(|e| ConmanError::io(&self.shim_path, e))?;
        // The parent's copies of the write end must be closed for the
        // reader to see end-of-stream once the launcher is done.
        drop(cmd);
        drop(write_end);

        let group = child.id();
        let pid = handshake
            .wait(child, line, timeout)
            .and_then(|report| report.container_pid())
            .inspect_err(|_| kill_group(group))?;
        tracing::info!(id = %handle.id(), pid, "launcher reported container pid");
        Ok(Instance::from_pid(pid))
    }

    fn start_container(&self, handle: &Handle) -> Result<()> {
        let _ = run_command(&mut self.runtime_command("start", handle))
            .context("OCI runtime start failed")?;
        Ok(())
    }

    fn container(&self, handle: &Handle) -> Result<Instance> {
        let stdout = run_command(&mut self.runtime_command("state", handle))
            .context("OCI runtime state failed")?;
        let state: OciState = serde_json::from_slice(&stdout)?;
        Ok(Instance::from(state))
    }

    fn delete_container(&self, handle: &Handle) -> Result<()> {
        let mut cmd = Command::new(&self.runtime_path);
        let _ = cmd
            .arg("--root")
            .arg(&self.runtime_root)
            .args(["delete", "--force"])
            .arg(handle.id().as_str());
        let _ = run_command(&mut cmd).context("OCI runtime delete failed")?;
        Ok(())
    }
}
