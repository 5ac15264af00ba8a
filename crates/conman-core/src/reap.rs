//! Child reaping for long-lived supervisor processes.
//!
//! A shim marks itself as the child sub-reaper so that the container
//! process, once its launcher exits, is reparented to the shim instead of
//! init. Every `SIGCHLD` is then answered with [`reap_children`].

use conman_common::error::{ConmanError, Result};
use nix::errno::Errno;
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;

/// A child process collected by [`reap_children`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reaped {
    /// Process id of the exited child.
    pub pid: i32,
    /// Exit code, or `128 + signal` for a child killed by a signal.
    pub exit_code: i32,
}

/// Marks the calling process as the child sub-reaper.
///
/// # Errors
///
/// Returns `Io` if the `prctl(2)` call fails.
#[cfg(target_os = "linux")]
pub fn set_subreaper() -> Result<()> {
    nix::sys::prctl::set_child_subreaper(true)
        .map_err(|e| ConmanError::io("prctl(PR_SET_CHILD_SUBREAPER)", std::io::Error::from(e)))?;
    tracing::debug!("registered as child sub-reaper");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error. Sub-reapers are a Linux feature.
#[cfg(not(target_os = "linux"))]
pub fn set_subreaper() -> Result<()> {
    Err(ConmanError::NotImplemented {
        operation: "set_subreaper",
    })
}

/// Collects every exited child without blocking.
///
/// Returns an empty list when no child has exited or when the process has
/// no children at all.
///
/// # Errors
///
/// Returns `Io` if `waitpid(2)` fails for a reason other than `ECHILD`.
pub fn reap_children() -> Result<Vec<Reaped>> {
    let mut reaped = Vec::new();
    loop {
        match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::Exited(pid, code)) => reaped.push(Reaped {
                pid: pid.as_raw(),
                exit_code: code,
            }),
            Ok(WaitStatus::Signaled(pid, signal, _)) => reaped.push(Reaped {
                pid: pid.as_raw(),
                exit_code: 128 + signal as i32,
            }),
            Ok(WaitStatus::StillAlive) | Err(Errno::ECHILD) => break,
            Ok(_) => {}
            Err(e) => return Err(ConmanError::io("waitpid", std::io::Error::from(e))),
        }
    }
    for r in &reaped {
        tracing::debug!(pid = r.pid, exit_code = r.exit_code, "reaped child");
    }
    Ok(reaped)
}
