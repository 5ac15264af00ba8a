//! Launcher handshake over a one-shot pipe.
//!
//! The launcher writes a single JSON report to the descriptor named by
//! `--syncpipe-fd` and closes it. The parent reads until end-of-stream on a
//! dedicated thread, started before the launcher is spawned so that no
//! report can be missed, and races that thread against a deadline.

use std::io::Read;
use std::os::fd::OwnedFd;
use std::process::{Child, Output};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use conman_common::constants::CONTAINER_PID_REPORT;
use conman_common::error::{ConmanError, Result};
use serde::{Deserialize, Serialize};

/// Message a launcher sends once it knows the container's fate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Report {
    /// Discriminant; `container_pid` on success.
    pub kind: String,
    /// Free-form status text.
    pub status: String,
    /// Captured standard error of the OCI runtime, if any.
    pub stderr: String,
    /// Container process id.
    pub pid: i64,
}

impl Report {
    /// Decodes a report from the raw bytes read off the pipe.
    ///
    /// # Errors
    ///
    /// Returns `Protocol` with the raw text if the bytes are not a report.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw).map_err(|e| ConmanError::Protocol {
            message: format!("failed to decode report: {e}"),
            report: String::from_utf8_lossy(raw).into_owned(),
        })
    }

    /// Returns the container pid if this is an acceptable success report.
    ///
    /// # Errors
    ///
    /// Returns `Protocol` carrying the full report if the kind is not
    /// `container_pid` or the pid is not positive.
    pub fn container_pid(&self) -> Result<u32> {
        match u32::try_from(self.pid) {
            Ok(pid) if pid > 0 && self.kind == CONTAINER_PID_REPORT => Ok(pid),
            _ => Err(ConmanError::Protocol {
                message: "launcher did not report a container pid".into(),
                report: format!("{self:?}"),
            }),
        }
    }
}

enum Event {
    Report(Result<Report>),
    Exited(std::io::Result<Output>),
}

/// Pending handshake: a reader thread bound to the pipe's read end.
pub struct Handshake {
    events: Receiver<Event>,
    sender: Sender<Event>,
}

impl Handshake {
    /// Starts reading `read_end` on a background thread.
    pub fn begin(read_end: OwnedFd) -> Self {
        let (sender, events) = mpsc::channel();
        let tx = sender.clone();
        let _ = std::thread::spawn(move || {
            let mut raw = Vec::new();
            let result = std::fs::File::from(read_end)
                .read_to_end(&mut raw)
                .map_err(|e| ConmanError::io("syncpipe", e))
                .and_then(|_| Report::decode(&raw));
            let _ = tx.send(Event::Report(result));
        });
        Self { events, sender }
    }

    /// Waits for the launcher's report, at most `timeout`.
    ///
    /// `child` must lead its own process group. The launcher's own exit is
    /// collected on another thread and logged under `line`. If it exits
    /// unsuccessfully before reporting, that failure is returned. On
    /// timeout the whole process group is killed, which also reaches
    /// descendants the launcher left running.
    ///
    /// # Errors
    ///
    /// Returns `Timeout`, `Protocol`, or `RuntimeExecution` as described on
    /// [`super::OciRuntime::create_container`].
    pub fn wait(self, child: Child, line: String, timeout: Duration) -> Result<Report> {
        let deadline = Instant::now() + timeout;
        let group = child.id();
        let tx = self.sender;
        let _ = std::thread::spawn(move || {
            let _ = tx.send(Event::Exited(child.wait_with_output()));
        });

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.events.recv_timeout(remaining) {
                Ok(Event::Report(report)) => return report,
                Ok(Event::Exited(Ok(output))) => {
                    super::exec::debug_log(&line, &output);
                    let _ = super::exec::check_status(line.clone(), output)?;
                }
                Ok(Event::Exited(Err(e))) => {
                    tracing::warn!(error = %e, "failed to collect launcher exit status");
                }
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {
                    kill_group(group);
                    return Err(ConmanError::Timeout {
                        operation: format!("handshake with {line}"),
                        after: timeout,
                    });
                }
            }
        }
    }
}

/// Sends `SIGKILL` to every process in the launcher's process group.
///
/// The group id stays reserved while any member is alive, so this never
/// reaches a process outside the launcher's tree.
pub fn kill_group(group: u32) {
    let Ok(raw) = i32::try_from(group) else {
        return;
    };
    match nix::sys::signal::killpg(nix::unistd::Pid::from_raw(raw), nix::sys::signal::SIGKILL) {
        Ok(()) => tracing::debug!(group, "launcher process group killed"),
        Err(e) => tracing::debug!(group, error = %e, "launcher process group already gone"),
    }
}
