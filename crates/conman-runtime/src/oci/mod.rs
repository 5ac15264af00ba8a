//! OCI runtime adapter.
//!
//! Containers are created through a launcher process that reports the
//! container pid over a handshake pipe, and are then driven with the OCI
//! runtime's own `start`/`state`/`delete` subcommands.

pub mod exec;
pub mod handshake;
pub mod runc;
pub mod spec;

use std::time::Duration;

use conman_common::error::Result;

use crate::handle::Handle;
use crate::instance::Instance;

/// Operations the lifecycle service needs from an OCI runtime.
///
/// Implementors must be shareable across threads; the service calls them
/// concurrently for different containers.
pub trait OciRuntime: Send + Sync {
    /// Launches the container described by `handle`'s bundle and waits up to
    /// `timeout` for the launcher to report the container pid.
    ///
    /// Exactly one attempt is made. The returned instance carries only the
    /// reported pid.
    ///
    /// # Errors
    ///
    /// Returns `Timeout` if no report arrives in time, `Protocol` if the
    /// report is malformed or unacceptable, and `RuntimeExecution` if the
    /// launcher exits unsuccessfully first.
    fn create_container(
        &self,
        handle: &Handle,
        stdin: bool,
        stdin_once: bool,
        timeout: Duration,
    ) -> Result<Instance>;

    /// Starts a created container.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeExecution` if the runtime rejects the request.
    fn start_container(&self, handle: &Handle) -> Result<()>;

    /// Queries the runtime for the container's current state.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeExecution` if the query fails and `Serialization` if
    /// the runtime output cannot be decoded.
    fn container(&self, handle: &Handle) -> Result<Instance>;

    /// Forcefully deletes the container from the runtime.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeExecution` if the runtime rejects the request.
    fn delete_container(&self, handle: &Handle) -> Result<()>;
}
