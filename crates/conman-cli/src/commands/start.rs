//! `conman start`: Start a created container.

use clap::Args;
use conman_common::types::ContainerId;
use conman_runtime::service::RuntimeService;

/// Arguments for the `start` command.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Container ID.
    pub id: String,
}

/// Executes the `start` command.
///
/// Returns once the runtime reports the container running.
///
/// # Errors
///
/// Returns an error if the container is unknown, not created, or does not
/// reach the running state in time.
pub fn execute(service: &RuntimeService, args: &StartArgs) -> anyhow::Result<()> {
    let id = ContainerId::new(args.id.as_str());
    service.start_container(&id)?;
    tracing::info!(id = %id, "container running");
    Ok(())
}
