//! `conman stop`: Stop a running container.

use clap::Args;
use conman_common::types::ContainerId;
use conman_runtime::service::RuntimeService;

/// Arguments for the `stop` command.
#[derive(Args, Debug)]
pub struct StopArgs {
    /// Container ID.
    pub id: String,
}

/// Executes the `stop` command.
///
/// # Errors
///
/// Returns an error; stopping containers is not available yet.
pub fn execute(service: &RuntimeService, args: &StopArgs) -> anyhow::Result<()> {
    service.stop_container(&ContainerId::new(args.id.as_str()))?;
    Ok(())
}
