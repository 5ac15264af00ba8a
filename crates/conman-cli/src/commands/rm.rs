//! `conman rm`: Remove a container.

use clap::Args;
use conman_common::types::ContainerId;
use conman_runtime::service::RuntimeService;

/// Arguments for the `rm` command.
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Container ID.
    pub id: String,
}

/// Executes the `rm` command.
///
/// # Errors
///
/// Returns an error; removing containers is not available yet.
pub fn execute(service: &RuntimeService, args: &RmArgs) -> anyhow::Result<()> {
    service.remove_container(&ContainerId::new(args.id.as_str()))?;
    Ok(())
}
