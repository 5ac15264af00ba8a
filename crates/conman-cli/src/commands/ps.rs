//! `conman ps`: List known containers.

use clap::Args;
use conman_runtime::service::RuntimeService;

use crate::output;

/// Arguments for the `ps` command.
#[derive(Args, Debug)]
pub struct PsArgs {
    /// Print the listing as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Executes the `ps` command.
///
/// Queries the runtime for every registered container and displays them
/// in a tabular format.
///
/// # Errors
///
/// Returns an error if any container cannot be queried.
pub fn execute(service: &RuntimeService, args: &PsArgs) -> anyhow::Result<()> {
    let containers = service.list_containers()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&containers)?);
        return Ok(());
    }

    if containers.is_empty() {
        println!("No containers found.");
        return Ok(());
    }

    println!("{:<34} {:<10} {:<20}", "CONTAINER ID", "STATE", "CREATED");
    for c in &containers {
        println!(
            "{:<34} {:<10} {:<20}",
            c.id,
            output::state_label(c.state),
            output::format_created(c.created_at)
        );
    }

    Ok(())
}
