//! `conman stats`: Show container usage statistics.

use clap::Args;
use conman_common::types::ContainerId;
use conman_runtime::service::RuntimeService;

use crate::output;

/// Arguments for the `stats` command.
#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Container ID.
    pub id: String,

    /// Print the record as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Executes the `stats` command.
///
/// # Errors
///
/// Returns an error if the container is unknown or cannot be queried.
pub fn execute(service: &RuntimeService, args: &StatsArgs) -> anyhow::Result<()> {
    let stats = service.container_stats(&ContainerId::new(args.id.as_str()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("{:<34} {:<12} {:<12} {:<25}", "CONTAINER ID", "CPU (ns)", "MEMORY", "SAMPLED");
    println!(
        "{:<34} {:<12} {:<12} {:<25}",
        stats.id,
        stats.cpu.usage_core_nano_seconds,
        output::format_bytes(stats.memory.working_set_bytes),
        stats.cpu.timestamp.to_rfc3339()
    );
    Ok(())
}
