//! CLI command definitions and dispatch.

pub mod create;
pub mod ps;
pub mod rm;
pub mod start;
pub mod stats;
pub mod stop;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use conman_common::config::RuntimeConfig;
use conman_runtime::service::RuntimeService;

/// conman: minimal container manager on top of an OCI runtime.
#[derive(Parser, Debug)]
#[command(name = "conman", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Path to the JSON configuration file.
    #[arg(
        long,
        global = true,
        env = "CONMAN_CONFIG",
        default_value = conman_common::constants::DEFAULT_CONFIG_FILE
    )]
    pub config: PathBuf,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a container from a root filesystem and a command.
    Create(create::CreateArgs),
    /// Start a created container and wait until it runs.
    Start(start::StartArgs),
    /// List known containers with their live state.
    Ps(ps::PsArgs),
    /// Show usage statistics of a container.
    Stats(stats::StatsArgs),
    /// Stop a running container.
    Stop(stop::StopArgs),
    /// Remove a container.
    Rm(rm::RmArgs),
}

/// Loads the configuration, recovers the registry, and dispatches the
/// parsed command to its handler.
///
/// # Errors
///
/// Returns an error if configuration, recovery, or the command fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = RuntimeConfig::load(&cli.config)
        .and_then(RuntimeConfig::resolve_binaries)
        .with_context(|| format!("cannot load configuration {}", cli.config.display()))?;
    let service = RuntimeService::new(config);
    let recovered = service.recover().context("cannot recover containers")?;
    tracing::debug!(recovered, "registry ready");

    match cli.command {
        Command::Create(args) => create::execute(&service, args),
        Command::Start(args) => start::execute(&service, &args),
        Command::Ps(args) => ps::execute(&service, &args),
        Command::Stats(args) => stats::execute(&service, &args),
        Command::Stop(args) => stop::execute(&service, &args),
        Command::Rm(args) => rm::execute(&service, &args),
    }
}
