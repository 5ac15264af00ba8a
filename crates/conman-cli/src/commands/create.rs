//! `conman create`: Create a container.

use std::path::PathBuf;

use clap::Args;
use conman_runtime::api::CreateContainerRequest;
use conman_runtime::service::RuntimeService;

/// Arguments for the `create` command.
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Mount the root filesystem read-only.
    #[arg(long)]
    pub read_only: bool,

    /// Keep standard input open.
    #[arg(long)]
    pub stdin: bool,

    /// Close standard input after the first attach detaches.
    #[arg(long)]
    pub stdin_once: bool,

    /// Root filesystem to copy into the bundle (defaults to the configured
    /// source).
    #[arg(long)]
    pub rootfs: Option<PathBuf>,

    /// Command to run, followed by its arguments.
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}

impl From<CreateArgs> for CreateContainerRequest {
    fn from(args: CreateArgs) -> Self {
        let mut command = args.command;
        let rest = if command.is_empty() {
            Vec::new()
        } else {
            command.split_off(1)
        };
        Self {
            command,
            args: rest,
            root_path: args.rootfs,
            read_only: args.read_only,
            stdin: args.stdin,
            stdin_once: args.stdin_once,
        }
    }
}

/// Executes the `create` command and prints the new container id.
///
/// # Errors
///
/// Returns an error if the container cannot be created.
pub fn execute(service: &RuntimeService, args: CreateArgs) -> anyhow::Result<()> {
    let id = service.create_container(args.into())?;
    println!("{id}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_word_is_the_command() {
        let req = CreateContainerRequest::from(CreateArgs {
            read_only: true,
            stdin: false,
            stdin_once: false,
            rootfs: Some(PathBuf::from("/tmp/rootfsA")),
            command: vec!["/bin/echo".into(), "hi".into(), "there".into()],
        });
        assert_eq!(req.command, vec!["/bin/echo"]);
        assert_eq!(req.args, vec!["hi", "there"]);
        assert!(req.read_only);
        assert_eq!(req.root_path, Some(PathBuf::from("/tmp/rootfsA")));
    }
}
