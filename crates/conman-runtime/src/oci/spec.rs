//! OCI runtime configuration (`config.json`) generation.

use std::path::PathBuf;

use conman_common::constants::OCI_VERSION;
use conman_common::error::{ConmanError, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_PATH: &str = "PATH=/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";
const DEFAULT_HOSTNAME: &str = "conman";

/// Inputs for [`RuntimeSpec::generate`].
#[derive(Debug, Clone, Default)]
pub struct SpecOptions {
    /// Executable and leading arguments.
    pub command: Vec<String>,
    /// Remaining arguments, appended after `command`.
    pub args: Vec<String>,
    /// Root filesystem path recorded in the document.
    pub root_path: PathBuf,
    /// Mount the root filesystem read-only.
    pub root_readonly: bool,
}

/// OCI runtime configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeSpec {
    /// Specification version.
    pub oci_version: String,
    /// Root filesystem.
    pub root: Root,
    /// Container process.
    pub process: Process,
    /// Container hostname.
    pub hostname: String,
    /// Mounts applied inside the container.
    pub mounts: Vec<Mount>,
    /// Linux-specific settings.
    pub linux: Linux,
}

/// Root filesystem of the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Root {
    /// Path to the root filesystem.
    pub path: PathBuf,
    /// Mount it read-only.
    pub readonly: bool,
}

/// Process executed in the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
    /// Allocate a terminal.
    pub terminal: bool,
    /// Identity the process runs as.
    pub user: User,
    /// Executable and arguments.
    pub args: Vec<String>,
    /// `KEY=value` environment entries.
    pub env: Vec<String>,
    /// Working directory.
    pub cwd: String,
}

/// Identity of the container process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User id inside the container.
    pub uid: u32,
    /// Group id inside the container.
    pub gid: u32,
}

/// A filesystem mounted into the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mount {
    /// Absolute path inside the container.
    pub destination: String,
    /// Filesystem type (`proc`, `tmpfs`, ...).
    #[serde(rename = "type")]
    pub mount_type: String,
    /// Device or source path.
    pub source: String,
    /// Mount options; omitted when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

/// Linux-specific settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Linux {
    /// Namespaces created for the container.
    pub namespaces: Vec<Namespace>,
}

/// A namespace to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    /// Namespace kind (`pid`, `mount`, ...).
    #[serde(rename = "type")]
    pub ns_type: String,
}

impl RuntimeSpec {
    /// Builds the document for a container running `command ++ args`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if there is nothing to execute.
    pub fn generate(opts: SpecOptions) -> Result<Self> {
        let args: Vec<String> = opts.command.into_iter().chain(opts.args).collect();
        if args.is_empty() {
            return Err(ConmanError::InvalidArgument {
                message: "container command is empty".into(),
            });
        }

        Ok(Self {
            oci_version: OCI_VERSION.to_string(),
            root: Root {
                path: opts.root_path,
                readonly: opts.root_readonly,
            },
            process: Process {
                terminal: false,
                user: User { uid: 0, gid: 0 },
                args,
                env: vec![DEFAULT_PATH.to_string()],
                cwd: "/".to_string(),
            },
            hostname: DEFAULT_HOSTNAME.to_string(),
            mounts: default_mounts(),
            linux: Linux {
                namespaces: ["pid", "network", "ipc", "uts", "mount"]
                    .into_iter()
                    .map(|ns| Namespace {
                        ns_type: ns.to_string(),
                    })
                    .collect(),
            },
        })
    }

    /// Serializes the document as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

fn mount(destination: &str, mount_type: &str, options: &[&str]) -> Mount {
    Mount {
        destination: destination.to_string(),
        mount_type: mount_type.to_string(),
        source: mount_type.to_string(),
        options: options.iter().map(ToString::to_string).collect(),
    }
}

fn default_mounts() -> Vec<Mount> {
    vec![
        mount("/proc", "proc", &[]),
        mount("/dev", "tmpfs", &["nosuid", "strictatime", "mode=755"]),
        mount("/dev/pts", "devpts", &["nosuid", "noexec", "newinstance"]),
        mount("/sys", "sysfs", &["nosuid", "noexec", "nodev", "ro"]),
    ]
}
