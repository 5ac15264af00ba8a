//! System-wide constants and default paths.

/// Default base directory for container state and bundles.
pub const DEFAULT_ROOT_DIR: &str = "/var/lib/conman";

/// Default directory holding per-container log files.
pub const DEFAULT_LOG_DIR: &str = "/var/log/conman";

/// Default directory holding per-container exit files.
pub const DEFAULT_EXIT_DIR: &str = "/run/conman/exits";

/// Default directory holding per-container attach sockets.
pub const DEFAULT_ATTACH_DIR: &str = "/run/conman/attach";

/// Default root filesystem copied into every bundle.
pub const DEFAULT_ROOTFS_SOURCE: &str = "/var/lib/conman/rootfs";

/// Default launcher executable spawned once per container.
pub const DEFAULT_SHIM_BINARY: &str = "shimmy";

/// Default low-level OCI runtime executable.
pub const DEFAULT_RUNTIME_BINARY: &str = "runc";

/// Default `--root` handed to the OCI runtime.
pub const DEFAULT_RUNTIME_ROOT: &str = "/run/conman/runc";

/// Directory under which shim control sockets are created.
pub const SOCKET_ROOT: &str = "/run/conman";

/// Namespace mixed into shim socket address digests.
pub const SOCKET_NAMESPACE: &str = "conman";

/// Subdirectory of a container's base directory holding the OCI bundle.
pub const BUNDLE_DIR: &str = "bundle";

/// Subdirectory of the bundle holding the root filesystem.
pub const ROOTFS_DIR: &str = "rootfs";

/// File name of the OCI runtime configuration inside the bundle.
pub const RUNTIME_SPEC_FILE: &str = "config.json";

/// File name of the persisted status word inside the base directory.
pub const STATE_FILE: &str = "state.json";

/// Directory under the root directory that holds one entry per container.
pub const CONTAINERS_DIR: &str = "containers";

/// Handshake report kind announcing the container process id.
pub const CONTAINER_PID_REPORT: &str = "container_pid";

/// Descriptor number at which inherited descriptors land in a child.
pub const INHERITED_FD: i32 = 3;

/// OCI runtime specification version written into generated bundles.
pub const OCI_VERSION: &str = "1.0.2";

/// Default configuration file read by the `conman` CLI.
pub const DEFAULT_CONFIG_FILE: &str = "/etc/conman/config.json";
