//! Container identity and on-disk layout.
//!
//! ```text
//! <base>/
//! ├── bundle/
//! │   ├── config.json     runtime configuration document
//! │   └── rootfs/         copied root filesystem
//! └── state.json          one status word, replaced atomically
//! ```
//!
//! The log, attach, and exit files live wherever the [`PathResolver`]
//! puts them, usually in shared per-kind directories.

use std::path::{Path, PathBuf};

use conman_common::config::RuntimeConfig;
use conman_common::constants::{BUNDLE_DIR, ROOTFS_DIR, RUNTIME_SPEC_FILE, STATE_FILE};
use conman_common::error::{ConmanError, Result, ResultExt};
use conman_common::types::{ContainerId, Status};

/// Path policy for container layouts.
///
/// Keeping the policy outside [`Handle`] lets tests place containers in a
/// temporary directory and lets the service decide where logs go.
pub trait PathResolver {
    /// Base directory holding the bundle and the state file.
    fn base_dir(&self, id: &ContainerId) -> PathBuf;
    /// Container log file.
    fn log_file(&self, id: &ContainerId) -> PathBuf;
    /// Interactive I/O channel.
    fn attach_file(&self, id: &ContainerId) -> PathBuf;
    /// File receiving the container's exit status.
    fn exit_file(&self, id: &ContainerId) -> PathBuf;
}

impl PathResolver for RuntimeConfig {
    fn base_dir(&self, id: &ContainerId) -> PathBuf {
        self.containers_dir().join(id.as_str())
    }

    fn log_file(&self, id: &ContainerId) -> PathBuf {
        self.log_dir.join(format!("{id}.log"))
    }

    fn attach_file(&self, id: &ContainerId) -> PathBuf {
        self.attach_dir.join(id.as_str())
    }

    fn exit_file(&self, id: &ContainerId) -> PathBuf {
        self.exit_dir.join(id.as_str())
    }
}

/// Durable identity of one container.
///
/// Produced once by [`Handle::allocate`] and read-only afterwards; only the
/// state file behind it changes.
#[derive(Debug, PartialEq, Eq)]
pub struct Handle {
    id: ContainerId,
    base_dir: PathBuf,
    log_file: PathBuf,
    attach_file: PathBuf,
    exit_file: PathBuf,
}

impl Handle {
    /// Generates a fresh identifier and creates its base directory.
    ///
    /// # Errors
    ///
    /// See [`Handle::allocate_as`].
    pub fn allocate(paths: &impl PathResolver) -> Result<Self> {
        Self::allocate_as(ContainerId::generate(), paths)
    }

    /// Creates the base directory for `id` with owner-only permissions.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the base directory is already present, or
    /// `Io` if it cannot be checked or created. No handle is returned on
    /// failure.
    pub fn allocate_as(id: ContainerId, paths: &impl PathResolver) -> Result<Self> {
        let base_dir = paths.base_dir(&id);
        if conman_core::fs::exists(&base_dir).context("cannot access container dir")? {
            return Err(ConmanError::AlreadyExists { path: base_dir });
        }
        conman_core::fs::create_dir_all(&base_dir, 0o700)
            .context("cannot create container dir")?;
        tracing::debug!(id = %id, base = %base_dir.display(), "container layout allocated");
        Ok(Self::open(id, paths))
    }

    /// Rebuilds the handle of an existing container without touching disk.
    pub fn open(id: ContainerId, paths: &impl PathResolver) -> Self {
        Self {
            base_dir: paths.base_dir(&id),
            log_file: paths.log_file(&id),
            attach_file: paths.attach_file(&id),
            exit_file: paths.exit_file(&id),
            id,
        }
    }

    /// Container identifier.
    pub const fn id(&self) -> &ContainerId {
        &self.id
    }

    /// Base directory of the container.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// OCI bundle directory.
    pub fn bundle_dir(&self) -> PathBuf {
        self.base_dir.join(BUNDLE_DIR)
    }

    /// Root filesystem inside the bundle.
    pub fn rootfs_dir(&self) -> PathBuf {
        self.bundle_dir().join(ROOTFS_DIR)
    }

    /// Runtime configuration document inside the bundle.
    pub fn runtime_spec_file(&self) -> PathBuf {
        self.bundle_dir().join(RUNTIME_SPEC_FILE)
    }

    /// File holding the recorded status word.
    pub fn state_file(&self) -> PathBuf {
        self.base_dir.join(STATE_FILE)
    }

    /// Container log file.
    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// Interactive I/O channel.
    pub fn attach_file(&self) -> &Path {
        &self.attach_file
    }

    /// Exit status file.
    pub fn exit_file(&self) -> &Path {
        &self.exit_file
    }

    /// Populates the bundle: copies `rootfs` and writes the runtime
    /// configuration document.
    ///
    /// # Errors
    ///
    /// Returns `Io` on the first failing step. A partially copied tree is
    /// left in place; removing the base directory cleans it up.
    pub fn bundle(&self, spec: &[u8], rootfs: &Path) -> Result<()> {
        conman_core::fs::create_dir_all(&self.bundle_dir(), 0o700)
            .context("cannot create bundle dir")?;
        conman_core::fs::copy_dir(rootfs, &self.rootfs_dir()).context("cannot copy rootfs dir")?;
        let spec_file = self.runtime_spec_file();
        std::fs::write(&spec_file, spec)
            .map_err(|e| ConmanError::io(&spec_file, e))
            .context("cannot write OCI runtime spec file")?;
        tracing::debug!(id = %self.id, source = %rootfs.display(), "bundle prepared");
        Ok(())
    }

    /// Reads the recorded status. An absent state file means `Initial`.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file exists but cannot be read, and
    /// `InvalidArgument` if it holds an unrecognized word.
    pub fn status(&self) -> Result<Status> {
        let path = self.state_file();
        match std::fs::read_to_string(&path) {
            Ok(word) => word.parse(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Status::Initial),
            Err(e) => Err(ConmanError::io(path, e)),
        }
    }

    fn write_status(&self, status: Status) -> Result<()> {
        conman_core::fs::atomic_write(&self.state_file(), status.as_str().as_bytes(), 0o600)
            .context("cannot write status")?;
        tracing::info!(id = %self.id, %status, "status recorded");
        Ok(())
    }

    /// Records that the runtime created the container.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the state file cannot be replaced.
    pub fn created(&self) -> Result<()> {
        self.write_status(Status::Created)
    }

    /// Records that the container was started.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the state file cannot be replaced.
    pub fn started(&self) -> Result<()> {
        self.write_status(Status::Running)
    }
}
