//! Configuration model for the conman runtime service.
//!
//! The configuration is built once at process start and handed to the
//! service constructor by value; nothing reads global flag state.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{ConmanError, Result};

/// Root configuration for the runtime service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Base directory; containers live under `<root_dir>/containers/<id>`.
    pub root_dir: PathBuf,
    /// Directory holding `<id>.log` files.
    pub log_dir: PathBuf,
    /// Directory holding per-container exit files.
    pub exit_dir: PathBuf,
    /// Directory holding per-container attach files.
    pub attach_dir: PathBuf,
    /// Root filesystem copied into each new bundle.
    pub rootfs_source: PathBuf,
    /// Launcher executable spawned for each container.
    pub shim_path: PathBuf,
    /// OCI runtime executable.
    pub runtime_path: PathBuf,
    /// State directory passed to the OCI runtime as `--root`.
    pub runtime_root: PathBuf,
    /// Deadline for the launcher handshake.
    #[serde(with = "millis")]
    pub create_timeout: Duration,
    /// Polling policy used while waiting for a started container.
    pub start_policy: StartPolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from(constants::DEFAULT_ROOT_DIR),
            log_dir: PathBuf::from(constants::DEFAULT_LOG_DIR),
            exit_dir: PathBuf::from(constants::DEFAULT_EXIT_DIR),
            attach_dir: PathBuf::from(constants::DEFAULT_ATTACH_DIR),
            rootfs_source: PathBuf::from(constants::DEFAULT_ROOTFS_SOURCE),
            shim_path: PathBuf::from(constants::DEFAULT_SHIM_BINARY),
            runtime_path: PathBuf::from(constants::DEFAULT_RUNTIME_BINARY),
            runtime_root: PathBuf::from(constants::DEFAULT_RUNTIME_ROOT),
            create_timeout: Duration::from_secs(10),
            start_policy: StartPolicy::default(),
        }
    }
}

impl RuntimeConfig {
    /// Loads a JSON configuration file, falling back to defaults when the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file exists but cannot be read, and
    /// `InvalidArgument` if it cannot be parsed or its start policy is
    /// unusable.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| ConmanError::io(path, e))?;
        let config: Self =
            serde_json::from_str(&content).map_err(|e| ConmanError::InvalidArgument {
                message: format!("invalid config {}: {e}", path.display()),
            })?;
        config.start_policy.validate()?;
        Ok(config)
    }

    /// Resolves bare executable names (`runc`, `shimmy`) through `PATH`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if an executable cannot be located.
    pub fn resolve_binaries(mut self) -> Result<Self> {
        self.shim_path = resolve_binary(&self.shim_path)?;
        self.runtime_path = resolve_binary(&self.runtime_path)?;
        Ok(self)
    }

    /// Returns the directory that holds one base directory per container.
    #[must_use]
    pub fn containers_dir(&self) -> PathBuf {
        self.root_dir.join(constants::CONTAINERS_DIR)
    }
}

fn resolve_binary(path: &Path) -> Result<PathBuf> {
    if path.components().count() > 1 {
        return Ok(path.to_path_buf());
    }
    which::which(path).map_err(|_| ConmanError::NotFound {
        kind: "executable",
        id: path.display().to_string(),
    })
}

/// Exponential backoff policy for start polling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartPolicy {
    /// Delay before the first observation.
    #[serde(with = "millis")]
    pub initial_delay: Duration,
    /// Ceiling for a single delay.
    #[serde(with = "millis")]
    pub max_delay: Duration,
    /// Ceiling for the cumulative wait.
    #[serde(with = "millis")]
    pub max_wait: Duration,
    /// Relative jitter applied to each delay, in `0.0..=1.0`.
    pub jitter: f64,
}

impl StartPolicy {
    /// Checks that the policy describes a growing, bounded sequence.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `initial_delay` is zero, `max_delay`
    /// is below `initial_delay`, or `jitter` lies outside `0.0..=1.0`.
    pub fn validate(&self) -> Result<()> {
        let problem = if self.initial_delay.is_zero() {
            "start_policy.initial_delay must be positive"
        } else if self.max_delay < self.initial_delay {
            "start_policy.max_delay must not be below initial_delay"
        } else if !(0.0..=1.0).contains(&self.jitter) {
            "start_policy.jitter must be within 0.0..=1.0"
        } else {
            return Ok(());
        };
        Err(ConmanError::InvalidArgument {
            message: problem.to_string(),
        })
    }
}

impl Default for StartPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            max_wait: Duration::from_secs(60),
            jitter: 0.1,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::cast_possible_truncation)]
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = RuntimeConfig::load(&dir.path().join("absent.json")).expect("load");
        assert_eq!(cfg, RuntimeConfig::default());
    }

    #[test]
    fn partial_file_overrides_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("conman.json");
        std::fs::write(
            &path,
            r#"{"root_dir": "/tmp/cm", "create_timeout": 50, "start_policy": {"jitter": 0.0}}"#,
        )
        .expect("write");

        let cfg = RuntimeConfig::load(&path).expect("load");
        assert_eq!(cfg.root_dir, PathBuf::from("/tmp/cm"));
        assert_eq!(cfg.create_timeout, Duration::from_millis(50));
        assert!(cfg.start_policy.jitter.abs() < f64::EPSILON);
        assert_eq!(cfg.start_policy.initial_delay, Duration::from_millis(200));
        assert_eq!(cfg.runtime_path, PathBuf::from("runc"));
    }

    #[test]
    fn malformed_file_is_invalid_argument() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("conman.json");
        std::fs::write(&path, "{ not json").expect("write");
        let err = RuntimeConfig::load(&path).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidArgument);
    }

    #[test]
    fn unusable_start_policy_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("conman.json");
        for policy in [
            r#"{"initial_delay": 0}"#,
            r#"{"initial_delay": 500, "max_delay": 100}"#,
            r#"{"jitter": 1.5}"#,
        ] {
            std::fs::write(&path, format!(r#"{{"start_policy": {policy}}}"#)).expect("write");
            let err = RuntimeConfig::load(&path).unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::InvalidArgument, "{policy}");
        }
    }

    #[test]
    fn default_start_policy_is_valid() {
        StartPolicy::default().validate().expect("valid");
    }

    #[test]
    fn containers_dir_is_under_root() {
        let cfg = RuntimeConfig {
            root_dir: PathBuf::from("/srv/cm"),
            ..RuntimeConfig::default()
        };
        assert_eq!(cfg.containers_dir(), PathBuf::from("/srv/cm/containers"));
    }

    #[test]
    fn absolute_binaries_are_kept_verbatim() {
        let cfg = RuntimeConfig {
            shim_path: PathBuf::from("/opt/bin/shimmy"),
            runtime_path: PathBuf::from("/opt/bin/runc"),
            ..RuntimeConfig::default()
        };
        let cfg = cfg.resolve_binaries().expect("resolve");
        assert_eq!(cfg.runtime_path, PathBuf::from("/opt/bin/runc"));
    }

    #[test]
    fn unknown_bare_binary_is_not_found() {
        let cfg = RuntimeConfig {
            runtime_path: PathBuf::from("definitely-not-a-real-runtime-binary"),
            shim_path: PathBuf::from("/bin/sh"),
            ..RuntimeConfig::default()
        };
        let err = cfg.resolve_binaries().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);
    }
}
