//! Point-in-time view of a container as reported by the OCI runtime.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use conman_common::types::{ContainerId, Status};
use serde::{Deserialize, Serialize};

/// Runtime-observed facts about a container. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Instance {
    /// Container identifier, when the source reported one.
    pub id: Option<ContainerId>,
    /// Process id of the container's init process (0 if none).
    pub pid: u32,
    /// When the runtime created the container.
    pub created_at: Option<DateTime<Utc>>,
    /// When the container process started.
    pub started_at: Option<DateTime<Utc>>,
    /// Observed status.
    pub status: Status,
}

impl Instance {
    /// Instance known only by the pid a launcher reported.
    #[must_use]
    pub fn from_pid(pid: u32) -> Self {
        Self {
            pid,
            ..Self::default()
        }
    }

    /// Returns `true` if the container may be started from this state.
    #[must_use]
    pub fn can_start(&self) -> bool {
        self.status == Status::Created
    }
}

/// Output of `<runtime> state <id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OciState {
    /// OCI specification version the runtime implements.
    #[serde(default)]
    pub oci_version: String,
    /// Container identifier.
    pub id: String,
    /// Runtime status word (`creating`, `created`, `running`, `stopped`, ...).
    pub status: String,
    /// Init process id; zero once the container stopped.
    #[serde(default)]
    pub pid: i64,
    /// Absolute bundle path.
    #[serde(default)]
    pub bundle: String,
    /// Root filesystem path, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rootfs: Option<String>,
    /// Creation timestamp, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    /// Annotations from the runtime configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<HashMap<String, String>>,
}

impl From<OciState> for Instance {
    fn from(state: OciState) -> Self {
        Self {
            id: Some(ContainerId::new(state.id)),
            pid: u32::try_from(state.pid).unwrap_or(0),
            created_at: state.created,
            started_at: None,
            status: Status::parse_lossy(&state.status),
        }
    }
}
