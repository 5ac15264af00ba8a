//! Request and response shapes of the lifecycle API.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use conman_common::types::{ContainerId, Status};
use serde::{Deserialize, Serialize};

/// Parameters of a container creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateContainerRequest {
    /// Executable and leading arguments.
    pub command: Vec<String>,
    /// Remaining arguments.
    pub args: Vec<String>,
    /// Root filesystem to copy into the bundle; the configured source when
    /// `None`.
    pub root_path: Option<PathBuf>,
    /// Mount the root filesystem read-only.
    pub read_only: bool,
    /// Keep standard input open.
    pub stdin: bool,
    /// Close standard input after the first attach detaches.
    pub stdin_once: bool,
}

/// Container state as an orchestrator sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CriState {
    /// Created but not started.
    Created,
    /// Running.
    Running,
    /// Exited.
    Exited,
    /// Anything else.
    Unknown,
}

impl From<Status> for CriState {
    fn from(status: Status) -> Self {
        match status {
            Status::Initial | Status::Created => Self::Created,
            Status::Running => Self::Running,
            Status::Stopped => Self::Exited,
            Status::Unknown => Self::Unknown,
        }
    }
}

/// One entry of a container listing.
///
/// Image, sandbox, and label information is not tracked and stays empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSummary {
    /// Container identifier.
    pub id: ContainerId,
    /// Owning pod sandbox.
    pub pod_sandbox_id: String,
    /// Image name.
    pub image: String,
    /// Resolved image reference.
    pub image_ref: String,
    /// Observed state.
    pub state: CriState,
    /// Creation time in unix seconds, zero if unknown.
    pub created_at: i64,
    /// Labels.
    pub labels: HashMap<String, String>,
    /// Annotations.
    pub annotations: HashMap<String, String>,
}

/// CPU usage sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuUsage {
    /// When the sample was taken.
    pub timestamp: DateTime<Utc>,
    /// Cumulative CPU time in nanoseconds.
    pub usage_core_nano_seconds: u64,
}

/// Memory usage sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryUsage {
    /// When the sample was taken.
    pub timestamp: DateTime<Utc>,
    /// Working set size in bytes.
    pub working_set_bytes: u64,
}

/// Resource usage of one container. Figures are not collected and stay
/// zero; only the timestamps are meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStats {
    /// Container identifier.
    pub id: ContainerId,
    /// CPU sample.
    pub cpu: CpuUsage,
    /// Memory sample.
    pub memory: MemoryUsage,
}

impl ContainerStats {
    /// Empty sample for `id` taken at `timestamp`.
    pub const fn empty(id: ContainerId, timestamp: DateTime<Utc>) -> Self {
        Self {
            id,
            cpu: CpuUsage {
                timestamp,
                usage_core_nano_seconds: 0,
            },
            memory: MemoryUsage {
                timestamp,
                working_set_bytes: 0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_projection() {
        assert_eq!(CriState::from(Status::Initial), CriState::Created);
        assert_eq!(CriState::from(Status::Created), CriState::Created);
        assert_eq!(CriState::from(Status::Running), CriState::Running);
        assert_eq!(CriState::from(Status::Stopped), CriState::Exited);
        assert_eq!(CriState::from(Status::Unknown), CriState::Unknown);
    }

    #[test]
    fn cri_state_serializes_upper_case() {
        assert_eq!(
            serde_json::to_string(&CriState::Exited).expect("json"),
            "\"EXITED\""
        );
    }
}
