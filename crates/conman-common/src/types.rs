//! Domain primitive types used across the conman workspace.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Unique identifier for a container.
///
/// Generated identifiers are UUIDv4 values rendered as 32 lowercase hex
/// characters, which keeps them safe to use as path components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerId(String);

impl ContainerId {
    /// Creates a container ID from an existing string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random container ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` when the identifier holds no characters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ContainerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Lifecycle status of a container.
///
/// `Initial` is the value before anything was persisted and is never
/// written to disk. `Unknown` stands for anything the OCI runtime reports
/// that this manager does not model.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Nothing recorded yet.
    #[default]
    Initial,
    /// The runtime created the container; its process has not started.
    Created,
    /// The container process is running.
    Running,
    /// The container process has exited.
    Stopped,
    /// Unrecognized or error state.
    Unknown,
}

impl Status {
    /// Returns the persisted word for this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Created => "created",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Unknown => "unknown",
        }
    }

    /// Parses a status word, mapping anything unrecognized to `Unknown`.
    #[must_use]
    pub fn parse_lossy(word: &str) -> Self {
        word.parse().unwrap_or(Self::Unknown)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = crate::error::ConmanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "initial" => Ok(Self::Initial),
            "created" => Ok(Self::Created),
            "running" => Ok(Self::Running),
            "stopped" => Ok(Self::Stopped),
            "unknown" => Ok(Self::Unknown),
            other => Err(crate::error::ConmanError::InvalidArgument {
                message: format!("unrecognized status word: {other:?}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_simple_hex() {
        let id = ContainerId::generate();
        assert_eq!(id.as_str().len(), 32);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_ids_differ() {
        assert_ne!(ContainerId::generate(), ContainerId::generate());
    }

    #[test]
    fn status_words_parse_back() {
        for status in [
            Status::Initial,
            Status::Created,
            Status::Running,
            Status::Stopped,
            Status::Unknown,
        ] {
            assert_eq!(status.as_str().parse::<Status>().unwrap(), status);
        }
    }

    #[test]
    fn runtime_only_words_map_to_unknown() {
        assert_eq!(Status::parse_lossy("creating"), Status::Unknown);
        assert_eq!(Status::parse_lossy("paused"), Status::Unknown);
        assert_eq!(Status::parse_lossy("running\n"), Status::Running);
    }

    #[test]
    fn status_is_ordered_by_lifecycle() {
        assert!(Status::Initial < Status::Created);
        assert!(Status::Created < Status::Running);
        assert!(Status::Running < Status::Stopped);
        assert!(Status::Stopped < Status::Unknown);
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Status::Running).unwrap(), "\"running\"");
    }
}
