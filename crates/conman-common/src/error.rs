//! Unified error types for the conman workspace.
//!
//! Every layer reports failures as a [`ConmanError`]. Layers add their own
//! operation label with [`ResultExt::context`], and callers match on
//! [`ConmanError::kind`], which sees through any number of those labels.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum ConmanError {
    /// An identifier is not present in the registry.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// A resource that must be fresh already exists.
    #[error("already exists: {}", path.display())]
    AlreadyExists {
        /// Path that was expected to be absent.
        path: PathBuf,
    },

    /// A caller supplied an unusable value.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the rejected value.
        message: String,
    },

    /// An operation was attempted from a disallowed status.
    #[error("container {id} is in state {status}")]
    InvalidState {
        /// Container the operation targeted.
        id: String,
        /// Status observed when the operation was rejected.
        status: String,
    },

    /// A bounded wait ran past its deadline.
    #[error("{operation} timed out after {}ms", after.as_millis())]
    Timeout {
        /// The wait that expired.
        operation: String,
        /// Deadline that elapsed.
        after: Duration,
    },

    /// A peer process sent a malformed or unacceptable message.
    #[error("protocol error: {message} (report: {report})")]
    Protocol {
        /// What was wrong with the message.
        message: String,
        /// The raw or decoded report, verbatim.
        report: String,
    },

    /// A subprocess exited unsuccessfully.
    #[error("{command} failed ({status}), stderr=[{stderr}]")]
    RuntimeExecution {
        /// Command line that was executed.
        command: String,
        /// Exit status description.
        status: String,
        /// Captured standard error.
        stderr: String,
    },

    /// An I/O operation failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },

    /// The operation exists in the API but has no implementation yet.
    #[error("{operation} is not implemented")]
    NotImplemented {
        /// Name of the unavailable operation.
        operation: &'static str,
    },

    /// An inner error annotated with the operation that observed it.
    #[error("{context}: {source}")]
    Context {
        /// Operation label.
        context: String,
        /// Wrapped error.
        source: Box<ConmanError>,
    },
}

/// Classification of a [`ConmanError`], independent of context labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`ConmanError::NotFound`].
    NotFound,
    /// See [`ConmanError::AlreadyExists`].
    AlreadyExists,
    /// See [`ConmanError::InvalidArgument`].
    InvalidArgument,
    /// See [`ConmanError::InvalidState`].
    InvalidState,
    /// See [`ConmanError::Timeout`].
    Timeout,
    /// See [`ConmanError::Protocol`].
    Protocol,
    /// See [`ConmanError::RuntimeExecution`].
    RuntimeExecution,
    /// See [`ConmanError::Io`].
    Io,
    /// See [`ConmanError::Serialization`].
    Serialization,
    /// See [`ConmanError::NotImplemented`].
    NotImplemented,
}

impl ConmanError {
    /// Builds an [`ConmanError::Io`] for the given path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns the taxonomy of this error, looking through context labels.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Protocol { .. } => ErrorKind::Protocol,
            Self::RuntimeExecution { .. } => ErrorKind::RuntimeExecution,
            Self::Io { .. } => ErrorKind::Io,
            Self::Serialization { .. } => ErrorKind::Serialization,
            Self::NotImplemented { .. } => ErrorKind::NotImplemented,
            Self::Context { source, .. } => source.kind(),
        }
    }

    /// Returns the innermost error, skipping context labels.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, ConmanError>;

/// Adds an operation label to the error side of a [`Result`].
pub trait ResultExt<T> {
    /// Wraps the error, if any, in [`ConmanError::Context`].
    ///
    /// # Errors
    ///
    /// Returns the original error wrapped with `context`.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|source| ConmanError::Context {
            context: context.into(),
            source: Box::new(source),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_sees_through_nested_context() {
        let err: Result<()> = Err(ConmanError::Timeout {
            operation: "handshake".into(),
            after: Duration::from_millis(50),
        });
        let err = err
            .context("create container")
            .context("runtime service")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(matches!(err.root(), ConmanError::Timeout { .. }));
    }

    #[test]
    fn context_is_rendered_before_cause() {
        let err: Result<()> = Err(ConmanError::NotFound {
            kind: "container",
            id: "abc".into(),
        });
        let msg = err.context("start container").unwrap_err().to_string();
        assert_eq!(msg, "start container: container not found: abc");
    }

    #[test]
    fn runtime_execution_includes_stderr() {
        let err = ConmanError::RuntimeExecution {
            command: "runc start x".into(),
            status: "exit status: 1".into(),
            stderr: "container does not exist".into(),
        };
        assert!(err.to_string().contains("stderr=[container does not exist]"));
    }

    #[test]
    fn serde_errors_convert() {
        let err: ConmanError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::Serialization);
    }
}
