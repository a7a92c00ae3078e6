//! Error types for OpenStack control-plane operations.
//!
//! Errors are categorized so callers can tell a rejected command apart from
//! unparseable output or a missing `openstack` binary.

use thiserror::Error;

/// Categories of control-plane errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The control plane ran the command and returned a non-zero exit
    Rejected,
    /// Command output could not be interpreted
    Parse,
    /// The `openstack` client could not be found or started
    CliNotFound,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Rejected => "Command rejected by the control plane",
            Self::Parse => "Unexpected command output",
            Self::CliNotFound => "OpenStack client not installed",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Rejected => "Check the captured stderr and the state of the resource in the cloud",
            Self::Parse => "Check the version of the openstack client",
            Self::CliNotFound => "Install python-openstackclient or pass --openstack-bin",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors that can occur while talking to the control plane.
#[derive(Debug, Error)]
pub enum Error {
    /// The command ran but exited non-zero
    #[error("{operation} rejected: {stderr}")]
    CommandRejected {
        /// The operation that was rejected (e.g. `server stop web01`)
        operation: String,
        /// Standard error output from the failed command
        stderr: String,
    },

    /// The client binary is missing
    #[error("{0} not found in PATH")]
    CliNotFound(String),

    /// A volume identifier did not have the 8-4-4-4-12 hex layout
    #[error("invalid volume id: {0:?}")]
    InvalidVolumeId(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::CommandRejected { .. } => ErrorCategory::Rejected,
            Error::InvalidVolumeId(_) => ErrorCategory::Parse,
            Error::CliNotFound(_) => ErrorCategory::CliNotFound,
            Error::Io(_) => ErrorCategory::Other,
        }
    }

    /// Whether the control plane itself refused the operation.
    pub fn is_rejection(&self) -> bool {
        self.category() == ErrorCategory::Rejected
    }

    /// Build a rejection from the captured stderr of a failed command.
    pub fn rejected(operation: impl Into<String>, stderr: &str) -> Self {
        let stderr = stderr.trim();
        Error::CommandRejected {
            operation: operation.into(),
            stderr: if stderr.is_empty() {
                "no error output".to_string()
            } else {
                stderr.to_string()
            },
        }
    }
}

/// Result type for control-plane operations.
pub type Result<T> = std::result::Result<T, Error>;
