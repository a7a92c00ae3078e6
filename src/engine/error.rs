//! Failure types for a backup run.

use super::orchestrator::Phase;
use std::time::Duration;
use thiserror::Error;

/// Why a single step did not complete.
#[derive(Debug, Error)]
pub enum StepFailure {
    /// The control plane refused a request or a query failed
    #[error(transparent)]
    Rejected(#[from] stackkit::Error),

    /// A resource never reached the desired status
    #[error(
        "{resource} did not reach '{desired}' within {secs}s (last seen: {seen})",
        secs = .waited.as_secs(),
        seen = .last_observed.as_deref().unwrap_or("nothing")
    )]
    Timeout {
        /// Server name or volume id
        resource: String,
        /// Status that was waited for
        desired: String,
        /// Last status observed before giving up
        last_observed: Option<String>,
        /// How long the poller waited
        waited: Duration,
    },
}

/// Errors that end a backup run.
#[derive(Debug, Error)]
pub enum BackupError {
    /// The initial state could not be read; nothing was changed.
    #[error("could not read the {what} of server {server}")]
    Capture {
        server: String,
        what: &'static str,
        #[source]
        source: stackkit::Error,
    },

    /// A backup step failed. Returned on its own only once the original
    /// state has been restored.
    #[error("{} failed", .phase.action())]
    Step {
        phase: Phase,
        #[source]
        failure: StepFailure,
    },

    /// Restoring the original state failed. The server may be left stopped
    /// or with volumes detached.
    #[error("{} failed, manual intervention required", .phase.action())]
    Rollback {
        phase: Phase,
        #[source]
        failure: StepFailure,
        /// The failure that triggered the rollback, if any
        cause: Option<Box<BackupError>>,
    },
}

impl BackupError {
    /// Whether the server may have been left in a state different from the
    /// one captured at the start.
    pub fn needs_operator(&self) -> bool {
        matches!(self, BackupError::Rollback { .. })
    }

    /// The control-plane error behind this failure, if it was not a timeout.
    pub fn control_plane_error(&self) -> Option<&stackkit::Error> {
        match self {
            BackupError::Capture { source, .. } => Some(source),
            BackupError::Step { failure, .. } | BackupError::Rollback { failure, .. } => {
                match failure {
                    StepFailure::Rejected(e) => Some(e),
                    StepFailure::Timeout { .. } => None,
                }
            }
        }
    }

    /// The failure that preceded a rollback failure.
    pub fn cause(&self) -> Option<&BackupError> {
        match self {
            BackupError::Rollback { cause, .. } => cause.as_deref(),
            _ => None,
        }
    }
}
