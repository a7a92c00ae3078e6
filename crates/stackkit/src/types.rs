//! Core types for OpenStack server and volume management.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Identifier of a block-storage volume.
///
/// Always a UUID in its canonical 8-4-4-4-12 hex layout, stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VolumeId(String);

impl VolumeId {
    const GROUPS: [usize; 5] = [8, 4, 4, 4, 12];

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for VolumeId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let groups: Vec<&str> = s.split('-').collect();
        let valid = groups.len() == Self::GROUPS.len()
            && groups
                .iter()
                .zip(Self::GROUPS)
                .all(|(g, len)| g.len() == len && g.chars().all(|c| c.is_ascii_hexdigit()));

        if !valid {
            return Err(Error::InvalidVolumeId(s.to_string()));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }
}

impl TryFrom<String> for VolumeId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VolumeId> for String {
    fn from(id: VolumeId) -> Self {
        id.0
    }
}

impl AsRef<str> for VolumeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VolumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Power state of a server as reported in `OS-EXT-STS:power_state`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PowerState {
    /// The guest is running
    Running,
    /// The guest is powered off
    Shutdown,
    /// Any other platform value (Paused, Suspended, Crashed, NOSTATE, ...)
    Other(String),
}

impl PowerState {
    /// The status token the control plane prints for this state.
    pub fn as_str(&self) -> &str {
        match self {
            PowerState::Running => "Running",
            PowerState::Shutdown => "Shutdown",
            PowerState::Other(raw) => raw,
        }
    }

    /// Interpret a raw status value by exact token.
    pub fn from_status(raw: &str) -> Self {
        Self::classify(raw, MatchMode::Exact)
    }

    /// Interpret a raw status value the way the poller compares it.
    ///
    /// `Running` is checked first, so under [`MatchMode::Contains`] a value
    /// such as `Running (1)` is still running.
    pub fn classify(raw: &str, mode: MatchMode) -> Self {
        if mode.matches(raw, PowerState::Running.as_str()) {
            PowerState::Running
        } else if mode.matches(raw, PowerState::Shutdown.as_str()) {
            PowerState::Shutdown
        } else {
            PowerState::Other(raw.trim().to_string())
        }
    }

    /// Whether the server is running.
    pub fn is_running(&self) -> bool {
        matches!(self, PowerState::Running)
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a volume as reported by `volume show -c status`.
///
/// Only the two settled states are modelled; transitional values such as
/// `detaching` are simply "not there yet" for the poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeStatus {
    /// Attached to a server (`in-use`)
    Attached,
    /// Not attached to any server (`available`)
    Detached,
}

impl VolumeStatus {
    /// The status token the control plane prints for this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            VolumeStatus::Attached => "in-use",
            VolumeStatus::Detached => "available",
        }
    }
}

/// Which cloud and region every control-plane call is addressed to.
///
/// Built once at startup and never modified; its flags are prepended to
/// every invocation of the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloudTarget {
    /// Cloud name from `clouds.yaml` (`--os-cloud`)
    pub cloud: Option<String>,
    /// Region name (`--os-region-name`)
    pub region: Option<String>,
}

impl CloudTarget {
    /// Create a target for the given cloud and region.
    pub fn new(cloud: Option<String>, region: Option<String>) -> Self {
        Self { cloud, region }
    }

    /// Global client flags selecting this target.
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(cloud) = &self.cloud {
            args.push("--os-cloud".to_string());
            args.push(cloud.clone());
        }
        if let Some(region) = &self.region {
            args.push("--os-region-name".to_string());
            args.push(region.clone());
        }
        args
    }
}

/// Captured result of one command execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Whether the process exited with status zero
    pub success: bool,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl CommandOutput {
    /// A successful run with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed run with the given stderr.
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

impl From<std::process::Output> for CommandOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }
}

/// How an observed status is compared with the desired one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Trimmed status must equal the desired token
    #[default]
    Exact,
    /// Desired token may appear anywhere in the raw status
    Contains,
}

impl MatchMode {
    /// Compare a raw observed status with the desired token.
    pub fn matches(&self, observed: &str, desired: &str) -> bool {
        match self {
            MatchMode::Exact => observed.trim() == desired,
            MatchMode::Contains => observed.contains(desired),
        }
    }
}

/// Configuration for convergence polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between two status queries
    pub interval: Duration,
    /// Give up once this much time has passed since the first query
    pub timeout: Duration,
    /// How observed statuses are compared
    pub match_mode: MatchMode,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            timeout: Duration::from_secs(300),
            match_mode: MatchMode::Exact,
        }
    }
}

impl PollConfig {
    /// Create a poll config with custom timing and exact matching.
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            match_mode: MatchMode::Exact,
        }
    }

    /// Use a different match mode.
    pub fn with_match_mode(mut self, match_mode: MatchMode) -> Self {
        self.match_mode = match_mode;
        self
    }
}
