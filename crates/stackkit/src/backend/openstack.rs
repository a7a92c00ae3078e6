//! OpenStack CLI backend using `openstack` commands.

use super::ControlPlane;
use crate::error::{Error, Result};
use crate::executor::{Executor, ProcessExecutor};
use crate::types::{CloudTarget, VolumeId};
use regex::Regex;
use std::sync::LazyLock;

/// Default name of the client executable.
pub const DEFAULT_CLI: &str = "openstack";

/// `server show` column holding the power state.
const POWER_STATE_FIELD: &str = "OS-EXT-STS:power_state";

/// `server show` column listing attached volumes.
const VOLUMES_FIELD: &str = "volumes_attached";

static VOLUME_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\bid['"]?\s*[=:]\s*['"]([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})['"]"#,
    )
    .expect("volume id pattern is valid")
});

/// Backend that executes real `openstack` commands.
///
/// Every invocation has the shape
/// `openstack [--os-cloud C] [--os-region-name R] <resource> <verb> [flags] [args]`.
pub struct OpenStackBackend<E: Executor = ProcessExecutor> {
    /// Path or name of the client executable
    program: String,
    /// Cloud and region prepended to every call
    target: CloudTarget,
    executor: E,
}

impl OpenStackBackend {
    /// Create a backend that spawns `program` for the given target.
    pub fn new(program: impl Into<String>, target: CloudTarget) -> Self {
        Self::with_executor(program, target, ProcessExecutor)
    }
}

impl<E: Executor> OpenStackBackend<E> {
    /// Create a backend with a custom executor (useful for testing).
    pub fn with_executor(program: impl Into<String>, target: CloudTarget, executor: E) -> Self {
        Self {
            program: program.into(),
            target,
            executor,
        }
    }

    /// Run a client command and return its stdout.
    ///
    /// `args` is the part after the global flags, e.g. `["server", "stop", "web01"]`.
    fn run(&self, args: &[&str]) -> Result<String> {
        let mut full: Vec<String> = self.target.args();
        full.extend(args.iter().map(|a| a.to_string()));

        log::info!("Running: {} {}", self.program, full.join(" "));
        let output = self.executor.run(&self.program, &full)?;

        if !output.success {
            let operation = args.join(" ");
            log::warn!("{} failed: {}", operation, output.stderr.trim());
            return Err(Error::rejected(operation, &output.stderr));
        }

        Ok(output.stdout)
    }

    fn run_unit(&self, args: &[&str]) -> Result<()> {
        self.run(args).map(|_| ())
    }
}

impl<E: Executor> ControlPlane for OpenStackBackend<E> {
    fn server_status(&self, server: &str) -> Result<String> {
        self.run(&["server", "show", "-c", POWER_STATE_FIELD, "-f", "value", server])
    }

    fn attached_volumes(&self, server: &str) -> Result<Vec<VolumeId>> {
        let stdout = self.run(&["server", "show", "-c", VOLUMES_FIELD, "-f", "value", server])?;
        parse_attached_volumes(&stdout)
    }

    fn stop_server(&self, server: &str) -> Result<()> {
        self.run_unit(&["server", "stop", server])
    }

    fn start_server(&self, server: &str) -> Result<()> {
        self.run_unit(&["server", "start", server])
    }

    fn detach_volume(&self, server: &str, volume: &VolumeId) -> Result<()> {
        self.run_unit(&["server", "remove", "volume", server, volume.as_str()])
    }

    fn attach_volume(&self, server: &str, volume: &VolumeId) -> Result<()> {
        self.run_unit(&["server", "add", "volume", server, volume.as_str()])
    }

    fn volume_status(&self, volume: &VolumeId) -> Result<String> {
        self.run(&["volume", "show", "-c", "status", "-f", "value", volume.as_str()])
    }

    fn create_server_backup(&self, server: &str, name: &str) -> Result<()> {
        self.run_unit(&["server", "backup", "create", "--name", name, "--wait", server])
    }

    fn create_volume_snapshot(&self, volume: &VolumeId, name: &str) -> Result<()> {
        self.run_unit(&["volume", "snapshot", "create", "--volume", volume.as_str(), name])
    }
}

/// Extract volume ids from `server show -c volumes_attached -f value`.
///
/// Current clients print one `id='<uuid>'` per line; older ones print a
/// list of dicts (`[{'id': '<uuid>'}]`). Lines without an id are skipped.
pub fn parse_attached_volumes(stdout: &str) -> Result<Vec<VolumeId>> {
    let mut volumes: Vec<VolumeId> = Vec::new();

    for caps in VOLUME_ID_PATTERN.captures_iter(stdout) {
        let id: VolumeId = caps[1].parse()?;
        if !volumes.contains(&id) {
            volumes.push(id);
        }
    }

    if volumes.is_empty() && stdout.contains("id") {
        log::debug!("No volume ids recognised in: {}", stdout.trim());
    }

    Ok(volumes)
}
