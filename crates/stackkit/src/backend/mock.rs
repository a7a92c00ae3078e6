//! In-memory control plane for testing without a cloud.
//!
//! Requests take effect immediately unless the resource has been frozen, in
//! which case they are accepted but the resource never changes state. Any
//! mutating operation can be made to fail with [`MockCloud::reject`].

use super::ControlPlane;
use crate::error::{Error, Result};
use crate::types::{PowerState, VolumeId, VolumeStatus};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// A mutating operation, used to inject failures and read the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    /// `server stop`
    Stop,
    /// `server start`
    Start,
    /// `server remove volume`
    Detach,
    /// `server add volume`
    Attach,
    /// `server backup create`
    Backup,
    /// `volume snapshot create`
    Snapshot,
}

/// One accepted or rejected mutating call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    /// What was requested
    pub op: MockOp,
    /// Server name or volume id the request targeted
    pub target: String,
    /// Artifact name for backups and snapshots
    pub name: Option<String>,
}

#[derive(Debug, Default)]
struct MockServer {
    power: String,
    volumes: Vec<VolumeId>,
}

#[derive(Debug, Default)]
struct MockState {
    servers: BTreeMap<String, MockServer>,
    volumes: BTreeMap<VolumeId, String>,
    rejected: HashSet<(MockOp, String)>,
    rejected_queries: HashSet<String>,
    frozen: HashSet<String>,
    calls: Vec<MockCall>,
    images: Vec<String>,
    snapshots: Vec<(VolumeId, String)>,
}

/// In-memory [`ControlPlane`].
#[derive(Debug, Default)]
pub struct MockCloud {
    state: Mutex<MockState>,
}

impl MockCloud {
    /// Create an empty cloud.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Add a server in the given power state.
    pub fn add_server(&self, name: &str, power: PowerState) {
        self.lock().servers.insert(
            name.to_string(),
            MockServer {
                power: power.as_str().to_string(),
                volumes: Vec::new(),
            },
        );
    }

    /// Add a volume attached to `server`.
    pub fn add_attached_volume(&self, server: &str, volume: &VolumeId) {
        let mut state = self.lock();
        state
            .volumes
            .insert(volume.clone(), VolumeStatus::Attached.as_str().to_string());
        if let Some(s) = state.servers.get_mut(server) {
            s.volumes.push(volume.clone());
        }
    }

    /// Make `op` against `target` fail with a rejection.
    pub fn reject(&self, op: MockOp, target: &str) {
        self.lock().rejected.insert((op, target.to_string()));
    }

    /// Make every status query against `target` fail.
    pub fn reject_queries(&self, target: &str) {
        self.lock().rejected_queries.insert(target.to_string());
    }

    /// Accept requests for `target` but never change its state.
    pub fn freeze(&self, target: &str) {
        self.lock().frozen.insert(target.to_string());
    }

    /// Mutating calls in the order they were made, including rejected ones.
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    /// Mutating calls of one kind.
    pub fn calls_of(&self, op: MockOp) -> Vec<MockCall> {
        self.calls().into_iter().filter(|c| c.op == op).collect()
    }

    /// Current power state of a server.
    pub fn power_of(&self, server: &str) -> Option<PowerState> {
        self.lock()
            .servers
            .get(server)
            .map(|s| PowerState::from_status(&s.power))
    }

    /// Volumes currently attached to a server.
    pub fn attached_to(&self, server: &str) -> Vec<VolumeId> {
        self.lock()
            .servers
            .get(server)
            .map(|s| s.volumes.clone())
            .unwrap_or_default()
    }

    /// Names of created server images.
    pub fn images(&self) -> Vec<String> {
        self.lock().images.clone()
    }

    /// Created volume snapshots as (volume, name).
    pub fn snapshots(&self) -> Vec<(VolumeId, String)> {
        self.lock().snapshots.clone()
    }

    /// Log a mutating call and decide whether it goes ahead.
    ///
    /// Returns `Ok(true)` when the state should change, `Ok(false)` when the
    /// target is frozen.
    fn request(&self, op: MockOp, target: &str, name: Option<&str>, label: &str) -> Result<bool> {
        let mut state = self.lock();
        state.calls.push(MockCall {
            op,
            target: target.to_string(),
            name: name.map(str::to_string),
        });

        if state.rejected.contains(&(op, target.to_string())) {
            return Err(Error::rejected(label, "rejected by mock cloud"));
        }
        Ok(!state.frozen.contains(target))
    }

    fn set_power(&self, server: &str, power: PowerState) -> Result<()> {
        let mut state = self.lock();
        let s = state
            .servers
            .get_mut(server)
            .ok_or_else(|| Error::rejected(format!("server {server}"), "No server found"))?;
        s.power = power.as_str().to_string();
        Ok(())
    }
}

impl ControlPlane for MockCloud {
    fn server_status(&self, server: &str) -> Result<String> {
        let state = self.lock();
        if state.rejected_queries.contains(server) {
            return Err(Error::rejected(format!("server show {server}"), "service unavailable"));
        }
        state
            .servers
            .get(server)
            .map(|s| format!("{}\n", s.power))
            .ok_or_else(|| Error::rejected(format!("server show {server}"), "No server found"))
    }

    fn attached_volumes(&self, server: &str) -> Result<Vec<VolumeId>> {
        let state = self.lock();
        if state.rejected_queries.contains(server) {
            return Err(Error::rejected(format!("server show {server}"), "service unavailable"));
        }
        state
            .servers
            .get(server)
            .map(|s| s.volumes.clone())
            .ok_or_else(|| Error::rejected(format!("server show {server}"), "No server found"))
    }

    fn stop_server(&self, server: &str) -> Result<()> {
        if self.request(MockOp::Stop, server, None, &format!("server stop {server}"))? {
            self.set_power(server, PowerState::Shutdown)?;
        }
        Ok(())
    }

    fn start_server(&self, server: &str) -> Result<()> {
        if self.request(MockOp::Start, server, None, &format!("server start {server}"))? {
            self.set_power(server, PowerState::Running)?;
        }
        Ok(())
    }

    fn detach_volume(&self, server: &str, volume: &VolumeId) -> Result<()> {
        let label = format!("server remove volume {server} {volume}");
        if self.request(MockOp::Detach, volume.as_str(), None, &label)? {
            let mut state = self.lock();
            if let Some(s) = state.servers.get_mut(server) {
                s.volumes.retain(|v| v != volume);
            }
            state
                .volumes
                .insert(volume.clone(), VolumeStatus::Detached.as_str().to_string());
        }
        Ok(())
    }

    fn attach_volume(&self, server: &str, volume: &VolumeId) -> Result<()> {
        let label = format!("server add volume {server} {volume}");
        if self.request(MockOp::Attach, volume.as_str(), None, &label)? {
            let mut state = self.lock();
            if let Some(s) = state.servers.get_mut(server) {
                if !s.volumes.contains(volume) {
                    s.volumes.push(volume.clone());
                }
            }
            state
                .volumes
                .insert(volume.clone(), VolumeStatus::Attached.as_str().to_string());
        }
        Ok(())
    }

    fn volume_status(&self, volume: &VolumeId) -> Result<String> {
        let state = self.lock();
        if state.rejected_queries.contains(volume.as_str()) {
            return Err(Error::rejected(format!("volume show {volume}"), "service unavailable"));
        }
        state
            .volumes
            .get(volume)
            .map(|s| format!("{s}\n"))
            .ok_or_else(|| Error::rejected(format!("volume show {volume}"), "No volume found"))
    }

    fn create_server_backup(&self, server: &str, name: &str) -> Result<()> {
        let label = format!("server backup create {server}");
        if self.request(MockOp::Backup, server, Some(name), &label)? {
            self.lock().images.push(name.to_string());
        }
        Ok(())
    }

    fn create_volume_snapshot(&self, volume: &VolumeId, name: &str) -> Result<()> {
        let label = format!("volume snapshot create {volume}");
        if self.request(MockOp::Snapshot, volume.as_str(), Some(name), &label)? {
            self.lock().snapshots.push((volume.clone(), name.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const V1: &str = "0b4c6a1e-52d1-4b6f-9a3e-1f2d3c4b5a69";

    #[test]
    fn test_mock_stop_and_start() {
        let cloud = MockCloud::new();
        cloud.add_server("web01", PowerState::Running);

        cloud.stop_server("web01").unwrap();
        assert_eq!(cloud.server_status("web01").unwrap(), "Shutdown\n");

        cloud.start_server("web01").unwrap();
        assert_eq!(cloud.power_of("web01"), Some(PowerState::Running));
        assert_eq!(cloud.calls().len(), 2);
    }

    #[test]
    fn test_mock_detach_and_attach() {
        let cloud = MockCloud::new();
        let v: VolumeId = V1.parse().unwrap();
        cloud.add_server("web01", PowerState::Running);
        cloud.add_attached_volume("web01", &v);

        cloud.detach_volume("web01", &v).unwrap();
        assert!(cloud.attached_to("web01").is_empty());
        assert_eq!(cloud.volume_status(&v).unwrap().trim(), "available");

        cloud.attach_volume("web01", &v).unwrap();
        assert_eq!(cloud.attached_volumes("web01").unwrap(), vec![v.clone()]);
        assert_eq!(cloud.volume_status(&v).unwrap().trim(), "in-use");
    }

    #[test]
    fn test_mock_reject_is_logged() {
        let cloud = MockCloud::new();
        cloud.add_server("web01", PowerState::Running);
        cloud.reject(MockOp::Stop, "web01");

        let err = cloud.stop_server("web01").unwrap_err();
        assert!(err.is_rejection());
        assert_eq!(cloud.power_of("web01"), Some(PowerState::Running));
        assert_eq!(cloud.calls_of(MockOp::Stop).len(), 1);
    }

    #[test]
    fn test_mock_frozen_accepts_without_change() {
        let cloud = MockCloud::new();
        cloud.add_server("web01", PowerState::Running);
        cloud.freeze("web01");

        cloud.stop_server("web01").unwrap();
        assert_eq!(cloud.power_of("web01"), Some(PowerState::Running));
    }

    #[test]
    fn test_mock_unknown_server() {
        let cloud = MockCloud::new();
        assert!(cloud.server_status("ghost").is_err());
        assert!(cloud.stop_server("ghost").is_err());
    }

    #[test]
    fn test_mock_artifacts() {
        let cloud = MockCloud::new();
        let v: VolumeId = V1.parse().unwrap();
        cloud.add_server("web01", PowerState::Shutdown);

        cloud.create_server_backup("web01", "web01_1").unwrap();
        cloud.create_volume_snapshot(&v, "DSK_web01_1").unwrap();

        assert_eq!(cloud.images(), vec!["web01_1"]);
        assert_eq!(cloud.snapshots(), vec![(v, "DSK_web01_1".to_string())]);
    }
}
