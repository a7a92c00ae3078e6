//! Backend abstraction for control-plane operations.
//!
//! The [`ControlPlane`] trait is everything the backup orchestrator needs from
//! the cloud, allowing for different implementations:
//! - [`openstack::OpenStackBackend`] drives the `openstack` CLI
//! - [`mock::MockCloud`] keeps servers and volumes in memory for tests

pub mod mock;
pub mod openstack;

pub use mock::MockCloud;
pub use openstack::OpenStackBackend;

use crate::error::Result;
use crate::types::VolumeId;

/// Operations on servers and volumes.
///
/// Every call is synchronous. Mutating calls return once the control plane
/// has accepted the request; convergence must be observed separately through
/// [`server_status`](ControlPlane::server_status) and
/// [`volume_status`](ControlPlane::volume_status).
pub trait ControlPlane: Send + Sync {
    /// Raw power state of a server (e.g. `Running`, `Shutdown`).
    fn server_status(&self, server: &str) -> Result<String>;

    /// Volumes currently attached to a server.
    fn attached_volumes(&self, server: &str) -> Result<Vec<VolumeId>>;

    /// Request a server stop.
    fn stop_server(&self, server: &str) -> Result<()>;

    /// Request a server start.
    fn start_server(&self, server: &str) -> Result<()>;

    /// Request detaching a volume from a server.
    fn detach_volume(&self, server: &str, volume: &VolumeId) -> Result<()>;

    /// Request attaching a volume to a server.
    fn attach_volume(&self, server: &str, volume: &VolumeId) -> Result<()>;

    /// Raw status of a volume (e.g. `in-use`, `available`).
    fn volume_status(&self, volume: &VolumeId) -> Result<String>;

    /// Create a backup image of a server, blocking until it is complete.
    fn create_server_backup(&self, server: &str, name: &str) -> Result<()>;

    /// Create a snapshot of a volume.
    fn create_volume_snapshot(&self, volume: &VolumeId, name: &str) -> Result<()>;
}
