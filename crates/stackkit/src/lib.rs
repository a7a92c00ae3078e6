//! # stackkit
//!
//! Rust library for driving an OpenStack control plane through the
//! `openstack` command-line client.
//!
//! This crate provides:
//! - Typed server and volume operations behind the [`ControlPlane`] trait
//! - Convergence polling with a pluggable [`Clock`]
//! - Volume set reconciliation for restoring attachments
//!
//! ## Example
//!
//! ```no_run
//! use stackkit::{CloudTarget, ControlPlane, OpenStackBackend, PollConfig, StatusPoller, SystemClock};
//!
//! let target = CloudTarget::new(Some("prod".to_string()), None);
//! let cloud = OpenStackBackend::new("openstack", target);
//!
//! cloud.stop_server("web01").expect("stop rejected");
//!
//! let clock = SystemClock::new();
//! let poller = StatusPoller::new(PollConfig::default(), &clock);
//! let stopped = poller.wait_for_status("web01", "Shutdown", || cloud.server_status("web01"));
//! assert!(stopped);
//! ```
//!
//! ## Testing
//!
//! [`backend::MockCloud`] keeps servers and volumes in memory and can reject
//! or freeze individual resources; [`poll::ManualClock`] makes polling run on
//! virtual time.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod executor;
pub mod poll;
pub mod reconcile;
pub mod types;

pub use backend::{ControlPlane, MockCloud, OpenStackBackend};
pub use error::{Error, ErrorCategory, Result};
pub use executor::{Executor, ProcessExecutor};
pub use poll::{Clock, ManualClock, PollCallback, PollOutcome, StatusPoller, SystemClock};
pub use reconcile::detached_from;
pub use types::{
    CloudTarget, CommandOutput, MatchMode, PollConfig, PowerState, VolumeId, VolumeStatus,
};
