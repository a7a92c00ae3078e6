//! Backup engine for stackshot
//!
//! 1. Capture - Record the server's power state and attached volumes
//! 2. Orchestrate - Stop, detach, snapshot, back up, reattach, restart
//! 3. Roll back - Put the server back the way it was when a step fails

pub mod context;
pub mod error;
pub mod orchestrator;

pub use context::ExecutionContext;
pub use error::BackupError;
pub use orchestrator::{Orchestrator, print_summary};
