//! Backup state machine.
//!
//! Sequences stop → detach → snapshot → backup → reattach → restart. Once the
//! server has been touched, restoring its volumes and power is attempted no
//! matter how the backup steps went.

use colored::Colorize;
use stackkit::{ControlPlane, PollOutcome, PowerState, StatusPoller, VolumeId, VolumeStatus};
use std::fmt;

use super::context::ExecutionContext;
use super::error::{BackupError, StepFailure};
use crate::ui;

/// Number of user-visible steps in a run.
const TOTAL_STEPS: usize = 6;

/// States of a backup run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initial,
    Captured,
    Stopped,
    Detached,
    VolumesBackedUp,
    ServerBackedUp,
    VolumesRestored,
    PowerRestored,
    Done,
    Failed,
}

impl Phase {
    /// What the run does to get into this phase.
    pub fn action(&self) -> &'static str {
        match self {
            Phase::Initial => "start",
            Phase::Captured => "capture server state",
            Phase::Stopped => "stop server",
            Phase::Detached => "detach volumes",
            Phase::VolumesBackedUp => "snapshot volumes",
            Phase::ServerBackedUp => "back up server",
            Phase::VolumesRestored => "reattach volumes",
            Phase::PowerRestored => "restart server",
            Phase::Done => "finish",
            Phase::Failed => "fail",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Done | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Initial => "INITIAL",
            Phase::Captured => "CAPTURED",
            Phase::Stopped => "STOPPED",
            Phase::Detached => "DETACHED",
            Phase::VolumesBackedUp => "VOLUMES_BACKED_UP",
            Phase::ServerBackedUp => "SERVER_BACKED_UP",
            Phase::VolumesRestored => "VOLUMES_RESTORED",
            Phase::PowerRestored => "POWER_RESTORED",
            Phase::Done => "DONE",
            Phase::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Artifacts created by a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupReport {
    pub server: String,
    /// Name of the server backup image
    pub image: String,
    /// Snapshot created for each volume
    pub snapshots: Vec<(VolumeId, String)>,
    pub transitions: Vec<Phase>,
}

/// Drives one backup run against a control plane.
pub struct Orchestrator<'a> {
    cloud: &'a dyn ControlPlane,
    poller: StatusPoller<'a>,
    transitions: Vec<Phase>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(cloud: &'a dyn ControlPlane, poller: StatusPoller<'a>) -> Self {
        Self {
            cloud,
            poller,
            transitions: vec![Phase::Initial],
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.transitions.last().copied().unwrap_or(Phase::Initial)
    }

    /// Every phase entered so far, in order.
    pub fn transitions(&self) -> &[Phase] {
        &self.transitions
    }

    fn enter(&mut self, phase: Phase) {
        if self.phase().is_terminal() {
            return;
        }
        log::debug!("{} -> {}", self.phase(), phase);
        self.transitions.push(phase);
    }

    /// Run the whole sequence for a captured context.
    ///
    /// `Ok` only when both the snapshots and the server backup were created
    /// and the original state was restored.
    pub fn run(&mut self, ctx: &ExecutionContext) -> Result<BackupReport, BackupError> {
        self.enter(Phase::Captured);

        ui::step(1, TOTAL_STEPS, &format!("Stopping server {}", ctx.server()));
        if let Err(failure) = self.stop_server(ctx) {
            return Err(self.abort(ctx, Phase::Stopped, failure, false));
        }
        self.enter(Phase::Stopped);

        ui::step(
            2,
            TOTAL_STEPS,
            &format!("Detaching {} volume(s)", ctx.original_volumes().len()),
        );
        if let Err(failure) = self.detach_volumes(ctx) {
            return Err(self.abort(ctx, Phase::Detached, failure, true));
        }
        self.enter(Phase::Detached);

        let backup = self.create_backups(ctx);
        if let Err(BackupError::Step { phase, failure }) = &backup {
            ui::error(&format!("Could not {}: {failure}", phase.action()));
        }

        ui::step(5, TOTAL_STEPS, "Reattaching volumes");
        if let Err(failure) = self.restore_volumes(ctx) {
            self.enter(Phase::Failed);
            return Err(BackupError::Rollback {
                phase: Phase::VolumesRestored,
                failure,
                cause: backup.err().map(Box::new),
            });
        }
        self.enter(Phase::VolumesRestored);

        ui::step(6, TOTAL_STEPS, "Restoring power state");
        if let Err(failure) = self.restore_power(ctx) {
            self.enter(Phase::Failed);
            return Err(BackupError::Rollback {
                phase: Phase::PowerRestored,
                failure,
                cause: backup.err().map(Box::new),
            });
        }
        self.enter(Phase::PowerRestored);

        match backup {
            Ok((image, snapshots)) => {
                self.enter(Phase::Done);
                Ok(BackupReport {
                    server: ctx.server().to_string(),
                    image,
                    snapshots,
                    transitions: self.transitions.clone(),
                })
            }
            Err(e) => {
                self.enter(Phase::Failed);
                Err(e)
            }
        }
    }

    /// Fail the run at `phase` and roll back what was touched.
    fn abort(
        &mut self,
        ctx: &ExecutionContext,
        phase: Phase,
        failure: StepFailure,
        volumes_touched: bool,
    ) -> BackupError {
        self.enter(Phase::Failed);
        ui::error(&format!("Could not {}: {}", phase.action(), failure));

        let cause = BackupError::Step { phase, failure };

        if volumes_touched {
            ui::info("Rolling back volume attachments");
            if let Err(failure) = self.restore_volumes(ctx) {
                return BackupError::Rollback {
                    phase: Phase::VolumesRestored,
                    failure,
                    cause: Some(Box::new(cause)),
                };
            }
        }

        ui::info("Rolling back power state");
        if let Err(failure) = self.restore_power(ctx) {
            return BackupError::Rollback {
                phase: Phase::PowerRestored,
                failure,
                cause: Some(Box::new(cause)),
            };
        }

        cause
    }

    fn stop_server(&self, ctx: &ExecutionContext) -> Result<(), StepFailure> {
        let server = ctx.server();
        let shutdown = PowerState::Shutdown;

        let current = self.cloud.server_status(server)?;
        if self.poller.matches(&current, shutdown.as_str()) {
            ui::dim(&format!("{server} is already shut down"));
            return Ok(());
        }

        self.cloud.stop_server(server)?;
        self.wait_server(server, &shutdown)
    }

    /// Issue every detach request, then wait for every volume.
    fn detach_volumes(&self, ctx: &ExecutionContext) -> Result<(), StepFailure> {
        let server = ctx.server();

        for volume in ctx.original_volumes() {
            self.cloud.detach_volume(server, volume)?;
        }
        for volume in ctx.original_volumes() {
            self.wait_volume(volume, &VolumeStatus::Detached)?;
            ui::dim(&format!("{volume} detached"));
        }
        Ok(())
    }

    /// Snapshot every volume, then back up the server.
    fn create_backups(
        &mut self,
        ctx: &ExecutionContext,
    ) -> Result<(String, Vec<(VolumeId, String)>), BackupError> {
        ui::step(3, TOTAL_STEPS, "Creating volume snapshots");
        let snapshot_name = ctx.volume_snapshot_name();
        let mut snapshots = Vec::new();

        for volume in ctx.original_volumes() {
            ui::info(&format!("Creating snapshot of volume {volume}..."));
            self.cloud
                .create_volume_snapshot(volume, &snapshot_name)
                .map_err(|e| BackupError::Step {
                    phase: Phase::VolumesBackedUp,
                    failure: e.into(),
                })?;
            ui::success(&format!("Snapshot {snapshot_name} of {volume} created"));
            snapshots.push((volume.clone(), snapshot_name.clone()));
        }
        self.enter(Phase::VolumesBackedUp);

        ui::step(4, TOTAL_STEPS, &format!("Creating image for {}", ctx.server()));
        let image = ctx.server_backup_name();
        self.cloud
            .create_server_backup(ctx.server(), &image)
            .map_err(|e| BackupError::Step {
                phase: Phase::ServerBackedUp,
                failure: e.into(),
            })?;
        ui::success(&format!("Image {image} created"));
        self.enter(Phase::ServerBackedUp);

        Ok((image, snapshots))
    }

    /// Reattach every captured volume that is not attached now.
    ///
    /// All attach requests are issued even if one is rejected, so as many
    /// volumes as possible end up back on the server.
    fn restore_volumes(&self, ctx: &ExecutionContext) -> Result<(), StepFailure> {
        let server = ctx.server();
        let attached = self.cloud.attached_volumes(server)?;
        let missing = stackkit::detached_from(ctx.original_volumes(), &attached);

        if missing.is_empty() {
            ui::dim("No volumes to reattach");
            return Ok(());
        }

        let mut first_failure: Option<StepFailure> = None;
        let mut requested = Vec::new();

        for volume in &missing {
            match self.cloud.attach_volume(server, volume) {
                Ok(()) => requested.push(volume),
                Err(e) => {
                    ui::error(&format!("Could not reattach {volume}: {e}"));
                    if first_failure.is_none() {
                        first_failure = Some(e.into());
                    }
                }
            }
        }
        for volume in requested {
            match self.wait_volume(volume, &VolumeStatus::Attached) {
                Ok(()) => ui::dim(&format!("{volume} reattached")),
                Err(failure) => {
                    ui::error(&failure.to_string());
                    if first_failure.is_none() {
                        first_failure = Some(failure);
                    }
                }
            }
        }

        match first_failure {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }

    /// Start the server again if it was running when the run began.
    fn restore_power(&self, ctx: &ExecutionContext) -> Result<(), StepFailure> {
        let server = ctx.server();
        let running = PowerState::Running;

        if !ctx.original_power().is_running() {
            ui::dim(&format!(
                "{server} was {} before the backup, leaving it stopped",
                ctx.original_power()
            ));
            return Ok(());
        }

        let current = self.cloud.server_status(server)?;
        if self.poller.matches(&current, running.as_str()) {
            ui::dim(&format!("{server} is already running"));
            return Ok(());
        }

        self.cloud.start_server(server)?;
        self.wait_server(server, &running)
    }

    fn wait_server(&self, server: &str, desired: &PowerState) -> Result<(), StepFailure> {
        let outcome = self
            .poller
            .wait_for(server, desired.as_str(), || self.cloud.server_status(server));
        converged(server, desired.as_str(), outcome)
    }

    fn wait_volume(&self, volume: &VolumeId, desired: &VolumeStatus) -> Result<(), StepFailure> {
        let outcome = self
            .poller
            .wait_for(volume.as_str(), desired.as_str(), || {
                self.cloud.volume_status(volume)
            });
        converged(volume.as_str(), desired.as_str(), outcome)
    }
}

fn converged(resource: &str, desired: &str, outcome: PollOutcome) -> Result<(), StepFailure> {
    match outcome {
        PollOutcome::Reached { .. } => Ok(()),
        PollOutcome::TimedOut {
            last_observed,
            elapsed,
        } => Err(StepFailure::Timeout {
            resource: resource.to_string(),
            desired: desired.to_string(),
            last_observed,
            waited: elapsed,
        }),
    }
}

/// Print the artifacts of a successful run.
pub fn print_summary(report: &BackupReport) {
    println!();
    println!(
        "  {} {} backed up and restored",
        "✓".green().bold(),
        report.server.bold()
    );
    println!("    • image {}", report.image);
    for (volume, name) in &report.snapshots {
        println!("    • snapshot {} of {}", name, volume);
    }
    log::debug!(
        "Phases: {}",
        report
            .transitions
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" -> ")
    );
}
