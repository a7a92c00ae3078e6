mod cli;
mod config;
mod engine;
mod paths;
mod progress;
mod ui;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::Cli;
use config::{Config, Settings};
use engine::{BackupError, ExecutionContext, Orchestrator};
use progress::PollReporter;
use stackkit::{OpenStackBackend, StatusPoller, SystemClock};
use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    // One timestamp names every artifact of this run
    let started = Utc::now();
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();
    ui::set_quiet(cli.quiet);

    if let Some(shell) = cli.completions {
        generate(shell, &mut Cli::command(), "stackshot", &mut io::stdout());
        return ExitCode::SUCCESS;
    }

    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            ui::error(&format!("{e:#}"));
            return ExitCode::FAILURE;
        }
    };

    let timestamp = engine::context::timestamp_suffix(started);
    let result = run(&settings, &timestamp);
    if let Err(e) = &result {
        report(e);
    }
    ExitCode::from(exit_status(&result))
}

/// Process exit status for a finished run.
fn exit_status(result: &Result<(), BackupError>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    config.into_settings(cli)
}

fn run(settings: &Settings, timestamp: &str) -> Result<(), BackupError> {
    let cloud = OpenStackBackend::new(settings.program.clone(), settings.target.clone());

    ui::header(&format!("Backing up {}", settings.server));
    ui::kv("cloud", settings.target.cloud.as_deref().unwrap_or("(environment)"));
    ui::kv("region", settings.target.region.as_deref().unwrap_or("(environment)"));

    let ctx = ExecutionContext::capture(
        &cloud,
        &settings.server,
        timestamp,
        settings.poll.match_mode,
    )?;
    ui::info(&format!(
        "{} is {} with {} volume(s) attached, artifacts will be suffixed {}",
        ctx.server(),
        ctx.original_power(),
        ctx.original_volumes().len(),
        ctx.timestamp()
    ));

    let clock = SystemClock::new();
    let reporter = PollReporter;
    let poller = StatusPoller::new(settings.poll.clone(), &clock).with_callback(&reporter);

    let mut orchestrator = Orchestrator::new(&cloud, poller);
    let result = orchestrator.run(&ctx);
    log::debug!(
        "Stopped in phase {} after {} transition(s)",
        orchestrator.phase(),
        orchestrator.transitions().len()
    );

    let report = result?;
    engine::print_summary(&report);
    Ok(())
}

fn report(err: &BackupError) {
    ui::error(&chain(err));
    if let Some(cause) = err.cause() {
        ui::dim(&format!("after: {}", chain(cause)));
    }
    if let Some(source) = err.control_plane_error() {
        let category = source.category();
        ui::dim(&format!("{}: {}", category.description(), category.advice()));
    }
    if err.needs_operator() {
        ui::warn("The server may be stopped or missing volumes; check it before retrying");
    } else if matches!(err, BackupError::Step { .. }) {
        ui::info("Server restored to its original state");
    }
}

/// An error and its sources joined into one line.
fn chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::error::StepFailure;
    use engine::orchestrator::Phase;
    use std::time::Duration;

    fn rollback_after_detach() -> BackupError {
        let cause = BackupError::Step {
            phase: Phase::Detached,
            failure: StepFailure::Timeout {
                resource: "0b4c6a1e-52d1-4b6f-9a3e-1f2d3c4b5a69".to_string(),
                desired: "available".to_string(),
                last_observed: Some("in-use".to_string()),
                waited: Duration::from_secs(300),
            },
        };
        BackupError::Rollback {
            phase: Phase::PowerRestored,
            failure: stackkit::Error::rejected("server start web01", "Quota exceeded\n").into(),
            cause: Some(Box::new(cause)),
        }
    }

    #[test]
    fn test_chain_joins_sources() {
        let err = rollback_after_detach();

        assert_eq!(
            chain(&err),
            "restart server failed, manual intervention required: \
             server start web01 rejected: Quota exceeded"
        );
        assert_eq!(
            chain(err.cause().unwrap()),
            "detach volumes failed: 0b4c6a1e-52d1-4b6f-9a3e-1f2d3c4b5a69 did not reach \
             'available' within 300s (last seen: in-use)"
        );
    }

    #[test]
    fn test_exit_status() {
        assert_eq!(exit_status(&Ok(())), 0);
        assert_eq!(exit_status(&Err(rollback_after_detach())), 1);

        let step = BackupError::Step {
            phase: Phase::ServerBackedUp,
            failure: stackkit::Error::rejected("server backup create web01", "").into(),
        };
        assert_eq!(exit_status(&Err(step)), 1);
    }

    #[test]
    fn test_control_plane_error_for_advice() {
        let err = rollback_after_detach();
        let source = err.control_plane_error().unwrap();
        assert_eq!(source.category(), stackkit::ErrorCategory::Rejected);

        let timeout = err.cause().unwrap();
        assert!(timeout.control_plane_error().is_none());
    }
}
