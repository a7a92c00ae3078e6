//! Process execution for control-plane commands.

use crate::error::{Error, Result};
use crate::types::CommandOutput;
use std::process::Command;

/// Runs a program and captures its output.
///
/// A non-zero exit is reported through [`CommandOutput::success`], not as an
/// `Err`; errors are reserved for failing to start the process at all.
pub trait Executor: Send + Sync {
    /// Run `program` with `args`, blocking until it exits.
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput>;
}

/// Executor that spawns real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExecutor;

impl Executor for ProcessExecutor {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        let output = Command::new(program).args(args).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::CliNotFound(program.to_string())
            } else {
                Error::Io(e)
            }
        })?;
        Ok(output.into())
    }
}
