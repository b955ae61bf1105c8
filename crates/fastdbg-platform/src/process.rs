//! External programs: the compiler and the emulator.

use std::future::Future;
use std::path::Path;
use std::process::{Command, Stdio};

use tokio::process::Command as TokioCommand;

use crate::error::PlatformError;

/// Captured result of a finished program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    /// Both streams, stdout first.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}

/// Runs external programs.
pub trait ProcessRunner: Send + Sync {
    /// Run `program` in `cwd` to completion.
    fn run(
        &self,
        program: &Path,
        args: &[String],
        cwd: &Path,
    ) -> impl Future<Output = Result<ProcessOutput, PlatformError>> + Send;

    /// Start `program` without waiting for it.
    fn spawn(&self, program: &Path, args: &[String]) -> Result<(), PlatformError>;
}

/// [`ProcessRunner`] backed by `tokio::process`. The emulator is
/// detached with `std::process` so it outlives the session.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    async fn run(
        &self,
        program: &Path,
        args: &[String],
        cwd: &Path,
    ) -> Result<ProcessOutput, PlatformError> {
        tracing::debug!(program = %program.display(), ?args, "running");
        let output = TokioCommand::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| spawn_error(program, source))?;

        Ok(ProcessOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn spawn(&self, program: &Path, args: &[String]) -> Result<(), PlatformError> {
        tracing::debug!(program = %program.display(), ?args, "spawning");
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| spawn_error(program, source))?;
        tracing::info!(pid = child.id(), program = %program.display(), "started");
        Ok(())
    }
}

fn spawn_error(program: &Path, source: std::io::Error) -> PlatformError {
    PlatformError::ProcessSpawn {
        program: program.display().to_string(),
        source,
    }
}
