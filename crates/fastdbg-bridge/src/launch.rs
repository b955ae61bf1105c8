//! Building and starting the program under debug.

use std::path::{Path, PathBuf};

use fastdbg_config::Config;
use fastdbg_instrument::{instrument, passthrough, DiagnosticRemapper, InstrumentedSource};
use fastdbg_platform::{
    is_debuggable, wait_until_exists, ArtifactPaths, FileAccessor, PlatformError, ProcessRunner,
};
use thiserror::Error;

use crate::emulator::SettingsWriter;

/// Errors from preparing, compiling or starting a program.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("not a debuggable source file: {}", .0.display())]
    UnsupportedSource(PathBuf),

    /// The compiler rejected the program. Positions in `message` refer
    /// to the original source.
    #[error("compile failed:\n{message}")]
    Compile {
        message: String,
        /// Line and column of the first error.
        location: Option<(usize, usize)>,
    },

    /// The compiler reported success but produced no program in time.
    #[error("compiled program did not appear: {}", .0.display())]
    MissingExecutable(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// A compiled program, ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Build {
    pub paths: ArtifactPaths,
    /// `true` when hooks were compiled in and a debug session applies.
    pub debug: bool,
}

/// Prepares, compiles and starts programs with the configured tools.
pub struct Launcher<F, R> {
    files: F,
    runner: R,
    config: Config,
    remapper: DiagnosticRemapper,
    settings: SettingsWriter,
}

impl<F: FileAccessor, R: ProcessRunner> Launcher<F, R> {
    pub fn new(files: F, runner: R, config: Config) -> Self {
        Self {
            files,
            runner,
            config,
            remapper: DiagnosticRemapper::new(),
            settings: SettingsWriter::new(),
        }
    }

    /// Write the working copy of `source` into a clean `bin` directory.
    ///
    /// Hooks are only injected for a debug run with breakpoints.
    pub fn prepare(
        &self,
        source: &Path,
        breakpoints: &[u32],
        no_debug: bool,
    ) -> Result<(ArtifactPaths, InstrumentedSource), LaunchError> {
        if !is_debuggable(source) {
            return Err(LaunchError::UnsupportedSource(source.to_path_buf()));
        }
        let paths = ArtifactPaths::for_source(source)?;
        let text = String::from_utf8_lossy(&self.files.read_file(source)?).into_owned();

        self.files.create_dir_all(&paths.bin_dir)?;
        for name in self.files.list_dir(&paths.bin_dir)? {
            if paths.is_build_output(&name) {
                tracing::debug!(file = %name, "removing stale build output");
                self.files.delete_file(&paths.bin_dir.join(&name))?;
            }
        }

        let working = if no_debug {
            passthrough(&text)
        } else {
            instrument(&text, breakpoints)
        };
        self.files.write_file(&paths.working_copy, working.text.as_bytes())?;
        Ok((paths, working))
    }

    /// Compile the working copy and wait for the program to appear.
    pub async fn compile(
        &self,
        paths: &ArtifactPaths,
        working: &InstrumentedSource,
    ) -> Result<(), LaunchError> {
        let args = vec![paths.working_file_name()];
        let output = self
            .runner
            .run(&self.config.compiler.path, &args, &paths.bin_dir)
            .await?;
        if !output.success {
            let remapped = self.remapper.remap(&output.combined(), working);
            tracing::warn!(location = ?remapped.location, "compile failed");
            return Err(LaunchError::Compile {
                message: remapped.text,
                location: remapped.location,
            });
        }

        let found = wait_until_exists(
            &self.files,
            &paths.executable,
            self.config.bridge.poll_interval(),
            Some(self.config.bridge.compile_timeout()),
        )
        .await;
        if !found {
            return Err(LaunchError::MissingExecutable(paths.executable.clone()));
        }
        tracing::info!(program = %paths.executable.display(), "compiled");
        Ok(())
    }

    /// Prepare and compile `source`.
    pub async fn build(
        &self,
        source: &Path,
        breakpoints: &[u32],
        no_debug: bool,
    ) -> Result<Build, LaunchError> {
        let (paths, working) = self.prepare(source, breakpoints, no_debug)?;
        self.compile(&paths, &working).await?;
        Ok(Build {
            paths,
            debug: working.is_instrumented(),
        })
    }

    /// Map the emulator's `H4:` drive onto `bin`, then start it on the
    /// compiled program without waiting for it.
    pub fn run_emulator(&self, paths: &ArtifactPaths) -> Result<(), LaunchError> {
        let emulator = &self.config.emulator;
        let settings = self
            .settings
            .prepare(&self.files, &emulator.path, &paths.bin_dir)?;
        let args = emulator.args_for(&paths.executable, settings.as_deref());
        self.runner.spawn(&emulator.path, &args)?;
        Ok(())
    }
}
