use std::path::{Path, PathBuf};
use std::time::Duration;

use fastdbg_platform::PathStyle;
use serde::{Deserialize, Serialize};

/// Replaced by the compiled program's path in emulator arguments.
pub const PROGRAM_PLACEHOLDER: &str = "{program}";
/// Replaced by the path of the generated emulator settings file.
pub const SETTINGS_PLACEHOLDER: &str = "{settings}";

/// Log verbosity level.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Where the compiler lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilerConfig {
    #[serde(default = "default_compiler_path")]
    pub path: PathBuf,
}

fn default_compiler_path() -> PathBuf {
    PathBuf::from("fastbasic")
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            path: default_compiler_path(),
        }
    }
}

/// How to start the emulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmulatorConfig {
    #[serde(default = "default_emulator_path")]
    pub path: PathBuf,
    /// Arguments; `{program}` marks the executable to run and
    /// `{settings}` the settings file written for the session.
    #[serde(default = "default_emulator_args")]
    pub args: Vec<String>,
}

fn default_emulator_path() -> PathBuf {
    PathBuf::from("altirra")
}

fn default_emulator_args() -> Vec<String> {
    vec![
        "/portable".to_string(),
        "/singleinstance".to_string(),
        "/run".to_string(),
        PROGRAM_PLACEHOLDER.to_string(),
    ]
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            path: default_emulator_path(),
            args: default_emulator_args(),
        }
    }
}

impl EmulatorConfig {
    /// Arguments with the placeholders filled in.
    pub fn args_for(&self, program: &Path, settings: Option<&Path>) -> Vec<String> {
        let program = program.display().to_string();
        let settings = settings.map(|s| s.display().to_string()).unwrap_or_default();
        self.args
            .iter()
            .map(|arg| {
                arg.replace(PROGRAM_PLACEHOLDER, &program)
                    .replace(SETTINGS_PLACEHOLDER, &settings)
            })
            .collect()
    }
}

/// Timing of the file channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Delay between file checks while waiting on the target (1–1000).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// How long to wait for a stop report; 0 waits forever.
    #[serde(default)]
    pub response_timeout_ms: u64,
    /// How long to wait for the compiled program to appear.
    #[serde(default = "default_compile_timeout_ms")]
    pub compile_timeout_ms: u64,
    /// Spelling used when comparing source paths.
    #[serde(default)]
    pub path_style: PathStyle,
}

fn default_poll_interval_ms() -> u64 {
    25
}

fn default_compile_timeout_ms() -> u64 {
    10_000
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            response_timeout_ms: 0,
            compile_timeout_ms: default_compile_timeout_ms(),
            path_style: PathStyle::default(),
        }
    }
}

impl BridgeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// `None` means no limit.
    pub fn response_timeout(&self) -> Option<Duration> {
        (self.response_timeout_ms > 0).then(|| Duration::from_millis(self.response_timeout_ms))
    }

    pub fn compile_timeout(&self) -> Duration {
        Duration::from_millis(self.compile_timeout_ms)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub level: LogLevel,
    /// Log file; defaults to the platform log directory.
    pub file: Option<PathBuf>,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub compiler: CompilerConfig,
    #[serde(default)]
    pub emulator: EmulatorConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub log: LogConfig,
}
