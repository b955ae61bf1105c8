mod cli;
mod repl;

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use fastdbg_bridge::{
    BridgeError, BridgeEvent, BridgeOptions, DebugBridge, LaunchError, Launcher, Resume,
    SessionState,
};
use fastdbg_config::{load_config, Config};
use fastdbg_platform::logging::{
    default_log_file_path, ensure_log_dir, log_level_to_filter, rotate_log_files,
    DEFAULT_MAX_LOG_FILES, DEFAULT_MAX_LOG_SIZE,
};
use fastdbg_platform::{DefaultPaths, DiskFiles, PlatformPaths, SystemRunner};

use cli::CliArgs;
use repl::{ReplCommand, HELP};

/// One JSON object per line on stdout.
fn emit(value: &serde_json::Value) {
    println!("{value}");
}

fn emit_error(message: impl std::fmt::Display) {
    emit(&json!({ "error": message.to_string() }));
}

fn drain_events(rx: &mut UnboundedReceiver<BridgeEvent>) {
    while let Ok(event) = rx.try_recv() {
        match serde_json::to_value(event) {
            Ok(value) => emit(&value),
            Err(e) => warn!("cannot serialize event: {e}"),
        }
    }
}

/// Send tracing output to the log file so it never mixes with the
/// JSON on stdout.
fn init_logging(config: &Config, paths: &dyn PlatformPaths) {
    let log_path = config
        .log
        .file
        .clone()
        .unwrap_or_else(|| default_log_file_path(paths));
    if let Err(e) = ensure_log_dir(&log_path) {
        eprintln!("fastdbg: cannot create log directory: {e}");
    }
    if let Err(e) = rotate_log_files(&log_path, DEFAULT_MAX_LOG_SIZE, DEFAULT_MAX_LOG_FILES) {
        eprintln!("fastdbg: cannot rotate logs: {e}");
    }
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level_to_filter(config.log.level.as_str())));

    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .init(),
        Err(e) => eprintln!("fastdbg: logging disabled, cannot open {}: {e}", log_path.display()),
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = env::current_dir().context("failed to read the current directory")?;
    Ok(cwd.join(path))
}

/// Wait out the outstanding message, reporting a timeout instead of
/// failing.
async fn wait(
    bridge: &mut DebugBridge<DiskFiles>,
    rx: &mut UnboundedReceiver<BridgeEvent>,
) -> Result<(), BridgeError> {
    let timeout = bridge.options().response_timeout;
    if !bridge.wait_for_stop(timeout).await? {
        emit(&json!({ "event": "timeout" }));
    }
    drain_events(rx);
    Ok(())
}

async fn resume(
    bridge: &mut DebugBridge<DiskFiles>,
    rx: &mut UnboundedReceiver<BridgeEvent>,
    how: Resume,
) -> Result<(), BridgeError> {
    bridge.begin(how)?;
    wait(bridge, rx).await
}

/// Apply one command. Returns `false` when the loop should stop.
async fn handle(
    command: ReplCommand,
    source: &Path,
    bridge: &mut DebugBridge<DiskFiles>,
    rx: &mut UnboundedReceiver<BridgeEvent>,
) -> Result<bool, BridgeError> {
    match command {
        ReplCommand::Continue => resume(bridge, rx, Resume::Continue).await?,
        ReplCommand::Step => resume(bridge, rx, Resume::Step).await?,
        ReplCommand::Jump(line) => resume(bridge, rx, Resume::Jump(line)).await?,
        ReplCommand::Wait => wait(bridge, rx).await?,
        ReplCommand::Break(lines) => {
            let breakpoints = bridge.set_breakpoints(source, &lines);
            emit(&json!({ "breakpoints": breakpoints }));
        }
        ReplCommand::Vars => emit(&json!({ "variables": bridge.variables() })),
        ReplCommand::Stack => emit(&json!({ "stack": bridge.stack() })),
        ReplCommand::Set { name, index, value } => {
            let value = match index {
                Some(index) => bridge.set_element(&name, index, &value)?,
                None => bridge.set_variable(&name, &value)?,
            };
            emit(&json!({ "set": name, "index": index, "value": value }));
        }
        ReplCommand::Quit => return Ok(false),
    }
    Ok(bridge.state() != SessionState::Ended)
}

async fn run(args: CliArgs) -> Result<()> {
    let paths = DefaultPaths::new().context("failed to detect platform paths")?;
    let config_dir = args.config_dir.clone().unwrap_or_else(|| paths.config_dir());
    let source = absolute(&args.source)?;

    let config = load_config(&config_dir, source.parent()).unwrap_or_else(|e| {
        eprintln!("fastdbg: config load failed, using defaults: {e}");
        Config::default()
    });
    init_logging(&config, &paths);
    info!(source = %source.display(), breakpoints = ?args.breakpoints, "fastdbg starting");

    let launcher = Launcher::new(DiskFiles, SystemRunner, config.clone());
    let build = match launcher.build(&source, &args.breakpoints, args.no_debug).await {
        Ok(build) => build,
        Err(LaunchError::Compile { message, location }) => {
            emit(&json!({ "event": "compile_failed", "message": message, "location": location }));
            anyhow::bail!("compilation failed");
        }
        Err(e) => return Err(e).context("build failed"),
    };

    if !build.debug {
        launcher.run_emulator(&build.paths).context("failed to start the emulator")?;
        emit(&json!({ "event": "launched", "program": build.paths.executable }));
        return Ok(());
    }

    let (mut bridge, mut rx) = DebugBridge::new(DiskFiles, BridgeOptions::from_config(&config.bridge));
    bridge.set_breakpoints(&source, &args.breakpoints);
    if let Err(e) = bridge.load(&source) {
        drain_events(&mut rx);
        return Err(e).context("failed to load debug symbols");
    }

    // The first message must be waiting before the program polls for it.
    bridge.begin(Resume::Start).context("failed to start the session")?;
    launcher.run_emulator(&build.paths).context("failed to start the emulator")?;
    wait(&mut bridge, &mut rx).await?;

    eprintln!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while bridge.state() != SessionState::Ended {
        let Some(line) = lines.next_line().await.context("failed to read stdin")? else {
            break;
        };
        let command = match ReplCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                emit_error(message);
                continue;
            }
        };
        match handle(command, &source, &mut bridge, &mut rx).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                warn!("command failed: {e}");
                emit_error(e);
            }
        }
    }

    info!("fastdbg exiting");
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = match CliArgs::parse(env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("fastdbg: {e:#}");
            std::process::exit(2);
        }
    };

    if let Err(e) = run(args).await {
        error!("{e:#}");
        eprintln!("fastdbg: {e:#}");
        std::process::exit(1);
    }
}
