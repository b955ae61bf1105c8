use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::ConfigError;
use crate::merge::merge_configs;
use crate::validate::validate;

const CONFIG_FILE: &str = "config.toml";
const PROJECT_DIR: &str = ".fastdbg";

/// Written when no global config exists yet.
const DEFAULT_CONFIG_CONTENT: &str = r#"# fastdbg configuration
# Uncomment and edit settings below to override defaults.

# [compiler]
# path = "fastbasic"

# [emulator]
# path = "altirra"
# args = ["/portable", "/singleinstance", "/run", "{program}"]
# atari800 reads its H: mapping from a generated file; give it
# args such as -config {settings} -run {program}.

# [bridge]
# poll_interval_ms = 25
# response_timeout_ms = 0      # 0 waits forever
# compile_timeout_ms = 10000
# path_style = "posix"         # or "windows"

# [log]
# level = "info"
"#;

/// Load the effective configuration.
///
/// `config_dir/config.toml` is created with commented defaults when
/// missing. The nearest `.fastdbg/config.toml` at or above
/// `project_dir` is layered on top, and the result is validated.
///
/// # Errors
///
/// Returns the first [`ConfigError`] met while reading, parsing or
/// validating.
pub fn load_config(config_dir: &Path, project_dir: Option<&Path>) -> Result<Config, ConfigError> {
    let global_path = config_dir.join(CONFIG_FILE);
    std::fs::create_dir_all(config_dir)?;

    if !global_path.exists() {
        std::fs::write(&global_path, DEFAULT_CONFIG_CONTENT)
            .map_err(|e| ConfigError::CreateDefault(e.to_string()))?;
        tracing::info!("created default config at {}", global_path.display());
    }

    let mut config = Config::default();
    let global = std::fs::read_to_string(&global_path)?;
    if has_settings(&global) {
        config = merge_configs(&config, &global)?;
    }

    if let Some(project_path) = project_dir.and_then(find_project_config) {
        tracing::debug!("applying project config {}", project_path.display());
        let project = std::fs::read_to_string(&project_path)?;
        config = merge_configs(&config, &project)?;
    }

    check(config)
}

/// Parse and validate a TOML string without touching the filesystem.
pub fn load_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
    check(config)
}

fn check(config: Config) -> Result<Config, ConfigError> {
    match validate(&config) {
        Ok(()) => Ok(config),
        Err(errors) => {
            for error in &errors {
                tracing::warn!("{error}");
            }
            Err(errors
                .into_iter()
                .next()
                .unwrap_or_else(|| ConfigError::Validation {
                    field: "unknown".to_string(),
                    message: "validation failed".to_string(),
                }))
        }
    }
}

/// Nearest `.fastdbg/config.toml` at or above `start`.
fn find_project_config(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(PROJECT_DIR).join(CONFIG_FILE))
        .find(|candidate| candidate.exists())
}

/// `true` when some line is neither blank nor a comment.
fn has_settings(content: &str) -> bool {
    content.lines().map(str::trim).any(|l| !l.is_empty() && !l.starts_with('#'))
}
