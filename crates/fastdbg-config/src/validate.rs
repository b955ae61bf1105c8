use crate::config::{Config, PROGRAM_PLACEHOLDER};
use crate::error::ConfigError;

const POLL_INTERVAL_RANGE: std::ops::RangeInclusive<u64> = 1..=1000;

/// Check every field, collecting all violations.
pub fn validate(config: &Config) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |field: &str, message: String| {
        errors.push(ConfigError::Validation {
            field: field.to_string(),
            message,
        });
    };

    if !POLL_INTERVAL_RANGE.contains(&config.bridge.poll_interval_ms) {
        fail(
            "bridge.poll_interval_ms",
            format!("must be 1 to 1000, got {}", config.bridge.poll_interval_ms),
        );
    }
    if config.bridge.compile_timeout_ms == 0 {
        fail("bridge.compile_timeout_ms", "must be greater than 0".to_string());
    }
    if config.compiler.path.as_os_str().is_empty() {
        fail("compiler.path", "must not be empty".to_string());
    }
    if config.emulator.path.as_os_str().is_empty() {
        fail("emulator.path", "must not be empty".to_string());
    }
    if !config
        .emulator
        .args
        .iter()
        .any(|arg| arg.contains(PROGRAM_PLACEHOLDER))
    {
        fail(
            "emulator.args",
            format!("must contain {PROGRAM_PLACEHOLDER}"),
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
