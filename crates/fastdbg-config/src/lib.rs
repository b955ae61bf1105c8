//! fastdbg-config — tool locations and session tuning.
//!
//! A global `config.toml` is overlaid by the nearest project-level
//! `.fastdbg/config.toml`, then validated.

pub mod config;
pub mod error;
pub mod load;
pub mod merge;
pub mod validate;

pub use config::{
    BridgeConfig, CompilerConfig, Config, EmulatorConfig, LogConfig, LogLevel, PROGRAM_PLACEHOLDER,
    SETTINGS_PLACEHOLDER,
};
pub use error::ConfigError;
pub use load::{load_config, load_from_str};
