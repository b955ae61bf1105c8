use thiserror::Error;

/// Errors from loading, parsing or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to create default config: {0}")]
    CreateDefault(String),

    #[error("TOML parse error: {0}")]
    Parse(String),

    /// A value is out of range.
    #[error("validation error: {field}: {message}")]
    Validation {
        /// Dotted path, e.g. `bridge.poll_interval_ms`.
        field: String,
        message: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
