//! Bridge error types.

use std::path::PathBuf;

use fastdbg_codec::CodecError;
use fastdbg_platform::PlatformError;
use fastdbg_symbols::ResolveError;
use thiserror::Error;

/// Errors from debug-session operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The compiler artifacts lack a label the protocol needs. The
    /// session has ended.
    #[error("symbol resolution failed: {0}")]
    Resolution(#[from] ResolveError),

    /// Reading or writing a channel or artifact file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A report from the target could not be decoded.
    #[error("malformed target report: {0}")]
    Codec(#[from] CodecError),

    /// The request is not valid in the current session state.
    #[error("request rejected: {message}")]
    Rejected {
        message: String,
    },

    /// The session has ended.
    #[error("session already ended")]
    Ended,

    /// No program has been loaded yet.
    #[error("no program loaded")]
    NotLoaded,

    #[error("not a debuggable source file: {}", .0.display())]
    UnsupportedSource(PathBuf),

    /// Neither the requested line nor any line after it has a hook.
    #[error("no code at or after line {line}")]
    NoAddressForLine {
        line: u32,
    },

    #[error("unknown variable: {name}")]
    UnknownVariable {
        name: String,
    },

    /// The variable cannot be changed from the host.
    #[error("variable is read-only: {name}")]
    ReadOnly {
        name: String,
    },

    #[error("invalid value for {name}: {reason}")]
    InvalidValue {
        name: String,
        reason: String,
    },

    #[error(transparent)]
    Platform(#[from] PlatformError),
}
