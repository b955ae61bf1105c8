//! fastdbg-instrument — prepares source for a debug build.
//!
//! Injects hook calls in front of executable lines, appends the
//! debug-support routines and maps compiler messages about the
//! instrumented copy back onto the original file.

pub mod diagnostics;
pub mod inject;

pub use diagnostics::{DiagnosticRemapper, RemappedDiagnostics};
pub use inject::{instrument, passthrough, InstrumentedSource, DEBUG_LIBRARY};
