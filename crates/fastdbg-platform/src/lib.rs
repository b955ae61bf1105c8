//! fastdbg-platform — the host-side collaborators of a debug session.
//!
//! File access with polling waits, artifact path derivation, external
//! process execution and log-file housekeeping.

pub mod error;
pub mod fs;
pub mod logging;
pub mod paths;
pub mod process;

pub use error::PlatformError;
pub use fs::{wait_until_absent, wait_until_exists, DiskFiles, FileAccessor, MemoryFiles};
pub use paths::{is_debuggable, ArtifactPaths, DefaultPaths, PathStyle, PlatformPaths};
pub use process::{ProcessOutput, ProcessRunner, SystemRunner};
