//! fastdbg-bridge — the host side of a file-channel debug session.
//!
//! The target and the host share a directory and take turns: the host
//! writes `debug.in` and waits for the target to delete it, then reads
//! the target's report from `debug.out`. This crate owns the session
//! state, breakpoint bookkeeping, the wire messages and the variable
//! table, plus the launcher that builds and starts the program and
//! maps the emulator's host drive onto the build directory.

pub mod breakpoint;
pub mod bridge;
pub mod emulator;
pub mod error;
pub mod event;
pub mod launch;
pub mod protocol;
pub mod session;
pub mod variables;

pub use breakpoint::{Breakpoint, BreakpointManager};
pub use bridge::{BridgeOptions, DebugBridge, Resume, StackFrame};
pub use emulator::{EmulatorKind, SettingsWriter};
pub use error::BridgeError;
pub use event::BridgeEvent;
pub use launch::{Build, LaunchError, Launcher};
pub use protocol::{Command, DumpRequest, OutboundMessage, Response};
pub use session::{Session, SessionState};
pub use variables::VariableTable;
