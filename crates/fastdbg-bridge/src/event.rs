use serde::Serialize;

/// Notifications raised by the bridge, one per completed round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BridgeEvent {
    /// The first stop, reached by the forced step at the first line.
    StoppedOnEntry { line: u32 },
    /// Stopped after a step or a jump.
    StoppedOnStep { line: u32 },
    /// Stopped at a breakpoint.
    StoppedOnBreakpoint { line: u32 },
    /// The program finished or the session failed.
    Ended,
}

impl BridgeEvent {
    /// Line the target stopped at, if it stopped.
    pub fn line(&self) -> Option<u32> {
        match *self {
            BridgeEvent::StoppedOnEntry { line }
            | BridgeEvent::StoppedOnStep { line }
            | BridgeEvent::StoppedOnBreakpoint { line } => Some(line),
            BridgeEvent::Ended => None,
        }
    }
}
