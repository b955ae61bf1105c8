//! Debug session state machine.
//!
//! ```text
//! Idle -> Loaded -> WaitingForTarget <-> Stopped
//!            \            |                 /
//!             +---------> Ended <----------+
//! ```

use crate::error::BridgeError;

/// The current state of a debug session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing loaded yet.
    Idle,
    /// Symbols resolved; no message sent yet.
    Loaded,
    /// A message is outstanding; the target owns the channel.
    WaitingForTarget,
    /// The target is parked in its break hook.
    Stopped,
    /// The program ended or the session failed. Terminal.
    Ended,
}

/// Lifecycle of one debugging run.
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    messages_sent: u32,
}

impl Session {
    /// Create a new session in the [`Idle`](SessionState::Idle) state.
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            messages_sent: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Number of messages handed to the target so far.
    pub fn messages_sent(&self) -> u32 {
        self.messages_sent
    }

    /// Transition: Idle → Loaded.
    pub fn loaded(&mut self) -> Result<(), BridgeError> {
        self.require_not_ended()?;
        if self.state != SessionState::Idle {
            return Err(BridgeError::Rejected {
                message: format!("cannot load: session is in {:?} state", self.state),
            });
        }
        self.state = SessionState::Loaded;
        Ok(())
    }

    /// Check that a message may be sent now, naming `op` in the error.
    pub fn can_send(&self, op: &str) -> Result<(), BridgeError> {
        match self.state {
            SessionState::Loaded | SessionState::Stopped => Ok(()),
            SessionState::Idle => Err(BridgeError::NotLoaded),
            SessionState::Ended => Err(BridgeError::Ended),
            SessionState::WaitingForTarget => Err(BridgeError::Rejected {
                message: format!("cannot {op}: session is in {:?} state", self.state),
            }),
        }
    }

    /// Transition: Loaded | Stopped → WaitingForTarget.
    ///
    /// Call once the outbound message has been written.
    pub fn sent(&mut self) -> Result<(), BridgeError> {
        self.can_send("send")?;
        self.state = SessionState::WaitingForTarget;
        self.messages_sent += 1;
        Ok(())
    }

    /// Transition: WaitingForTarget → Stopped.
    pub fn handle_stopped(&mut self) -> Result<(), BridgeError> {
        self.require_not_ended()?;
        if self.state != SessionState::WaitingForTarget {
            return Err(BridgeError::Rejected {
                message: format!("cannot stop: session is in {:?} state", self.state),
            });
        }
        self.state = SessionState::Stopped;
        Ok(())
    }

    /// Transition: any → Ended. Ending twice is harmless.
    pub fn end(&mut self) {
        self.state = SessionState::Ended;
    }

    fn require_not_ended(&self) -> Result<(), BridgeError> {
        if self.state == SessionState::Ended {
            return Err(BridgeError::Ended);
        }
        Ok(())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_happy_path() {
        let mut session = Session::new();
        assert_eq!(session.state(), SessionState::Idle);

        session.loaded().unwrap();
        assert_eq!(session.state(), SessionState::Loaded);

        session.sent().unwrap();
        assert_eq!(session.state(), SessionState::WaitingForTarget);
        assert_eq!(session.messages_sent(), 1);

        session.handle_stopped().unwrap();
        assert_eq!(session.state(), SessionState::Stopped);

        session.sent().unwrap();
        assert_eq!(session.messages_sent(), 2);

        session.end();
        assert_eq!(session.state(), SessionState::Ended);
    }

    #[test]
    fn one_message_in_flight() {
        let mut session = Session::new();
        session.loaded().unwrap();
        session.sent().unwrap();

        let err = session.sent().unwrap_err();
        assert!(matches!(err, BridgeError::Rejected { .. }));
        assert!(err.to_string().contains("WaitingForTarget"));
        assert_eq!(session.messages_sent(), 1);
    }

    #[test]
    fn send_before_load() {
        let session = Session::new();
        assert!(matches!(session.can_send("step"), Err(BridgeError::NotLoaded)));
    }

    #[test]
    fn stop_without_outstanding_message() {
        let mut session = Session::new();
        session.loaded().unwrap();
        assert!(matches!(
            session.handle_stopped(),
            Err(BridgeError::Rejected { .. })
        ));
    }

    #[test]
    fn ended_is_terminal() {
        let mut session = Session::new();
        session.end();
        assert!(matches!(session.loaded(), Err(BridgeError::Ended)));
        assert!(matches!(session.sent(), Err(BridgeError::Ended)));
        assert!(matches!(session.handle_stopped(), Err(BridgeError::Ended)));
        session.end();
        assert_eq!(session.state(), SessionState::Ended);
    }

    #[test]
    fn load_only_once() {
        let mut session = Session::new();
        session.loaded().unwrap();
        assert!(matches!(session.loaded(), Err(BridgeError::Rejected { .. })));
    }
}
