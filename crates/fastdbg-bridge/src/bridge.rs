//! The debug bridge: one debugging run over the file channel.

use std::path::{Path, PathBuf};
use std::time::Duration;

use fastdbg_codec::Value;
use fastdbg_config::BridgeConfig;
use fastdbg_platform::{is_debuggable, wait_until_absent, ArtifactPaths, FileAccessor, PathStyle};
use fastdbg_symbols::{resolve, ControlAddresses, LineMap, Variable};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::breakpoint::{Breakpoint, BreakpointManager};
use crate::error::BridgeError;
use crate::event::BridgeEvent;
use crate::protocol::{Command, OutboundMessage, Response};
use crate::session::{Session, SessionState};
use crate::variables::VariableTable;

/// Timing and path handling of a bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeOptions {
    /// Delay between checks of the channel files.
    pub poll_interval: Duration,
    /// How long a round-trip may take; `None` waits forever.
    pub response_timeout: Option<Duration>,
    pub path_style: PathStyle,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self::from_config(&BridgeConfig::default())
    }
}

impl BridgeOptions {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            response_timeout: config.response_timeout(),
            path_style: config.path_style,
        }
    }
}

/// How the target should resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resume {
    /// The first message of a run.
    Start,
    Continue,
    Step,
    /// Resume at the given source line, or the first line after it that
    /// has code.
    ///
    /// The jump resumes in stepping mode, so the target stops again at
    /// the line after the jump target, breakpoint or not.
    Jump(u32),
}

impl Resume {
    fn name(self) -> &'static str {
        match self {
            Resume::Start => "start",
            Resume::Continue => "continue",
            Resume::Step => "step",
            Resume::Jump(_) => "jump",
        }
    }
}

/// The single frame the target exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackFrame {
    pub index: usize,
    pub name: String,
    pub path: PathBuf,
    pub line: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Entry,
    Step,
    Breakpoint,
}

impl StopReason {
    fn event(self, line: u32) -> BridgeEvent {
        match self {
            StopReason::Entry => BridgeEvent::StoppedOnEntry { line },
            StopReason::Step => BridgeEvent::StoppedOnStep { line },
            StopReason::Breakpoint => BridgeEvent::StoppedOnBreakpoint { line },
        }
    }
}

#[derive(Debug)]
struct Program {
    /// Normalized source path; breakpoints are filed under it.
    key: PathBuf,
    paths: ArtifactPaths,
    lines: LineMap,
    control: ControlAddresses,
}

/// Drives one debugging run of a compiled program.
///
/// Every round-trip writes one message, waits for the target to consume
/// it and decodes the report. Events go out on the channel returned by
/// [`DebugBridge::new`] as the state changes.
pub struct DebugBridge<F: FileAccessor> {
    files: F,
    options: BridgeOptions,
    session: Session,
    breakpoints: BreakpointManager,
    program: Option<Program>,
    variables: VariableTable,
    current_line: u32,
    awaiting: Option<StopReason>,
    events: mpsc::UnboundedSender<BridgeEvent>,
}

impl<F: FileAccessor> DebugBridge<F> {
    pub fn new(files: F, options: BridgeOptions) -> (Self, mpsc::UnboundedReceiver<BridgeEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let bridge = Self {
            files,
            options,
            session: Session::new(),
            breakpoints: BreakpointManager::new(),
            program: None,
            variables: VariableTable::default(),
            current_line: 0,
            awaiting: None,
            events,
        };
        (bridge, rx)
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Line of the last stop; 0 before the first one.
    pub fn current_line(&self) -> u32 {
        self.current_line
    }

    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }

    /// Artifact paths of the loaded program.
    pub fn artifacts(&self) -> Option<&ArtifactPaths> {
        self.program.as_ref().map(|p| &p.paths)
    }

    /// Resolve the compiled artifacts of `source` and write the dump
    /// request.
    ///
    /// Loading the same source again does nothing. If the artifacts lack
    /// a control label the session ends.
    pub fn load(&mut self, source: &Path) -> Result<(), BridgeError> {
        let key = self.normalize(source);
        if let Some(program) = &self.program {
            if program.key == key {
                tracing::debug!(source = %source.display(), "already loaded");
                return Ok(());
            }
            return Err(BridgeError::Rejected {
                message: format!(
                    "cannot load {}: {} is already loaded",
                    source.display(),
                    program.paths.source.display()
                ),
            });
        }
        if !is_debuggable(source) {
            return Err(BridgeError::UnsupportedSource(source.to_path_buf()));
        }
        if self.session.state() != SessionState::Idle {
            return Err(BridgeError::Ended);
        }

        let paths = ArtifactPaths::for_source(source)?;
        let listing = self.files.read_file(&paths.listing)?;
        let labels = self.files.read_file(&paths.labels)?;
        let mut symbols = match resolve(&listing, &labels) {
            Ok(symbols) => symbols,
            Err(e) => {
                tracing::error!(source = %source.display(), "{e}, ending session");
                self.end();
                return Err(e.into());
            }
        };

        match self.files.read_file(source) {
            Ok(text) => symbols.limit_lines(String::from_utf8_lossy(&text).lines().count()),
            Err(e) => tracing::warn!(
                source = %source.display(),
                "cannot read source, keeping every line label: {e}"
            ),
        }

        let variables = VariableTable::new(symbols.variables);
        let request = variables.dump_request();
        self.files.write_file(&paths.dump_request, &request.encode())?;
        tracing::debug!(
            min_address = request.min_address,
            scalar_len = request.scalar_len,
            regions = request.regions.len(),
            "wrote dump request"
        );

        self.breakpoints.verify(&key, &symbols.lines);
        self.session.loaded()?;
        tracing::info!(
            source = %source.display(),
            variables = variables.len(),
            lines = symbols.lines.len(),
            "program loaded"
        );
        self.variables = variables;
        self.program = Some(Program {
            key,
            paths,
            lines: symbols.lines,
            control: symbols.control,
        });
        Ok(())
    }

    /// Replace every breakpoint of `source`.
    ///
    /// Nothing is sent; the change rides on the next message.
    pub fn set_breakpoints(&mut self, source: &Path, lines: &[u32]) -> Vec<Breakpoint> {
        let key = self.normalize(source);
        self.breakpoints.set_breakpoints(&key, lines);
        self.verify(&key);
        self.breakpoints.get_for_file(&key).to_vec()
    }

    pub fn set_breakpoint(&mut self, source: &Path, line: u32) -> Breakpoint {
        let key = self.normalize(source);
        let bp = self.breakpoints.add(&key, line);
        self.verify(&key);
        self.breakpoints
            .get_for_file(&key)
            .iter()
            .find(|b| b.id == bp.id)
            .cloned()
            .unwrap_or(bp)
    }

    /// Returns `true` if a breakpoint was removed.
    pub fn clear_breakpoint(&mut self, source: &Path, line: u32) -> bool {
        let key = self.normalize(source);
        self.breakpoints.remove(&key, line)
    }

    pub fn breakpoints(&self, source: &Path) -> Vec<Breakpoint> {
        self.breakpoints
            .get_for_file(&self.normalize(source))
            .to_vec()
    }

    /// Write the message for `resume` without waiting for the target.
    pub fn begin(&mut self, resume: Resume) -> Result<(), BridgeError> {
        self.session.can_send(resume.name())?;
        let program = self.program.as_ref().ok_or(BridgeError::NotLoaded)?;

        let first_line_break = self.session.messages_sent() == 0
            && self.breakpoints.has_breakpoint(&program.key, 1);
        let (command, reason) = match resume {
            Resume::Start if first_line_break => (Command::Step, StopReason::Entry),
            Resume::Start | Resume::Continue if first_line_break => {
                (Command::Step, StopReason::Breakpoint)
            }
            Resume::Start | Resume::Continue => (Command::Continue, StopReason::Breakpoint),
            Resume::Step => (Command::Step, StopReason::Step),
            Resume::Jump(_) => (Command::Jump, StopReason::Step),
        };

        let mut message = OutboundMessage::new(command);
        if let Resume::Jump(line) = resume {
            let (target, address) = program
                .lines
                .first_address_from(line)
                .ok_or(BridgeError::NoAddressForLine { line })?;
            tracing::debug!(line, target, address, "jump target");
            message.jump_address = Some(address);
        }

        let pending = self.breakpoints.pending(&program.key);
        for address in pending.clear.iter().filter_map(|&l| program.lines.address_of(l)) {
            message.patches.clear(address, &program.control);
        }
        for address in pending.set.iter().filter_map(|&l| program.lines.address_of(l)) {
            message.patches.set(address, &program.control);
        }
        message.writes = self.variables.pending_writes();

        let bytes = message.encode(&program.control);
        self.files.write_file(&program.paths.to_target, &bytes)?;
        self.files.delete_file(&program.paths.from_target)?;
        tracing::debug!(
            ?command,
            patches = message.patches.len(),
            writes = message.writes.len(),
            len = bytes.len(),
            "sent message"
        );

        self.breakpoints.mark_flushed(&program.key);
        self.variables.clear_modified();
        self.session.sent()?;
        self.awaiting = Some(reason);
        Ok(())
    }

    /// Wait for the report on the outstanding message and apply it.
    ///
    /// Returns `Ok(false)` if `timeout` elapsed first; the message stays
    /// outstanding and the wait may be repeated.
    pub async fn wait_for_stop(&mut self, timeout: Option<Duration>) -> Result<bool, BridgeError> {
        if self.session.state() != SessionState::WaitingForTarget {
            return Err(BridgeError::Rejected {
                message: format!(
                    "cannot wait: session is in {:?} state",
                    self.session.state()
                ),
            });
        }
        let program = self.program.as_ref().ok_or(BridgeError::NotLoaded)?;

        let consumed = wait_until_absent(
            &self.files,
            &program.paths.to_target,
            self.options.poll_interval,
            timeout,
        )
        .await;
        if !consumed {
            tracing::warn!("target did not answer in time");
            return Ok(false);
        }

        let packet = self.files.read_file(&program.paths.from_target)?;
        match Response::parse(packet)? {
            Response::Ended => {
                tracing::info!("program ended");
                self.end();
            }
            Response::Stopped {
                hook_address,
                packet,
            } => {
                let line = program.lines.line_at(hook_address).unwrap_or(1);
                self.current_line = line;
                self.session.handle_stopped()?;
                if let Err(e) = self.variables.apply_snapshot(&packet) {
                    tracing::warn!("stop report does not match the variable layout: {e}");
                }
                let reason = self.awaiting.take().unwrap_or(StopReason::Breakpoint);
                tracing::info!(line, ?reason, "stopped");
                self.emit(reason.event(line));
            }
            Response::Unknown(packet_type) => {
                tracing::warn!(packet_type, "ignoring unknown packet");
                self.awaiting = None;
                self.session.handle_stopped()?;
            }
        }
        Ok(true)
    }

    /// Send `resume` and wait for the resulting stop.
    pub async fn resume(&mut self, resume: Resume) -> Result<bool, BridgeError> {
        self.begin(resume)?;
        self.wait_for_stop(self.options.response_timeout).await
    }

    pub async fn start(&mut self) -> Result<bool, BridgeError> {
        self.resume(Resume::Start).await
    }

    pub async fn continue_execution(&mut self) -> Result<bool, BridgeError> {
        self.resume(Resume::Continue).await
    }

    pub async fn step(&mut self) -> Result<bool, BridgeError> {
        self.resume(Resume::Step).await
    }

    pub async fn jump(&mut self, line: u32) -> Result<bool, BridgeError> {
        self.resume(Resume::Jump(line)).await
    }

    /// Variables in display order, as of the last stop.
    pub fn variables(&self) -> &[Variable] {
        self.variables.variables()
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.find(name)
    }

    /// Stage a new value; it is written with the next message.
    pub fn set_variable(&mut self, name: &str, text: &str) -> Result<Value, BridgeError> {
        self.require_stopped("set variable")?;
        self.variables.set_variable(name, text)
    }

    /// Stage a new value for one array element.
    pub fn set_element(
        &mut self,
        name: &str,
        index: usize,
        text: &str,
    ) -> Result<Value, BridgeError> {
        self.require_stopped("set element")?;
        self.variables.set_element(name, index, text)
    }

    /// The current frame, or nothing until the target has stopped.
    pub fn stack(&self) -> Vec<StackFrame> {
        match &self.program {
            Some(program) if self.session.state() == SessionState::Stopped => vec![StackFrame {
                index: 0,
                name: format!("Line {}", self.current_line),
                path: program.paths.source.clone(),
                line: self.current_line,
            }],
            _ => Vec::new(),
        }
    }

    /// End the session and announce it.
    pub fn end(&mut self) {
        if self.session.state() == SessionState::Ended {
            return;
        }
        self.session.end();
        self.awaiting = None;
        self.emit(BridgeEvent::Ended);
    }

    fn require_stopped(&self, op: &str) -> Result<(), BridgeError> {
        match self.session.state() {
            SessionState::Stopped => Ok(()),
            SessionState::Idle => Err(BridgeError::NotLoaded),
            SessionState::Ended => Err(BridgeError::Ended),
            other => Err(BridgeError::Rejected {
                message: format!("cannot {op}: session is in {other:?} state"),
            }),
        }
    }

    fn verify(&mut self, key: &Path) {
        if let Some(program) = self.program.as_ref().filter(|p| p.key == key) {
            self.breakpoints.verify(key, &program.lines);
        }
    }

    fn normalize(&self, source: &Path) -> PathBuf {
        PathBuf::from(
            self.options
                .path_style
                .normalize(&source.to_string_lossy()),
        )
    }

    fn emit(&self, event: BridgeEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!(?event, "no event listener");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fastdbg_codec::encode_float;
    use fastdbg_platform::MemoryFiles;
    use std::sync::Arc;

    const SOURCE: &str = "/w/game.bas";
    const LISTING: &str = "/w/bin/game.lst";
    const LABELS: &str = "/w/bin/game.lbl";
    const TO_TARGET: &str = "/w/bin/debug.in";
    const FROM_TARGET: &str = "/w/bin/debug.out";
    const DUMP: &str = "/w/bin/debug.mem";

    const LISTING_TEXT: &str = "\
000000r 1  xx xx        fb_var_A:\t.res 2\t; Word variable
000002r 1  xx xx xx xx  fb_var_F:\t.res 6\t; Float variable
";

    const LABELS_TEXT: &str = "\
al 003000 .fb_lbl____DEBUG_CHECK
al 003100 .fb_lbl____DEBUG_BREAK
al 000012 .TOK_RET
al 000034 .TOK_JUMP
al 002000 .fb_var_A
al 002002 .fb_var_F
al 002400 .@FastBasic_LINE_1
al 002410 .@FastBasic_LINE_2
al 002420 .@FastBasic_LINE_5
";

    fn options() -> BridgeOptions {
        BridgeOptions {
            poll_interval: Duration::from_millis(10),
            response_timeout: Some(Duration::from_secs(1)),
            path_style: PathStyle::Posix,
        }
    }

    fn files() -> Arc<MemoryFiles> {
        Arc::new(
            MemoryFiles::new()
                .with_file(LISTING, LISTING_TEXT)
                .with_file(LABELS, LABELS_TEXT),
        )
    }

    fn loaded() -> (
        DebugBridge<Arc<MemoryFiles>>,
        mpsc::UnboundedReceiver<BridgeEvent>,
        Arc<MemoryFiles>,
    ) {
        let files = files();
        let (mut bridge, rx) = DebugBridge::new(Arc::clone(&files), options());
        bridge.load(Path::new(SOURCE)).unwrap();
        (bridge, rx, files)
    }

    /// Play the target: consume the message and report a stop at `hook`.
    fn report_stop(files: &MemoryFiles, hook: u16, a: u16, f: f64) -> Vec<u8> {
        let message = files.read_file(Path::new(TO_TARGET)).unwrap();
        let [hi, lo] = (hook + 3).to_be_bytes();
        let mut packet = vec![1, hi, lo];
        packet.extend_from_slice(&a.to_le_bytes());
        packet.extend_from_slice(&encode_float(f));
        files.write_file(Path::new(FROM_TARGET), &packet).unwrap();
        files.delete_file(Path::new(TO_TARGET)).unwrap();
        message
    }

    fn report(files: &MemoryFiles, packet: &[u8]) -> Vec<u8> {
        let message = files.read_file(Path::new(TO_TARGET)).unwrap();
        files.write_file(Path::new(FROM_TARGET), packet).unwrap();
        files.delete_file(Path::new(TO_TARGET)).unwrap();
        message
    }

    #[test]
    fn load_writes_dump_request() {
        let (bridge, _rx, files) = loaded();
        assert_eq!(bridge.state(), SessionState::Loaded);
        assert_eq!(
            files.read_file(Path::new(DUMP)).unwrap(),
            vec![0x00, 0x20, 8, 0]
        );
        let names: Vec<&str> = bridge.variables().iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["A", "F%"]);
    }

    #[test]
    fn load_twice_is_a_no_op() {
        let (mut bridge, _rx, files) = loaded();
        files.delete_file(Path::new(LISTING)).unwrap();
        bridge.load(Path::new(SOURCE)).unwrap();
        bridge.load(Path::new("/w/./../w/game.bas")).unwrap_err();
        assert_eq!(bridge.state(), SessionState::Loaded);
    }

    #[test]
    fn load_rejects_other_extensions() {
        let (mut bridge, _rx) = DebugBridge::new(files(), options());
        let err = bridge.load(Path::new("/w/launch.json")).unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedSource(_)));
        assert_eq!(bridge.state(), SessionState::Idle);
    }

    #[test]
    fn missing_control_label_ends_session() {
        let labels = LABELS_TEXT.replace("al 000034 .TOK_JUMP\n", "");
        let files = MemoryFiles::new()
            .with_file(LISTING, LISTING_TEXT)
            .with_file(LABELS, labels);
        let (mut bridge, mut rx) = DebugBridge::new(files, options());

        let err = bridge.load(Path::new(SOURCE)).unwrap_err();
        assert!(matches!(err, BridgeError::Resolution(_)));
        assert_eq!(bridge.state(), SessionState::Ended);
        assert_eq!(rx.try_recv().unwrap(), BridgeEvent::Ended);
        assert!(matches!(bridge.begin(Resume::Start), Err(BridgeError::Ended)));
    }

    #[test]
    fn missing_artifacts_are_io_errors() {
        let (mut bridge, _rx) = DebugBridge::new(MemoryFiles::new(), options());
        let err = bridge.load(Path::new(SOURCE)).unwrap_err();
        assert!(matches!(err, BridgeError::Io(_)));
        assert_eq!(bridge.state(), SessionState::Idle);
    }

    #[test]
    fn begin_before_load() {
        let (mut bridge, _rx) = DebugBridge::new(files(), options());
        assert!(matches!(
            bridge.begin(Resume::Continue),
            Err(BridgeError::NotLoaded)
        ));
    }

    #[test]
    fn start_sends_continue_and_clears_stale_report() {
        let (mut bridge, _rx, files) = loaded();
        files.write_file(Path::new(FROM_TARGET), &[1, 2, 3]).unwrap();
        bridge.set_breakpoints(Path::new(SOURCE), &[5]);

        bridge.begin(Resume::Start).unwrap();
        assert_eq!(bridge.state(), SessionState::WaitingForTarget);
        assert!(!files.exists(Path::new(FROM_TARGET)));

        let message = files.read_file(Path::new(TO_TARGET)).unwrap();
        assert_eq!(
            message,
            vec![1, 1, 0, 0x21, 0x24, 0x00, 0x31, 0x00, 0x30, 1, 0, 0x12]
        );
    }

    #[test]
    fn second_message_while_waiting_is_rejected() {
        let (mut bridge, _rx, _files) = loaded();
        bridge.begin(Resume::Start).unwrap();
        assert!(matches!(
            bridge.begin(Resume::Step),
            Err(BridgeError::Rejected { .. })
        ));
    }

    #[tokio::test]
    async fn breakpoint_on_first_line_forces_step() {
        let (mut bridge, mut rx, files) = loaded();
        bridge.set_breakpoints(Path::new(SOURCE), &[1, 5]);

        bridge.begin(Resume::Start).unwrap();
        let message = report_stop(&files, 0x2400, 7, 1.5);
        assert_eq!(message[0], 2);

        assert!(bridge.wait_for_stop(Some(Duration::from_secs(1))).await.unwrap());
        assert_eq!(rx.try_recv().unwrap(), BridgeEvent::StoppedOnEntry { line: 1 });
        assert_eq!(bridge.current_line(), 1);
        assert_eq!(bridge.variable("A").unwrap().scalar_value(), Some(&Value::Word(7)));
        assert_eq!(bridge.variable("F").unwrap().scalar_value(), Some(&Value::Float(1.5)));

        bridge.begin(Resume::Continue).unwrap();
        let message = report_stop(&files, 0x2420, 8, 1.5);
        assert_eq!(message[0], 1);
        bridge.wait_for_stop(None).await.unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            BridgeEvent::StoppedOnBreakpoint { line: 5 }
        );
    }

    #[tokio::test]
    async fn step_and_jump_report_step_stops() {
        let (mut bridge, mut rx, files) = loaded();
        bridge.begin(Resume::Start).unwrap();
        report_stop(&files, 0x2400, 0, 0.0);
        bridge.wait_for_stop(None).await.unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            BridgeEvent::StoppedOnBreakpoint { line: 1 }
        );

        bridge.begin(Resume::Step).unwrap();
        report_stop(&files, 0x2410, 0, 0.0);
        bridge.wait_for_stop(None).await.unwrap();
        assert_eq!(rx.try_recv().unwrap(), BridgeEvent::StoppedOnStep { line: 2 });

        // Line 3 has no hook; the next one that does is line 5.
        bridge.begin(Resume::Jump(3)).unwrap();
        let message = report_stop(&files, 0x2420, 0, 0.0);
        assert_eq!(&message[..3], &[3, 0x24, 0x20]);
        // No patches, then the step token: TOK_JUMP to the break hook.
        assert_eq!(&message[3..], &[0, 0, 0x00, 0x30, 3, 0, 0x34, 0x00, 0x31]);
        bridge.wait_for_stop(None).await.unwrap();
        assert_eq!(rx.try_recv().unwrap(), BridgeEvent::StoppedOnStep { line: 5 });
    }

    #[tokio::test]
    async fn jump_past_last_line_sends_nothing() {
        let (mut bridge, _rx, files) = loaded();
        bridge.begin(Resume::Start).unwrap();
        report_stop(&files, 0x2400, 0, 0.0);
        bridge.wait_for_stop(None).await.unwrap();

        let err = bridge.begin(Resume::Jump(6)).unwrap_err();
        assert!(matches!(err, BridgeError::NoAddressForLine { line: 6 }));
        assert!(!files.exists(Path::new(TO_TARGET)));
        assert_eq!(bridge.state(), SessionState::Stopped);
    }

    #[tokio::test]
    async fn debug_library_lines_are_out_of_reach() {
        let labels = format!("{LABELS_TEXT}al 002500 .@FastBasic_LINE_9\n");
        let files = Arc::new(
            MemoryFiles::new()
                .with_file(SOURCE, "A=1\nF=2\n\n\nPRINT A\n")
                .with_file(LISTING, LISTING_TEXT)
                .with_file(LABELS, labels),
        );
        let (mut bridge, _rx) = DebugBridge::new(Arc::clone(&files), options());
        bridge.load(Path::new(SOURCE)).unwrap();
        bridge.begin(Resume::Start).unwrap();
        report_stop(&files, 0x2400, 0, 0.0);
        bridge.wait_for_stop(None).await.unwrap();

        let err = bridge.begin(Resume::Jump(6)).unwrap_err();
        assert!(matches!(err, BridgeError::NoAddressForLine { line: 6 }));
    }

    #[tokio::test]
    async fn edits_are_flushed_once() {
        let (mut bridge, _rx, files) = loaded();
        assert!(matches!(
            bridge.set_variable("A", "1"),
            Err(BridgeError::Rejected { .. })
        ));
        bridge.begin(Resume::Start).unwrap();
        report_stop(&files, 0x2400, 0, 0.0);
        bridge.wait_for_stop(None).await.unwrap();

        bridge.set_variable("a", "$1234").unwrap();
        bridge.begin(Resume::Continue).unwrap();
        let message = report_stop(&files, 0x2400, 0x1234, 0.0);
        assert_eq!(&message[8..], &[0x00, 0x20, 2, 0, 0x34, 0x12]);
        bridge.wait_for_stop(None).await.unwrap();

        bridge.begin(Resume::Continue).unwrap();
        let message = report_stop(&files, 0x2400, 0, 0.0);
        assert_eq!(message.len(), 8);
    }

    #[tokio::test]
    async fn cleared_breakpoint_patched_back_once() {
        let (mut bridge, _rx, files) = loaded();
        bridge.set_breakpoints(Path::new(SOURCE), &[2]);
        bridge.begin(Resume::Start).unwrap();
        report_stop(&files, 0x2410, 0, 0.0);
        bridge.wait_for_stop(None).await.unwrap();

        assert!(bridge.clear_breakpoint(Path::new(SOURCE), 2));
        bridge.begin(Resume::Continue).unwrap();
        let message = report(&files, &[9]);
        assert_eq!(&message[1..7], &[1, 0, 0x11, 0x24, 0x00, 0x30]);
    }

    #[tokio::test]
    async fn ended_packet_ends_session() {
        let (mut bridge, mut rx, files) = loaded();
        bridge.begin(Resume::Start).unwrap();
        report(&files, &[9]);
        assert!(bridge.wait_for_stop(None).await.unwrap());
        assert_eq!(rx.try_recv().unwrap(), BridgeEvent::Ended);
        assert_eq!(bridge.state(), SessionState::Ended);
        assert!(bridge.stack().is_empty());
        assert!(matches!(
            bridge.continue_execution().await,
            Err(BridgeError::Ended)
        ));
    }

    #[tokio::test]
    async fn unknown_packet_raises_nothing() {
        let (mut bridge, mut rx, files) = loaded();
        bridge.begin(Resume::Start).unwrap();
        report(&files, &[4, 0, 0]);
        assert!(bridge.wait_for_stop(None).await.unwrap());
        assert!(rx.try_recv().is_err());
        assert_eq!(bridge.state(), SessionState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_keeps_message_outstanding() {
        let (mut bridge, _rx, files) = loaded();
        bridge.begin(Resume::Start).unwrap();
        assert!(!bridge
            .wait_for_stop(Some(Duration::from_millis(100)))
            .await
            .unwrap());
        assert_eq!(bridge.state(), SessionState::WaitingForTarget);

        report_stop(&files, 0x2410, 0, 0.0);
        assert!(bridge.wait_for_stop(None).await.unwrap());
        assert_eq!(bridge.current_line(), 2);
    }

    #[tokio::test]
    async fn stack_names_current_line() {
        let (mut bridge, _rx, files) = loaded();
        assert!(bridge.stack().is_empty());
        bridge.begin(Resume::Start).unwrap();
        report_stop(&files, 0x2410, 0, 0.0);
        bridge.wait_for_stop(None).await.unwrap();

        let stack = bridge.stack();
        assert_eq!(stack.len(), 1);
        assert_eq!(stack[0].name, "Line 2");
        assert_eq!(stack[0].path, PathBuf::from(SOURCE));
    }

    #[tokio::test]
    async fn unknown_address_reports_line_one() {
        let (mut bridge, mut rx, files) = loaded();
        bridge.begin(Resume::Start).unwrap();
        report_stop(&files, 0x5555, 0, 0.0);
        bridge.wait_for_stop(None).await.unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            BridgeEvent::StoppedOnBreakpoint { line: 1 }
        );
    }

    #[test]
    fn breakpoints_verify_after_load() {
        let files = files();
        let (mut bridge, _rx) = DebugBridge::new(Arc::clone(&files), options());
        let bps = bridge.set_breakpoints(Path::new(SOURCE), &[2, 3]);
        assert!(bps.iter().all(|bp| bp.verified));

        bridge.load(Path::new(SOURCE)).unwrap();
        let bps = bridge.breakpoints(Path::new(SOURCE));
        assert!(bps.iter().find(|bp| bp.line == 2).unwrap().verified);
        assert!(!bps.iter().find(|bp| bp.line == 3).unwrap().verified);

        let bp = bridge.set_breakpoint(Path::new(SOURCE), 4);
        assert!(!bp.verified);
    }
}
