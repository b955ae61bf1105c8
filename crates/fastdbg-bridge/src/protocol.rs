//! Wire messages of the file channel.
//!
//! Host → target (`debug.in`):
//!
//! ```text
//! byte   command            1 continue, 2 step, 3 jump
//! word   jump address       jump only, high byte first
//! word   patch count
//! (word location, word value) * patch count
//! word   check hook, word len, byte[len] resume token
//! (word address, word len, byte[len] data) * until EOF
//! ```
//!
//! Target → host (`debug.out`): a packet type byte, then for a stop the
//! return address (high byte first) and the memory snapshot.

use std::collections::BTreeMap;

use fastdbg_codec::{encode_value, put_word, read_byte, CodecError, Value};
use fastdbg_symbols::ControlAddresses;

/// Packet type of a stop report.
pub const PACKET_STOPPED: u8 = 1;
/// Packet type of the end-of-program report.
pub const PACKET_ENDED: u8 = 9;
/// Offset of the scalar block in a stop report.
pub const SNAPSHOT_OFFSET: usize = 3;
/// The hook call instruction is this many bytes before its return address.
const HOOK_CALL_LEN: u16 = 3;

/// Bytes behind each entry of a region reported as a pointer table.
pub const POINTER_CHUNK: usize = 256;

/// `true` when the target reports a dump region as a table of pointers,
/// one per 256 bytes of the region, each followed by the 256 bytes it
/// points at, instead of raw bytes.
///
/// The target decides by length alone, so some non-string arrays are
/// reported this way too.
pub fn reports_pointer_table(len: usize) -> bool {
    len % POINTER_CHUNK == 0 && len > POINTER_CHUNK
}

/// What the target should do after applying a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Continue = 1,
    Step = 2,
    Jump = 3,
}

/// One code patch: write `value` at `location`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Patch {
    pub location: u16,
    pub value: u16,
}

/// Breakpoint patches of one message, at most one per location.
///
/// A set always wins over a clear of the same location, whichever
/// comes first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchSet {
    patches: BTreeMap<u16, (u16, bool)>,
}

impl PatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route the hook at `hook_address` to the break hook.
    pub fn set(&mut self, hook_address: u16, control: &ControlAddresses) {
        self.patches
            .insert(hook_address.wrapping_add(1), (control.break_hook, true));
    }

    /// Route the hook at `hook_address` back to the check hook.
    pub fn clear(&mut self, hook_address: u16, control: &ControlAddresses) {
        self.patches
            .entry(hook_address.wrapping_add(1))
            .or_insert((control.check_hook, false));
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Patches in location order.
    pub fn iter(&self) -> impl Iterator<Item = Patch> + '_ {
        self.patches.iter().map(|(&location, &(value, _))| Patch { location, value })
    }
}

/// A write of encoded data into target memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableWrite {
    pub address: u16,
    pub data: Vec<u8>,
}

impl VariableWrite {
    pub fn new(address: u16, value: &Value) -> Self {
        let mut data = Vec::new();
        encode_value(value, &mut data);
        Self { address, data }
    }
}

/// One host → target message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub command: Command,
    /// Hook address to resume at; only sent with [`Command::Jump`].
    pub jump_address: Option<u16>,
    pub patches: PatchSet,
    pub writes: Vec<VariableWrite>,
}

impl OutboundMessage {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            jump_address: None,
            patches: PatchSet::new(),
            writes: Vec::new(),
        }
    }

    /// Bytes written over the start of the check hook. Continuing makes
    /// every unpatched hook return at once; stepping makes every hook
    /// fall through to the break hook.
    pub fn resume_token(&self, control: &ControlAddresses) -> Vec<u8> {
        match self.command {
            Command::Continue => vec![control.return_token],
            Command::Step | Command::Jump => {
                let [lo, hi] = control.break_hook.to_le_bytes();
                vec![control.jump_token, lo, hi]
            }
        }
    }

    pub fn encode(&self, control: &ControlAddresses) -> Vec<u8> {
        let mut out = vec![self.command as u8];
        if self.command == Command::Jump {
            let address = self.jump_address.unwrap_or_default();
            out.extend_from_slice(&address.to_be_bytes());
        }

        put_word(&mut out, self.patches.len() as u16);
        for patch in self.patches.iter() {
            put_word(&mut out, patch.location);
            put_word(&mut out, patch.value);
        }

        let token = self.resume_token(control);
        put_word(&mut out, control.check_hook);
        put_word(&mut out, token.len() as u16);
        out.extend_from_slice(&token);

        for write in &self.writes {
            put_word(&mut out, write.address);
            put_word(&mut out, write.data.len() as u16);
            out.extend_from_slice(&write.data);
        }
        out
    }
}

/// Which memory the target reports on each stop (`debug.mem`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DumpRequest {
    /// Lowest variable address; the scalar block starts here.
    pub min_address: u16,
    /// Length of the scalar block.
    pub scalar_len: u16,
    /// `(slot address, length)` of each string or array, in report order.
    pub regions: Vec<(u16, u16)>,
}

impl DumpRequest {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 * (self.regions.len() + 1));
        put_word(&mut out, self.min_address);
        put_word(&mut out, self.scalar_len);
        for &(address, len) in &self.regions {
            put_word(&mut out, address);
            put_word(&mut out, len);
        }
        out
    }
}

/// A decoded target → host report.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// The program ran to completion.
    Ended,
    /// The target stopped in its break hook.
    Stopped {
        /// Address of the hook call that stopped.
        hook_address: u16,
        /// The whole packet; the snapshot starts at [`SNAPSHOT_OFFSET`].
        packet: Vec<u8>,
    },
    /// A packet type this host does not know.
    Unknown(u8),
}

impl Response {
    pub fn parse(packet: Vec<u8>) -> Result<Self, CodecError> {
        match read_byte(&packet, 0)? {
            PACKET_ENDED => Ok(Response::Ended),
            PACKET_STOPPED => {
                // The return address comes off the stack high byte first.
                let hi = read_byte(&packet, 1)?;
                let lo = read_byte(&packet, 2)?;
                let return_address = u16::from_le_bytes([lo, hi]);
                Ok(Response::Stopped {
                    hook_address: return_address.wrapping_sub(HOOK_CALL_LEN),
                    packet,
                })
            }
            other => Ok(Response::Unknown(other)),
        }
    }
}
