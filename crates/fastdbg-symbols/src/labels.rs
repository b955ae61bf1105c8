//! Addresses from the label file.
//!
//! ```text
//! al 002300 .fb_var_A
//! al 0024A1 .@FastBasic_LINE_12
//! al 0025F0 .fb_lbl____DEBUG_CHECK
//! al 000012 .TOK_RET
//! ```

use std::collections::{BTreeMap, HashMap};

/// Label of the poll-only hook every line calls by default.
pub const CHECK_HOOK_LABEL: &str = "fb_lbl____DEBUG_CHECK";
/// Label of the full state-exchange hook.
pub const BREAK_HOOK_LABEL: &str = "fb_lbl____DEBUG_BREAK";
/// Label carrying the interpreter's return token.
pub const RETURN_TOKEN_LABEL: &str = "TOK_RET";
/// Label carrying the interpreter's jump token.
pub const JUMP_TOKEN_LABEL: &str = "TOK_JUMP";

const LINE_LABEL_PREFIX: &str = "@FastBasic_LINE_";
const VARIABLE_LABEL_PREFIX: &str = "fb_var_";

/// Addresses and tokens the protocol needs before any exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlAddresses {
    /// Entry of the check hook; also the target of the resume patch.
    pub check_hook: u16,
    /// Entry of the break hook.
    pub break_hook: u16,
    /// Token that makes the check hook return immediately.
    pub return_token: u8,
    /// Token that makes the check hook jump to the break hook.
    pub jump_token: u8,
}

/// Bidirectional map between source lines and hook addresses.
///
/// Several lines can share one address when the optimizer merges them;
/// looking such an address up yields the lowest of those lines.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineMap {
    line_to_address: BTreeMap<u32, u16>,
    address_to_line: HashMap<u16, u32>,
}

impl LineMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `line`'s hook lives at `address`.
    pub fn insert(&mut self, line: u32, address: u16) {
        self.line_to_address.insert(line, address);
        self.address_to_line
            .entry(address)
            .and_modify(|existing| *existing = (*existing).min(line))
            .or_insert(line);
    }

    /// Hook address of `line`, if the compiler kept one.
    pub fn address_of(&self, line: u32) -> Option<u16> {
        self.line_to_address.get(&line).copied()
    }

    /// Lowest line whose hook lives at `address`.
    pub fn line_at(&self, address: u16) -> Option<u32> {
        self.address_to_line.get(&address).copied()
    }

    /// First line at or after `line` that has a hook address.
    pub fn first_address_from(&self, line: u32) -> Option<(u32, u16)> {
        self.line_to_address
            .range(line..)
            .next()
            .map(|(&l, &a)| (l, a))
    }

    /// Drop every line after `last_line` and return how many went.
    pub fn retain_through(&mut self, last_line: u32) -> usize {
        let dropped = self.line_to_address.split_off(&last_line.saturating_add(1));
        if !dropped.is_empty() {
            self.address_to_line.clear();
            for (&line, &address) in &self.line_to_address {
                self.address_to_line
                    .entry(address)
                    .and_modify(|existing| *existing = (*existing).min(line))
                    .or_insert(line);
            }
        }
        dropped.len()
    }

    /// Highest line with a hook address, or 0 when empty.
    pub fn max_line(&self) -> u32 {
        self.line_to_address
            .keys()
            .next_back()
            .copied()
            .unwrap_or(0)
    }

    /// Number of lines with an address.
    pub fn len(&self) -> usize {
        self.line_to_address.len()
    }

    /// `true` when no line has an address.
    pub fn is_empty(&self) -> bool {
        self.line_to_address.is_empty()
    }
}

/// Everything pulled out of a label file.
#[derive(Debug, Default)]
pub struct LabelScan {
    /// Variable slot addresses keyed by bare variable name.
    pub variables: HashMap<String, u16>,
    /// Line hooks.
    pub lines: LineMap,
    pub check_hook: Option<u16>,
    pub break_hook: Option<u16>,
    pub return_token: Option<u8>,
    pub jump_token: Option<u8>,
    /// One message per record that had to be dropped.
    pub diagnostics: Vec<String>,
}

/// Scan label-file text.
pub fn scan_labels(text: &str) -> LabelScan {
    let mut scan = LabelScan::default();

    for line in text.lines() {
        let mut fields = line.split_whitespace();
        let (Some(_kind), Some(hex), Some(label)) = (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };
        let Some(label) = label.strip_prefix('.') else {
            continue;
        };
        let Ok(value) = u32::from_str_radix(hex, 16) else {
            scan.diagnostics
                .push(format!("bad address {hex} for label {label}"));
            continue;
        };
        let Ok(address) = u16::try_from(value) else {
            scan.diagnostics
                .push(format!("address {hex} out of range for label {label}"));
            continue;
        };

        match label {
            CHECK_HOOK_LABEL => scan.check_hook = Some(address),
            BREAK_HOOK_LABEL => scan.break_hook = Some(address),
            RETURN_TOKEN_LABEL => scan.return_token = token(address, label, &mut scan.diagnostics),
            JUMP_TOKEN_LABEL => scan.jump_token = token(address, label, &mut scan.diagnostics),
            _ => {
                if let Some(rest) = label.strip_prefix(LINE_LABEL_PREFIX) {
                    match parse_line_number(rest) {
                        Some(line) => scan.lines.insert(line, address),
                        None => scan.diagnostics.push(format!("bad line label {label}")),
                    }
                } else if let Some(name) = label.strip_prefix(VARIABLE_LABEL_PREFIX) {
                    scan.variables.insert(name.to_string(), address);
                }
            }
        }
    }

    for message in &scan.diagnostics {
        tracing::warn!("{message}");
    }
    scan
}

fn token(value: u16, label: &str, diagnostics: &mut Vec<String>) -> Option<u8> {
    let token = u8::try_from(value).ok();
    if token.is_none() {
        diagnostics.push(format!("token {label} does not fit a byte: {value:#x}"));
    }
    token
}

/// `12` or `12_3` → 12. Line 0 is not a source line.
fn parse_line_number(rest: &str) -> Option<u32> {
    let digits = rest.split('_').next()?;
    digits.parse().ok().filter(|&line| line > 0)
}
