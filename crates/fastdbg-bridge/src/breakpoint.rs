//! Breakpoint bookkeeping.
//!
//! Breakpoints live on the host until the next outbound message turns
//! them into code patches. A line counts as *armed* once a message
//! carrying its set patch has reached the target; only armed lines need
//! a clear patch when they are removed.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use fastdbg_symbols::LineMap;
use serde::Serialize;

/// A host-side breakpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breakpoint {
    pub id: u32,
    /// Line number (1-based).
    pub line: u32,
    /// `false` once symbols are loaded and the line has no hook.
    pub verified: bool,
}

/// Set and clear patches owed to the target for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingPatches {
    pub set: BTreeSet<u32>,
    pub clear: BTreeSet<u32>,
}

/// Manages breakpoints across files, keyed by normalized path.
#[derive(Debug, Clone, Default)]
pub struct BreakpointManager {
    breakpoints: HashMap<PathBuf, Vec<Breakpoint>>,
    armed: HashMap<PathBuf, BTreeSet<u32>>,
    pending_clears: HashMap<PathBuf, BTreeSet<u32>>,
    next_id: u32,
}

impl BreakpointManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every breakpoint of `path` with one per line in `lines`.
    ///
    /// Duplicate lines collapse into one breakpoint.
    pub fn set_breakpoints(&mut self, path: &Path, lines: &[u32]) -> Vec<Breakpoint> {
        self.clear_file(path);
        let mut added: Vec<Breakpoint> = Vec::with_capacity(lines.len());
        for &line in lines {
            let bp = self.add(path, line);
            if !added.contains(&bp) {
                added.push(bp);
            }
        }
        added
    }

    /// Add a breakpoint at `line`, or return the one already there.
    pub fn add(&mut self, path: &Path, line: u32) -> Breakpoint {
        let list = self.breakpoints.entry(path.to_path_buf()).or_default();
        if let Some(existing) = list.iter().find(|bp| bp.line == line) {
            return existing.clone();
        }
        self.next_id += 1;
        let bp = Breakpoint {
            id: self.next_id,
            line,
            verified: true,
        };
        list.push(bp.clone());
        bp
    }

    /// Remove the breakpoint at `line`.
    ///
    /// Returns `true` if a breakpoint was removed.
    pub fn remove(&mut self, path: &Path, line: u32) -> bool {
        let Some(list) = self.breakpoints.get_mut(path) else {
            return false;
        };
        let before = list.len();
        list.retain(|bp| bp.line != line);
        let removed = before != list.len();
        if list.is_empty() {
            self.breakpoints.remove(path);
        }
        if removed {
            self.queue_clear(path, line);
        }
        removed
    }

    /// Remove every breakpoint of `path`.
    pub fn clear_file(&mut self, path: &Path) {
        if let Some(list) = self.breakpoints.remove(path) {
            for bp in list {
                self.queue_clear(path, bp.line);
            }
        }
    }

    /// All breakpoints of a file, in insertion order.
    pub fn get_for_file(&self, path: &Path) -> &[Breakpoint] {
        self.breakpoints.get(path).map_or(&[], |v| v.as_slice())
    }

    /// Sorted breakpoint lines of a file.
    pub fn lines(&self, path: &Path) -> Vec<u32> {
        let mut lines: Vec<u32> = self.get_for_file(path).iter().map(|bp| bp.line).collect();
        lines.sort_unstable();
        lines
    }

    pub fn has_breakpoint(&self, path: &Path, line: u32) -> bool {
        self.get_for_file(path).iter().any(|bp| bp.line == line)
    }

    /// Verify the breakpoints of `path` against the lines that kept a hook.
    pub fn verify(&mut self, path: &Path, lines: &LineMap) {
        if let Some(list) = self.breakpoints.get_mut(path) {
            for bp in list.iter_mut() {
                bp.verified = lines.address_of(bp.line).is_some();
            }
        }
    }

    /// Patches the next message to the target must carry for `path`.
    ///
    /// Every current breakpoint is (re)sent as a set. Only armed lines
    /// that are no longer set need a clear.
    pub fn pending(&self, path: &Path) -> PendingPatches {
        let set: BTreeSet<u32> = self.get_for_file(path).iter().map(|bp| bp.line).collect();
        let clear = self
            .pending_clears
            .get(path)
            .map(|lines| lines.difference(&set).copied().collect())
            .unwrap_or_default();
        PendingPatches { set, clear }
    }

    /// Record that the patches from [`pending`](Self::pending) reached
    /// the target.
    pub fn mark_flushed(&mut self, path: &Path) {
        self.pending_clears.remove(path);
        let set: BTreeSet<u32> = self.get_for_file(path).iter().map(|bp| bp.line).collect();
        if set.is_empty() {
            self.armed.remove(path);
        } else {
            self.armed.insert(path.to_path_buf(), set);
        }
    }

    /// Iterate over all breakpoints across all files.
    pub fn all(&self) -> impl Iterator<Item = &Breakpoint> {
        self.breakpoints.values().flat_map(|v| v.iter())
    }

    fn queue_clear(&mut self, path: &Path, line: u32) {
        let armed = self
            .armed
            .get(path)
            .is_some_and(|lines| lines.contains(&line));
        if armed {
            self.pending_clears
                .entry(path.to_path_buf())
                .or_default()
                .insert(line);
        }
    }
}
