//! Hook injection.

/// Call placed in front of the first line: waits for the host's first
/// message before the program runs.
pub const POLL_PREFIX: &str = "@___DEBUG_POLL:";
/// Call placed in front of every other executable line.
pub const CHECK_PREFIX: &str = "@___DEBUG_CHECK:";
/// Statement appended when no breakpoint is set, so the program waits
/// for a key instead of exiting.
pub const AWAIT_KEY: &str = "GET ___DEBUG_KEY";

/// Routines the hooks call, appended after the program body.
pub const DEBUG_LIBRARY: &str = include_str!("../assets/debug_library.bas");

/// Lines that must not host a call: comments, directives, data and
/// procedure boundaries.
const SKIPPED_PREFIXES: &[&str] = &[
    "'", ".", "data ", "da.", "proc ", "pr.", "endproc", "endp.",
];
/// Branch keywords that only make sense at the start of a line.
const BRANCH_KEYWORDS: &[&str] = &["else", "elif"];

/// A source file ready for the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentedSource {
    /// Text to compile.
    pub text: String,
    /// Number of lines in the untouched source.
    pub original_line_count: usize,
    /// Bytes injected in front of each original line.
    prefix_widths: Vec<usize>,
}

impl InstrumentedSource {
    /// Bytes injected in front of 1-based `line`; 0 outside the
    /// original source.
    pub fn prefix_width(&self, line: usize) -> usize {
        line.checked_sub(1)
            .and_then(|i| self.prefix_widths.get(i))
            .copied()
            .unwrap_or(0)
    }

    /// `true` when hooks were injected.
    pub fn is_instrumented(&self) -> bool {
        self.prefix_widths.iter().any(|&w| w > 0)
    }
}

/// Prepare `source` for a debug build.
///
/// With no breakpoints only [`AWAIT_KEY`] is appended. Otherwise the
/// first line gets [`POLL_PREFIX`], every other executable line gets
/// [`CHECK_PREFIX`] and [`DEBUG_LIBRARY`] follows the program.
pub fn instrument(source: &str, breakpoints: &[u32]) -> InstrumentedSource {
    let mut lines = split_lines(source);
    let original_line_count = lines.len();
    let mut prefix_widths = vec![0; original_line_count];

    if breakpoints.is_empty() {
        lines.push(AWAIT_KEY.to_string());
        tracing::debug!(lines = original_line_count, "no breakpoints, appending key wait");
        return InstrumentedSource {
            text: lines.join("\n"),
            original_line_count,
            prefix_widths,
        };
    }

    for (index, line) in lines.iter_mut().enumerate() {
        let prefix = if index == 0 {
            POLL_PREFIX
        } else if accepts_hook(line) {
            CHECK_PREFIX
        } else {
            continue;
        };
        line.insert_str(0, prefix);
        prefix_widths[index] = prefix.len();
    }
    lines.extend(DEBUG_LIBRARY.lines().map(str::to_string));

    tracing::debug!(
        lines = original_line_count,
        hooks = prefix_widths.iter().filter(|&&w| w > 0).count(),
        "source instrumented"
    );
    InstrumentedSource {
        text: lines.join("\n"),
        original_line_count,
        prefix_widths,
    }
}

/// The source unchanged, for runs without debugging.
pub fn passthrough(source: &str) -> InstrumentedSource {
    let original_line_count = split_lines(source).len();
    InstrumentedSource {
        text: source.to_string(),
        original_line_count,
        prefix_widths: vec![0; original_line_count],
    }
}

/// Split on `\n` or `\r\n`. A trailing newline yields a final empty line.
fn split_lines(source: &str) -> Vec<String> {
    source
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect()
}

/// `true` when a check-hook call can be placed in front of `line`.
fn accepts_hook(line: &str) -> bool {
    let line = line.trim().to_lowercase();
    if line.is_empty() || SKIPPED_PREFIXES.iter().any(|p| line.starts_with(p)) {
        return false;
    }
    let first_word = line
        .split(|c: char| !c.is_ascii_alphanumeric())
        .next()
        .unwrap_or_default();
    !BRANCH_KEYWORDS.contains(&first_word)
}
