//! Compiler messages mapped back onto the untouched source.

use regex::{Captures, Regex};

use crate::inject::{InstrumentedSource, CHECK_PREFIX, POLL_PREFIX};

const COMMAND_BANNER: &str = "Command failed:";
const COMPILE_BANNER: &str = "BAS compile '";

/// Compiler output after remapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemappedDiagnostics {
    /// Message text with positions in original-source coordinates.
    pub text: String,
    /// Line and column of the first located message, 1-based.
    pub location: Option<(usize, usize)>,
}

/// Rewrites compiler output produced for an [`InstrumentedSource`].
#[derive(Debug)]
pub struct DiagnosticRemapper {
    row_col: Regex,
    row_only: Regex,
}

impl Default for DiagnosticRemapper {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticRemapper {
    pub fn new() -> Self {
        // prog.bas:12:34: message
        let row_col =
            Regex::new(r"(?i)\.(bas|lst|fb):(\d+):(\d+):").expect("row/col regex is valid");
        // prog.bas:12: message
        let row_only = Regex::new(r"(?i)\.(bas|lst|fb):(\d+): ").expect("row regex is valid");
        Self { row_col, row_only }
    }

    /// Remap `output` from compiling `source`.
    pub fn remap(&self, output: &str, source: &InstrumentedSource) -> RemappedDiagnostics {
        let mut lines: Vec<&str> = output.lines().collect();
        if lines.first().is_some_and(|l| l.starts_with(COMMAND_BANNER)) {
            lines.remove(0);
        }
        if lines.first().is_some_and(|l| l.starts_with(COMPILE_BANNER)) {
            lines.remove(0);
        }
        let text = lines.join("\n");

        let max_row = source.original_line_count.max(1);
        let mut location = None;

        let text = self.row_col.replace_all(&text, |caps: &Captures<'_>| {
            let row = number(&caps[2]);
            let column = number(&caps[3])
                .saturating_sub(source.prefix_width(row))
                .max(1);
            let row = row.clamp(1, max_row);
            location.get_or_insert((row, column));
            format!(".{}:{row}:{column}:", &caps[1])
        });
        let text = self.row_only.replace_all(&text, |caps: &Captures<'_>| {
            let row = number(&caps[2]).clamp(1, max_row);
            location.get_or_insert((row, 1));
            format!(".{}:{row}: ", &caps[1])
        });
        let text = text.replace(CHECK_PREFIX, "").replace(POLL_PREFIX, "");

        RemappedDiagnostics { text, location }
    }
}

fn number(digits: &str) -> usize {
    digits.parse().unwrap_or(1)
}
