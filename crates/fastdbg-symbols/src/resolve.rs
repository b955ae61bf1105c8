//! Combine listing and label scans into one symbol table.

use crate::error::ResolveError;
use crate::labels::{
    scan_labels, ControlAddresses, LineMap, BREAK_HOOK_LABEL, CHECK_HOOK_LABEL, JUMP_TOKEN_LABEL,
    RETURN_TOKEN_LABEL,
};
use crate::listing::scan_listing;
use crate::variable::Variable;

/// Everything the bridge needs to talk to one compiled program.
#[derive(Debug, Clone)]
pub struct Symbols {
    /// Declared variables sorted by display name.
    pub variables: Vec<Variable>,
    /// Line hooks.
    pub lines: LineMap,
    /// Hook addresses and patch tokens.
    pub control: ControlAddresses,
    /// Records dropped from either artifact.
    pub diagnostics: Vec<String>,
}

impl Symbols {
    /// Forget line labels past the end of the user's source.
    ///
    /// The compiled copy carries the debug-support routines after the
    /// program, and their lines must never be reported or jumped to.
    pub fn limit_lines(&mut self, source_lines: usize) {
        let last_line = u32::try_from(source_lines).unwrap_or(u32::MAX);
        let dropped = self.lines.retain_through(last_line);
        if dropped > 0 {
            tracing::debug!(dropped, last_line, "dropped line labels past the source");
        }
    }
}

/// Resolve the listing and label artifacts of one build.
///
/// Malformed records are dropped and reported in
/// [`Symbols::diagnostics`]; only a missing control label fails.
pub fn resolve(listing: &[u8], labels: &[u8]) -> Result<Symbols, ResolveError> {
    let listing = scan_listing(&String::from_utf8_lossy(listing));
    let labels = scan_labels(&String::from_utf8_lossy(labels));

    let control = ControlAddresses {
        check_hook: require(labels.check_hook, CHECK_HOOK_LABEL)?,
        break_hook: require(labels.break_hook, BREAK_HOOK_LABEL)?,
        return_token: require(labels.return_token, RETURN_TOKEN_LABEL)?,
        jump_token: require(labels.jump_token, JUMP_TOKEN_LABEL)?,
    };

    let mut diagnostics = listing.diagnostics;
    diagnostics.extend(labels.diagnostics);

    let mut variables = listing.variables;
    for variable in &mut variables {
        match labels.variables.get(variable.label_name()) {
            Some(&address) => variable.address = address,
            None => {
                let message = format!("no address for variable {}", variable.name);
                tracing::warn!("{message}");
                diagnostics.push(message);
            }
        }
    }
    variables.sort_by(|a, b| a.name.cmp(&b.name));

    tracing::info!(
        variables = variables.len(),
        lines = labels.lines.len(),
        "symbols resolved"
    );
    Ok(Symbols {
        variables,
        lines: labels.lines,
        control,
        diagnostics,
    })
}

fn require<T>(value: Option<T>, label: &'static str) -> Result<T, ResolveError> {
    value.ok_or(ResolveError::MissingControlAddress { label })
}
