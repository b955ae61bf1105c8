//! Variable declarations from the assembler listing.
//!
//! The compiler reserves one slot per variable and tags it with a
//! comment naming its type:
//!
//! ```text
//! 000006r 1  xx xx xx xx  fb_var_AB:	.res 6	; Float variable
//! 000004r 1  xx xx        fb_var_C:	.res 2	; Word Array variable
//! ```
//!
//! Array sizes are only visible in the code that dimensions them:
//!
//! ```text
//! 000011r 1  08           	.byte	8
//! 000012r 1  rr           	.byte	TOK_DIM
//! 000013r 1  rr           	makevar	"C"
//! ```

use fastdbg_codec::VarType;

use crate::variable::Variable;

const RECORD_SUFFIX: &str = " variable";
const NAME_MARKER: &str = " fb_var_";
const TYPE_MARKER: &str = "; ";
const ARRAY_QUALIFIER: &str = "Array";
const DIM_TOKEN: &str = "TOK_DIM";

/// Prefix of variables the debug-support library declares for itself.
pub const DEBUG_NAME_PREFIX: &str = "___DEBUG_";

/// Result of scanning a listing.
#[derive(Debug, Default)]
pub struct ListingScan {
    /// Declared variables, in listing order, with display names.
    pub variables: Vec<Variable>,
    /// One message per record that had to be dropped.
    pub diagnostics: Vec<String>,
}

/// Scan listing text for variable declarations.
pub fn scan_listing(text: &str) -> ListingScan {
    let lines: Vec<&str> = text.lines().collect();
    let mut scan = ListingScan::default();

    for line in &lines {
        let line = line.trim_end();
        if !line.ends_with(RECORD_SUFFIX) {
            continue;
        }
        let Some((name, type_text)) = split_record(line) else {
            scan.diagnostics
                .push(format!("malformed variable record: {line}"));
            continue;
        };
        if name.starts_with(DEBUG_NAME_PREFIX) {
            continue;
        }

        let mut parts = type_text.split(' ');
        let type_name = parts.next().unwrap_or_default();
        let Some(var_type) = VarType::from_listing_name(type_name) else {
            scan.diagnostics
                .push(format!("unexpected variable type {type_name} for {name}"));
            continue;
        };
        let display_name = format!("{name}{}", var_type.name_suffix());

        let variable = if parts.next() == Some(ARRAY_QUALIFIER) {
            match dimension_of(&lines, name, var_type) {
                Some(count) => Variable::array(display_name, var_type, count),
                None => {
                    scan.diagnostics
                        .push(format!("no dimension found for array {name}"));
                    continue;
                }
            }
        } else {
            Variable::scalar(display_name, var_type)
        };
        scan.variables.push(variable);
    }

    for message in &scan.diagnostics {
        tracing::warn!("{message}");
    }
    scan
}

/// Split a record into its variable name and type text
/// (`"Word Array"`, `"Float"`, ...).
fn split_record(line: &str) -> Option<(&str, &str)> {
    let type_start = line.rfind(TYPE_MARKER)? + TYPE_MARKER.len();
    let type_end = line.len() - RECORD_SUFFIX.len();
    let name_start = line.find(NAME_MARKER)? + NAME_MARKER.len();
    let name_end = name_start + line[name_start..].find(':')?;
    if type_end < type_start || name_end == name_start {
        return None;
    }
    Some((&line[name_start..name_end], &line[type_start..type_end]))
}

/// Recover the element count of array `name` from its `DIM` code.
fn dimension_of(lines: &[&str], name: &str, var_type: VarType) -> Option<usize> {
    let makevar = format!("makevar\t\"{name}\"");
    // Floats carry an extra multiply token between the size and the DIM.
    let back = if var_type == VarType::Float { 3 } else { 2 };

    let index = (1..lines.len()).find(|&j| {
        lines[j].trim_end().ends_with(&makevar) && lines[j - 1].trim_end().ends_with(DIM_TOKEN)
    })?;
    let size_line = lines.get(index.checked_sub(back)?)?;
    let literal = size_line.trim_end().rsplit('\t').next()?.trim();
    let size = parse_literal(literal)?;

    // Word and string arrays are sized in bytes, two per element.
    let count = match var_type {
        VarType::Word | VarType::String => size / 2,
        VarType::Byte | VarType::Float => size,
    };
    Some(count)
}

fn parse_literal(literal: &str) -> Option<usize> {
    match literal.strip_prefix('$') {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => literal.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::VarValue;

    fn record(name: &str, kind: &str) -> String {
        format!("000004r 1  xx xx        fb_var_{name}:\t.res 2\t; {kind} variable")
    }

    fn dim(name: &str, size_line: &str, float: bool) -> String {
        let mut out = format!("000011r 1  08           \t{size_line}\n");
        if float {
            out.push_str("00003Br 1  rr           \t.byte\tTOK_MUL6\n");
        }
        out.push_str("000012r 1  rr           \t.byte\tTOK_DIM\n");
        out.push_str(&format!("000013r 1  rr           \tmakevar\t\"{name}\"\n"));
        out
    }

    #[test]
    fn scalars_get_type_suffixes() {
        let text = [
            record("A", "Word"),
            record("HW", "String"),
            record("AB", "Float"),
        ]
        .join("\n");
        let scan = scan_listing(&text);
        let names: Vec<_> = scan.variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["A", "HW$", "AB%"]);
        assert_eq!(scan.variables[2].byte_len, 6);
        assert!(scan.diagnostics.is_empty());
    }

    #[test]
    fn debug_support_variables_are_skipped() {
        let text = [record("A", "Word"), record("___DEBUG_KEY", "Word")].join("\n");
        let scan = scan_listing(&text);
        assert_eq!(scan.variables.len(), 1);
    }

    #[test]
    fn other_lines_are_ignored() {
        let text = "000000r 1               \t.export fb_var_A\n; just a comment\n";
        let scan = scan_listing(text);
        assert!(scan.variables.is_empty());
        assert!(scan.diagnostics.is_empty());
    }

    #[test]
    fn unknown_type_is_dropped_with_diagnostic() {
        let scan = scan_listing(&record("Q", "Pointer"));
        assert!(scan.variables.is_empty());
        assert_eq!(scan.diagnostics.len(), 1);
        assert!(scan.diagnostics[0].contains("Pointer"));
    }

    #[test]
    fn malformed_record_is_dropped_with_diagnostic() {
        let scan = scan_listing("garbage ; Word variable");
        assert!(scan.variables.is_empty());
        assert_eq!(scan.diagnostics.len(), 1);
    }

    #[test]
    fn byte_array_size_is_element_count() {
        let text = format!("{}\n{}", record("D", "Byte Array"), dim("D", ".byte\t8", false));
        let scan = scan_listing(&text);
        let d = &scan.variables[0];
        assert_eq!(d.name, "D");
        assert_eq!(d.elements().unwrap().len(), 8);
        assert_eq!(d.byte_len, 8);
    }

    #[test]
    fn word_array_size_is_halved() {
        let text = format!("{}\n{}", record("C", "Word Array"), dim("C", ".byte\t8", false));
        let scan = scan_listing(&text);
        assert_eq!(scan.variables[0].elements().unwrap().len(), 4);
        assert_eq!(scan.variables[0].byte_len, 8);
    }

    #[test]
    fn float_array_skips_multiply_token() {
        let text = format!("{}\n{}", record("A5", "Float Array"), dim("A5", ".byte\t5", true));
        let scan = scan_listing(&text);
        let a = &scan.variables[0];
        assert_eq!(a.name, "A5%");
        assert_eq!(a.elements().unwrap().len(), 5);
        assert_eq!(a.byte_len, 30);
    }

    #[test]
    fn string_array_gets_suffix_and_halved_size() {
        let text = format!("{}\n{}", record("JJ", "String Array"), dim("JJ", ".byte\t6", false));
        let scan = scan_listing(&text);
        let jj = &scan.variables[0];
        assert_eq!(jj.name, "JJ$");
        assert_eq!(jj.elements().unwrap().len(), 3);
    }

    #[test]
    fn array_size_boundary() {
        for (count, large) in [(255, false), (256, true), (257, true)] {
            let text = format!(
                "{}\n{}",
                record("W", "Word Array"),
                dim("W", &format!(".word\t{}", count * 2), false)
            );
            let scan = scan_listing(&text);
            let w = &scan.variables[0];
            match &w.value {
                VarValue::Elements(e) => {
                    assert!(!large, "{count} should collapse");
                    assert_eq!(e.len(), count);
                }
                VarValue::LargeArray { count: c } => {
                    assert!(large, "{count} should be enumerated");
                    assert_eq!(*c, count);
                }
                VarValue::Scalar(_) => panic!("array parsed as scalar"),
            }
        }
    }

    #[test]
    fn hex_size_literal() {
        let text = format!("{}\n{}", record("D", "Byte Array"), dim("D", ".byte\t$10", false));
        let scan = scan_listing(&text);
        assert_eq!(scan.variables[0].elements().unwrap().len(), 16);
    }

    #[test]
    fn array_without_dimension_is_dropped() {
        let scan = scan_listing(&record("Z", "Byte Array"));
        assert!(scan.variables.is_empty());
        assert!(scan.diagnostics[0].contains("no dimension"));
    }

    #[test]
    fn dimension_requires_dim_token_before_makevar() {
        let text = format!(
            "{}\n000011r 1 \t.byte\t8\n000012r 1 \t.byte\tTOK_NUM\n000013r 1 \tmakevar\t\"D\"",
            record("D", "Byte Array")
        );
        let scan = scan_listing(&text);
        assert!(scan.variables.is_empty());
    }

    #[test]
    fn crlf_listing_parses() {
        let text = format!("{}\r\n{}\r\n", record("A", "Word"), record("B", "Word"));
        let scan = scan_listing(&text);
        assert_eq!(scan.variables.len(), 2);
    }
}
