//! Interactive commands read from stdin.

/// One parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Continue,
    Step,
    Jump(u32),
    /// Replace all breakpoints.
    Break(Vec<u32>),
    Vars,
    Stack,
    Set {
        name: String,
        index: Option<usize>,
        value: String,
    },
    /// Keep waiting after a timeout.
    Wait,
    Quit,
}

pub const HELP: &str = "commands: c | s | j LINE | b LINE... | vars | stack | set NAME[(I)] VALUE | w | q";

impl ReplCommand {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "" => return Ok(None),
            "c" | "continue" => ReplCommand::Continue,
            "s" | "step" => ReplCommand::Step,
            "j" | "jump" => ReplCommand::Jump(parse_line(rest)?),
            "b" | "break" => ReplCommand::Break(
                rest.split_whitespace()
                    .map(parse_line)
                    .collect::<Result<_, _>>()?,
            ),
            "vars" | "v" => ReplCommand::Vars,
            "stack" | "bt" => ReplCommand::Stack,
            "w" | "wait" => ReplCommand::Wait,
            "q" | "quit" => ReplCommand::Quit,
            "set" => parse_set(rest)?,
            other => return Err(format!("unknown command: {other}\n{HELP}")),
        };
        Ok(Some(command))
    }
}

fn parse_line(text: &str) -> Result<u32, String> {
    text.trim()
        .parse()
        .map_err(|_| format!("invalid line number: {text:?}"))
}

/// `NAME VALUE`, `NAME[I] VALUE` or `NAME(I) VALUE`; the value may
/// contain spaces.
fn parse_set(rest: &str) -> Result<ReplCommand, String> {
    let (target, value) = rest
        .split_once(char::is_whitespace)
        .ok_or_else(|| format!("usage: set NAME VALUE\n{HELP}"))?;

    let (name, index) = match target.find(&['[', '('][..]) {
        Some(open) => {
            let inner = target[open + 1..].trim_end_matches(&[']', ')'][..]);
            let index = inner
                .parse()
                .map_err(|_| format!("invalid index: {inner:?}"))?;
            (&target[..open], Some(index))
        }
        None => (target, None),
    };

    Ok(ReplCommand::Set {
        name: name.to_string(),
        index,
        value: value.trim().to_string(),
    })
}
