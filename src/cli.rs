//! Command-line arguments.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

pub const USAGE: &str = "usage: fastdbg <source> [--break LINE]... [--config-dir DIR] [--no-debug]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub source: PathBuf,
    pub breakpoints: Vec<u32>,
    pub config_dir: Option<PathBuf>,
    pub no_debug: bool,
}

impl CliArgs {
    /// Parse arguments, not including the program name.
    pub fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let mut source = None;
        let mut breakpoints = Vec::new();
        let mut config_dir = None;
        let mut no_debug = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--break" | "-b" => {
                    let value = args.next().context("--break needs a line number")?;
                    let line = value
                        .parse()
                        .with_context(|| format!("invalid line number: {value}"))?;
                    breakpoints.push(line);
                }
                "--config-dir" => {
                    let dir = args.next().context("--config-dir needs a directory")?;
                    config_dir = Some(PathBuf::from(dir));
                }
                "--no-debug" => no_debug = true,
                flag if flag.starts_with('-') => bail!("unknown option: {flag}\n{USAGE}"),
                _ if source.is_some() => bail!("more than one source given\n{USAGE}"),
                _ => source = Some(PathBuf::from(arg)),
            }
        }

        Ok(Self {
            source: source.context(USAGE)?,
            breakpoints,
            config_dir,
            no_debug,
        })
    }
}
