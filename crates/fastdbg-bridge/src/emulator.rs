//! Emulator settings that map the `H4:` device onto the build directory.
//!
//! The debug routines compiled into the program open `H4:debug.in`,
//! `H4:debug.out` and `H4:debug.mem`, so the emulator's fourth host
//! drive must point at `bin/` before the program starts.

use std::io;
use std::path::{Path, PathBuf};

use fastdbg_platform::FileAccessor;
use regex::{Captures, Regex};

const ALTIRRA_INI: &str = "Altirra.ini";
const ATARI800_CFG: &str = "atari800.cfg";

/// Portable settings for a first Altirra run: `H4:` on the build
/// directory, writable, and no prompts or pauses that would stall a
/// session.
const ALTIRRA_DEFAULTS: &str = r#"[User\Software\virtualdub.org\Altirra\Settings]
"Display: Direct3D9" = 1
"Display: 3D" = 0
"Startup: Reuse program instance" = 1

[User\Software\virtualdub.org\Altirra\Profiles\00000000]
"Devices" = "[{\"tag\": \"hostfs\",\"params\": {\"readonly\": false,\"path4\": \"{h4}\"}}]"
"Devices: CIO H: patch enabled" = 1
"Pause when inactive" = 0
"Input: Active map names" = "Arrow Keys -> Joystick (port 1)"

[User\Software\virtualdub.org\Altirra\DialogDefaults]
"DiscardMemory" = "ok"
"#;

const ATARI800_SETTINGS: &str = "Atari 800 Emulator, Version 5.2.0
H4_DIR={h4}
HD_READ_ONLY=0
";

/// Emulators whose settings can be written for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmulatorKind {
    /// Reads `Altirra.ini` next to its executable in portable mode.
    Altirra,
    /// Reads the file passed with `-config`.
    Atari800,
    Other,
}

impl EmulatorKind {
    /// Tell the emulator apart by its executable name.
    pub fn detect(path: &Path) -> Self {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if stem.starts_with("altirra") {
            EmulatorKind::Altirra
        } else if stem.starts_with("atari800") {
            EmulatorKind::Atari800
        } else {
            EmulatorKind::Other
        }
    }
}

/// Writes or updates emulator settings for one build directory.
#[derive(Debug)]
pub struct SettingsWriter {
    path4: Regex,
}

impl Default for SettingsWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsWriter {
    pub fn new() -> Self {
        Self {
            path4: Regex::new(r#"(?mi)(^\s*"Devices".*?\\"path4\\":\s*\\")([^"]*?)(\\")"#)
                .expect("path4 regex is valid"),
        }
    }

    /// Point `H4:` of `emulator` at `bin_dir`.
    ///
    /// Returns the settings file written, or `None` when the emulator is
    /// not one we know or its settings cannot be located.
    pub fn prepare<F: FileAccessor>(
        &self,
        files: &F,
        emulator: &Path,
        bin_dir: &Path,
    ) -> io::Result<Option<PathBuf>> {
        let h4 = host_dir(bin_dir);
        match EmulatorKind::detect(emulator) {
            EmulatorKind::Altirra => {
                let Some(dir) = emulator.parent().filter(|d| !d.as_os_str().is_empty()) else {
                    tracing::warn!(
                        emulator = %emulator.display(),
                        "emulator path has no directory, cannot locate {ALTIRRA_INI}; H4: is not mapped"
                    );
                    return Ok(None);
                };
                let ini = dir.join(ALTIRRA_INI);
                let text = if files.exists(&ini) {
                    let existing = String::from_utf8_lossy(&files.read_file(&ini)?).into_owned();
                    self.update_altirra(&existing, &h4)
                } else {
                    tracing::info!(settings = %ini.display(), "creating emulator settings");
                    ALTIRRA_DEFAULTS.replace("{h4}", &h4)
                };
                files.write_file(&ini, text.as_bytes())?;
                Ok(Some(ini))
            }
            EmulatorKind::Atari800 => {
                let cfg = bin_dir.join(ATARI800_CFG);
                files.write_file(&cfg, ATARI800_SETTINGS.replace("{h4}", &h4).as_bytes())?;
                Ok(Some(cfg))
            }
            EmulatorKind::Other => {
                tracing::debug!(emulator = %emulator.display(), "no settings to write");
                Ok(None)
            }
        }
    }

    fn update_altirra(&self, existing: &str, h4: &str) -> String {
        if !self.path4.is_match(existing) {
            tracing::warn!("{ALTIRRA_INI} has no host device entry; H4: is not mapped");
            return existing.to_string();
        }
        self.path4
            .replace_all(existing, |caps: &Captures| {
                format!("{}{h4}{}", &caps[1], &caps[3])
            })
            .into_owned()
    }
}

/// The build directory as emulators expect it: forward slashes and a
/// trailing separator.
fn host_dir(bin_dir: &Path) -> String {
    let mut dir = bin_dir.to_string_lossy().replace('\\', "/");
    if !dir.ends_with('/') {
        dir.push('/');
    }
    dir
}
