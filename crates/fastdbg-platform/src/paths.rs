use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PlatformError;

/// Source extensions the compiler accepts.
pub const DEBUGGABLE_EXTENSIONS: &[&str] = &["bas", "lst", "fb"];

const BIN_DIR: &str = "bin";

/// Path spelling of the host the target's files live on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathStyle {
    Posix,
    /// Backslash separators; case-insensitive.
    Windows,
}

impl PathStyle {
    /// The style of the machine this binary was built for.
    pub fn native() -> Self {
        if cfg!(windows) {
            PathStyle::Windows
        } else {
            PathStyle::Posix
        }
    }

    /// Canonical spelling of `path`, used to compare source paths.
    pub fn normalize(self, path: &str) -> String {
        match self {
            PathStyle::Windows => path.replace('/', "\\").to_lowercase(),
            PathStyle::Posix => path.replace('\\', "/"),
        }
    }
}

impl Default for PathStyle {
    fn default() -> Self {
        Self::native()
    }
}

/// `true` when `path` has an extension the compiler accepts.
pub fn is_debuggable(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            DEBUGGABLE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

/// Every file a debug build of one source reads or writes.
///
/// All of them live in a `bin` directory next to the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub source: PathBuf,
    pub bin_dir: PathBuf,
    /// Instrumented copy handed to the compiler.
    pub working_copy: PathBuf,
    pub listing: PathBuf,
    pub labels: PathBuf,
    pub executable: PathBuf,
    /// Host → target messages.
    pub to_target: PathBuf,
    /// Target → host reports.
    pub from_target: PathBuf,
    /// Which memory the target reports on each stop.
    pub dump_request: PathBuf,
    stem: String,
}

impl ArtifactPaths {
    /// Derive the artifact paths of `source`.
    ///
    /// The stem is the file name up to its first `.`, so `game.v2.bas`
    /// compiles to `game.xex`.
    pub fn for_source(source: &Path) -> Result<Self, PlatformError> {
        let file_name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| PlatformError::Path(format!("no file name in {}", source.display())))?;
        let stem = file_name.split('.').next().unwrap_or(file_name).to_string();
        let bin_dir = source
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(BIN_DIR);

        Ok(Self {
            source: source.to_path_buf(),
            working_copy: bin_dir.join(file_name),
            listing: bin_dir.join(format!("{stem}.lst")),
            labels: bin_dir.join(format!("{stem}.lbl")),
            executable: bin_dir.join(format!("{stem}.xex")),
            to_target: bin_dir.join("debug.in"),
            from_target: bin_dir.join("debug.out"),
            dump_request: bin_dir.join("debug.mem"),
            bin_dir,
            stem,
        })
    }

    /// File name of the working copy, as passed to the compiler.
    pub fn working_file_name(&self) -> String {
        self.working_copy
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// `true` for build outputs of this source, i.e. files named
    /// `<stem>.<anything>`.
    pub fn is_build_output(&self, file_name: &str) -> bool {
        file_name
            .strip_prefix(self.stem.as_str())
            .is_some_and(|rest| rest.starts_with('.'))
    }
}

/// Standard directories for the application.
pub trait PlatformPaths: Send + Sync {
    /// `~/.config/fastdbg`
    fn config_dir(&self) -> PathBuf;
    /// `~/.local/share/fastdbg`
    fn data_dir(&self) -> PathBuf;
    /// `<data_dir>/logs`
    fn log_dir(&self) -> PathBuf;
}

/// [`PlatformPaths`] rooted at the user's home directory.
pub struct DefaultPaths {
    home: PathBuf,
}

impl DefaultPaths {
    /// Resolve the home directory.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Path` if the home directory cannot be
    /// determined.
    pub fn new() -> Result<Self, PlatformError> {
        let home = dirs::home_dir()
            .or_else(|| std::env::var_os("HOME").map(PathBuf::from))
            .ok_or_else(|| PlatformError::Path("could not determine home directory".into()))?;
        Ok(Self { home })
    }

    /// Paths rooted at an explicit directory.
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }
}

impl PlatformPaths for DefaultPaths {
    fn config_dir(&self) -> PathBuf {
        self.home.join(".config").join("fastdbg")
    }

    fn data_dir(&self) -> PathBuf {
        self.home.join(".local").join("share").join("fastdbg")
    }

    fn log_dir(&self) -> PathBuf {
        self.data_dir().join("logs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_style_normalizes_separators_and_case() {
        assert_eq!(
            PathStyle::Windows.normalize("C:/Games/Demo.BAS"),
            "c:\\games\\demo.bas"
        );
    }

    #[test]
    fn posix_style_keeps_case() {
        assert_eq!(
            PathStyle::Posix.normalize("/home/u\\Demo.bas"),
            "/home/u/Demo.bas"
        );
    }

    #[test]
    fn path_style_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Holder {
            style: PathStyle,
        }
        let h: Holder = toml::from_str("style = \"windows\"").unwrap();
        assert_eq!(h.style, PathStyle::Windows);
        assert!(toml::from_str::<Holder>("style = \"Windows\"").is_err());
    }

    #[test]
    fn artifacts_live_in_bin_next_to_source() {
        let paths = ArtifactPaths::for_source(Path::new("/work/game.v2.bas")).unwrap();
        assert_eq!(paths.bin_dir, PathBuf::from("/work/bin"));
        assert_eq!(paths.working_copy, PathBuf::from("/work/bin/game.v2.bas"));
        assert_eq!(paths.listing, PathBuf::from("/work/bin/game.lst"));
        assert_eq!(paths.labels, PathBuf::from("/work/bin/game.lbl"));
        assert_eq!(paths.executable, PathBuf::from("/work/bin/game.xex"));
        assert_eq!(paths.to_target, PathBuf::from("/work/bin/debug.in"));
        assert_eq!(paths.from_target, PathBuf::from("/work/bin/debug.out"));
        assert_eq!(paths.dump_request, PathBuf::from("/work/bin/debug.mem"));
        assert_eq!(paths.working_file_name(), "game.v2.bas");
    }

    #[test]
    fn build_outputs_match_stem_and_dot() {
        let paths = ArtifactPaths::for_source(Path::new("/work/game.bas")).unwrap();
        assert!(paths.is_build_output("game.xex"));
        assert!(paths.is_build_output("game.bas"));
        assert!(!paths.is_build_output("gamer.xex"));
        assert!(!paths.is_build_output("debug.in"));
    }

    #[test]
    fn source_without_file_name_is_rejected() {
        assert!(ArtifactPaths::for_source(Path::new("/")).is_err());
    }

    #[test]
    fn debuggable_extensions() {
        assert!(is_debuggable(Path::new("a.bas")));
        assert!(is_debuggable(Path::new("a.FB")));
        assert!(is_debuggable(Path::new("a.lst")));
        assert!(!is_debuggable(Path::new("launch.json")));
        assert!(!is_debuggable(Path::new("noext")));
    }

    #[test]
    fn default_paths_use_app_name() {
        let paths = DefaultPaths::with_home("/home/u");
        assert_eq!(paths.config_dir(), PathBuf::from("/home/u/.config/fastdbg"));
        assert!(paths.log_dir().starts_with(paths.data_dir()));
    }

    #[test]
    fn default_paths_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DefaultPaths>();
    }
}
