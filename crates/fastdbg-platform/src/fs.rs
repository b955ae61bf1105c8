//! File access for the debug channel.
//!
//! The target and the host only share a directory, so every exchange
//! is a file appearing or disappearing. [`FileAccessor`] abstracts the
//! directory; [`wait_until_exists`] and [`wait_until_absent`] poll it.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::{sleep, Instant};

/// Whole-file operations on the shared directory.
///
/// Writes are expected to become visible all at once.
pub trait FileAccessor: Send + Sync {
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;
    fn write_file(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
    /// Remove a file. A file that is already gone is not an error.
    fn delete_file(&self, path: &Path) -> io::Result<()>;
    fn exists(&self, path: &Path) -> bool;
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;
    /// Names of the files directly inside `dir`.
    fn list_dir(&self, dir: &Path) -> io::Result<Vec<String>>;
}

impl<T: FileAccessor + ?Sized> FileAccessor for Arc<T> {
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        (**self).read_file(path)
    }

    fn write_file(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        (**self).write_file(path, contents)
    }

    fn delete_file(&self, path: &Path) -> io::Result<()> {
        (**self).delete_file(path)
    }

    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        (**self).create_dir_all(path)
    }

    fn list_dir(&self, dir: &Path) -> io::Result<Vec<String>> {
        (**self).list_dir(dir)
    }
}

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskFiles;

impl FileAccessor for DiskFiles {
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn write_file(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        std::fs::write(path, contents)
    }

    fn delete_file(&self, path: &Path) -> io::Result<()> {
        match std::fs::remove_file(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn list_dir(&self, dir: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }
}

/// In-memory files for testing purposes.
#[derive(Debug, Default)]
pub struct MemoryFiles {
    files: Mutex<BTreeMap<PathBuf, Vec<u8>>>,
}

impl MemoryFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style seeding of one file.
    pub fn with_file(self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        if let Ok(mut files) = self.files.lock() {
            files.insert(path.into(), contents.into());
        }
        self
    }

    fn lock(&self) -> io::Result<MutexGuard<'_, BTreeMap<PathBuf, Vec<u8>>>> {
        self.files
            .lock()
            .map_err(|e| io::Error::other(format!("mutex poisoned: {e}")))
    }
}

impl FileAccessor for MemoryFiles {
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.lock()?.get(path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{} not found", path.display()))
        })
    }

    fn write_file(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        self.lock()?.insert(path.to_path_buf(), contents.to_vec());
        Ok(())
    }

    fn delete_file(&self, path: &Path) -> io::Result<()> {
        self.lock()?.remove(path);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock().is_ok_and(|files| files.contains_key(path))
    }

    fn create_dir_all(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }

    fn list_dir(&self, dir: &Path) -> io::Result<Vec<String>> {
        Ok(self
            .lock()?
            .keys()
            .filter(|path| path.parent() == Some(dir))
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect())
    }
}

/// Poll until `path` exists. Returns `false` if `timeout` elapses first;
/// `None` waits forever.
pub async fn wait_until_exists<F: FileAccessor + ?Sized>(
    files: &F,
    path: &Path,
    poll: Duration,
    timeout: Option<Duration>,
) -> bool {
    wait_for(files, path, true, poll, timeout).await
}

/// Poll until `path` no longer exists. Returns `false` if `timeout`
/// elapses first; `None` waits forever.
pub async fn wait_until_absent<F: FileAccessor + ?Sized>(
    files: &F,
    path: &Path,
    poll: Duration,
    timeout: Option<Duration>,
) -> bool {
    wait_for(files, path, false, poll, timeout).await
}

async fn wait_for<F: FileAccessor + ?Sized>(
    files: &F,
    path: &Path,
    present: bool,
    poll: Duration,
    timeout: Option<Duration>,
) -> bool {
    let deadline = timeout.map(|t| Instant::now() + t);
    loop {
        if files.exists(path) == present {
            return true;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            tracing::debug!(path = %path.display(), present, "wait timed out");
            return false;
        }
        sleep(poll).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const POLL: Duration = Duration::from_millis(25);

    #[test]
    fn memory_files_write_read_delete() {
        let files = MemoryFiles::new();
        let path = Path::new("/p/bin/debug.in");
        files.write_file(path, b"abc").unwrap();
        assert!(files.exists(path));
        assert_eq!(files.read_file(path).unwrap(), b"abc");
        files.delete_file(path).unwrap();
        assert!(!files.exists(path));
        assert_eq!(
            files.read_file(path).unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
        // Deleting again is fine.
        files.delete_file(path).unwrap();
    }

    #[test]
    fn memory_files_list_only_direct_children() {
        let files = MemoryFiles::new()
            .with_file("/p/bin/a.lst", "")
            .with_file("/p/bin/a.lbl", "")
            .with_file("/p/a.bas", "");
        let mut names = files.list_dir(Path::new("/p/bin")).unwrap();
        names.sort();
        assert_eq!(names, vec!["a.lbl", "a.lst"]);
    }

    #[test]
    fn disk_files_round_trip() {
        let tmp = TempDir::new().unwrap();
        let files = DiskFiles;
        let dir = tmp.path().join("bin");
        files.create_dir_all(&dir).unwrap();
        let path = dir.join("debug.out");
        files.write_file(&path, &[1, 2, 3]).unwrap();
        assert_eq!(files.read_file(&path).unwrap(), vec![1, 2, 3]);
        assert_eq!(files.list_dir(&dir).unwrap(), vec!["debug.out"]);
        files.delete_file(&path).unwrap();
        files.delete_file(&path).unwrap();
        assert!(!files.exists(&path));
    }

    #[test]
    fn arc_forwards_to_inner() {
        let files = Arc::new(MemoryFiles::new());
        files.write_file(Path::new("x"), b"1").unwrap();
        assert!(FileAccessor::exists(&files, Path::new("x")));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_returns_immediately_when_satisfied() {
        let files = MemoryFiles::new().with_file("f", "");
        assert!(wait_until_exists(&files, Path::new("f"), POLL, Some(Duration::ZERO)).await);
        assert!(wait_until_absent(&files, Path::new("g"), POLL, Some(Duration::ZERO)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_times_out() {
        let files = MemoryFiles::new();
        let start = Instant::now();
        let found = wait_until_exists(&files, Path::new("f"), POLL, Some(Duration::from_secs(1))).await;
        assert!(!found);
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_sees_file_written_later() {
        let files = Arc::new(MemoryFiles::new());
        let writer = Arc::clone(&files);
        tokio::spawn(async move {
            sleep(Duration::from_millis(200)).await;
            writer.write_file(Path::new("f"), b"").unwrap();
        });
        assert!(wait_until_exists(&*files, Path::new("f"), POLL, None).await);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_sees_file_removed_later() {
        let files = Arc::new(MemoryFiles::new().with_file("f", ""));
        let remover = Arc::clone(&files);
        tokio::spawn(async move {
            sleep(Duration::from_millis(200)).await;
            remover.delete_file(Path::new("f")).unwrap();
        });
        assert!(wait_until_absent(&files, Path::new("f"), POLL, Some(Duration::from_secs(5))).await);
    }
}
