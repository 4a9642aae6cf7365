//! Filesystem façade.
//!
//! System files such as `/etc/shells` are only ever written through
//! escalated `tee` invocations. Writes here run with the caller's own
//! privileges and are meant for user-owned files and scratch files.

use crate::error::{Error, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> Error + '_ {
    move |source| Error::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Filesystem operations used by the core.
pub trait FileSystem: Send + Sync {
    /// Whether `path` exists.
    fn exists(&self, path: &Path) -> bool;

    /// Whether `path` is a regular file with an execute bit set.
    fn is_executable(&self, path: &Path) -> bool;

    /// Read `path` as UTF-8.
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Create or truncate `path` and write `contents`.
    fn write(&self, path: &Path, contents: &str) -> Result<()>;

    /// Append `contents` to `path`, creating it if needed.
    fn append(&self, path: &Path, contents: &str) -> Result<()>;

    /// Delete the file at `path`.
    fn remove_file(&self, path: &Path) -> Result<()>;

    /// Create a uniquely named temporary file holding `contents`.
    ///
    /// # Arguments
    ///
    /// - `prefix`: Leading part of the file name, e.g. `"devstrap-"`
    /// - `contents`: Initial file contents
    ///
    /// # Returns
    ///
    /// The path of the new file. It outlives this call; the caller removes
    /// it with [`FileSystem::remove_file`] when done.
    fn create_temp_file(&self, prefix: &str, contents: &str) -> Result<PathBuf>;
}

/// [`FileSystem`] over the real host filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl FileSystem for LocalFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_executable(&self, path: &Path) -> bool {
        let Ok(meta) = std::fs::metadata(path) else {
            return false;
        };
        if !meta.is_file() {
            return false;
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            meta.permissions().mode() & 0o111 != 0
        }
        #[cfg(not(unix))]
        {
            true
        }
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).map_err(io_error(path))
    }

    fn write(&self, path: &Path, contents: &str) -> Result<()> {
        std::fs::write(path, contents).map_err(io_error(path))
    }

    fn append(&self, path: &Path, contents: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_error(path))?;
        file.write_all(contents.as_bytes()).map_err(io_error(path))
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        std::fs::remove_file(path).map_err(io_error(path))
    }

    fn create_temp_file(&self, prefix: &str, contents: &str) -> Result<PathBuf> {
        let dir = std::env::temp_dir();
        let mut file = tempfile::Builder::new()
            .prefix(prefix)
            .tempfile()
            .map_err(io_error(&dir))?;
        file.write_all(contents.as_bytes())
            .map_err(io_error(file.path()))?;
        let path = file.path().to_path_buf();
        file.into_temp_path()
            .keep()
            .map_err(|e| Error::Io { path, source: e.error })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_and_exists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shells");
        std::fs::write(&path, "/bin/sh\n").unwrap();

        let fs = LocalFileSystem;
        assert!(fs.exists(&path));
        assert_eq!(fs.read_to_string(&path).unwrap(), "/bin/sh\n");
    }

    #[test]
    fn test_read_missing_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = LocalFileSystem.read_to_string(&dir.path().join("nope"));
        assert!(matches!(result, Err(Error::Io { .. })));
    }

    #[test]
    fn test_write_append_remove() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile");
        let fs = LocalFileSystem;

        fs.append(&path, "a\n").unwrap();
        fs.append(&path, "b\n").unwrap();
        assert_eq!(fs.read_to_string(&path).unwrap(), "a\nb\n");

        fs.write(&path, "c\n").unwrap();
        assert_eq!(fs.read_to_string(&path).unwrap(), "c\n");

        fs.remove_file(&path).unwrap();
        assert!(!fs.exists(&path));
        assert!(matches!(fs.remove_file(&path), Err(Error::Io { .. })));
    }

    #[test]
    fn test_create_temp_file_persists_until_removed() {
        let fs = LocalFileSystem;
        let first = fs.create_temp_file("devstrap-test-", "payload").unwrap();
        let second = fs.create_temp_file("devstrap-test-", "").unwrap();

        assert_ne!(first, second);
        assert!(first
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("devstrap-test-"));
        assert_eq!(fs.read_to_string(&first).unwrap(), "payload");

        fs.remove_file(&first).unwrap();
        fs.remove_file(&second).unwrap();
        assert!(!fs.exists(&first));
    }

    #[cfg(unix)]
    #[test]
    fn test_is_executable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("tool");
        std::fs::write(&script, "#!/bin/sh\n").unwrap();
        assert!(!LocalFileSystem.is_executable(&script));

        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert!(LocalFileSystem.is_executable(&script));
        assert!(!LocalFileSystem.is_executable(dir.path()));
    }
}
