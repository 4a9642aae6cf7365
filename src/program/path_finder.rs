//! PATH-based executable lookup with fallback locations.

use crate::filesystem::{FileSystem, LocalFileSystem};
use std::path::{Path, PathBuf};

/// System locations checked when an executable is not on PATH.
const FALLBACK_DIRS: &[&str] = &[
    "/usr/local/bin",
    "/usr/bin",
    "/usr/sbin",
    "/opt/homebrew/bin",
    "/home/linuxbrew/.linuxbrew/bin",
];

/// Find an executable by name.
///
/// PATH is searched first via the `which` crate. If that fails, common
/// system directories and then `<home>/.local/bin` and `<home>/bin` are
/// checked. Fallback hits must carry an execute bit.
pub(crate) fn find_executable(name: &str, home: Option<&Path>) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }

    if let Ok(path) = which::which(name) {
        return Some(path);
    }

    // Absolute or relative paths that `which` rejected are not worth retrying.
    if name.contains('/') {
        return None;
    }

    for dir in FALLBACK_DIRS {
        let path = Path::new(dir).join(name);
        if LocalFileSystem.is_executable(&path) {
            return Some(path);
        }
    }

    if let Some(home) = home {
        for sub in [".local/bin", "bin"] {
            let path = home.join(sub).join(name);
            if LocalFileSystem.is_executable(&path) {
                return Some(path);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_common_executable() {
        // sh exists on every Unix system
        let result = find_executable("sh", None);
        assert!(result.is_some());
        assert!(result.unwrap().exists());
    }

    #[test]
    fn test_find_nonexistent_executable() {
        let result = find_executable("definitely_not_a_real_executable_12345", None);
        assert!(result.is_none());
    }

    #[test]
    fn test_empty_name() {
        assert!(find_executable("", None).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_home_fallback() {
        use std::os::unix::fs::PermissionsExt;

        let home = tempfile::tempdir().unwrap();
        let bin = home.path().join(".local/bin");
        std::fs::create_dir_all(&bin).unwrap();
        let tool = bin.join("devstrap_home_only_tool_xyz");
        std::fs::write(&tool, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

        let found = find_executable("devstrap_home_only_tool_xyz", Some(home.path()));
        assert_eq!(found, Some(tool));
    }

    #[cfg(unix)]
    #[test]
    fn test_home_fallback_skips_non_executable_files() {
        let home = tempfile::tempdir().unwrap();
        let bin = home.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::write(bin.join("devstrap_plain_file_xyz"), "not a program\n").unwrap();

        assert_eq!(find_executable("devstrap_plain_file_xyz", Some(home.path())), None);
    }
}
