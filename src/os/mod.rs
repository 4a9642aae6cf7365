//! Platform-specific system operations.
//!
//! [`OsManager`] bundles the user- and system-level operations installers
//! need: program lookup, user shell records, sudoers grants and
//! `/etc/shells` maintenance. [`UnixOsManager`] implements it for Linux and
//! macOS. Every operation that changes system-wide state goes through the
//! [`Escalator`](crate::Escalator), and file contents are fed through stdin
//! rather than shell redirection.

mod unix;

pub use unix::UnixOsManager;

use crate::error::Result;
use crate::program::VersionParser;
use async_trait::async_trait;
use std::path::PathBuf;

/// Which Unix flavour the host is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Platform {
    /// Linux, user records managed with `usermod`/`getent`.
    Linux,
    /// macOS, user records managed with `dscl`.
    MacOs,
}

impl Platform {
    /// The platform this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Linux
        }
    }
}

/// Host operations used by installers.
#[async_trait]
pub trait OsManager: Send + Sync {
    /// Whether `name` is on PATH (or a known fallback location).
    fn program_exists(&self, name: &str) -> bool;

    /// Full path of `name`.
    fn program_path(&self, name: &str) -> Result<PathBuf>;

    /// Version of `name`, extracted from its `--version` output by `parser`.
    async fn program_version(&self, name: &str, parser: &VersionParser) -> Result<String>;

    /// Whether the current process runs as root.
    async fn is_running_as_root(&self) -> Result<bool>;

    /// Login name of the current user.
    async fn current_username(&self) -> Result<String>;

    /// Login shell recorded for `username`.
    async fn user_shell(&self, username: &str) -> Result<String>;

    /// Change the login shell of `username` to `shell_path`.
    async fn set_user_shell(&self, username: &str, shell_path: &str) -> Result<()>;

    /// Grant `username` passwordless sudo via `/etc/sudoers.d/<username>`.
    async fn add_sudo_access(&self, username: &str) -> Result<()>;

    /// Append `shell_path` to `/etc/shells` unless a line already equals it.
    async fn ensure_shell_in_etc_shells(&self, shell_path: &str) -> Result<()>;

    /// Value of environment variable `name`, empty if unset.
    fn getenv(&self, name: &str) -> String;
}
