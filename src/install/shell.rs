//! Login shells: installation and making one the user's default.

use super::ToolInstaller;
use crate::error::{Error, Result};
use crate::filesystem::FileSystem;
use crate::os::OsManager;
use crate::package::{PackageManager, RequestedPackageInfo};
use crate::program::ProgramQuery;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Installs a shell package such as `zsh` or `fish`.
pub struct ShellInstaller {
    shell: String,
    programs: Arc<dyn ProgramQuery>,
}

impl ShellInstaller {
    /// Installer for `shell`, whose package and executable share the name.
    pub fn new(shell: impl Into<String>, programs: Arc<dyn ProgramQuery>) -> Self {
        Self {
            shell: shell.into(),
            programs,
        }
    }
}

#[async_trait]
impl ToolInstaller for ShellInstaller {
    fn name(&self) -> &str {
        &self.shell
    }

    async fn is_available(&self) -> bool {
        self.programs.program_exists(&self.shell)
    }

    async fn install(&self, packages: &dyn PackageManager) -> Result<()> {
        packages.install(&RequestedPackageInfo::new(&self.shell)).await
    }
}

/// Homebrew prefix from the path of the `brew` executable
/// (`/opt/homebrew/bin/brew` -> `/opt/homebrew`).
pub fn brew_prefix_from(brew_path: &Path) -> Option<PathBuf> {
    brew_path.parent()?.parent().map(Path::to_path_buf)
}

/// Makes a shell the current user's login shell.
///
/// Shells installed by Homebrew live outside the system directories, so
/// they must be registered in `/etc/shells` before `chsh`-style tools
/// accept them.
pub struct ShellChanger {
    shell: String,
    os: Arc<dyn OsManager>,
    fs: Arc<dyn FileSystem>,
    brew_prefix: Option<PathBuf>,
}

impl ShellChanger {
    /// Changer for `shell` (an executable name such as `zsh`).
    pub fn new(shell: impl Into<String>, os: Arc<dyn OsManager>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            shell: shell.into(),
            os,
            fs,
            brew_prefix: None,
        }
    }

    /// Also look under `<prefix>/bin` and treat shells there as Homebrew's.
    pub fn with_brew_prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.brew_prefix = Some(prefix.into());
        self
    }

    /// Absolute path of the shell: PATH first, then the Homebrew bin dir.
    pub fn get_shell_path(&self) -> Result<String> {
        if let Ok(path) = self.os.program_path(&self.shell) {
            return Ok(path.to_string_lossy().into_owned());
        }
        if let Some(prefix) = &self.brew_prefix {
            let candidate = prefix.join("bin").join(&self.shell);
            if self.fs.is_executable(&candidate) {
                return Ok(candidate.to_string_lossy().into_owned());
            }
        }
        Err(Error::MissingProgram {
            name: self.shell.clone(),
        })
    }

    fn is_brew_shell(&self, shell_path: &str) -> bool {
        self.brew_prefix
            .as_deref()
            .is_some_and(|prefix| Path::new(shell_path).starts_with(prefix))
    }

    /// Whether the user's login shell already is this shell.
    pub async fn is_current_default(&self) -> Result<bool> {
        let shell_path = self.get_shell_path()?;
        let user = self.os.current_username().await?;
        let current = self.os.user_shell(&user).await?;
        Ok(current == shell_path)
    }

    /// Make this shell the user's login shell.
    ///
    /// No-op if it already is. Homebrew shells are first added to
    /// `/etc/shells`.
    pub async fn set_as_default(&self) -> Result<()> {
        let shell_path = self.get_shell_path()?;
        let user = self.os.current_username().await?;
        let current = self.os.user_shell(&user).await?;
        if current == shell_path {
            debug!(user = %user, shell = %shell_path, "already the login shell");
            return Ok(());
        }

        match self.os.is_running_as_root().await {
            Ok(true) => warn!(
                user = %user,
                shell = %shell_path,
                "running as root, changing root's login shell"
            ),
            Ok(false) => {}
            Err(e) => debug!(error = %e, "could not check for root"),
        }

        if self.is_brew_shell(&shell_path) {
            self.os.ensure_shell_in_etc_shells(&shell_path).await?;
        }

        info!(user = %user, from = %current, to = %shell_path, "setting login shell");
        self.os.set_user_shell(&user, &shell_path).await
    }
}
