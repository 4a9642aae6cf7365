//! [`OsManager`] for Linux and macOS.

use super::{OsManager, Platform};
use crate::commander::{to_args, Commander, RunOptions};
use crate::environment::Environment;
use crate::error::{Error, Result, ResultExt};
use crate::escalator::Escalator;
use crate::filesystem::FileSystem;
use crate::program::{ProgramQuery, VersionParser};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const ETC_SHELLS: &str = "/etc/shells";
const SUDOERS_DIR: &str = "/etc/sudoers.d";
const ETC_PASSWD: &str = "/etc/passwd";

/// Unix implementation of [`OsManager`].
///
/// System file locations default to the real ones and can be redirected for
/// tests with [`with_shells_file`](Self::with_shells_file) and
/// [`with_sudoers_dir`](Self::with_sudoers_dir).
pub struct UnixOsManager {
    commander: Arc<dyn Commander>,
    escalator: Arc<Escalator>,
    programs: Arc<dyn ProgramQuery>,
    fs: Arc<dyn FileSystem>,
    env: Arc<dyn Environment>,
    platform: Platform,
    shells_file: PathBuf,
    sudoers_dir: PathBuf,
    passwd_file: PathBuf,
}

impl UnixOsManager {
    /// Wire an OS manager from its collaborators.
    pub fn new(
        commander: Arc<dyn Commander>,
        escalator: Arc<Escalator>,
        programs: Arc<dyn ProgramQuery>,
        fs: Arc<dyn FileSystem>,
        env: Arc<dyn Environment>,
        platform: Platform,
    ) -> Self {
        Self {
            commander,
            escalator,
            programs,
            fs,
            env,
            platform,
            shells_file: PathBuf::from(ETC_SHELLS),
            sudoers_dir: PathBuf::from(SUDOERS_DIR),
            passwd_file: PathBuf::from(ETC_PASSWD),
        }
    }

    /// Use `path` instead of `/etc/shells`.
    pub fn with_shells_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.shells_file = path.into();
        self
    }

    /// Use `dir` instead of `/etc/sudoers.d`.
    pub fn with_sudoers_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sudoers_dir = dir.into();
        self
    }

    /// The platform this manager targets.
    pub fn platform(&self) -> Platform {
        self.platform
    }

    async fn linux_user_shell(&self, username: &str) -> Result<String> {
        let result = self
            .commander
            .run("getent", &to_args(&["passwd", username]), &RunOptions::new().capture())
            .await;
        if let Ok(result) = result {
            if result.success() {
                if let Some(shell) = passwd_shell(&result.as_string(), username) {
                    return Ok(shell);
                }
            }
        }

        debug!(username, "getent unavailable, reading passwd file");
        let passwd = self.fs.read_to_string(&self.passwd_file)?;
        passwd_shell(&passwd, username).ok_or_else(|| Error::Parse {
            what: "passwd database".to_string(),
            message: format!("no entry for user {}", username),
        })
    }

    async fn macos_user_shell(&self, username: &str) -> Result<String> {
        let record = format!("/Users/{}", username);
        let result = self
            .commander
            .run(
                "dscl",
                &to_args(&[".", "-read", &record, "UserShell"]),
                &RunOptions::new().capture(),
            )
            .await?
            .check("dscl")?;
        dscl_shell(&result.as_string()).ok_or_else(|| Error::Parse {
            what: "dscl output".to_string(),
            message: format!("no UserShell attribute for {}", username),
        })
    }
}

#[async_trait]
impl OsManager for UnixOsManager {
    fn program_exists(&self, name: &str) -> bool {
        self.programs.program_exists(name)
    }

    fn program_path(&self, name: &str) -> Result<PathBuf> {
        self.programs.program_path(name)
    }

    async fn program_version(&self, name: &str, parser: &VersionParser) -> Result<String> {
        self.programs.program_version(name, parser).await
    }

    async fn is_running_as_root(&self) -> Result<bool> {
        self.escalator.is_running_as_root().await
    }

    async fn current_username(&self) -> Result<String> {
        let result = self
            .commander
            .run("id", &to_args(&["-un"]), &RunOptions::new().capture())
            .await;
        match result {
            Ok(result) if result.success() && !result.as_string().is_empty() => {
                return Ok(result.as_string())
            }
            Ok(result) => debug!(exit_code = result.exit_code, "id -un failed"),
            Err(e) => debug!(error = %e, "id -un could not run"),
        }

        ["USER", "LOGNAME"]
            .iter()
            .filter_map(|name| self.env.var(name))
            .find(|value| !value.is_empty())
            .ok_or_else(|| Error::Parse {
                what: "current user".to_string(),
                message: "id -un failed and USER/LOGNAME are unset".to_string(),
            })
    }

    async fn user_shell(&self, username: &str) -> Result<String> {
        validate_username(username)?;
        let shell = match self.platform {
            Platform::Linux => self.linux_user_shell(username).await,
            Platform::MacOs => self.macos_user_shell(username).await,
        };
        shell.with_context(|| format!("failed to read login shell of {}", username))
    }

    async fn set_user_shell(&self, username: &str, shell_path: &str) -> Result<()> {
        validate_username(username)?;
        if shell_path.is_empty() {
            return Err(Error::InvalidInput("shell path must not be empty".to_string()));
        }

        let (command, args) = match self.platform {
            Platform::Linux => ("usermod", to_args(&["-s", shell_path, username])),
            Platform::MacOs => {
                let record = format!("/Users/{}", username);
                ("dscl", to_args(&[".", "-create", &record, "UserShell", shell_path]))
            }
        };

        info!(username, shell = shell_path, "changing login shell");
        self.escalator
            .run_checked(command, &args, &RunOptions::new().capture())
            .await
            .with_context(|| format!("failed to set login shell of {} to {}", username, shell_path))?;
        Ok(())
    }

    async fn add_sudo_access(&self, username: &str) -> Result<()> {
        validate_username(username)?;
        let target = self.sudoers_dir.join(username);
        let entry = format!("{} ALL=(ALL) NOPASSWD:ALL\n", username);

        info!(username, path = %target.display(), "granting passwordless sudo");
        self.escalator
            .run_checked(
                "tee",
                &[target.to_string_lossy().into_owned()],
                &RunOptions::new().capture().input(entry),
            )
            .await
            .with_context(|| format!("failed to grant sudo access to {}", username))?;
        Ok(())
    }

    async fn ensure_shell_in_etc_shells(&self, shell_path: &str) -> Result<()> {
        if shell_path.is_empty() {
            return Err(Error::InvalidInput("shell path must not be empty".to_string()));
        }

        let current = read_if_exists(self.fs.as_ref(), &self.shells_file)?;
        if current.lines().any(|line| line.trim() == shell_path) {
            debug!(shell = shell_path, "already listed in shells file");
            return Ok(());
        }

        info!(shell = shell_path, path = %self.shells_file.display(), "registering shell");
        self.escalator
            .run_checked(
                "tee",
                &["-a".to_string(), self.shells_file.to_string_lossy().into_owned()],
                &RunOptions::new().capture().input(format!("{}\n", shell_path)),
            )
            .await
            .with_context(|| format!("failed to add {} to {}", shell_path, self.shells_file.display()))?;
        Ok(())
    }

    fn getenv(&self, name: &str) -> String {
        self.env.var(name).unwrap_or_default()
    }
}

/// Usernames end up in file paths and command arguments.
fn validate_username(username: &str) -> Result<()> {
    if username.is_empty() {
        return Err(Error::InvalidInput("username must not be empty".to_string()));
    }
    if username.starts_with('-')
        || username
            .chars()
            .any(|c| c == '/' || c == ':' || c.is_whitespace())
    {
        return Err(Error::InvalidInput(format!("invalid username: {:?}", username)));
    }
    Ok(())
}

fn read_if_exists(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    if !fs.exists(path) {
        return Ok(String::new());
    }
    fs.read_to_string(path)
}

/// Shell field (7th) of the passwd line for `username`.
fn passwd_shell(passwd: &str, username: &str) -> Option<String> {
    passwd
        .lines()
        .map(|line| line.split(':').collect::<Vec<_>>())
        .find(|fields| fields.len() >= 7 && fields[0] == username)
        .map(|fields| fields[6].trim().to_string())
        .filter(|shell| !shell.is_empty())
}

/// Value of `UserShell:` in `dscl -read` output.
fn dscl_shell(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|line| line.trim().strip_prefix("UserShell:"))
        .map(|value| value.trim().to_string())
        .filter(|shell| !shell.is_empty())
}
