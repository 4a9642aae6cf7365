//! Bootstrap options configuration.
//!
//! This module provides the [`BootstrapOptions`] struct controlling what
//! `devstrap install` does and how it reports progress. Options are usually
//! read from a TOML file; every field has a default.

use crate::compatibility::CompatibilitySource;
use crate::error::{Error, Result};
use crate::package::DisplayMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for one bootstrap run.
///
/// # Default Behavior
///
/// Progress display, the embedded compatibility matrix, `zsh` made the
/// login shell, GnuPG installed, and a 5 second grace period between
/// SIGTERM and SIGKILL on cancellation.
///
/// # Example
///
/// ```rust
/// use devstrap::{BootstrapOptions, DisplayMode};
///
/// let opts = BootstrapOptions::from_toml(r#"
///     display_mode = "verbose"
///     shell = "fish"
///     install_gpg = false
/// "#).unwrap();
///
/// assert_eq!(opts.display_mode, DisplayMode::Verbose);
/// assert_eq!(opts.shell, "fish");
/// assert!(opts.set_default_shell);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BootstrapOptions {
    /// How backend output is presented.
    ///
    /// Default: `progress`
    pub display_mode: DisplayMode,

    /// Compatibility matrix to use instead of the embedded one.
    pub compatibility_file: Option<PathBuf>,

    /// Shell package and executable to install.
    ///
    /// Default: `zsh`
    pub shell: String,

    /// Whether to install GnuPG.
    ///
    /// Default: `true`
    pub install_gpg: bool,

    /// Whether to make [`shell`](Self::shell) the login shell.
    ///
    /// Default: `true`
    pub set_default_shell: bool,

    /// Seconds a cancelled child gets between SIGTERM and SIGKILL.
    ///
    /// Default: 5
    pub termination_grace_secs: u64,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            display_mode: DisplayMode::Progress,
            compatibility_file: None,
            shell: "zsh".to_string(),
            install_gpg: true,
            set_default_shell: true,
            termination_grace_secs: 5,
        }
    }
}

impl BootstrapOptions {
    /// Parse and validate TOML.
    pub fn from_toml(text: &str) -> Result<Self> {
        let options: Self =
            toml::from_str(text).map_err(|e| Error::Config(format!("options: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    /// Read options from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Reject values that cannot work.
    pub fn validate(&self) -> Result<()> {
        let shell = self.shell.trim();
        if shell.is_empty() {
            return Err(Error::Config("shell must not be empty".to_string()));
        }
        if shell.contains('/') || shell.starts_with('-') || shell.contains(char::is_whitespace) {
            return Err(Error::Config(format!(
                "shell must be a program name, got {:?}",
                self.shell
            )));
        }
        Ok(())
    }

    /// Where to load the compatibility matrix from.
    pub fn compatibility_source(&self) -> CompatibilitySource {
        match &self.compatibility_file {
            Some(path) => CompatibilitySource::File(path.clone()),
            None => CompatibilitySource::Embedded,
        }
    }

    /// Grace period as a [`Duration`].
    pub fn termination_grace(&self) -> Duration {
        Duration::from_secs(self.termination_grace_secs)
    }
}
