//! Package manager backends.
//!
//! Every backend implements [`PackageManager`], hiding its command syntax and
//! output format behind one install/uninstall/query contract:
//!
//! - [`AptPackageManager`]: Debian family (`apt`, `dpkg-query`)
//! - [`DnfPackageManager`]: Fedora/RHEL family (`dnf`, including groups)
//! - [`BrewPackageManager`]: Homebrew on macOS (never escalated)
//! - [`PacmanPackageManager`]: Arch family (`pacman`)
//!
//! [`Backend`] is a tagged enum over all of them, chosen per host with
//! [`PackageManagerKind::for_system`].

mod apt;
mod backend;
mod brew;
mod dnf;
mod pacman;

pub use apt::AptPackageManager;
pub use backend::{Backend, PackageManagerKind};
pub use brew::BrewPackageManager;
pub use dnf::DnfPackageManager;
pub use pacman::PacmanPackageManager;

use crate::commander::{Commander, RunOptions};
use crate::error::{Error, Result};
use crate::escalator::Escalator;
use crate::program::ProgramQuery;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::warn;

/// Package type for DNF groups.
pub const GROUP_TYPE: &str = "group";

/// How backends present their own child-process output.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DisplayMode {
    /// Silence backend output; progress is shown by the caller.
    #[default]
    Progress,
    /// Stream backend output through to the terminal.
    Verbose,
}

impl DisplayMode {
    /// Whether install/uninstall output should be discarded.
    pub fn should_discard_output(&self) -> bool {
        matches!(self, Self::Progress)
    }

    /// Options for mutating backend invocations under this mode.
    pub fn run_options(&self) -> RunOptions {
        if self.should_discard_output() {
            RunOptions::new().discard()
        } else {
            RunOptions::new().stream()
        }
    }
}

/// An installed package.
///
/// Identity is `(name, package_type)`: two entries with different versions
/// compare equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageInfo {
    /// Package name as the backend knows it.
    pub name: String,
    /// Installed version string, verbatim from the backend.
    pub version: String,
    /// Backend-specific category, e.g. `"group"` for DNF.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub package_type: Option<String>,
}

impl PackageInfo {
    /// A plain package.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            package_type: None,
        }
    }

    /// A DNF group.
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: String::new(),
            package_type: Some(GROUP_TYPE.to_string()),
        }
    }

    /// Whether this is a DNF group.
    pub fn is_group(&self) -> bool {
        self.package_type.as_deref() == Some(GROUP_TYPE)
    }
}

impl PartialEq for PackageInfo {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.package_type == other.package_type
    }
}

impl Eq for PackageInfo {}

impl Hash for PackageInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.package_type.hash(state);
    }
}

/// A package to install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedPackageInfo {
    /// Package name.
    pub name: String,
    /// Optional semver constraint expression such as `>=2.2.0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_constraints: Option<String>,
    /// Backend-specific category, e.g. `"group"` for DNF.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub package_type: Option<String>,
}

impl RequestedPackageInfo {
    /// Request the latest version of `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version_constraints: None,
            package_type: None,
        }
    }

    /// Request a DNF group.
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            package_type: Some(GROUP_TYPE.to_string()),
            ..Self::new(name)
        }
    }

    /// Attach a version constraint.
    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.version_constraints = Some(constraint.into());
        self
    }

    /// Whether this requests a DNF group.
    pub fn is_group(&self) -> bool {
        self.package_type.as_deref() == Some(GROUP_TYPE)
    }
}

/// Name and version of a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageManagerInfo {
    /// Backend tool name (e.g. `apt`).
    pub name: String,
    /// Backend tool version.
    pub version: String,
}

/// Uniform contract over package backends.
#[async_trait]
pub trait PackageManager: Send + Sync {
    /// Backend name and version.
    async fn info(&self) -> Result<PackageManagerInfo>;

    /// Install `package`. Constraints the backend cannot honour are ignored with a warning.
    ///
    /// # Arguments
    ///
    /// - `package`: Name, optional version constraint and optional type
    ///   (`"group"` selects DNF group commands)
    ///
    /// # Returns
    ///
    /// - `Ok(())` once the backend exited 0
    /// - `Err(Error::InvalidInput)` for a name the backend would misread
    /// - `Err(Error::Context)` prefixed `failed to install package <name>`
    ///   wrapping the escalation or exit failure
    async fn install(&self, package: &RequestedPackageInfo) -> Result<()>;

    /// Remove `package`.
    async fn uninstall(&self, package: &PackageInfo) -> Result<()>;

    /// Every installed package, in backend order.
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<PackageInfo>)` parsed from the backend's listing; lines
    ///   that do not parse are skipped
    /// - `Err` if the listing command fails
    async fn list_installed(&self) -> Result<Vec<PackageInfo>>;

    /// Whether a package with the same name is installed.
    async fn is_installed(&self, package: &PackageInfo) -> Result<bool> {
        Ok(self
            .list_installed()
            .await?
            .iter()
            .any(|p| p.name == package.name))
    }

    /// Installed version of `name`.
    ///
    /// # Returns
    ///
    /// - `Ok(version)` of the first listed package named `name`
    /// - `Err(Error::PackageNotInstalled)` if none is listed
    async fn package_version(&self, name: &str) -> Result<String> {
        self.list_installed()
            .await?
            .into_iter()
            .find(|p| p.name == name)
            .map(|p| p.version)
            .ok_or_else(|| Error::PackageNotInstalled {
                name: name.to_string(),
            })
    }
}

/// Shared collaborators for backends.
#[derive(Clone)]
pub struct PackageContext {
    /// Runs unprivileged queries.
    pub commander: Arc<dyn Commander>,
    /// Wraps mutating invocations.
    pub escalator: Arc<Escalator>,
    /// Reads the backend's own version.
    pub programs: Arc<dyn ProgramQuery>,
    /// Output policy for install/uninstall.
    pub display_mode: DisplayMode,
}

impl PackageContext {
    /// Bundle collaborators.
    pub fn new(
        commander: Arc<dyn Commander>,
        escalator: Arc<Escalator>,
        programs: Arc<dyn ProgramQuery>,
        display_mode: DisplayMode,
    ) -> Self {
        Self {
            commander,
            escalator,
            programs,
            display_mode,
        }
    }
}

/// Backends without version pinning install the latest and say so.
fn warn_ignored_constraint(backend: &str, package: &RequestedPackageInfo) {
    if let Some(constraint) = &package.version_constraints {
        warn!(
            backend,
            package = %package.name,
            constraint = %constraint,
            "version constraints are not supported, installing latest"
        );
    }
}

/// Reject names that would be read as options by the backend.
fn validate_package_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput("package name must not be empty".to_string()));
    }
    if name.starts_with('-') {
        return Err(Error::InvalidInput(format!("invalid package name: {}", name)));
    }
    Ok(())
}

/// `name version` lines, first two whitespace fields; shorter lines are skipped.
fn parse_name_version_lines(output: &str) -> Vec<PackageInfo> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let name = fields.next()?;
            let version = fields.next()?;
            Some(PackageInfo::new(name, version))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commander::OutputMode;
    use std::collections::HashSet;

    #[test]
    fn test_display_mode_discard_policy() {
        assert!(DisplayMode::Progress.should_discard_output());
        assert!(!DisplayMode::Verbose.should_discard_output());
        assert_eq!(DisplayMode::Progress.run_options().output_mode(), OutputMode::Discard);
        assert_eq!(DisplayMode::Verbose.run_options().output_mode(), OutputMode::Stream);
        assert_eq!(DisplayMode::default(), DisplayMode::Progress);
        assert_eq!("verbose".parse::<DisplayMode>().unwrap(), DisplayMode::Verbose);
    }

    #[test]
    fn test_package_identity_ignores_version() {
        let a = PackageInfo::new("git", "2.34");
        let b = PackageInfo::new("git", "2.40");
        assert_eq!(a, b);
        assert_ne!(PackageInfo::group("git"), a);

        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_requested_package_builders() {
        let req = RequestedPackageInfo::group("Development Tools");
        assert!(req.is_group());
        assert!(req.version_constraints.is_none());

        let req = RequestedPackageInfo::new("gpg").with_constraint(">=2.2.0");
        assert_eq!(req.version_constraints.as_deref(), Some(">=2.2.0"));
        assert!(!req.is_group());
    }

    #[test]
    fn test_package_info_serde_uses_type_key() {
        let json = serde_json::to_string(&PackageInfo::group("Development Tools")).unwrap();
        assert!(json.contains("\"type\":\"group\""));
        let plain = serde_json::to_string(&PackageInfo::new("git", "1")).unwrap();
        assert!(!plain.contains("type"));
    }

    #[test]
    fn test_validate_package_name() {
        assert!(validate_package_name("git").is_ok());
        assert!(validate_package_name("").is_err());
        assert!(validate_package_name("--force").is_err());
    }

    #[test]
    fn test_parse_name_version_lines() {
        let parsed = parse_name_version_lines("git 2.0\n\nlonely\ncurl 8.1 extra\n");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].name, "git");
        assert_eq!(parsed[1].version, "8.1");
    }
}
