//! GnuPG: installation and read-only client helpers.

use super::ToolInstaller;
use crate::commander::{to_args, Commander, RunOptions};
use crate::environment::Environment;
use crate::error::{Result, ResultExt};
use crate::filesystem::FileSystem;
use crate::package::{PackageManager, PackageManagerKind, RequestedPackageInfo};
use crate::program::{lenient_version, whitespace_field, ProgramQuery};
use async_trait::async_trait;
use semver::VersionReq;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Oldest supported GnuPG release.
pub const GPG_VERSION_CONSTRAINT: &str = ">=2.2.0";

const TTY_VARS: &[&str] = &["GPG_TTY", "TTY", "TERM_TTY"];
const DEV_TTY: &str = "/dev/tty";

/// `gpg (GnuPG) 2.4.4` -> `2.4.4`
fn gpg_version(output: &str) -> Result<String> {
    Ok(whitespace_field(output, 2))
}

/// Ensures `gpg` >= 2.2.0 and `gpg-agent` are present.
pub struct GpgInstaller {
    programs: Arc<dyn ProgramQuery>,
    package: String,
}

impl GpgInstaller {
    /// Installer requesting the `gpg` package.
    pub fn new(programs: Arc<dyn ProgramQuery>) -> Self {
        Self {
            programs,
            package: "gpg".to_string(),
        }
    }

    /// Installer requesting the package name `kind` uses for GnuPG.
    pub fn for_backend(programs: Arc<dyn ProgramQuery>, kind: PackageManagerKind) -> Self {
        let package = match kind {
            PackageManagerKind::Apt => "gpg",
            PackageManagerKind::Dnf => "gnupg2",
            PackageManagerKind::Brew | PackageManagerKind::Pacman => "gnupg",
        };
        Self {
            programs,
            package: package.to_string(),
        }
    }

    /// Package name passed to the backend.
    pub fn package(&self) -> &str {
        &self.package
    }

    async fn version_ok(&self) -> bool {
        let raw = match self.programs.program_version("gpg", &gpg_version).await {
            Ok(raw) => raw,
            Err(e) => {
                debug!(error = %e, "cannot read gpg version");
                return false;
            }
        };
        let Ok(req) = VersionReq::parse(GPG_VERSION_CONSTRAINT) else {
            return false;
        };
        // The parser falls back to the whole output; only the banner line counts.
        let banner = raw.lines().next().unwrap_or_default();
        match lenient_version(banner) {
            Some(version) => req.matches(&version),
            None => {
                debug!(version = %raw, "unrecognised gpg version");
                false
            }
        }
    }
}

#[async_trait]
impl ToolInstaller for GpgInstaller {
    fn name(&self) -> &str {
        "gpg"
    }

    async fn is_available(&self) -> bool {
        self.programs.program_exists("gpg")
            && self.version_ok().await
            && self.programs.program_exists("gpg-agent")
    }

    async fn install(&self, packages: &dyn PackageManager) -> Result<()> {
        packages
            .install(&RequestedPackageInfo::new(&self.package).with_constraint(GPG_VERSION_CONSTRAINT))
            .await
    }
}

/// Read-only queries against the user's GnuPG setup.
pub struct GpgClient {
    commander: Arc<dyn Commander>,
    env: Arc<dyn Environment>,
    fs: Arc<dyn FileSystem>,
}

impl GpgClient {
    /// Client over the given collaborators.
    pub fn new(
        commander: Arc<dyn Commander>,
        env: Arc<dyn Environment>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self { commander, env, fs }
    }

    /// Long key IDs of every secret key, in listing order.
    pub async fn secret_key_ids(&self) -> Result<Vec<String>> {
        let result = self
            .commander
            .run(
                "gpg",
                &to_args(&["--list-secret-keys", "--keyid-format", "LONG"]),
                &RunOptions::new().capture(),
            )
            .await
            .and_then(|r| r.check("gpg"))
            .context("failed to list secret keys")?;
        Ok(parse_secret_key_ids(&String::from_utf8_lossy(&result.stdout)))
    }

    /// Whether at least one secret key exists.
    pub async fn has_secret_key(&self) -> Result<bool> {
        Ok(!self.secret_key_ids().await?.is_empty())
    }

    /// Terminal for pinentry: `GPG_TTY`, `TTY`, `TERM_TTY`, else `/dev/tty`
    /// if it exists.
    pub fn tty(&self) -> Option<String> {
        TTY_VARS
            .iter()
            .filter_map(|name| self.env.var(name))
            .find(|value| !value.is_empty())
            .or_else(|| {
                self.fs
                    .exists(Path::new(DEV_TTY))
                    .then(|| DEV_TTY.to_string())
            })
    }
}

/// Key IDs from `sec   rsa4096/3AA5C34371567BD2 2016-03-10 [SC]` lines.
fn parse_secret_key_ids(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| line.starts_with("sec"))
        .filter_map(|line| line.split_whitespace().nth(1))
        .filter_map(|field| field.split_once('/'))
        .map(|(_, id)| id.to_string())
        .collect()
}
