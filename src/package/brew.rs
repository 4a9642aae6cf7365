//! Homebrew backend. Homebrew refuses to run as root, so nothing here is
//! escalated.

use super::{
    parse_name_version_lines, validate_package_name, warn_ignored_constraint, PackageContext,
    PackageInfo, PackageManager, PackageManagerInfo, RequestedPackageInfo,
};
use crate::commander::{to_args, RunOptions};
use crate::error::{Result, ResultExt};
use crate::program::whitespace_field;
use async_trait::async_trait;
use tracing::info;

/// `Homebrew 4.2.0` -> `4.2.0`
fn brew_version(output: &str) -> Result<String> {
    Ok(whitespace_field(output, 1))
}

/// Installs with `brew` as the current user.
pub struct BrewPackageManager {
    ctx: PackageContext,
}

impl BrewPackageManager {
    /// Backend over `ctx`. The escalator in `ctx` is never used.
    pub fn new(ctx: PackageContext) -> Self {
        Self { ctx }
    }

    async fn brew(&self, action: &str, name: &str) -> Result<()> {
        self.ctx
            .commander
            .run(
                "brew",
                &to_args(&[action, name]),
                &self.ctx.display_mode.run_options(),
            )
            .await?
            .check("brew")?;
        Ok(())
    }
}

#[async_trait]
impl PackageManager for BrewPackageManager {
    async fn info(&self) -> Result<PackageManagerInfo> {
        let version = self
            .ctx
            .programs
            .program_version("brew", &brew_version)
            .await?;
        Ok(PackageManagerInfo {
            name: "brew".to_string(),
            version,
        })
    }

    async fn install(&self, package: &RequestedPackageInfo) -> Result<()> {
        validate_package_name(&package.name)?;
        warn_ignored_constraint("brew", package);
        info!(package = %package.name, "installing with brew");

        self.brew("install", &package.name)
            .await
            .with_context(|| format!("failed to install package {}", package.name))
    }

    async fn uninstall(&self, package: &PackageInfo) -> Result<()> {
        validate_package_name(&package.name)?;
        info!(package = %package.name, "removing with brew");

        self.brew("uninstall", &package.name)
            .await
            .with_context(|| format!("failed to uninstall package {}", package.name))
    }

    /// `brew list --versions` prints `name v1 v2 ...`; the first version wins.
    async fn list_installed(&self) -> Result<Vec<PackageInfo>> {
        let result = self
            .ctx
            .commander
            .run(
                "brew",
                &to_args(&["list", "--versions"]),
                &RunOptions::new().capture(),
            )
            .await
            .and_then(|r| r.check("brew"))
            .context("failed to list installed packages")?;
        Ok(parse_name_version_lines(&String::from_utf8_lossy(
            &result.stdout,
        )))
    }
}
