//! Pacman backend for the Arch family.

use super::{
    parse_name_version_lines, validate_package_name, warn_ignored_constraint, PackageContext,
    PackageInfo, PackageManager, PackageManagerInfo, RequestedPackageInfo,
};
use crate::commander::{to_args, RunOptions};
use crate::error::{Result, ResultExt};
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use tracing::info;

fn version_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Pacman v(\S+)").expect("Invalid regex pattern"))
}

/// Pacman prints an ASCII-art banner containing `Pacman v6.1.0 - libalpm v14.0.0`.
/// Builds without the banner report their raw output instead.
fn pacman_version(output: &str) -> Result<String> {
    Ok(version_pattern()
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| output.trim().to_string()))
}

/// Installs with `pacman`.
pub struct PacmanPackageManager {
    ctx: PackageContext,
}

impl PacmanPackageManager {
    /// Backend over `ctx`.
    pub fn new(ctx: PackageContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl PackageManager for PacmanPackageManager {
    async fn info(&self) -> Result<PackageManagerInfo> {
        let version = self
            .ctx
            .programs
            .program_version("pacman", &pacman_version)
            .await?;
        Ok(PackageManagerInfo {
            name: "pacman".to_string(),
            version,
        })
    }

    async fn install(&self, package: &RequestedPackageInfo) -> Result<()> {
        validate_package_name(&package.name)?;
        warn_ignored_constraint("pacman", package);
        info!(package = %package.name, "installing with pacman");

        self.ctx
            .escalator
            .run_checked(
                "pacman",
                &to_args(&["-S", "--noconfirm", "--needed", package.name.as_str()]),
                &self.ctx.display_mode.run_options(),
            )
            .await
            .with_context(|| format!("failed to install package {}", package.name))?;
        Ok(())
    }

    async fn uninstall(&self, package: &PackageInfo) -> Result<()> {
        validate_package_name(&package.name)?;
        info!(package = %package.name, "removing with pacman");

        self.ctx
            .escalator
            .run_checked(
                "pacman",
                &to_args(&["-R", "--noconfirm", package.name.as_str()]),
                &self.ctx.display_mode.run_options(),
            )
            .await
            .with_context(|| format!("failed to uninstall package {}", package.name))?;
        Ok(())
    }

    async fn list_installed(&self) -> Result<Vec<PackageInfo>> {
        let result = self
            .ctx
            .commander
            .run("pacman", &to_args(&["-Q"]), &RunOptions::new().capture())
            .await
            .and_then(|r| r.check("pacman"))
            .context("failed to list installed packages")?;
        Ok(parse_name_version_lines(&String::from_utf8_lossy(
            &result.stdout,
        )))
    }
}
