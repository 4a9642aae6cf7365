//! DNF backend for the Fedora/RHEL family, including package groups.

use super::{
    validate_package_name, warn_ignored_constraint, PackageContext, PackageInfo, PackageManager,
    PackageManagerInfo, RequestedPackageInfo,
};
use crate::commander::{to_args, RunOptions};
use crate::error::{Result, ResultExt};
use crate::program::whitespace_field;
use async_trait::async_trait;
use tracing::info;

/// `dnf 4.18.0` -> `4.18.0`; other shapes fall back to the raw output.
fn dnf_version(output: &str) -> Result<String> {
    Ok(whitespace_field(output, 1))
}

/// `git-core.x86_64` -> `git-core`; names without a dot are kept whole.
fn strip_arch(field: &str) -> &str {
    field.rsplit_once('.').map_or(field, |(name, _)| name)
}

/// Parse `dnf list installed`.
///
/// Long names make dnf wrap the version onto the following line, so a line
/// with a single field is held until the next line supplies its version.
fn parse_dnf_list(output: &str) -> Vec<PackageInfo> {
    let mut packages = Vec::new();
    let mut pending: Option<&str> = None;

    for line in output.lines() {
        if line.trim().is_empty()
            || line.starts_with("Installed Packages")
            || line.starts_with("Last metadata expiration check")
        {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        match (pending.take(), fields.as_slice()) {
            (Some(name), [version, ..]) => {
                packages.push(PackageInfo::new(strip_arch(name), *version));
            }
            (None, [name]) => pending = Some(*name),
            (None, [name, version, ..]) => {
                packages.push(PackageInfo::new(strip_arch(name), *version));
            }
            (_, []) => {}
        }
    }
    packages
}

/// Installs with `dnf`, handling `group` requests with `dnf group ...`.
pub struct DnfPackageManager {
    ctx: PackageContext,
}

impl DnfPackageManager {
    /// Backend over `ctx`.
    pub fn new(ctx: PackageContext) -> Self {
        Self { ctx }
    }

    fn mutation_args(action: &str, name: &str, group: bool) -> Vec<String> {
        if group {
            to_args(&["group", action, "-y", name])
        } else {
            to_args(&[action, "-y", name])
        }
    }

    async fn group_installed(&self, name: &str) -> Result<bool> {
        let result = self
            .ctx
            .commander
            .run(
                "dnf",
                &to_args(&["group", "list", "installed"]),
                &RunOptions::new().capture(),
            )
            .await
            .and_then(|r| r.check("dnf"))
            .context("failed to list installed groups")?;
        let output = String::from_utf8_lossy(&result.stdout);
        Ok(output.lines().any(|line| line.trim().contains(name)))
    }
}

#[async_trait]
impl PackageManager for DnfPackageManager {
    async fn info(&self) -> Result<PackageManagerInfo> {
        let version = self.ctx.programs.program_version("dnf", &dnf_version).await?;
        Ok(PackageManagerInfo {
            name: "dnf".to_string(),
            version,
        })
    }

    async fn install(&self, package: &RequestedPackageInfo) -> Result<()> {
        validate_package_name(&package.name)?;
        warn_ignored_constraint("dnf", package);
        info!(package = %package.name, group = package.is_group(), "installing with dnf");

        let args = Self::mutation_args("install", &package.name, package.is_group());
        self.ctx
            .escalator
            .run_checked("dnf", &args, &self.ctx.display_mode.run_options())
            .await
            .with_context(|| format!("failed to install package {}", package.name))?;
        Ok(())
    }

    async fn uninstall(&self, package: &PackageInfo) -> Result<()> {
        validate_package_name(&package.name)?;
        info!(package = %package.name, group = package.is_group(), "removing with dnf");

        let args = Self::mutation_args("remove", &package.name, package.is_group());
        self.ctx
            .escalator
            .run_checked("dnf", &args, &self.ctx.display_mode.run_options())
            .await
            .with_context(|| format!("failed to uninstall package {}", package.name))?;
        Ok(())
    }

    async fn list_installed(&self) -> Result<Vec<PackageInfo>> {
        let result = self
            .ctx
            .commander
            .run(
                "dnf",
                &to_args(&["list", "installed"]),
                &RunOptions::new().capture(),
            )
            .await
            .and_then(|r| r.check("dnf"))
            .context("failed to list installed packages")?;
        Ok(parse_dnf_list(&String::from_utf8_lossy(&result.stdout)))
    }

    async fn is_installed(&self, package: &PackageInfo) -> Result<bool> {
        if package.is_group() {
            return self.group_installed(&package.name).await;
        }
        Ok(self
            .list_installed()
            .await?
            .iter()
            .any(|p| p.name == package.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commander::CommandResult;
    use crate::escalator::Escalator;
    use crate::package::DisplayMode;
    use crate::testing::{FakeCommander, FakeProgramQuery};
    use std::sync::Arc;

    const DNF_LIST: &str = "\
Last metadata expiration check: 0:12:01 ago on Mon 01 Jan 2024.
Installed Packages
bash.x86_64                          5.2.26-1.fc39          @updates
git-core.x86_64                      2.44.0-1.fc39          @updates
python3.11.x86_64                    3.11.8-1.fc39          @updates

texlive-collection-latexrecommended.noarch
                                     11:svn65512-1.fc39     @fedora
";

    fn dnf(commander: Arc<FakeCommander>) -> DnfPackageManager {
        let programs = Arc::new(FakeProgramQuery::new().with_program("sudo"));
        let escalator = Arc::new(Escalator::new(commander.clone(), programs.clone()));
        DnfPackageManager::new(PackageContext::new(
            commander,
            escalator,
            programs,
            DisplayMode::Verbose,
        ))
    }

    #[tokio::test]
    async fn test_group_install_with_sudo() {
        let commander = Arc::new(FakeCommander::with_sudo());
        let pm = dnf(commander.clone());

        pm.install(&RequestedPackageInfo::group("Development Tools"))
            .await
            .unwrap();

        assert_eq!(
            commander.commands(),
            vec![to_args(&["sudo", "dnf", "group", "install", "-y", "Development Tools"])]
        );
    }

    #[tokio::test]
    async fn test_plain_install_and_remove() {
        let commander = Arc::new(FakeCommander::as_root());
        let pm = dnf(commander.clone());

        pm.install(&RequestedPackageInfo::new("zsh")).await.unwrap();
        pm.uninstall(&PackageInfo::new("zsh", "")).await.unwrap();
        pm.uninstall(&PackageInfo::group("Development Tools"))
            .await
            .unwrap();

        assert_eq!(
            commander.commands(),
            vec![
                to_args(&["dnf", "install", "-y", "zsh"]),
                to_args(&["dnf", "remove", "-y", "zsh"]),
                to_args(&["dnf", "group", "remove", "-y", "Development Tools"]),
            ]
        );
    }

    #[tokio::test]
    async fn test_install_failure_has_context() {
        let commander = Arc::new(FakeCommander::as_root());
        commander.on_any("dnf", CommandResult::failed(1, "No match for argument: nope"));
        let pm = dnf(commander);

        let err = pm.install(&RequestedPackageInfo::new("nope")).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to install package nope: dnf exited with code 1: No match for argument: nope"
        );
    }

    #[test]
    fn test_parse_dnf_list() {
        let packages = parse_dnf_list(DNF_LIST);
        let pairs: Vec<_> = packages
            .iter()
            .map(|p| (p.name.as_str(), p.version.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("bash", "5.2.26-1.fc39"),
                ("git-core", "2.44.0-1.fc39"),
                ("python3.11", "3.11.8-1.fc39"),
                ("texlive-collection-latexrecommended", "11:svn65512-1.fc39"),
            ]
        );
    }

    #[test]
    fn test_strip_arch() {
        assert_eq!(strip_arch("bash.x86_64"), "bash");
        assert_eq!(strip_arch("gcc-c++"), "gcc-c++");
    }

    #[tokio::test]
    async fn test_list_is_unprivileged_capture() {
        let commander = Arc::new(FakeCommander::new());
        commander.on(
            "dnf",
            &["list", "installed"],
            CommandResult::ok("Installed Packages\nzsh.x86_64 5.9-7.fc39 @fedora\n"),
        );
        let pm = dnf(commander.clone());

        assert!(pm.is_installed(&PackageInfo::new("zsh", "")).await.unwrap());
        assert_eq!(pm.package_version("zsh").await.unwrap(), "5.9-7.fc39");
        assert_eq!(commander.calls()[0].command, "dnf");
        assert!(commander.calls().iter().all(|c| c.command != "sudo"));
    }

    #[tokio::test]
    async fn test_group_is_installed() {
        let commander = Arc::new(FakeCommander::new());
        commander.on(
            "dnf",
            &["group", "list", "installed"],
            CommandResult::ok("Installed Groups:\n   Development Tools\n"),
        );
        let pm = dnf(commander);

        assert!(pm
            .is_installed(&PackageInfo::group("Development Tools"))
            .await
            .unwrap());
        assert!(!pm
            .is_installed(&PackageInfo::group("C Development Tools and Libraries"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_info() {
        let commander = Arc::new(FakeCommander::new());
        let programs = Arc::new(FakeProgramQuery::new().with_version("dnf", "dnf 4.18.0\n"));
        let escalator = Arc::new(Escalator::new(commander.clone(), programs.clone()));
        let pm = DnfPackageManager::new(PackageContext::new(
            commander,
            escalator,
            programs,
            DisplayMode::Progress,
        ));

        assert_eq!(pm.info().await.unwrap().version, "4.18.0");
    }
}
