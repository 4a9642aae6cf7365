//! APT backend for the Debian family.

use super::{
    parse_name_version_lines, validate_package_name, warn_ignored_constraint, PackageContext,
    PackageInfo, PackageManager, PackageManagerInfo, RequestedPackageInfo,
};
use crate::commander::{to_args, RunOptions};
use crate::error::{Result, ResultExt};
use crate::program::whitespace_field;
use async_trait::async_trait;
use tracing::info;

const DPKG_QUERY_FORMAT: &str = "-f=${Package} ${Version}\n";

/// `apt 2.4.8 (amd64)` -> `2.4.8`
fn apt_version(output: &str) -> Result<String> {
    Ok(whitespace_field(output, 1))
}

/// Installs with `apt`, lists with `dpkg-query`.
pub struct AptPackageManager {
    ctx: PackageContext,
}

impl AptPackageManager {
    /// Backend over `ctx`.
    pub fn new(ctx: PackageContext) -> Self {
        Self { ctx }
    }

    async fn update_and_install(&self, name: &str, options: &RunOptions) -> Result<()> {
        self.ctx
            .escalator
            .run_checked("apt", &to_args(&["update"]), options)
            .await
            .context("failed to update package index")?;
        self.ctx
            .escalator
            .run_checked("apt", &to_args(&["install", "-y", name]), options)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl PackageManager for AptPackageManager {
    async fn info(&self) -> Result<PackageManagerInfo> {
        let version = self.ctx.programs.program_version("apt", &apt_version).await?;
        Ok(PackageManagerInfo {
            name: "apt".to_string(),
            version,
        })
    }

    async fn install(&self, package: &RequestedPackageInfo) -> Result<()> {
        validate_package_name(&package.name)?;
        warn_ignored_constraint("apt", package);
        info!(package = %package.name, "installing with apt");

        let options = self.ctx.display_mode.run_options();
        self.update_and_install(&package.name, &options)
            .await
            .with_context(|| format!("failed to install package {}", package.name))
    }

    async fn uninstall(&self, package: &PackageInfo) -> Result<()> {
        validate_package_name(&package.name)?;
        info!(package = %package.name, "removing with apt");

        let options = self.ctx.display_mode.run_options();
        self.ctx
            .escalator
            .run_checked("apt", &to_args(&["remove", "-y", package.name.as_str()]), &options)
            .await
            .with_context(|| format!("failed to uninstall package {}", package.name))?;
        Ok(())
    }

    async fn list_installed(&self) -> Result<Vec<PackageInfo>> {
        let result = self
            .ctx
            .commander
            .run(
                "dpkg-query",
                &to_args(&["-W", DPKG_QUERY_FORMAT]),
                &RunOptions::new().capture(),
            )
            .await
            .and_then(|r| r.check("dpkg-query"))
            .context("failed to list installed packages")?;
        Ok(parse_name_version_lines(&String::from_utf8_lossy(
            &result.stdout,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commander::{CommandResult, OutputMode};
    use crate::error::Error;
    use crate::escalator::Escalator;
    use crate::package::DisplayMode;
    use crate::testing::{FakeCommander, FakeProgramQuery};
    use std::sync::Arc;

    const DPKG_OUTPUT: &str =
        "git 1:2.34.1-1ubuntu1.9\ncurl 7.81.0-1ubuntu1.10\nbuild-essential 12.9ubuntu3\n";

    fn apt(commander: Arc<FakeCommander>, programs: FakeProgramQuery) -> AptPackageManager {
        let programs = Arc::new(programs);
        let escalator = Arc::new(Escalator::new(commander.clone(), programs.clone()));
        AptPackageManager::new(PackageContext::new(
            commander,
            escalator,
            programs,
            DisplayMode::Progress,
        ))
    }

    fn dpkg_args() -> Vec<&'static str> {
        vec!["-W", DPKG_QUERY_FORMAT]
    }

    #[tokio::test]
    async fn test_install_as_root() {
        let commander = Arc::new(FakeCommander::as_root());
        let pm = apt(commander.clone(), FakeProgramQuery::new());

        pm.install(&RequestedPackageInfo::new("git")).await.unwrap();

        assert_eq!(
            commander.commands(),
            vec![
                to_args(&["apt", "update"]),
                to_args(&["apt", "install", "-y", "git"]),
            ]
        );
    }

    #[tokio::test]
    async fn test_install_with_sudo() {
        let commander = Arc::new(FakeCommander::with_sudo());
        let pm = apt(commander.clone(), FakeProgramQuery::new().with_program("sudo"));

        pm.install(&RequestedPackageInfo::new("git")).await.unwrap();

        assert_eq!(
            commander.commands(),
            vec![
                to_args(&["sudo", "apt", "update"]),
                to_args(&["sudo", "apt", "install", "-y", "git"]),
            ]
        );
    }

    #[tokio::test]
    async fn test_install_discards_output_in_progress_mode() {
        let commander = Arc::new(FakeCommander::as_root());
        let pm = apt(commander.clone(), FakeProgramQuery::new());

        pm.install(&RequestedPackageInfo::new("git")).await.unwrap();

        let modes: Vec<_> = commander
            .calls()
            .into_iter()
            .filter(|c| c.command == "apt")
            .map(|c| c.mode)
            .collect();
        assert_eq!(modes, vec![OutputMode::Discard, OutputMode::Discard]);
    }

    #[tokio::test]
    async fn test_update_failure_aborts_install() {
        let commander = Arc::new(FakeCommander::as_root());
        commander.on("apt", &["update"], CommandResult::failed(100, "E: network down"));
        let pm = apt(commander.clone(), FakeProgramQuery::new());

        let err = pm.install(&RequestedPackageInfo::new("git")).await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "failed to install package git: failed to update package index: apt exited with code 100: E: network down"
        );
        assert_eq!(commander.commands(), vec![to_args(&["apt", "update"])]);
    }

    #[tokio::test]
    async fn test_install_ignores_constraint() {
        let commander = Arc::new(FakeCommander::as_root());
        let pm = apt(commander.clone(), FakeProgramQuery::new());

        pm.install(&RequestedPackageInfo::new("gpg").with_constraint(">=2.2.0"))
            .await
            .unwrap();

        assert_eq!(
            commander.commands().last().unwrap(),
            &to_args(&["apt", "install", "-y", "gpg"])
        );
    }

    #[tokio::test]
    async fn test_uninstall() {
        let commander = Arc::new(FakeCommander::with_sudo());
        let pm = apt(commander.clone(), FakeProgramQuery::new().with_program("sudo"));

        pm.uninstall(&PackageInfo::new("git", "")).await.unwrap();

        assert_eq!(
            commander.commands(),
            vec![to_args(&["sudo", "apt", "remove", "-y", "git"])]
        );
    }

    #[tokio::test]
    async fn test_list_installed_parses_dpkg_query() {
        let commander = Arc::new(FakeCommander::new());
        commander.on("dpkg-query", &dpkg_args(), CommandResult::ok(DPKG_OUTPUT));
        let pm = apt(commander.clone(), FakeProgramQuery::new());

        let packages = pm.list_installed().await.unwrap();
        let pairs: Vec<_> = packages
            .iter()
            .map(|p| (p.name.as_str(), p.version.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("git", "1:2.34.1-1ubuntu1.9"),
                ("curl", "7.81.0-1ubuntu1.10"),
                ("build-essential", "12.9ubuntu3"),
            ]
        );
        assert_eq!(commander.calls()[0].mode, OutputMode::Capture);
    }

    #[tokio::test]
    async fn test_listed_packages_are_installed() {
        let commander = Arc::new(FakeCommander::new());
        commander.on("dpkg-query", &dpkg_args(), CommandResult::ok(DPKG_OUTPUT));
        let pm = apt(commander, FakeProgramQuery::new());

        for package in pm.list_installed().await.unwrap() {
            assert!(pm.is_installed(&package).await.unwrap());
            assert_eq!(pm.package_version(&package.name).await.unwrap(), package.version);
        }
        assert!(!pm.is_installed(&PackageInfo::new("zsh", "")).await.unwrap());
        assert!(matches!(
            pm.package_version("zsh").await,
            Err(Error::PackageNotInstalled { .. })
        ));
    }

    #[tokio::test]
    async fn test_info_reads_apt_version() {
        let programs = FakeProgramQuery::new().with_version("apt", "apt 2.4.8 (amd64)\n");
        let pm = apt(Arc::new(FakeCommander::new()), programs);

        let info = pm.info().await.unwrap();
        assert_eq!(info.name, "apt");
        assert_eq!(info.version, "2.4.8");
    }

    #[test]
    fn test_apt_version_falls_back_to_raw() {
        assert_eq!(apt_version("weird").unwrap(), "weird");
    }
}
