//! Wiring of the real collaborators.

use crate::commander::{CancelSignal, Commander, SystemCommander};
use crate::compatibility::{HostDetector, ProgramPrerequisiteChecker};
use crate::environment::{Environment, ProcessEnvironment};
use crate::escalator::Escalator;
use crate::filesystem::{FileSystem, LocalFileSystem};
use crate::install::{brew_prefix_from, GpgClient};
use crate::os::{OsManager, Platform, UnixOsManager};
use crate::package::{Backend, DisplayMode, PackageContext, PackageManagerKind};
use crate::program::{ProgramQuery, SystemProgramQuery};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Every collaborator the bootstrapper needs, built once and shared.
///
/// # Example
///
/// ```rust,no_run
/// use devstrap::{DisplayMode, Host, PackageManager, PackageManagerKind};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> devstrap::Result<()> {
///     let host = Host::system(None, None);
///     let apt = host.package_manager(PackageManagerKind::Apt, DisplayMode::Progress);
///     println!("{} installed packages", apt.list_installed().await?.len());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Host {
    commander: Arc<dyn Commander>,
    programs: Arc<dyn ProgramQuery>,
    escalator: Arc<Escalator>,
    fs: Arc<dyn FileSystem>,
    env: Arc<dyn Environment>,
    os: Arc<dyn OsManager>,
}

impl Host {
    /// The real machine. `cancel` aborts running children; `grace` overrides
    /// how long they get between SIGTERM and SIGKILL.
    pub fn system(cancel: Option<CancelSignal>, grace: Option<Duration>) -> Self {
        let mut commander = SystemCommander::new();
        if let Some(signal) = cancel {
            commander = commander.with_cancellation(signal);
        }
        if let Some(grace) = grace {
            commander = commander.with_termination_grace(grace);
        }
        let commander: Arc<dyn Commander> = Arc::new(commander);
        let programs: Arc<dyn ProgramQuery> =
            Arc::new(SystemProgramQuery::new(commander.clone(), &ProcessEnvironment));
        Self::from_parts(
            commander,
            programs,
            Arc::new(LocalFileSystem),
            Arc::new(ProcessEnvironment),
            Platform::current(),
        )
    }

    /// Build from injected parts; the escalator and OS manager are derived.
    pub fn from_parts(
        commander: Arc<dyn Commander>,
        programs: Arc<dyn ProgramQuery>,
        fs: Arc<dyn FileSystem>,
        env: Arc<dyn Environment>,
        platform: Platform,
    ) -> Self {
        let escalator = Arc::new(Escalator::new(commander.clone(), programs.clone()));
        let os: Arc<dyn OsManager> = Arc::new(UnixOsManager::new(
            commander.clone(),
            escalator.clone(),
            programs.clone(),
            fs.clone(),
            env.clone(),
            platform,
        ));
        Self {
            commander,
            programs,
            escalator,
            fs,
            env,
            os,
        }
    }

    /// Replace the OS manager.
    pub fn with_os(mut self, os: Arc<dyn OsManager>) -> Self {
        self.os = os;
        self
    }

    /// Process runner.
    pub fn commander(&self) -> Arc<dyn Commander> {
        self.commander.clone()
    }

    /// Program lookup.
    pub fn programs(&self) -> Arc<dyn ProgramQuery> {
        self.programs.clone()
    }

    /// Privilege escalation.
    pub fn escalator(&self) -> Arc<Escalator> {
        self.escalator.clone()
    }

    /// Filesystem access.
    pub fn fs(&self) -> Arc<dyn FileSystem> {
        self.fs.clone()
    }

    /// Environment variables.
    pub fn env(&self) -> Arc<dyn Environment> {
        self.env.clone()
    }

    /// Platform operations.
    pub fn os(&self) -> Arc<dyn OsManager> {
        self.os.clone()
    }

    /// Backend of `kind` with output policy `mode`.
    pub fn package_manager(&self, kind: PackageManagerKind, mode: DisplayMode) -> Backend {
        Backend::new(
            kind,
            PackageContext::new(
                self.commander.clone(),
                self.escalator.clone(),
                self.programs.clone(),
                mode,
            ),
        )
    }

    /// Detector for this host.
    pub fn detector(&self) -> HostDetector {
        HostDetector::new(self.commander.clone(), self.fs.clone())
    }

    /// Prerequisite checker backed by program lookup.
    pub fn prerequisite_checker(&self) -> ProgramPrerequisiteChecker {
        ProgramPrerequisiteChecker::new(self.programs.clone())
    }

    /// GnuPG queries.
    pub fn gpg_client(&self) -> GpgClient {
        GpgClient::new(self.commander.clone(), self.env.clone(), self.fs.clone())
    }

    /// Homebrew prefix, if `brew` can be found.
    pub fn brew_prefix(&self) -> Option<PathBuf> {
        let brew = self.programs.program_path("brew").ok()?;
        brew_prefix_from(&brew)
    }
}
