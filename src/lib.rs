//! # devstrap
//!
//! Privilege-aware command execution and package management for
//! bootstrapping developer machines on Linux and macOS.
//!
//! ## Layers
//!
//! - [`Commander`] runs external programs with capture/discard/stream
//!   output, stdin injection and environment overlays
//! - [`Escalator`] decides between running directly, `sudo` or `doas`
//! - [`OsManager`] reads and changes user shells, `/etc/shells` and sudoers
//! - [`PackageManager`] installs and queries packages through APT, DNF,
//!   Homebrew or Pacman
//! - [`compatibility`] checks the host against a support matrix
//! - [`install`] drives tool installers (GnuPG, login shells)
//!
//! Every external effect sits behind a trait, and the [`testing`] module
//! provides in-memory fakes for all of them.
//!
//! ## Example
//!
//! ```rust,no_run
//! use devstrap::compatibility::{self, CompatibilityConfig};
//! use devstrap::{DisplayMode, Host, PackageManager, PackageManagerKind, RequestedPackageInfo};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let host = Host::system(None, None);
//!     let config = CompatibilityConfig::embedded()?;
//!     let system = compatibility::check(
//!         Some(&config),
//!         &host.detector(),
//!         &host.prerequisite_checker(),
//!     )
//!     .await?;
//!
//!     if let Some(kind) = PackageManagerKind::for_system(&system) {
//!         let packages = host.package_manager(kind, DisplayMode::Progress);
//!         packages.install(&RequestedPackageInfo::new("git")).await?;
//!     }
//!     Ok(())
//! }
//! ```

mod commander;
pub mod compatibility;
mod environment;
mod error;
mod escalator;
mod filesystem;
mod host;
pub mod install;
mod options;
mod os;
mod package;
mod program;
pub mod testing;

pub use commander::{
    cancellation, to_args, CancelHandle, CancelSignal, CommandResult, Commander, OutputMode,
    RunOptions, SystemCommander, DEFAULT_TERMINATION_GRACE,
};
pub use compatibility::{CompatibilityConfig, CompatibilityFailure, CompatibilitySource, SystemInfo};
pub use environment::{Environment, ProcessEnvironment};
pub use error::{Error, Result, ResultExt};
pub use escalator::{EscalationCandidate, EscalationMethod, EscalationResult, Escalator};
pub use filesystem::{FileSystem, LocalFileSystem};
pub use host::Host;
pub use install::{
    run_installer, GpgClient, GpgInstaller, InstallProgress, ShellChanger, ShellInstaller,
    ToolInstaller,
};
pub use options::BootstrapOptions;
pub use os::{OsManager, Platform, UnixOsManager};
pub use package::{
    AptPackageManager, Backend, BrewPackageManager, DisplayMode, DnfPackageManager,
    PackageContext, PackageInfo, PackageManager, PackageManagerInfo, PackageManagerKind,
    PacmanPackageManager, RequestedPackageInfo, GROUP_TYPE,
};
pub use program::{
    lenient_version, parse_version, whitespace_field, ProgramQuery, SystemProgramQuery,
    VersionParser,
};
