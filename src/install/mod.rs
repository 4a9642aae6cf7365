//! Tool installers built on the package layer.
//!
//! A [`ToolInstaller`] knows how to tell whether its tool is usable and
//! which package provides it; [`run_installer`] drives one through
//! check, install and verify, reporting [`InstallProgress`] along the way.
//!
//! # Example
//!
//! ```rust,no_run
//! use devstrap::{run_installer, DisplayMode, GpgInstaller, Host, PackageManagerKind};
//!
//! #[tokio::main]
//! async fn main() -> devstrap::Result<()> {
//!     let host = Host::system(None, None);
//!     let packages = host.package_manager(PackageManagerKind::Brew, DisplayMode::Verbose);
//!     let gpg = GpgInstaller::for_backend(host.programs(), PackageManagerKind::Brew);
//!
//!     run_installer(&gpg, &packages, |p| println!("{}", p.description())).await
//! }
//! ```

mod executor;
mod gpg;
mod progress;
mod shell;

pub use executor::run_installer;
pub use gpg::{GpgClient, GpgInstaller, GPG_VERSION_CONSTRAINT};
pub use progress::InstallProgress;
pub use shell::{brew_prefix_from, ShellChanger, ShellInstaller};

use crate::error::Result;
use crate::package::PackageManager;
use async_trait::async_trait;

/// One installable tool.
#[async_trait]
pub trait ToolInstaller: Send + Sync {
    /// Tool name used in progress reports.
    fn name(&self) -> &str;

    /// Whether the tool is installed and usable.
    async fn is_available(&self) -> bool;

    /// Install the tool through `packages`.
    async fn install(&self, packages: &dyn PackageManager) -> Result<()>;
}
