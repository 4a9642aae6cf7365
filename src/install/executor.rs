//! Installation execution with progress reporting and verification.

use crate::error::{Error, Result, ResultExt};
use crate::install::{InstallProgress, ToolInstaller};
use crate::package::PackageManager;
use tracing::info;

/// Install one tool unless it is already usable.
///
/// This function:
/// 1. Reports `Started` and `CheckingAvailability`
/// 2. Returns early with `AlreadyInstalled` if the tool is usable
/// 3. Installs through `packages`
/// 4. Verifies the tool is now usable, failing with
///    [`Error::VerificationFailed`] otherwise
///
/// # Arguments
///
/// - `installer`: The tool to ensure
/// - `packages`: Backend used when the tool is missing
/// - `on_progress`: Called once per stage, in order
///
/// # Returns
///
/// - `Ok(())` if the tool was already usable or is usable after installing
/// - `Err(Error::Context)` prefixed `failed to install <tool>` if the backend failed
/// - `Err(Error::VerificationFailed)` if the tool is still unusable afterwards
///
/// # Example
///
/// ```rust,no_run
/// use devstrap::{run_installer, Host, PackageManagerKind, DisplayMode, ShellInstaller};
///
/// #[tokio::main]
/// async fn main() -> devstrap::Result<()> {
///     let host = Host::system(None, None);
///     let packages = host.package_manager(PackageManagerKind::Apt, DisplayMode::Progress);
///     let zsh = ShellInstaller::new("zsh", host.programs());
///
///     run_installer(&zsh, &packages, |progress| println!("{:?}", progress)).await
/// }
/// ```
pub async fn run_installer<F>(
    installer: &dyn ToolInstaller,
    packages: &dyn PackageManager,
    on_progress: F,
) -> Result<()>
where
    F: Fn(InstallProgress) + Send + Sync,
{
    let tool = installer.name().to_string();
    on_progress(InstallProgress::Started { tool: tool.clone() });

    on_progress(InstallProgress::CheckingAvailability);
    if installer.is_available().await {
        info!(tool = %tool, "already available");
        on_progress(InstallProgress::AlreadyInstalled { tool });
        return Ok(());
    }

    on_progress(InstallProgress::Installing { tool: tool.clone() });
    installer
        .install(packages)
        .await
        .with_context(|| format!("failed to install {}", tool))?;

    on_progress(InstallProgress::Verifying { tool: tool.clone() });
    if !installer.is_available().await {
        return Err(Error::VerificationFailed { tool });
    }

    info!(tool = %tool, "installed");
    on_progress(InstallProgress::Completed { tool });
    Ok(())
}
