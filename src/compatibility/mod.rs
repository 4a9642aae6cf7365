//! Host compatibility checking.
//!
//! [`check`] evaluates the detected host against a [`CompatibilityConfig`]
//! and verifies the prerequisite programs it names. Failures carry the
//! [`SystemInfo`] gathered up to that point so callers can still render
//! diagnostics.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use devstrap::compatibility::{self, CompatibilityConfig, HostDetector, ProgramPrerequisiteChecker};
//! use devstrap::{LocalFileSystem, ProcessEnvironment, SystemCommander, SystemProgramQuery};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let commander = Arc::new(SystemCommander::new());
//!     let programs = Arc::new(SystemProgramQuery::new(commander.clone(), &ProcessEnvironment));
//!     let config = CompatibilityConfig::embedded().unwrap();
//!     let detector = HostDetector::new(commander, Arc::new(LocalFileSystem));
//!     let checker = ProgramPrerequisiteChecker::new(programs);
//!
//!     match compatibility::check(Some(&config), &detector, &checker).await {
//!         Ok(info) => println!("{} {} is supported", info.os_name, info.distro_name),
//!         Err(failure) => eprintln!("{} ({} missing)", failure, failure.system_info.prerequisites.missing.len()),
//!     }
//! }
//! ```

mod config;
mod detector;
mod prerequisites;

pub use config::{
    CompatibilityConfig, CompatibilitySource, DistroConfig, OsConfig, PrerequisiteConfig,
};
pub use detector::{
    parse_os_release, DetectedSystem, HostDetector, OsRelease, SystemDetector, UNKNOWN_DISTRO,
};
pub use prerequisites::{
    PrerequisiteChecker, PrerequisiteDetail, PrerequisiteStatus, ProgramPrerequisiteChecker,
};

use crate::error::{Error, ResultExt};
use crate::program::lenient_version;
use semver::VersionReq;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What the compatibility check learned about the host.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SystemInfo {
    /// `linux`, `macos`, `windows`, ...
    pub os_name: String,
    /// os-release `ID` on Linux, `macos` on macOS.
    pub distro_name: String,
    /// Distribution version, if known.
    pub distro_version: Option<String>,
    /// os-release `ID_LIKE` entries.
    pub distro_like: Vec<String>,
    /// CPU architecture.
    pub arch: String,
    /// Prerequisite outcome; empty if the check stopped before it ran.
    pub prerequisites: PrerequisiteStatus,
}

impl From<DetectedSystem> for SystemInfo {
    fn from(system: DetectedSystem) -> Self {
        Self {
            os_name: system.os_name,
            distro_name: system.distro_name,
            distro_version: system.distro_version,
            distro_like: system.distro_like,
            arch: system.arch,
            prerequisites: PrerequisiteStatus::default(),
        }
    }
}

/// A rejected host, with everything detected before the rejection.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct CompatibilityFailure {
    /// Partially populated host description.
    pub system_info: SystemInfo,
    /// Why the host was rejected.
    pub error: Error,
}

impl CompatibilityFailure {
    fn new(system_info: SystemInfo, error: Error) -> Self {
        Self { system_info, error }
    }
}

fn with_notes(message: String, notes: &str) -> String {
    if notes.is_empty() {
        message
    } else {
        format!("{} - {}", message, notes)
    }
}

fn unsupported(message: String, notes: &str) -> Error {
    Error::UnsupportedPlatform {
        message: with_notes(message, notes),
    }
}

fn check_version(info: &SystemInfo, constraint: &str) -> Result<(), Error> {
    let req = VersionReq::parse(constraint).map_err(|e| {
        Error::Config(format!(
            "invalid version_constraint \"{}\" for {}: {}",
            constraint, info.distro_name, e
        ))
    })?;
    let Some(raw) = info.distro_version.as_deref() else {
        return Err(Error::UnsupportedPlatform {
            message: format!(
                "cannot verify {} version against constraint \"{}\": version unknown",
                info.distro_name, constraint
            ),
        });
    };
    let version = lenient_version(raw).ok_or_else(|| Error::Parse {
        what: format!("{} version", info.distro_name),
        message: format!("{:?} is not a version", raw),
    });
    let version = version.context(format!(
        "cannot verify {} version against constraint \"{}\"",
        info.distro_name, constraint
    ))?;
    if req.matches(&version) {
        Ok(())
    } else {
        Err(Error::UnsupportedPlatform {
            message: format!(
                "unsupported {} version {}: requires \"{}\"",
                info.distro_name, raw, constraint
            ),
        })
    }
}

/// Evaluate the host against `config`.
///
/// Steps, in order: detect the host; look up the OS (and on Linux the
/// distribution); check the distribution version constraint; check
/// prerequisites, with distribution-level lists replacing the OS-level one
/// when non-empty.
///
/// # Arguments
///
/// - `config`: Support matrix; `None` is rejected
/// - `detector`: Identifies the host
/// - `checker`: Probes prerequisite programs
///
/// # Returns
///
/// - `Ok(SystemInfo)` for a supported host with every prerequisite present
/// - `Err(CompatibilityFailure)` holding the error and whatever
///   [`SystemInfo`] was gathered before it
pub async fn check(
    config: Option<&CompatibilityConfig>,
    detector: &dyn SystemDetector,
    checker: &dyn PrerequisiteChecker,
) -> Result<SystemInfo, CompatibilityFailure> {
    let Some(config) = config else {
        return Err(CompatibilityFailure::new(
            SystemInfo::default(),
            Error::InvalidInput("compatibility configuration is nil".to_string()),
        ));
    };

    let detected = detector
        .detect_system()
        .await
        .context("failed to detect system")
        .map_err(|e| CompatibilityFailure::new(SystemInfo::default(), e))?;
    let mut info = SystemInfo::from(detected);

    let Some(os_config) = config.operating_systems.get(&info.os_name) else {
        let error = unsupported(format!("unsupported operating system: {}", info.os_name), "");
        return Err(CompatibilityFailure::new(info, error));
    };
    if !os_config.supported {
        let error = unsupported(
            format!("unsupported operating system: {}", info.os_name),
            &os_config.notes,
        );
        return Err(CompatibilityFailure::new(info, error));
    }

    let mut prerequisites = &os_config.prerequisites;
    if info.os_name == "linux" {
        let Some(distro_config) = os_config.distributions.get(&info.distro_name) else {
            let error = unsupported(
                format!("unsupported Linux distribution: {}", info.distro_name),
                "",
            );
            return Err(CompatibilityFailure::new(info, error));
        };
        if !distro_config.supported {
            let error = unsupported(
                format!("unsupported Linux distribution: {}", info.distro_name),
                &distro_config.notes,
            );
            return Err(CompatibilityFailure::new(info, error));
        }
        if let Some(constraint) = &distro_config.version_constraint {
            if let Err(error) = check_version(&info, constraint) {
                return Err(CompatibilityFailure::new(info, error));
            }
        }
        if !distro_config.prerequisites.is_empty() {
            prerequisites = &distro_config.prerequisites;
        }
    }

    info.prerequisites = checker.check(prerequisites).await;
    if let Err(error) = info.prerequisites.ensure_complete() {
        return Err(CompatibilityFailure::new(info, error));
    }

    debug!(os = %info.os_name, distro = %info.distro_name, "host is compatible");
    Ok(info)
}
