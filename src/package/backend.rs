//! Backend selection and static dispatch.

use super::{
    AptPackageManager, BrewPackageManager, DnfPackageManager, PackageContext, PackageInfo,
    PackageManager, PackageManagerInfo, PacmanPackageManager, RequestedPackageInfo,
};
use crate::compatibility::SystemInfo;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const DEBIAN_FAMILY: &[&str] = &[
    "debian",
    "ubuntu",
    "linuxmint",
    "pop",
    "elementary",
    "raspbian",
    "kali",
    "zorin",
];
const FEDORA_FAMILY: &[&str] = &[
    "fedora",
    "rhel",
    "centos",
    "rocky",
    "almalinux",
    "ol",
    "amzn",
];
const ARCH_FAMILY: &[&str] = &["arch", "manjaro", "endeavouros", "garuda", "instantos"];

/// Which package backend a host uses.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PackageManagerKind {
    /// Debian family.
    Apt,
    /// Fedora/RHEL family.
    Dnf,
    /// macOS.
    Brew,
    /// Arch family.
    Pacman,
}

impl PackageManagerKind {
    /// Executable that must be present for this backend.
    pub fn executable(&self) -> &'static str {
        match self {
            Self::Apt => "apt",
            Self::Dnf => "dnf",
            Self::Brew => "brew",
            Self::Pacman => "pacman",
        }
    }

    /// Human-readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Apt => "APT",
            Self::Dnf => "DNF",
            Self::Brew => "Homebrew",
            Self::Pacman => "Pacman",
        }
    }

    /// Backend for a detected host, `None` if the distro is unknown.
    ///
    /// Derivatives not listed by ID are matched through their `ID_LIKE`
    /// parents.
    pub fn for_system(system: &SystemInfo) -> Option<Self> {
        Self::for_names(&system.os_name, &system.distro_name).or_else(|| {
            system
                .distro_like
                .iter()
                .find_map(|parent| Self::for_names(&system.os_name, parent))
        })
    }

    /// Backend for an OS/distro pair as reported by host detection.
    pub fn for_names(os_name: &str, distro_name: &str) -> Option<Self> {
        match os_name {
            "macos" => Some(Self::Brew),
            "linux" => {
                let distro = distro_name.to_ascii_lowercase();
                if DEBIAN_FAMILY.contains(&distro.as_str()) {
                    Some(Self::Apt)
                } else if FEDORA_FAMILY.contains(&distro.as_str()) {
                    Some(Self::Dnf)
                } else if ARCH_FAMILY.contains(&distro.as_str()) {
                    Some(Self::Pacman)
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

/// One concrete backend, dispatched statically.
pub enum Backend {
    /// APT.
    Apt(AptPackageManager),
    /// DNF.
    Dnf(DnfPackageManager),
    /// Homebrew.
    Brew(BrewPackageManager),
    /// Pacman.
    Pacman(PacmanPackageManager),
}

impl Backend {
    /// Build the backend for `kind`.
    pub fn new(kind: PackageManagerKind, ctx: PackageContext) -> Self {
        match kind {
            PackageManagerKind::Apt => Self::Apt(AptPackageManager::new(ctx)),
            PackageManagerKind::Dnf => Self::Dnf(DnfPackageManager::new(ctx)),
            PackageManagerKind::Brew => Self::Brew(BrewPackageManager::new(ctx)),
            PackageManagerKind::Pacman => Self::Pacman(PacmanPackageManager::new(ctx)),
        }
    }

    /// Which backend this is.
    pub fn kind(&self) -> PackageManagerKind {
        match self {
            Self::Apt(_) => PackageManagerKind::Apt,
            Self::Dnf(_) => PackageManagerKind::Dnf,
            Self::Brew(_) => PackageManagerKind::Brew,
            Self::Pacman(_) => PackageManagerKind::Pacman,
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $pm:ident => $call:expr) => {
        match $self {
            Backend::Apt($pm) => $call,
            Backend::Dnf($pm) => $call,
            Backend::Brew($pm) => $call,
            Backend::Pacman($pm) => $call,
        }
    };
}

#[async_trait]
impl PackageManager for Backend {
    async fn info(&self) -> Result<PackageManagerInfo> {
        dispatch!(self, pm => pm.info().await)
    }

    async fn install(&self, package: &RequestedPackageInfo) -> Result<()> {
        dispatch!(self, pm => pm.install(package).await)
    }

    async fn uninstall(&self, package: &PackageInfo) -> Result<()> {
        dispatch!(self, pm => pm.uninstall(package).await)
    }

    async fn list_installed(&self) -> Result<Vec<PackageInfo>> {
        dispatch!(self, pm => pm.list_installed().await)
    }

    async fn is_installed(&self, package: &PackageInfo) -> Result<bool> {
        dispatch!(self, pm => pm.is_installed(package).await)
    }

    async fn package_version(&self, name: &str) -> Result<String> {
        dispatch!(self, pm => pm.package_version(name).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commander::to_args;
    use crate::escalator::Escalator;
    use crate::package::DisplayMode;
    use crate::testing::{FakeCommander, FakeProgramQuery};
    use std::sync::Arc;
    use strum::IntoEnumIterator;

    #[test]
    fn test_for_names() {
        assert_eq!(
            PackageManagerKind::for_names("macos", "macos"),
            Some(PackageManagerKind::Brew)
        );
        assert_eq!(
            PackageManagerKind::for_names("linux", "ubuntu"),
            Some(PackageManagerKind::Apt)
        );
        assert_eq!(
            PackageManagerKind::for_names("linux", "Fedora"),
            Some(PackageManagerKind::Dnf)
        );
        assert_eq!(
            PackageManagerKind::for_names("linux", "manjaro"),
            Some(PackageManagerKind::Pacman)
        );
        assert_eq!(PackageManagerKind::for_names("linux", "gentoo"), None);
        assert_eq!(PackageManagerKind::for_names("windows", ""), None);
    }

    #[test]
    fn test_for_system_uses_id_like() {
        let system = SystemInfo {
            os_name: "linux".to_string(),
            distro_name: "neon".to_string(),
            distro_like: vec!["ubuntu".to_string(), "debian".to_string()],
            ..Default::default()
        };
        assert_eq!(
            PackageManagerKind::for_system(&system),
            Some(PackageManagerKind::Apt)
        );

        let system = SystemInfo {
            distro_like: Vec::new(),
            ..system
        };
        assert_eq!(PackageManagerKind::for_system(&system), None);
    }

    #[test]
    fn test_kind_strings() {
        for kind in PackageManagerKind::iter() {
            assert_eq!(kind.to_string(), kind.executable());
            assert_eq!(kind.to_string().parse::<PackageManagerKind>().unwrap(), kind);
        }
        assert_eq!(PackageManagerKind::Brew.display_name(), "Homebrew");
    }

    #[tokio::test]
    async fn test_backend_dispatches_to_kind() {
        let commander = Arc::new(FakeCommander::as_root());
        let programs = Arc::new(FakeProgramQuery::new());
        let escalator = Arc::new(Escalator::new(commander.clone(), programs.clone()));
        let ctx = PackageContext::new(commander.clone(), escalator, programs, DisplayMode::Progress);

        for kind in PackageManagerKind::iter() {
            assert_eq!(Backend::new(kind, ctx.clone()).kind(), kind);
        }

        let backend = Backend::new(PackageManagerKind::Dnf, ctx);
        backend
            .install(&RequestedPackageInfo::new("git"))
            .await
            .unwrap();
        assert_eq!(
            commander.commands(),
            vec![to_args(&["dnf", "install", "-y", "git"])]
        );
    }
}
