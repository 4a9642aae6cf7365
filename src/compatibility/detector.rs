//! Host detection: OS, distribution, version and architecture.

use crate::commander::{to_args, Commander, RunOptions};
use crate::error::Result;
use crate::filesystem::FileSystem;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

const OS_RELEASE_PATHS: &[&str] = &["/etc/os-release", "/usr/lib/os-release"];

/// Distro name reported when `/etc/os-release` is missing or has no `ID`.
pub const UNKNOWN_DISTRO: &str = "unknown";

/// What a [`SystemDetector`] found.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DetectedSystem {
    /// `linux`, `macos`, `windows`, ...
    pub os_name: String,
    /// os-release `ID` on Linux, `macos` on macOS, else the OS name.
    pub distro_name: String,
    /// os-release `VERSION_ID` or macOS product version, if known.
    pub distro_version: Option<String>,
    /// os-release `ID_LIKE` entries, used for backend family fallback.
    pub distro_like: Vec<String>,
    /// CPU architecture, e.g. `x86_64` or `aarch64`.
    pub arch: String,
}

/// Identifies the host.
#[async_trait]
pub trait SystemDetector: Send + Sync {
    /// Detect the running system.
    async fn detect_system(&self) -> Result<DetectedSystem>;
}

/// Fields of interest from an os-release file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OsRelease {
    /// `ID`
    pub id: Option<String>,
    /// `VERSION_ID`
    pub version_id: Option<String>,
    /// `ID_LIKE`, split on whitespace.
    pub id_like: Vec<String>,
}

/// Parse `KEY=value` lines, unquoting values.
pub fn parse_os_release(content: &str) -> OsRelease {
    let mut release = OsRelease::default();
    for line in content.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"').trim_matches('\'');
        match key {
            "ID" => release.id = Some(value.to_ascii_lowercase()),
            "VERSION_ID" => release.version_id = Some(value.to_string()),
            "ID_LIKE" => {
                release.id_like = value.split_whitespace().map(str::to_string).collect();
            }
            _ => {}
        }
    }
    release
}

/// Detects the machine this process runs on.
pub struct HostDetector {
    commander: Arc<dyn Commander>,
    fs: Arc<dyn FileSystem>,
    os_name: String,
    arch: String,
}

impl HostDetector {
    /// Detector for the compile-time OS and architecture.
    pub fn new(commander: Arc<dyn Commander>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            commander,
            fs,
            os_name: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }

    /// Pretend to run on `os_name`/`arch`.
    pub fn with_target(mut self, os_name: impl Into<String>, arch: impl Into<String>) -> Self {
        self.os_name = os_name.into();
        self.arch = arch.into();
        self
    }

    fn read_os_release(&self) -> Option<OsRelease> {
        OS_RELEASE_PATHS.iter().find_map(|path| {
            let path = Path::new(path);
            if !self.fs.exists(path) {
                return None;
            }
            match self.fs.read_to_string(path) {
                Ok(content) => Some(parse_os_release(&content)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "cannot read os-release");
                    None
                }
            }
        })
    }

    async fn macos_version(&self) -> Option<String> {
        let result = self
            .commander
            .run(
                "sw_vers",
                &to_args(&["-productVersion"]),
                &RunOptions::new().capture(),
            )
            .await
            .and_then(|r| r.check("sw_vers"));
        match result {
            Ok(r) => Some(r.as_string()).filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(error = %e, "cannot read macOS version");
                None
            }
        }
    }
}

#[async_trait]
impl SystemDetector for HostDetector {
    async fn detect_system(&self) -> Result<DetectedSystem> {
        let mut system = DetectedSystem {
            os_name: self.os_name.clone(),
            distro_name: self.os_name.clone(),
            arch: self.arch.clone(),
            ..Default::default()
        };

        match self.os_name.as_str() {
            "linux" => {
                let release = self.read_os_release().unwrap_or_default();
                system.distro_name = release.id.unwrap_or_else(|| UNKNOWN_DISTRO.to_string());
                system.distro_version = release.version_id;
                system.distro_like = release.id_like;
            }
            "macos" => system.distro_version = self.macos_version().await,
            _ => {}
        }

        debug!(
            os = %system.os_name,
            distro = %system.distro_name,
            version = ?system.distro_version,
            arch = %system.arch,
            "detected system"
        );
        Ok(system)
    }
}
