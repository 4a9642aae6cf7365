//! The declarative OS/distribution support matrix.

use crate::error::{Error, Result};
use semver::VersionReq;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const EMBEDDED: &str = include_str!("compatibility.yaml");

/// Where to load the matrix from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CompatibilitySource {
    /// The matrix compiled into the binary.
    #[default]
    Embedded,
    /// A YAML file on disk.
    File(PathBuf),
}

/// Support matrix keyed by OS name (`linux`, `macos`, `windows`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompatibilityConfig {
    /// Per-OS entries.
    pub operating_systems: BTreeMap<String, OsConfig>,
}

/// Support entry for one operating system.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OsConfig {
    /// Whether the OS can be bootstrapped at all.
    #[serde(default)]
    pub supported: bool,
    /// Shown alongside a rejection.
    #[serde(default)]
    pub notes: String,
    /// Programs required on every distribution of this OS.
    #[serde(default)]
    pub prerequisites: Vec<PrerequisiteConfig>,
    /// Per-distribution entries, keyed by os-release `ID`.
    #[serde(default)]
    pub distributions: BTreeMap<String, DistroConfig>,
}

/// Support entry for one Linux distribution.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DistroConfig {
    /// Whether the distribution can be bootstrapped.
    #[serde(default)]
    pub supported: bool,
    /// Shown alongside a rejection.
    #[serde(default)]
    pub notes: String,
    /// Semver requirement on the distribution version, e.g. `>=20.4.0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_constraint: Option<String>,
    /// Replaces the OS-level prerequisites when non-empty.
    #[serde(default)]
    pub prerequisites: Vec<PrerequisiteConfig>,
}

/// A program that must be on PATH.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrerequisiteConfig {
    /// Display name.
    pub name: String,
    /// Executable looked up on PATH.
    pub command: String,
    /// What the program is needed for.
    #[serde(default)]
    pub description: String,
    /// How to get it.
    #[serde(default)]
    pub install_hint: String,
}

impl CompatibilityConfig {
    /// Load and validate the matrix from `source`.
    pub fn load(source: &CompatibilitySource) -> Result<Self> {
        match source {
            CompatibilitySource::Embedded => Self::embedded(),
            CompatibilitySource::File(path) => Self::from_file(path),
        }
    }

    /// The matrix compiled into the binary.
    pub fn embedded() -> Result<Self> {
        Self::from_yaml(EMBEDDED)
    }

    /// Read a YAML matrix from `path`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Parse and validate a YAML matrix.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)
            .map_err(|e| Error::Config(format!("compatibility matrix: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check structural rules serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.operating_systems.is_empty() {
            return Err(Error::Config(
                "compatibility matrix lists no operating systems".to_string(),
            ));
        }
        for (os, os_config) in &self.operating_systems {
            validate_prerequisites(os, &os_config.prerequisites)?;
            for (distro, distro_config) in &os_config.distributions {
                let scope = format!("{}/{}", os, distro);
                validate_prerequisites(&scope, &distro_config.prerequisites)?;
                if let Some(constraint) = &distro_config.version_constraint {
                    VersionReq::parse(constraint).map_err(|e| {
                        Error::Config(format!(
                            "{}: invalid version_constraint \"{}\": {}",
                            scope, constraint, e
                        ))
                    })?;
                }
            }
        }
        Ok(())
    }
}

fn validate_prerequisites(scope: &str, prerequisites: &[PrerequisiteConfig]) -> Result<()> {
    for prerequisite in prerequisites {
        if prerequisite.name.trim().is_empty() {
            return Err(Error::Config(format!(
                "{}: prerequisite without a name",
                scope
            )));
        }
        if prerequisite.command.trim().is_empty() {
            return Err(Error::Config(format!(
                "{}: prerequisite {} has no command",
                scope, prerequisite.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_embedded_matrix_is_valid() {
        let config = CompatibilityConfig::embedded().unwrap();
        assert!(config.operating_systems["linux"].supported);
        assert!(config.operating_systems["macos"].supported);

        let windows = &config.operating_systems["windows"];
        assert!(!windows.supported);
        assert_eq!(windows.notes, "Windows is not supported");

        let ubuntu = &config.operating_systems["linux"].distributions["ubuntu"];
        assert_eq!(ubuntu.version_constraint.as_deref(), Some(">=20.4.0"));
    }

    #[test]
    fn test_rejects_empty_matrix() {
        let err = CompatibilityConfig::from_yaml("operating_systems: {}\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_prerequisite_without_command() {
        let yaml = r#"
operating_systems:
  linux:
    supported: true
    prerequisites:
      - name: curl
        command: ""
"#;
        let err = CompatibilityConfig::from_yaml(yaml).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid configuration: linux: prerequisite curl has no command"
        );
    }

    #[test]
    fn test_rejects_bad_constraint() {
        let yaml = r#"
operating_systems:
  linux:
    supported: true
    distributions:
      ubuntu:
        supported: true
        version_constraint: "at least 20"
"#;
        let err = CompatibilityConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("linux/ubuntu: invalid version_constraint"));
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let config = CompatibilityConfig::from_yaml("operating_systems:\n  freebsd: {}\n").unwrap();
        let freebsd = &config.operating_systems["freebsd"];
        assert!(!freebsd.supported);
        assert!(freebsd.notes.is_empty());
        assert!(freebsd.distributions.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "operating_systems:\n  macos:\n    supported: true").unwrap();

        let source = CompatibilitySource::File(file.path().to_path_buf());
        let config = CompatibilityConfig::load(&source).unwrap();
        assert_eq!(config.operating_systems.len(), 1);

        let missing = CompatibilitySource::File(PathBuf::from("/nonexistent/compat.yaml"));
        assert!(matches!(
            CompatibilityConfig::load(&missing),
            Err(Error::Io { .. })
        ));
    }

    #[test]
    fn test_malformed_yaml() {
        assert!(matches!(
            CompatibilityConfig::from_yaml("operating_systems: [1, 2"),
            Err(Error::Config(_))
        ));
    }
}
