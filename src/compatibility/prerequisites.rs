//! Prerequisite program checks.

use super::config::PrerequisiteConfig;
use crate::error::{Error, Result};
use crate::program::ProgramQuery;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Outcome for one prerequisite.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrerequisiteDetail {
    /// Display name.
    pub name: String,
    /// Executable that was looked up.
    pub command: String,
    /// Whether it was found.
    pub available: bool,
    /// What it is needed for.
    pub description: String,
    /// How to get it.
    pub install_hint: String,
}

/// Outcome of checking a prerequisite list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrerequisiteStatus {
    /// Names found, in declaration order.
    pub available: Vec<String>,
    /// Names not found, in declaration order.
    pub missing: Vec<String>,
    /// Per-name details.
    pub details: BTreeMap<String, PrerequisiteDetail>,
}

impl PrerequisiteStatus {
    /// Record one outcome.
    pub fn record(&mut self, prerequisite: &PrerequisiteConfig, available: bool) {
        let name = prerequisite.name.clone();
        if available {
            self.available.push(name.clone());
        } else {
            self.missing.push(name.clone());
        }
        self.details.insert(
            name.clone(),
            PrerequisiteDetail {
                name,
                command: prerequisite.command.clone(),
                available,
                description: prerequisite.description.clone(),
                install_hint: prerequisite.install_hint.clone(),
            },
        );
    }

    /// `Err(MissingPrerequisites)` if anything is missing.
    pub fn ensure_complete(&self) -> Result<()> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingPrerequisites {
                names: self.missing.clone(),
            })
        }
    }
}

/// Checks a prerequisite list against the host.
#[async_trait]
pub trait PrerequisiteChecker: Send + Sync {
    /// Probe every prerequisite; absence is recorded, not raised.
    async fn check(&self, prerequisites: &[PrerequisiteConfig]) -> PrerequisiteStatus;
}

/// Looks prerequisites up with a [`ProgramQuery`].
pub struct ProgramPrerequisiteChecker {
    programs: Arc<dyn ProgramQuery>,
}

impl ProgramPrerequisiteChecker {
    /// Checker backed by `programs`.
    pub fn new(programs: Arc<dyn ProgramQuery>) -> Self {
        Self { programs }
    }
}

#[async_trait]
impl PrerequisiteChecker for ProgramPrerequisiteChecker {
    async fn check(&self, prerequisites: &[PrerequisiteConfig]) -> PrerequisiteStatus {
        let mut status = PrerequisiteStatus::default();
        for prerequisite in prerequisites {
            let available = self.programs.program_exists(&prerequisite.command);
            debug!(
                prerequisite = %prerequisite.name,
                command = %prerequisite.command,
                available,
                "checked prerequisite"
            );
            status.record(prerequisite, available);
        }
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeProgramQuery;

    fn prerequisite(name: &str, command: &str) -> PrerequisiteConfig {
        PrerequisiteConfig {
            name: name.to_string(),
            command: command.to_string(),
            description: format!("{} description", name),
            install_hint: format!("install {}", name),
        }
    }

    #[tokio::test]
    async fn test_records_available_and_missing() {
        let checker =
            ProgramPrerequisiteChecker::new(Arc::new(FakeProgramQuery::new().with_program("git")));
        let status = checker
            .check(&[
                prerequisite("git", "git"),
                prerequisite("homebrew", "brew"),
                prerequisite("curl", "curl"),
            ])
            .await;

        assert_eq!(status.available, vec!["git"]);
        assert_eq!(status.missing, vec!["homebrew", "curl"]);
        assert!(status.details["git"].available);
        assert_eq!(status.details["homebrew"].command, "brew");
        assert_eq!(status.details["homebrew"].install_hint, "install homebrew");

        let err = status.ensure_complete().unwrap_err();
        assert_eq!(err.to_string(), "missing prerequisites: homebrew, curl");
    }

    #[tokio::test]
    async fn test_empty_list_is_complete() {
        let checker = ProgramPrerequisiteChecker::new(Arc::new(FakeProgramQuery::new()));
        let status = checker.check(&[]).await;
        assert!(status.ensure_complete().is_ok());
        assert!(status.details.is_empty());
    }
}
