//! Progress reporting types for tool installation.
//!
//! [`InstallProgress`] represents the discrete stages [`run_installer`]
//! reports through its callback.
//!
//! [`run_installer`]: crate::install::run_installer

/// Stages of installing one tool.
///
/// # Example
///
/// ```rust
/// use devstrap::InstallProgress;
///
/// fn on_progress(progress: InstallProgress) {
///     match &progress {
///         InstallProgress::Started { tool } => println!("Setting up {}", tool),
///         InstallProgress::AlreadyInstalled { tool } => println!("{} already available", tool),
///         InstallProgress::Completed { tool } => println!("{} installed", tool),
///         other => println!("{}...", other.description()),
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallProgress {
    /// Installation has started.
    Started {
        /// Tool being installed.
        tool: String,
    },

    /// Probing whether the tool is already usable.
    CheckingAvailability,

    /// The tool was already usable; nothing was installed.
    AlreadyInstalled {
        /// Tool that was found.
        tool: String,
    },

    /// The package manager is installing the tool.
    Installing {
        /// Tool being installed.
        tool: String,
    },

    /// Checking that the tool is usable after installation.
    Verifying {
        /// Tool being verified.
        tool: String,
    },

    /// Installation completed successfully.
    Completed {
        /// Tool that was installed.
        tool: String,
    },
}

impl InstallProgress {
    /// Human-readable description of the stage.
    ///
    /// ```rust
    /// use devstrap::InstallProgress;
    ///
    /// assert_eq!(InstallProgress::CheckingAvailability.description(), "Checking availability");
    /// ```
    pub fn description(&self) -> &'static str {
        match self {
            Self::Started { .. } => "Starting installation",
            Self::CheckingAvailability => "Checking availability",
            Self::AlreadyInstalled { .. } => "Already installed",
            Self::Installing { .. } => "Installing",
            Self::Verifying { .. } => "Verifying installation",
            Self::Completed { .. } => "Installation complete",
        }
    }

    /// Whether this is a final stage.
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::AlreadyInstalled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> String {
        "gpg".to_string()
    }

    #[test]
    fn test_install_progress_description() {
        assert_eq!(
            InstallProgress::Started { tool: tool() }.description(),
            "Starting installation"
        );
        assert_eq!(
            InstallProgress::Installing { tool: tool() }.description(),
            "Installing"
        );
        assert_eq!(
            InstallProgress::Verifying { tool: tool() }.description(),
            "Verifying installation"
        );
        assert_eq!(
            InstallProgress::Completed { tool: tool() }.description(),
            "Installation complete"
        );
    }

    #[test]
    fn test_install_progress_is_complete() {
        assert!(InstallProgress::Completed { tool: tool() }.is_complete());
        assert!(InstallProgress::AlreadyInstalled { tool: tool() }.is_complete());
        assert!(!InstallProgress::Started { tool: tool() }.is_complete());
        assert!(!InstallProgress::CheckingAvailability.is_complete());
        assert!(!InstallProgress::Installing { tool: tool() }.is_complete());
        assert!(!InstallProgress::Verifying { tool: tool() }.is_complete());
    }
}
