//! Error types shared by every layer of the bootstrapper.
//!
//! Each layer wraps lower-level failures with a message prefix via
//! [`ResultExt::context`], so a failed install surfaces as e.g.
//! `failed to install package git: apt exited with code 100: ...`.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced while probing the host, running commands, or managing
/// packages.
///
/// # Example
///
/// ```rust
/// use devstrap::Error;
///
/// fn report(error: &Error) {
///     eprintln!("error: {}", error);
///     if let Some(fix) = error.fix_suggestion() {
///         eprintln!("hint: {}", fix);
///     }
/// }
/// ```
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The child process could not be started at all.
    #[error("failed to start {program}: {source}")]
    Spawn {
        /// Program that was being executed.
        program: String,
        /// Underlying I/O error from the spawn attempt.
        #[source]
        source: std::io::Error,
    },

    /// The child ran to completion but exited unsuccessfully.
    #[error("{program} exited with code {exit_code}{}", stderr_suffix(.stderr))]
    NonZeroExit {
        /// Program that was executed (after escalation wrapping).
        program: String,
        /// Exit code reported by the child; `-1` if none was available.
        exit_code: i32,
        /// Captured standard error, empty when output was not captured.
        stderr: String,
    },

    /// Command output did not have the expected shape.
    #[error("failed to parse {what}: {message}")]
    Parse {
        /// What was being parsed (e.g. "apt version").
        what: String,
        /// Description of the mismatch.
        message: String,
    },

    /// A required external program is not installed.
    #[error("program not found: {name}")]
    MissingProgram {
        /// Executable name that was looked up.
        name: String,
    },

    /// The compatibility check rejected the host.
    #[error("{message}")]
    UnsupportedPlatform {
        /// Full rejection message.
        message: String,
    },

    /// One or more prerequisite programs are absent.
    #[error("missing prerequisites: {}", .names.join(", "))]
    MissingPrerequisites {
        /// Names of the missing prerequisites, in declaration order.
        names: Vec<String>,
    },

    /// A package was queried but is not installed.
    #[error("package {name} is not installed")]
    PackageNotInstalled {
        /// Package name.
        name: String,
    },

    /// A tool installed without error but is still not usable.
    #[error("verification failed: {tool} is not available after installation")]
    VerificationFailed {
        /// Tool that was being installed.
        tool: String,
    },

    /// Caller-supplied input was rejected.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The invocation was aborted through a cancellation signal.
    #[error("{program} was cancelled")]
    Cancelled {
        /// Program that was running when cancellation fired.
        program: String,
    },

    /// Reading a file failed.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// File being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A configuration document could not be loaded or validated.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A lower-level error with a contextual prefix.
    #[error("{message}: {source}")]
    Context {
        /// Prefix describing the operation that failed.
        message: String,
        /// The wrapped error.
        #[source]
        source: Box<Error>,
    },
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}

impl Error {
    /// Wrap this error with a contextual message prefix.
    pub fn context(self, message: impl Into<String>) -> Self {
        Self::Context {
            message: message.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping any [`Error::Context`] layers.
    pub fn root_cause(&self) -> &Error {
        match self {
            Self::Context { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Whether this error (at any depth) is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root_cause(), Self::Cancelled { .. })
    }

    /// Get an actionable suggestion for fixing this error, when one exists.
    ///
    /// # Example
    ///
    /// ```rust
    /// use devstrap::Error;
    ///
    /// let error = Error::MissingProgram { name: "gpg".to_string() };
    /// assert!(error.fix_suggestion().unwrap().contains("gpg"));
    /// ```
    pub fn fix_suggestion(&self) -> Option<String> {
        match self.root_cause() {
            Self::Spawn { program, source } => match source.kind() {
                std::io::ErrorKind::NotFound => {
                    Some(format!("Install {} or add it to PATH", program))
                }
                std::io::ErrorKind::PermissionDenied => {
                    Some(format!("Check that {} is executable", program))
                }
                _ => None,
            },
            Self::NonZeroExit { program, .. } if program == "sudo" || program == "doas" => Some(
                "Run once interactively so the escalator can authenticate, or configure passwordless access"
                    .to_string(),
            ),
            Self::MissingProgram { name } => Some(format!("Install {} and make sure it is on PATH", name)),
            Self::MissingPrerequisites { names } => {
                Some(format!("Install the missing programs: {}", names.join(", ")))
            }
            Self::VerificationFailed { .. } => Some(
                "Restart your terminal so PATH changes take effect, then retry".to_string(),
            ),
            Self::Config(_) => Some("Check the configuration file syntax".to_string()),
            _ => None,
        }
    }
}

/// Extension trait adding contextual prefixes to crate results.
pub trait ResultExt<T> {
    /// Prefix the error (if any) with `message`.
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Prefix the error (if any) with a lazily built message.
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(message))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| e.context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonzero_exit_display_includes_stderr() {
        let error = Error::NonZeroExit {
            program: "apt".to_string(),
            exit_code: 100,
            stderr: "E: Unable to locate package nope\n".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "apt exited with code 100: E: Unable to locate package nope"
        );
    }

    #[test]
    fn test_nonzero_exit_display_without_stderr() {
        let error = Error::NonZeroExit {
            program: "dnf".to_string(),
            exit_code: 1,
            stderr: String::new(),
        };
        assert_eq!(error.to_string(), "dnf exited with code 1");
    }

    #[test]
    fn test_context_chain_display() {
        let result: Result<()> = Err(Error::NonZeroExit {
            program: "sudo".to_string(),
            exit_code: 1,
            stderr: String::new(),
        });
        let error = result
            .context("failed to install package git")
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            "failed to install package git: sudo exited with code 1"
        );
        assert!(matches!(error.root_cause(), Error::NonZeroExit { .. }));
        assert!(error.fix_suggestion().is_some());
    }

    #[test]
    fn test_missing_prerequisites_display() {
        let error = Error::MissingPrerequisites {
            names: vec!["curl".to_string(), "git".to_string()],
        };
        assert_eq!(error.to_string(), "missing prerequisites: curl, git");
    }

    #[test]
    fn test_is_cancelled_through_context() {
        let error = Error::Cancelled {
            program: "apt".to_string(),
        }
        .context("failed to update package index");
        assert!(error.is_cancelled());
    }

    #[test]
    fn test_spawn_not_found_fix() {
        let error = Error::Spawn {
            program: "brew".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(error.fix_suggestion().unwrap().contains("brew"));
        assert!(error.to_string().starts_with("failed to start brew"));
    }
}
