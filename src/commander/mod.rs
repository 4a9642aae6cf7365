//! External process execution.
//!
//! Every program the bootstrapper launches goes through a [`Commander`].
//! The production implementation is [`SystemCommander`]; tests substitute
//! [`crate::testing::FakeCommander`].
//!
//! A non-zero exit is not an error at this layer: it is reported in
//! [`CommandResult::exit_code`]. Only a failure to start the process (or a
//! cancellation) produces an `Err`.

mod cancel;
mod options;
mod system;

pub use cancel::{cancellation, CancelHandle, CancelSignal};
pub use options::{OutputMode, RunOptions};
pub use system::{SystemCommander, DEFAULT_TERMINATION_GRACE};

use crate::error::{Error, Result};
use async_trait::async_trait;

/// Outcome of one process invocation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandResult {
    /// Captured standard output (empty unless output was captured).
    pub stdout: Vec<u8>,
    /// Captured standard error (empty unless output was captured).
    pub stderr: Vec<u8>,
    /// Exit code of the child. Signal terminations are reported as `128 + signal`.
    pub exit_code: i32,
}

impl CommandResult {
    /// Build a result from raw parts.
    pub fn new(stdout: impl Into<Vec<u8>>, stderr: impl Into<Vec<u8>>, exit_code: i32) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    /// A successful result with the given stdout.
    pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        Self::new(stdout, Vec::new(), 0)
    }

    /// A failed result with the given exit code and stderr.
    pub fn failed(exit_code: i32, stderr: impl Into<Vec<u8>>) -> Self {
        Self::new(Vec::new(), stderr, exit_code)
    }

    /// Whether the child exited with code zero.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout decoded as UTF-8 (lossily) and trimmed.
    pub fn as_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).trim().to_string()
    }

    /// Stderr decoded as UTF-8 (lossily) and trimmed.
    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }

    /// Convert a non-zero exit into [`Error::NonZeroExit`] attributed to `program`.
    pub fn check(self, program: &str) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(Error::NonZeroExit {
                program: program.to_string(),
                exit_code: self.exit_code,
                stderr: self.stderr_string(),
            })
        }
    }
}

/// Launches external programs.
#[async_trait]
pub trait Commander: Send + Sync {
    /// Run `command` with `args`, waiting for it to exit.
    ///
    /// `command` is resolved against PATH unless it is an absolute path.
    ///
    /// # Arguments
    ///
    /// - `command`: Program to spawn; must not be empty
    /// - `args`: Arguments, passed through without shell interpretation
    /// - `options`: Output mode, stdin input, environment overlay and working dir
    ///
    /// # Returns
    ///
    /// - `Ok(CommandResult)` once the child exited, whatever its exit code
    /// - `Err(Error::Spawn)` if the child could not be started
    /// - `Err(Error::Cancelled)` if cancellation fired while it ran
    async fn run(&self, command: &str, args: &[String], options: &RunOptions)
        -> Result<CommandResult>;
}

/// Convert a slice of string literals into owned arguments.
pub fn to_args(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}
