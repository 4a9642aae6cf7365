//! Program presence and version probing.
//!
//! - [`ProgramQuery`]: lookup seam used by the escalator, OS manager and
//!   installers
//! - [`SystemProgramQuery`]: PATH lookup with fallbacks, versions via `--version`
//! - [`parse_version`], [`lenient_version`], [`whitespace_field`]: parsing helpers

mod parser;
mod path_finder;

pub use parser::{lenient_version, parse_version, whitespace_field};

use crate::commander::{CommandResult, Commander, RunOptions};
use crate::environment::Environment;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Caller-supplied extraction of a version string from raw `--version` output.
pub type VersionParser = dyn Fn(&str) -> Result<String> + Send + Sync;

/// Looks up programs and their versions.
#[async_trait]
pub trait ProgramQuery: Send + Sync {
    /// Full path of `name`, or [`Error::MissingProgram`].
    fn program_path(&self, name: &str) -> Result<PathBuf>;

    /// Whether `name` can be found.
    fn program_exists(&self, name: &str) -> bool {
        self.program_path(name).is_ok()
    }

    /// Run `name --version` and extract a version with `parser`.
    async fn program_version(&self, name: &str, parser: &VersionParser) -> Result<String>;
}

/// [`ProgramQuery`] over the real PATH, running versions through a [`Commander`].
pub struct SystemProgramQuery {
    commander: Arc<dyn Commander>,
    home: Option<PathBuf>,
}

impl SystemProgramQuery {
    /// Create a query whose home-directory fallbacks come from `HOME` in `env`.
    pub fn new(commander: Arc<dyn Commander>, env: &dyn Environment) -> Self {
        Self {
            commander,
            home: env.var("HOME").filter(|h| !h.is_empty()).map(PathBuf::from),
        }
    }
}

#[async_trait]
impl ProgramQuery for SystemProgramQuery {
    fn program_path(&self, name: &str) -> Result<PathBuf> {
        path_finder::find_executable(name, self.home.as_deref()).ok_or_else(|| {
            Error::MissingProgram {
                name: name.to_string(),
            }
        })
    }

    async fn program_version(&self, name: &str, parser: &VersionParser) -> Result<String> {
        let path = self.program_path(name)?;
        let output = run_version(self.commander.as_ref(), &path).await?;
        debug!(program = name, output = %output.trim(), "version output");
        parser(&output)
    }
}

/// Run `<path> --version`, preferring stdout and falling back to stderr.
async fn run_version(commander: &dyn Commander, path: &Path) -> Result<String> {
    let program = path.to_string_lossy();
    let result: CommandResult = commander
        .run(&program, &["--version".to_string()], &RunOptions::new().capture())
        .await?
        .check(&program)?;

    // Some tools write their version to stderr
    let out = if !result.stdout.is_empty() {
        result.stdout
    } else {
        result.stderr
    };
    String::from_utf8(out).map_err(|_| Error::Parse {
        what: format!("{} version", program),
        message: "output is not valid UTF-8".to_string(),
    })
}
