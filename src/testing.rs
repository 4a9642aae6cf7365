//! In-memory fakes for the external-effect seams.
//!
//! These let the escalator, OS manager, package managers and installers be
//! exercised without spawning processes or touching the host:
//!
//! - [`FakeCommander`] records every invocation and answers from scripted rules
//! - [`FakeProgramQuery`] reports a fixed set of programs and version outputs
//! - [`MemoryFileSystem`] and [`MemoryEnvironment`] hold files and variables
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use devstrap::testing::{FakeCommander, FakeProgramQuery};
//! use devstrap::{to_args, CommandResult, Escalator, EscalationMethod};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let commander = Arc::new(FakeCommander::with_sudo());
//!     commander.on("sudo", &["apt", "update"], CommandResult::ok(""));
//!     let programs = Arc::new(FakeProgramQuery::new().with_program("sudo"));
//!     let escalator = Escalator::new(commander.clone(), programs);
//!
//!     let plan = escalator.escalate("apt", &to_args(&["update"])).await.unwrap();
//!     assert_eq!(plan.method, EscalationMethod::Sudo);
//! }
//! ```

use crate::commander::{CommandResult, Commander, OutputMode, RunOptions};
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::filesystem::FileSystem;
use crate::program::{ProgramQuery, VersionParser};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One recorded [`Commander::run`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program that was spawned.
    pub command: String,
    /// Its arguments.
    pub args: Vec<String>,
    /// Bytes fed to stdin, if any.
    pub input: Option<Vec<u8>>,
    /// Effective output mode.
    pub mode: OutputMode,
    /// Environment overlay.
    pub env: Vec<(String, String)>,
}

impl Invocation {
    /// `command` followed by `args`.
    pub fn command_line(&self) -> Vec<String> {
        let mut line = vec![self.command.clone()];
        line.extend(self.args.iter().cloned());
        line
    }

    /// Stdin decoded as UTF-8, if any was given.
    pub fn input_string(&self) -> Option<String> {
        self.input
            .as_ref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Whether this is `id -u` or an escalator `-n true` probe.
    pub fn is_escalation_probe(&self) -> bool {
        (self.command == "id" && self.args == ["-u"]) || self.args == ["-n", "true"]
    }
}

type Handler = Box<dyn Fn(&Invocation) -> Result<CommandResult> + Send + Sync>;

struct Rule {
    command: String,
    args: Option<Vec<String>>,
    handler: Handler,
}

/// Scripted [`Commander`].
///
/// Rules are matched newest first; an invocation with no matching rule
/// succeeds with empty output.
#[derive(Default)]
pub struct FakeCommander {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<Invocation>>,
}

impl FakeCommander {
    /// No rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// `id -u` answers `0`.
    pub fn as_root() -> Self {
        let fake = Self::new();
        fake.on("id", &["-u"], CommandResult::ok("0\n"));
        fake
    }

    /// `id -u` answers `1000`.
    pub fn unprivileged() -> Self {
        let fake = Self::new();
        fake.on("id", &["-u"], CommandResult::ok("1000\n"));
        fake
    }

    /// Unprivileged with passwordless `sudo -n true`.
    pub fn with_sudo() -> Self {
        let fake = Self::unprivileged();
        fake.on("sudo", &["-n", "true"], CommandResult::ok(""));
        fake
    }

    /// Answer `command` with exactly `args` using `result`.
    pub fn on(&self, command: &str, args: &[&str], result: CommandResult) -> &Self {
        self.push_rule(
            command,
            Some(args.iter().map(|a| a.to_string()).collect()),
            Box::new(move |_| Ok(result.clone())),
        )
    }

    /// Answer `command` with any arguments using `result`.
    pub fn on_any(&self, command: &str, result: CommandResult) -> &Self {
        self.push_rule(command, None, Box::new(move |_| Ok(result.clone())))
    }

    /// Answer `command` (any arguments) by calling `handler`.
    pub fn handle<F>(&self, command: &str, handler: F) -> &Self
    where
        F: Fn(&Invocation) -> Result<CommandResult> + Send + Sync + 'static,
    {
        self.push_rule(command, None, Box::new(handler))
    }

    /// Make `command` fail to spawn as if it were not installed.
    pub fn fail_spawn(&self, command: &str) -> &Self {
        let program = command.to_string();
        self.push_rule(
            command,
            None,
            Box::new(move |_| {
                Err(Error::Spawn {
                    program: program.clone(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                })
            }),
        )
    }

    /// Every invocation so far, in order.
    pub fn calls(&self) -> Vec<Invocation> {
        lock(&self.calls).clone()
    }

    /// Command lines of every invocation that is not an escalation probe.
    pub fn commands(&self) -> Vec<Vec<String>> {
        lock(&self.calls)
            .iter()
            .filter(|c| !c.is_escalation_probe())
            .map(Invocation::command_line)
            .collect()
    }

    fn push_rule(&self, command: &str, args: Option<Vec<String>>, handler: Handler) -> &Self {
        lock(&self.rules).push(Rule {
            command: command.to_string(),
            args,
            handler,
        });
        self
    }
}

#[async_trait]
impl Commander for FakeCommander {
    async fn run(
        &self,
        command: &str,
        args: &[String],
        options: &RunOptions,
    ) -> Result<CommandResult> {
        let invocation = Invocation {
            command: command.to_string(),
            args: args.to_vec(),
            input: options.stdin_input().map(<[u8]>::to_vec),
            mode: options.output_mode(),
            env: options.env_overlay().to_vec(),
        };
        lock(&self.calls).push(invocation.clone());

        let rules = lock(&self.rules);
        let rule = rules.iter().rev().find(|rule| {
            rule.command == command
                && rule.args.as_ref().map_or(true, |expected| expected == args)
        });
        match rule {
            Some(rule) => (rule.handler)(&invocation),
            None => Ok(CommandResult::ok("")),
        }
    }
}

/// [`ProgramQuery`] over a fixed set of programs.
#[derive(Debug, Clone, Default)]
pub struct FakeProgramQuery {
    programs: BTreeMap<String, PathBuf>,
    versions: BTreeMap<String, String>,
}

impl FakeProgramQuery {
    /// No programs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `name` at `/usr/bin/<name>`.
    pub fn with_program(self, name: &str) -> Self {
        let path = Path::new("/usr/bin").join(name);
        self.with_program_at(name, path)
    }

    /// Report `name` at `path`.
    pub fn with_program_at(mut self, name: &str, path: impl Into<PathBuf>) -> Self {
        self.programs.insert(name.to_string(), path.into());
        self
    }

    /// Report `name` with the given raw `--version` output.
    pub fn with_version(mut self, name: &str, output: &str) -> Self {
        self.versions.insert(name.to_string(), output.to_string());
        if self.programs.contains_key(name) {
            self
        } else {
            self.with_program(name)
        }
    }
}

#[async_trait]
impl ProgramQuery for FakeProgramQuery {
    fn program_path(&self, name: &str) -> Result<PathBuf> {
        self.programs
            .get(name)
            .cloned()
            .ok_or_else(|| Error::MissingProgram {
                name: name.to_string(),
            })
    }

    async fn program_version(&self, name: &str, parser: &VersionParser) -> Result<String> {
        self.program_path(name)?;
        let output = self.versions.get(name).ok_or_else(|| Error::Parse {
            what: format!("{} version", name),
            message: "no version output".to_string(),
        })?;
        parser(output)
    }
}

/// [`FileSystem`] held in memory.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: Mutex<BTreeMap<PathBuf, String>>,
    executables: Mutex<BTreeSet<PathBuf>>,
    temp_files: AtomicUsize,
}

impl MemoryFileSystem {
    /// Empty filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`MemoryFileSystem::insert`].
    pub fn with_file(self, path: impl Into<PathBuf>, contents: &str) -> Self {
        self.insert(path, contents);
        self
    }

    /// Create or replace a file.
    pub fn insert(&self, path: impl Into<PathBuf>, contents: &str) {
        lock(&self.files).insert(path.into(), contents.to_string());
    }

    /// Mark `path` as an existing executable.
    pub fn mark_executable(&self, path: impl Into<PathBuf>) {
        lock(&self.executables).insert(path.into());
    }

    /// Current contents of `path`.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<String> {
        lock(&self.files).get(path.as_ref()).cloned()
    }
}

impl FileSystem for MemoryFileSystem {
    fn exists(&self, path: &Path) -> bool {
        lock(&self.files).contains_key(path) || lock(&self.executables).contains(path)
    }

    fn is_executable(&self, path: &Path) -> bool {
        lock(&self.executables).contains(path)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        lock(&self.files)
            .get(path)
            .cloned()
            .ok_or_else(|| Error::Io {
                path: path.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
    }

    fn write(&self, path: &Path, contents: &str) -> Result<()> {
        self.insert(path, contents);
        Ok(())
    }

    fn append(&self, path: &Path, contents: &str) -> Result<()> {
        lock(&self.files)
            .entry(path.to_path_buf())
            .or_default()
            .push_str(contents);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        lock(&self.executables).remove(path);
        match lock(&self.files).remove(path) {
            Some(_) => Ok(()),
            None => Err(Error::Io {
                path: path.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }),
        }
    }

    /// Files are named `/tmp/<prefix><n>` with `n` counting up from 0.
    fn create_temp_file(&self, prefix: &str, contents: &str) -> Result<PathBuf> {
        let n = self.temp_files.fetch_add(1, Ordering::Relaxed);
        let path = PathBuf::from(format!("/tmp/{}{}", prefix, n));
        self.insert(path.clone(), contents);
        Ok(path)
    }
}

/// [`Environment`] held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryEnvironment {
    vars: BTreeMap<String, String>,
}

impl MemoryEnvironment {
    /// No variables set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` to `value`.
    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.vars.insert(name.to_string(), value.to_string());
        self
    }
}

impl Environment for MemoryEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}
