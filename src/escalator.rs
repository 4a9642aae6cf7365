//! Privilege escalation.
//!
//! The [`Escalator`] decides how a privileged command should be launched:
//! directly when already root, through `sudo` or `doas` when one of them works
//! without a password prompt, or directly as a last resort (which will most
//! likely fail with a permission error reported by the child).
//!
//! Escalators are tried in order from a list of [`EscalationCandidate`]s, so
//! supporting another tool only means adding a candidate.

use crate::commander::{to_args, CommandResult, Commander, RunOptions};
use crate::error::{Error, Result, ResultExt};
use crate::program::ProgramQuery;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// How a command ends up being run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EscalationMethod {
    /// Already running as root; no wrapping needed.
    None,
    /// Wrapped with `sudo`.
    Sudo,
    /// Wrapped with `doas`.
    Doas,
    /// No escalator available; run unprivileged and hope for the best.
    Direct,
}

/// The command line to execute after escalation.
///
/// For `sudo`/`doas`, `final_command` is the escalator and `final_args` is
/// the original command followed by its arguments. Otherwise both are the
/// originals unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscalationResult {
    /// Strategy that was selected.
    pub method: EscalationMethod,
    /// Program to spawn.
    pub final_command: String,
    /// Arguments to pass to `final_command`.
    pub final_args: Vec<String>,
    /// Whether the command was wrapped by an escalator.
    pub needs_escalation: bool,
}

impl EscalationResult {
    fn unwrapped(method: EscalationMethod, command: &str, args: &[String]) -> Self {
        Self {
            method,
            final_command: command.to_string(),
            final_args: args.to_vec(),
            needs_escalation: false,
        }
    }
}

/// One escalation tool: how to probe it and how to wrap a command with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationCandidate {
    /// Method reported when this candidate is selected.
    pub method: EscalationMethod,
    /// Executable name.
    pub program: &'static str,
}

impl EscalationCandidate {
    /// `sudo`
    pub const SUDO: Self = Self {
        method: EscalationMethod::Sudo,
        program: "sudo",
    };

    /// `doas`
    pub const DOAS: Self = Self {
        method: EscalationMethod::Doas,
        program: "doas",
    };

    /// The tool is usable if it is on PATH and `<tool> -n true` succeeds,
    /// i.e. no password prompt is needed in this session.
    pub async fn probe(&self, commander: &dyn Commander, programs: &dyn ProgramQuery) -> bool {
        if !programs.program_exists(self.program) {
            debug!(escalator = self.program, "not found in PATH");
            return false;
        }
        match commander
            .run(self.program, &to_args(&["-n", "true"]), &RunOptions::new().capture())
            .await
        {
            Ok(result) if result.success() => true,
            Ok(result) => {
                debug!(
                    escalator = self.program,
                    exit_code = result.exit_code,
                    "non-interactive probe failed"
                );
                false
            }
            Err(e) => {
                debug!(escalator = self.program, error = %e, "probe could not run");
                false
            }
        }
    }

    /// Prefix `command args...` with this tool.
    pub fn wrap(&self, command: &str, args: &[String]) -> EscalationResult {
        let mut final_args = Vec::with_capacity(args.len() + 1);
        final_args.push(command.to_string());
        final_args.extend_from_slice(args);
        EscalationResult {
            method: self.method,
            final_command: self.program.to_string(),
            final_args,
            needs_escalation: true,
        }
    }
}

/// Selects and applies a privilege escalation strategy.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use devstrap::{to_args, Escalator, ProcessEnvironment, RunOptions, SystemCommander, SystemProgramQuery};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> devstrap::Result<()> {
///     let commander = Arc::new(SystemCommander::new());
///     let programs = Arc::new(SystemProgramQuery::new(commander.clone(), &ProcessEnvironment));
///     let escalator = Escalator::new(commander, programs);
///
///     let plan = escalator.escalate("apt", &to_args(&["update"])).await?;
///     println!("{} {:?} via {}", plan.final_command, plan.final_args, plan.method);
///     Ok(())
/// }
/// ```
pub struct Escalator {
    commander: Arc<dyn Commander>,
    programs: Arc<dyn ProgramQuery>,
    candidates: Vec<EscalationCandidate>,
}

impl Escalator {
    /// Escalator trying `sudo`, then `doas`.
    pub fn new(commander: Arc<dyn Commander>, programs: Arc<dyn ProgramQuery>) -> Self {
        Self {
            commander,
            programs,
            candidates: vec![EscalationCandidate::SUDO, EscalationCandidate::DOAS],
        }
    }

    /// Replace the ordered candidate list.
    pub fn with_candidates(mut self, candidates: Vec<EscalationCandidate>) -> Self {
        self.candidates = candidates;
        self
    }

    /// Whether `id -u` reports uid 0.
    pub async fn is_running_as_root(&self) -> Result<bool> {
        let result = self
            .commander
            .run("id", &to_args(&["-u"]), &RunOptions::new().capture())
            .await
            .and_then(|r| r.check("id"))
            .context("failed to determine current user id")?;
        Ok(result.as_string() == "0")
    }

    /// Decide how to run `command args...` with root privileges.
    ///
    /// Only an empty `command` is an error; probe failures just rule a
    /// candidate out.
    ///
    /// # Arguments
    ///
    /// - `command`: Program needing root, e.g. `"apt"`
    /// - `args`: Its arguments
    ///
    /// # Returns
    ///
    /// - `Ok(EscalationResult)` with `method` `None` when already root,
    ///   `Sudo`/`Doas` when a candidate probes as usable, else `Direct`
    /// - `Err(Error::InvalidInput)` if `command` is empty
    pub async fn escalate(&self, command: &str, args: &[String]) -> Result<EscalationResult> {
        if command.is_empty() {
            return Err(Error::InvalidInput(
                "cannot escalate an empty command".to_string(),
            ));
        }

        match self.is_running_as_root().await {
            Ok(true) => {
                return Ok(EscalationResult::unwrapped(
                    EscalationMethod::None,
                    command,
                    args,
                ))
            }
            Ok(false) => {}
            Err(e) => warn!(error = %e, "could not check for root, assuming unprivileged"),
        }

        for candidate in &self.candidates {
            if candidate.probe(self.commander.as_ref(), self.programs.as_ref()).await {
                debug!(command, escalator = candidate.program, "escalating");
                return Ok(candidate.wrap(command, args));
            }
        }

        warn!(
            command,
            "no usable privilege escalator (sudo/doas); running directly"
        );
        Ok(EscalationResult::unwrapped(
            EscalationMethod::Direct,
            command,
            args,
        ))
    }

    /// Methods usable right now.
    ///
    /// `[None]` when root; otherwise every candidate that probes as usable,
    /// followed by `Direct`.
    pub async fn available_methods(&self) -> Result<Vec<EscalationMethod>> {
        if self.is_running_as_root().await? {
            return Ok(vec![EscalationMethod::None]);
        }
        let mut methods = Vec::new();
        for candidate in &self.candidates {
            if candidate.probe(self.commander.as_ref(), self.programs.as_ref()).await {
                methods.push(candidate.method);
            }
        }
        methods.push(EscalationMethod::Direct);
        Ok(methods)
    }

    /// Escalate and run, returning the raw result (non-zero exits included).
    pub async fn run(
        &self,
        command: &str,
        args: &[String],
        options: &RunOptions,
    ) -> Result<CommandResult> {
        let plan = self.escalate(command, args).await?;
        self.commander
            .run(&plan.final_command, &plan.final_args, options)
            .await
    }

    /// Escalate and run, turning a non-zero exit into an error.
    ///
    /// # Arguments
    ///
    /// - `command`: Program needing root
    /// - `args`: Its arguments
    /// - `options`: Passed unchanged to the [`Commander`]
    ///
    /// # Returns
    ///
    /// - `Ok(CommandResult)` if the (possibly wrapped) command exited 0
    /// - `Err(Error::NonZeroExit)` carrying the exit code and stderr otherwise
    pub async fn run_checked(
        &self,
        command: &str,
        args: &[String],
        options: &RunOptions,
    ) -> Result<CommandResult> {
        let plan = self.escalate(command, args).await?;
        self.commander
            .run(&plan.final_command, &plan.final_args, options)
            .await?
            .check(&plan.final_command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeCommander, FakeProgramQuery};
    use strum::IntoEnumIterator;

    fn escalator(commander: Arc<FakeCommander>, programs: FakeProgramQuery) -> Escalator {
        Escalator::new(commander, Arc::new(programs))
    }

    #[tokio::test]
    async fn test_root_runs_unwrapped() {
        let commander = Arc::new(FakeCommander::as_root());
        let esc = escalator(commander, FakeProgramQuery::new().with_program("sudo"));

        let args = to_args(&["install", "-y", "git"]);
        let plan = esc.escalate("apt", &args).await.unwrap();
        assert_eq!(plan.method, EscalationMethod::None);
        assert_eq!(plan.final_command, "apt");
        assert_eq!(plan.final_args, args);
        assert!(!plan.needs_escalation);
    }

    #[tokio::test]
    async fn test_sudo_wraps_command() {
        let commander = Arc::new(FakeCommander::with_sudo());
        let esc = escalator(commander, FakeProgramQuery::new().with_program("sudo"));

        let plan = esc.escalate("apt", &to_args(&["update"])).await.unwrap();
        assert_eq!(plan.method, EscalationMethod::Sudo);
        assert_eq!(plan.final_command, "sudo");
        assert_eq!(plan.final_args, vec!["apt", "update"]);
        assert!(plan.needs_escalation);
    }

    #[tokio::test]
    async fn test_sudo_needing_password_falls_back_to_doas() {
        let commander = Arc::new(FakeCommander::unprivileged());
        commander.on("sudo", &["-n", "true"], CommandResult::failed(1, "a password is required"));
        commander.on("doas", &["-n", "true"], CommandResult::ok(""));
        let esc = escalator(
            commander,
            FakeProgramQuery::new().with_program("sudo").with_program("doas"),
        );

        let plan = esc.escalate("tee", &to_args(&["/etc/shells"])).await.unwrap();
        assert_eq!(plan.method, EscalationMethod::Doas);
        assert_eq!(plan.final_command, "doas");
        assert_eq!(plan.final_args, vec!["tee", "/etc/shells"]);
    }

    #[tokio::test]
    async fn test_sudo_not_in_path_is_not_probed() {
        let commander = Arc::new(FakeCommander::unprivileged());
        let esc = escalator(commander.clone(), FakeProgramQuery::new());

        let plan = esc.escalate("usermod", &to_args(&["-s", "/bin/zsh", "bob"])).await.unwrap();
        assert_eq!(plan.method, EscalationMethod::Direct);
        assert_eq!(plan.final_command, "usermod");
        assert!(!plan.needs_escalation);
        assert!(commander.calls().iter().all(|c| c.command != "sudo"));
    }

    #[tokio::test]
    async fn test_root_check_failure_treated_as_non_root() {
        let commander = Arc::new(FakeCommander::new());
        commander.fail_spawn("id");
        commander.on("sudo", &["-n", "true"], CommandResult::ok(""));
        let esc = escalator(commander, FakeProgramQuery::new().with_program("sudo"));

        assert!(esc.is_running_as_root().await.is_err());
        let plan = esc.escalate("apt", &[]).await.unwrap();
        assert_eq!(plan.method, EscalationMethod::Sudo);
        assert_eq!(plan.final_args, vec!["apt"]);
    }

    #[tokio::test]
    async fn test_empty_command_is_error() {
        let esc = escalator(Arc::new(FakeCommander::as_root()), FakeProgramQuery::new());
        assert!(matches!(
            esc.escalate("", &[]).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_available_methods() {
        let esc = escalator(Arc::new(FakeCommander::as_root()), FakeProgramQuery::new());
        assert_eq!(
            esc.available_methods().await.unwrap(),
            vec![EscalationMethod::None]
        );

        let commander = Arc::new(FakeCommander::unprivileged());
        commander.on("sudo", &["-n", "true"], CommandResult::ok(""));
        commander.on("doas", &["-n", "true"], CommandResult::ok(""));
        let esc = escalator(
            commander,
            FakeProgramQuery::new().with_program("sudo").with_program("doas"),
        );
        assert_eq!(
            esc.available_methods().await.unwrap(),
            vec![
                EscalationMethod::Sudo,
                EscalationMethod::Doas,
                EscalationMethod::Direct
            ]
        );

        let esc = escalator(Arc::new(FakeCommander::unprivileged()), FakeProgramQuery::new());
        assert_eq!(
            esc.available_methods().await.unwrap(),
            vec![EscalationMethod::Direct]
        );
    }

    #[tokio::test]
    async fn test_custom_candidates_order() {
        let commander = Arc::new(FakeCommander::unprivileged());
        commander.on("sudo", &["-n", "true"], CommandResult::ok(""));
        commander.on("doas", &["-n", "true"], CommandResult::ok(""));
        let esc = escalator(
            commander,
            FakeProgramQuery::new().with_program("sudo").with_program("doas"),
        )
        .with_candidates(vec![EscalationCandidate::DOAS, EscalationCandidate::SUDO]);

        let plan = esc.escalate("apt", &[]).await.unwrap();
        assert_eq!(plan.method, EscalationMethod::Doas);
    }

    #[tokio::test]
    async fn test_run_checked_reports_escalator_exit() {
        let commander = Arc::new(FakeCommander::with_sudo());
        commander.on("sudo", &["apt", "update"], CommandResult::failed(100, "E: network"));
        let esc = escalator(commander, FakeProgramQuery::new().with_program("sudo"));

        let err = esc
            .run_checked("apt", &to_args(&["update"]), &RunOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NonZeroExit { ref program, exit_code: 100, .. } if program == "sudo"));
    }

    #[test]
    fn test_method_serde_and_display() {
        for method in EscalationMethod::iter() {
            let json = serde_json::to_string(&method).unwrap();
            assert_eq!(json, format!("\"{}\"", method));
            let back: EscalationMethod = serde_json::from_str(&json).unwrap();
            assert_eq!(back, method);
        }
        assert_eq!(EscalationMethod::Sudo.to_string(), "sudo");
    }
}
