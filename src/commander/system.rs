//! [`Commander`] backed by real child processes.

use super::{CancelSignal, CommandResult, Commander, OutputMode, RunOptions};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tracing::{debug, warn};

/// How long a cancelled child gets between SIGTERM and SIGKILL by default.
pub const DEFAULT_TERMINATION_GRACE: Duration = Duration::from_secs(5);

const READ_CHUNK: usize = 8 * 1024;

/// Runs commands with `tokio::process`.
///
/// # Example
///
/// ```rust,no_run
/// use devstrap::{to_args, Commander, RunOptions, SystemCommander};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> devstrap::Result<()> {
///     let commander = SystemCommander::new();
///     let result = commander
///         .run("id", &to_args(&["-u"]), &RunOptions::new().capture())
///         .await?;
///     println!("uid = {}", result.as_string());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SystemCommander {
    cancel: Option<CancelSignal>,
    grace: Duration,
}

impl Default for SystemCommander {
    fn default() -> Self {
        Self {
            cancel: None,
            grace: DEFAULT_TERMINATION_GRACE,
        }
    }
}

impl SystemCommander {
    /// A commander with no cancellation signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort running children when `signal` fires.
    pub fn with_cancellation(mut self, signal: CancelSignal) -> Self {
        self.cancel = Some(signal);
        self
    }

    /// Time between SIGTERM and SIGKILL for cancelled children.
    pub fn with_termination_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }
}

#[async_trait]
impl Commander for SystemCommander {
    async fn run(
        &self,
        command: &str,
        args: &[String],
        options: &RunOptions,
    ) -> Result<CommandResult> {
        if command.is_empty() {
            return Err(Error::InvalidInput("command must not be empty".to_string()));
        }
        if self.cancel.as_ref().is_some_and(CancelSignal::is_cancelled) {
            return Err(Error::Cancelled {
                program: command.to_string(),
            });
        }

        let mode = options.output_mode();
        debug!(command, ?args, %mode, "running command");

        let mut cmd = Command::new(command);
        cmd.args(args).kill_on_drop(true);
        for (name, value) in options.env_overlay() {
            cmd.env(name, value);
        }
        if let Some(dir) = options.working_directory() {
            cmd.current_dir(dir);
        }

        let (stdout, stderr) = match mode {
            OutputMode::Capture | OutputMode::InteractiveCapture => (Stdio::piped(), Stdio::piped()),
            OutputMode::Stream => (Stdio::inherit(), Stdio::inherit()),
            OutputMode::Discard => (Stdio::null(), Stdio::null()),
        };
        let stdin = if options.stdin_input().is_some() {
            Stdio::piped()
        } else if matches!(mode, OutputMode::Stream | OutputMode::InteractiveCapture) {
            Stdio::inherit()
        } else {
            Stdio::null()
        };
        cmd.stdin(stdin).stdout(stdout).stderr(stderr);

        let mut child = cmd.spawn().map_err(|source| Error::Spawn {
            program: command.to_string(),
            source,
        })?;

        let outcome = match self.cancel.clone() {
            None => Some(drive(&mut child, options.stdin_input(), mode).await),
            Some(mut signal) => tokio::select! {
                res = drive(&mut child, options.stdin_input(), mode) => Some(res),
                _ = signal.cancelled() => None,
            },
        };

        match outcome {
            Some(Ok(result)) => {
                debug!(command, exit_code = result.exit_code, "command finished");
                Ok(result)
            }
            Some(Err(source)) => Err(Error::Spawn {
                program: command.to_string(),
                source,
            }),
            None => {
                warn!(command, "cancellation requested, terminating child");
                terminate(&mut child, self.grace).await;
                Err(Error::Cancelled {
                    program: command.to_string(),
                })
            }
        }
    }
}

/// Feed stdin, drain both output pipes, then reap the child.
async fn drive(
    child: &mut Child,
    input: Option<&[u8]>,
    mode: OutputMode,
) -> std::io::Result<CommandResult> {
    let tee = mode == OutputMode::InteractiveCapture;
    let stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (_, out, err) = futures::future::try_join3(
        feed(stdin, input),
        collect(stdout, tee.then(tokio::io::stdout)),
        collect(stderr, tee.then(tokio::io::stderr)),
    )
    .await?;

    let status = child.wait().await?;
    Ok(CommandResult::new(out, err, exit_code(status)))
}

async fn feed(stdin: Option<ChildStdin>, input: Option<&[u8]>) -> std::io::Result<()> {
    let (Some(mut pipe), Some(input)) = (stdin, input) else {
        return Ok(());
    };
    match pipe.write_all(input).await {
        // The child exited without reading everything; its exit code tells the story.
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => return Ok(()),
        other => other?,
    }
    // Dropping the pipe closes the child's stdin.
    drop(pipe);
    Ok(())
}

async fn collect<R, W>(pipe: Option<R>, mut echo: Option<W>) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let Some(mut pipe) = pipe else {
        return Ok(Vec::new());
    };
    let mut captured = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let n = pipe.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        if let Some(writer) = echo.as_mut() {
            writer.write_all(&chunk[..n]).await?;
            writer.flush().await?;
        }
        captured.extend_from_slice(&chunk[..n]);
    }
    Ok(captured)
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    signal_exit_code(status).unwrap_or(-1)
}

#[cfg(unix)]
fn signal_exit_code(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal().map(|sig| 128 + sig)
}

#[cfg(not(unix))]
fn signal_exit_code(_status: ExitStatus) -> Option<i32> {
    None
}

/// SIGTERM, wait up to `grace`, then SIGKILL.
async fn terminate(child: &mut Child, grace: Duration) {
    if request_termination(child)
        && tokio::time::timeout(grace, child.wait()).await.is_ok()
    {
        return;
    }
    if let Err(e) = child.kill().await {
        warn!(error = %e, "failed to kill child process");
    }
}

#[cfg(unix)]
fn request_termination(child: &Child) -> bool {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return false;
    };
    match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        Ok(()) => true,
        Err(e) => {
            debug!(pid, error = %e, "SIGTERM failed");
            false
        }
    }
}

#[cfg(not(unix))]
fn request_termination(_child: &Child) -> bool {
    false
}
