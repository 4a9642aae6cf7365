//! Per-invocation options for [`Commander::run`](super::Commander::run).

use std::path::{Path, PathBuf};

/// How a child's stdout/stderr are handled. Exactly one is in effect per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum OutputMode {
    /// Buffer both streams into the result.
    Capture,
    /// Send both streams to a null sink.
    Discard,
    /// Forward both streams to the parent's streams as they arrive.
    Stream,
    /// Inherit the terminal for stdin while teeing output into the result.
    ///
    /// Only stdin is a terminal. Stdout and stderr are pipes, so children
    /// that check `isatty` on them fall back to non-interactive output.
    InteractiveCapture,
}

/// Options for one invocation.
///
/// Options compose with builder methods. When several output modes are
/// requested the effective one is chosen by [`RunOptions::output_mode`]:
/// interactive capture, then capture, then stream, then discard. With no
/// output mode requested, output is captured.
///
/// # Example
///
/// ```rust
/// use devstrap::{OutputMode, RunOptions};
///
/// let opts = RunOptions::new()
///     .stream()
///     .capture()
///     .input("alice ALL=(ALL) NOPASSWD:ALL\n")
///     .env("LC_ALL", "C");
/// assert_eq!(opts.output_mode(), OutputMode::Capture);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    capture: bool,
    discard: bool,
    stream: bool,
    interactive: bool,
    input: Option<Vec<u8>>,
    env: Vec<(String, String)>,
    working_dir: Option<PathBuf>,
}

impl RunOptions {
    /// Options with nothing set (captures output).
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect stdout and stderr into the result.
    pub fn capture(mut self) -> Self {
        self.capture = true;
        self
    }

    /// Silence both streams.
    pub fn discard(mut self) -> Self {
        self.discard = true;
        self
    }

    /// Forward the child's streams to ours live.
    pub fn stream(mut self) -> Self {
        self.stream = true;
        self
    }

    /// Attach the child's stdin to the terminal while still capturing its
    /// output. Stdout and stderr reach the child as pipes, not a tty; see
    /// [`OutputMode::InteractiveCapture`].
    pub fn interactive_capture(mut self) -> Self {
        self.interactive = true;
        self
    }

    /// Feed `input` to the child's stdin, then close it.
    pub fn input(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Overlay one environment variable. Later entries win.
    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((name.into(), value.into()));
        self
    }

    /// Run the child in `dir` instead of the current directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// The single output mode in effect.
    pub fn output_mode(&self) -> OutputMode {
        if self.interactive {
            OutputMode::InteractiveCapture
        } else if self.capture {
            OutputMode::Capture
        } else if self.stream {
            OutputMode::Stream
        } else if self.discard {
            OutputMode::Discard
        } else {
            OutputMode::Capture
        }
    }

    /// Bytes to write to stdin, if any.
    pub fn stdin_input(&self) -> Option<&[u8]> {
        self.input.as_deref()
    }

    /// Environment overlay in insertion order.
    pub fn env_overlay(&self) -> &[(String, String)] {
        &self.env
    }

    /// Working directory override.
    pub fn working_directory(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_capture() {
        assert_eq!(RunOptions::new().output_mode(), OutputMode::Capture);
    }

    #[test]
    fn test_capture_wins_over_stream() {
        let opts = RunOptions::new().stream().capture();
        assert_eq!(opts.output_mode(), OutputMode::Capture);
        let opts = RunOptions::new().capture().stream();
        assert_eq!(opts.output_mode(), OutputMode::Capture);
    }

    #[test]
    fn test_stream_and_discard() {
        assert_eq!(RunOptions::new().stream().output_mode(), OutputMode::Stream);
        assert_eq!(RunOptions::new().discard().output_mode(), OutputMode::Discard);
        assert_eq!(
            RunOptions::new().discard().stream().output_mode(),
            OutputMode::Stream
        );
    }

    #[test]
    fn test_interactive_capture_dominates() {
        let opts = RunOptions::new().capture().discard().interactive_capture();
        assert_eq!(opts.output_mode(), OutputMode::InteractiveCapture);
    }

    #[test]
    fn test_env_overlay_keeps_order() {
        let opts = RunOptions::new().env("A", "1").env("A", "2");
        assert_eq!(
            opts.env_overlay(),
            &[
                ("A".to_string(), "1".to_string()),
                ("A".to_string(), "2".to_string())
            ]
        );
    }

    #[test]
    fn test_input_and_working_dir() {
        let opts = RunOptions::new().input("data").working_dir("/tmp");
        assert_eq!(opts.stdin_input(), Some(&b"data"[..]));
        assert_eq!(opts.working_directory(), Some(Path::new("/tmp")));
    }

    #[test]
    fn test_output_mode_display() {
        assert_eq!(OutputMode::InteractiveCapture.to_string(), "interactive_capture");
    }
}
