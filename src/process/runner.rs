//! Async external command execution with timeout.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;

/// Upper bound for a single existence probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Captured result of a finished external command.
///
/// A non-zero exit code is not an error at this level; callers decide what
/// a failed status means for them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output, lossily decoded and trimmed.
    pub stdout: String,
    /// Standard error, lossily decoded and trimmed.
    pub stderr: String,
    /// Exit code, `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    /// Build an output record from its three parts.
    ///
    /// # Example
    ///
    /// ```rust
    /// use feature_installer::CommandOutput;
    ///
    /// let out = CommandOutput::new("4.6", "", Some(0));
    /// assert!(out.success());
    /// assert!(out.is_clean());
    /// ```
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    /// True when the process exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// True when the process exited with status 0 and wrote nothing to stderr.
    ///
    /// Package installers report many failures on stderr while still
    /// exiting successfully, so installation steps use this stricter test.
    pub fn is_clean(&self) -> bool {
        self.success() && self.stderr.is_empty()
    }

    /// True when the shell reported that the program does not exist.
    ///
    /// POSIX shells exit with status 127 and print "not found" (or
    /// "No such file or directory") when the first word of a line cannot
    /// be resolved.
    ///
    /// # Example
    ///
    /// ```rust
    /// use feature_installer::CommandOutput;
    ///
    /// let out = CommandOutput::new("", "sh: 1: julius: not found", Some(127));
    /// assert!(out.is_command_not_found());
    /// assert!(!CommandOutput::new("", "not found", Some(1)).is_command_not_found());
    /// ```
    pub fn is_command_not_found(&self) -> bool {
        self.exit_code == Some(127)
            && (self.stderr.contains("not found") || self.stderr.contains("No such file or directory"))
    }
}

/// Errors raised while running an external command.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProcessError {
    /// The command line was empty or could not be tokenized.
    #[error("Empty or malformed command line: {command:?}")]
    EmptyCommand {
        /// The offending command line.
        command: String,
    },

    /// The command did not finish in time and was killed.
    #[error("Command timed out after {duration:?}: {command}")]
    Timeout {
        /// The command line that was running.
        command: String,
        /// How long the command was allowed to run.
        duration: Duration,
    },

    /// The process could not be started at all.
    #[error("Failed to execute {command}: {message}")]
    Spawn {
        /// The command line that failed to start.
        command: String,
        /// Underlying I/O error message.
        message: String,
    },
}

/// Capability to run external commands.
///
/// The engine and every platform backend talk to the operating system only
/// through this trait, which lets tests substitute a scripted runner.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Returns true iff the leading token of `command` can be spawned.
    ///
    /// The probe starts the program and terminates it immediately; it never
    /// blocks for longer than a short bound.
    async fn probe(&self, command: &str) -> bool;

    /// Run `command` to completion and capture its output.
    ///
    /// With `timeout` set, the process is killed once the duration elapses
    /// and [`ProcessError::Timeout`] is returned. With `None`, the call waits
    /// for the program to exit on its own.
    ///
    /// On Unix the line goes through `sh -c`, so a missing program is not a
    /// [`ProcessError::Spawn`]: the shell exits with status 127 instead, see
    /// [`CommandOutput::is_command_not_found`]. `Spawn` only reports a shell
    /// that cannot start, or a missing program on Windows.
    async fn run(&self, command: &str, timeout: Option<Duration>) -> Result<CommandOutput, ProcessError>;
}

/// [`CommandRunner`] backed by real child processes.
///
/// On Unix-like systems the command line is handed to `sh -c` so that quoted
/// package specifications (`'numpy>=1.2'`) keep their meaning. On Windows
/// the line is split into words and executed directly.
///
/// # Example
///
/// ```rust,no_run
/// use feature_installer::{CommandRunner, ProcessRunner};
/// use std::time::Duration;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let runner = ProcessRunner::new();
///     if runner.probe("git").await {
///         let out = runner.run("git --version", Some(Duration::from_secs(5))).await;
///         println!("{:?}", out);
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    probe_timeout: Duration,
}

impl ProcessRunner {
    /// Create a runner with the default probe bound.
    pub fn new() -> Self {
        Self {
            probe_timeout: PROBE_TIMEOUT,
        }
    }

    /// Create a runner with a custom probe bound.
    pub fn with_probe_timeout(probe_timeout: Duration) -> Self {
        Self { probe_timeout }
    }

    fn build_command(command: &str) -> Result<Command, ProcessError> {
        if command.trim().is_empty() {
            return Err(ProcessError::EmptyCommand {
                command: command.to_string(),
            });
        }

        if cfg!(windows) {
            let words = split_command(command)?;
            let mut cmd = Command::new(&words[0]);
            cmd.args(&words[1..]);
            Ok(cmd)
        } else {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command);
            Ok(cmd)
        }
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn probe(&self, command: &str) -> bool {
        let program = match split_command(command) {
            Ok(words) => words[0].clone(),
            Err(_) => return false,
        };

        let spawned = Command::new(&program)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();

        match spawned {
            Ok(mut child) => {
                // The program exists; stop it before it does anything.
                let _ = child.start_kill();
                let _ = timeout(self.probe_timeout, child.wait()).await;
                tracing::debug!(program = %program, "probe succeeded");
                true
            }
            Err(e) => {
                tracing::debug!(program = %program, error = %e, "probe failed");
                false
            }
        }
    }

    async fn run(&self, command: &str, limit: Option<Duration>) -> Result<CommandOutput, ProcessError> {
        let mut cmd = Self::build_command(command)?;
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(command = %command, "running");

        let spawn_error = |e: std::io::Error| ProcessError::Spawn {
            command: command.to_string(),
            message: e.to_string(),
        };

        let output = match limit {
            Some(duration) => timeout(duration, cmd.output())
                .await
                .map_err(|_| ProcessError::Timeout {
                    command: command.to_string(),
                    duration,
                })?
                .map_err(spawn_error)?,
            None => cmd.output().await.map_err(spawn_error)?,
        };

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            exit_code: output.status.code(),
        })
    }
}

/// Split a command line into words, rejecting empty lines.
pub(crate) fn split_command(command: &str) -> Result<Vec<String>, ProcessError> {
    let words = shell_words::split(command).map_err(|_| ProcessError::EmptyCommand {
        command: command.to_string(),
    })?;
    if words.is_empty() {
        return Err(ProcessError::EmptyCommand {
            command: command.to_string(),
        });
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_command() {
        let words = split_command("pip install 'numpy>=1.2' --user").unwrap();
        assert_eq!(words, vec!["pip", "install", "numpy>=1.2", "--user"]);
    }

    #[test]
    fn test_split_empty_command() {
        assert!(matches!(split_command("   "), Err(ProcessError::EmptyCommand { .. })));
        assert!(matches!(split_command("echo 'open"), Err(ProcessError::EmptyCommand { .. })));
    }

    #[test]
    fn test_output_clean_requires_empty_stderr() {
        assert!(CommandOutput::new("ok", "", Some(0)).is_clean());
        assert!(!CommandOutput::new("ok", "warning", Some(0)).is_clean());
        assert!(!CommandOutput::new("", "", Some(1)).is_clean());
        assert!(!CommandOutput::new("", "", None).success());
    }

    #[tokio::test]
    async fn test_probe_nonexistent() {
        let runner = ProcessRunner::new();
        assert!(!runner.probe("definitely_not_a_real_executable_12345 --help").await);
        assert!(!runner.probe("").await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_probe_existing() {
        let runner = ProcessRunner::new();
        assert!(runner.probe("sh -c 'exit 0'").await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_captures_streams() {
        let runner = ProcessRunner::new();
        let out = runner
            .run("echo hello; echo oops 1>&2; exit 3", Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(out.stdout, "hello");
        assert_eq!(out.stderr, "oops");
        assert_eq!(out.exit_code, Some(3));
        assert!(!out.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_missing_program_exits_127() {
        let runner = ProcessRunner::new();
        let out = runner
            .run("definitely_not_a_real_executable_12345 --help", Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert!(out.is_command_not_found(), "{out:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_accepts_shell_builtins() {
        let runner = ProcessRunner::new();
        let out = runner
            .run("X=1; export X; cd /tmp && true", Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert!(out.success());
        assert!(!out.is_command_not_found());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_timeout() {
        let runner = ProcessRunner::new();
        let result = runner.run("sleep 5", Some(Duration::from_millis(100))).await;
        assert!(matches!(result, Err(ProcessError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_run_empty_command() {
        let runner = ProcessRunner::new();
        let result = runner.run("", None).await;
        assert!(matches!(result, Err(ProcessError::EmptyCommand { .. })));
    }
}
