//! External process execution on the tokio process layer

use crate::core::error::{Error, Result};
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// How a command is handed to the OS
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    /// Interpreted by the platform shell
    Shell(String),
    /// Program and arguments, no shell involved
    Argv(Vec<String>),
}

/// A command about to run, as seen by `pre_exec_process`/`post_exec_process`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub command: CommandLine,
    pub cwd: Option<PathBuf>,
}

impl ProcessSpec {
    pub fn shell(command: impl Into<String>) -> Self {
        Self {
            command: CommandLine::Shell(command.into()),
            cwd: None,
        }
    }

    pub fn argv(args: Vec<String>) -> Self {
        Self {
            command: CommandLine::Argv(args),
            cwd: None,
        }
    }

    /// Working directory; an empty path means the current one
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        let cwd = cwd.into();
        self.cwd = (!cwd.as_os_str().is_empty()).then_some(cwd);
        self
    }

    fn command(&self, merge_stderr: bool) -> Result<Command> {
        let mut command = match &self.command {
            CommandLine::Shell(line) => shell_command(line, merge_stderr),
            CommandLine::Argv(args) => {
                let (program, rest) = args.split_first().ok_or_else(|| {
                    Error::config("Cannot execute an empty argument list.")
                })?;
                let mut command = Command::new(program);
                command.args(rest);
                command
            }
        };
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }
        command.kill_on_drop(true);
        Ok(command)
    }
}

#[cfg(unix)]
fn shell_command(line: &str, merge_stderr: bool) -> Command {
    let mut command = Command::new("sh");
    if merge_stderr {
        command.arg("-c").arg(format!("exec 2>&1\n{}", line));
    } else {
        command.arg("-c").arg(line);
    }
    command
}

#[cfg(windows)]
fn shell_command(line: &str, merge_stderr: bool) -> Command {
    let mut command = Command::new("cmd");
    if merge_stderr {
        command.arg("/C").arg(format!("{} 2>&1", line));
    } else {
        command.arg("/C").arg(line);
    }
    command
}

impl fmt::Display for ProcessSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.command {
            CommandLine::Shell(line) => write!(f, "{}", line),
            CommandLine::Argv(args) => write!(f, "{}", args.join(" ")),
        }
    }
}

/// What to do with the child's stderr when capturing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StderrMode {
    /// Capture into its own buffer
    Separate,
    /// Drop it
    Discard,
    /// Interleave into stdout
    Merge,
}

/// Output of a captured run; `None` for streams that were not captured
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captured {
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub retcode: i32,
}

/// Spawns processes under a timeout
#[derive(Debug, Clone, Copy)]
pub struct ProcessRunner {
    timeout_secs: u64,
}

impl ProcessRunner {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }

    /// Run with inherited stdio and return the exit code. A child killed by
    /// a signal reports `-1`.
    pub async fn run(&self, spec: &ProcessSpec) -> Result<i32> {
        debug!("Executing `{}`", spec);
        let mut command = spec.command(false)?;
        let mut child = command.spawn().map_err(|e| Error::Spawn {
            command: spec.to_string(),
            reason: e.to_string(),
        })?;

        let status = timeout(self.limit(), child.wait())
            .await
            .map_err(|_| self.timed_out(spec))?
            .map_err(|e| Error::Spawn {
                command: spec.to_string(),
                reason: e.to_string(),
            })?;

        Ok(status.code().unwrap_or(-1))
    }

    /// Run and capture output as lossy UTF-8
    pub async fn capture(
        &self,
        spec: &ProcessSpec,
        capture_stdout: bool,
        stderr: StderrMode,
    ) -> Result<Captured> {
        debug!("Capturing `{}` (stderr: {:?})", spec, stderr);
        let shell_merge = stderr == StderrMode::Merge && matches!(spec.command, CommandLine::Shell(_));
        let mut command = spec.command(shell_merge)?;

        // Merged output has to be read even when stdout itself is not kept
        let pipe_stdout = capture_stdout || stderr == StderrMode::Merge;
        command.stdin(Stdio::null());
        command.stdout(if pipe_stdout { Stdio::piped() } else { Stdio::null() });
        command.stderr(match stderr {
            StderrMode::Discard => Stdio::null(),
            StderrMode::Merge if shell_merge => Stdio::null(),
            _ => Stdio::piped(),
        });

        let child = command.spawn().map_err(|e| Error::Spawn {
            command: spec.to_string(),
            reason: e.to_string(),
        })?;

        let output = timeout(self.limit(), child.wait_with_output())
            .await
            .map_err(|_| self.timed_out(spec))?
            .map_err(|e| Error::Spawn {
                command: spec.to_string(),
                reason: e.to_string(),
            })?;

        let out = String::from_utf8_lossy(&output.stdout).into_owned();
        let err = String::from_utf8_lossy(&output.stderr).into_owned();
        let retcode = output.status.code().unwrap_or(-1);

        let (stdout, stderr) = match stderr {
            StderrMode::Separate => (capture_stdout.then_some(out), Some(err)),
            StderrMode::Discard => (capture_stdout.then_some(out), None),
            StderrMode::Merge if shell_merge => (Some(out), None),
            StderrMode::Merge => (Some(out + &err), None),
        };

        Ok(Captured {
            stdout,
            stderr,
            retcode,
        })
    }

    fn limit(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn timed_out(&self, spec: &ProcessSpec) -> Error {
        Error::Timeout {
            command: spec.to_string(),
            secs: self.timeout_secs,
        }
    }
}
