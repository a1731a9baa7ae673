//! The git process boundary.

use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use super::GitError;
use crate::config::Settings;
use crate::shell_exec::{Cmd, DEFAULT_MAX_OUTPUT_BYTES};

/// Both streams of a successful git call, trailing newlines trimmed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitOutput {
    pub stdout: String,
    /// Some reports (`worktree prune --dry-run --verbose`) only go here.
    pub stderr: String,
}

impl From<String> for GitOutput {
    fn from(stdout: String) -> Self {
        Self {
            stdout,
            stderr: String::new(),
        }
    }
}

/// Runs one git subcommand.
///
/// Implementations must pass `args` as an argument array, never through a
/// shell. `timeout` of `None` means the implementation's default.
pub trait CommandRunner: Send + Sync {
    fn run_output(
        &self,
        args: &[String],
        cwd: &Path,
        timeout: Option<Duration>,
    ) -> Result<GitOutput, GitError>;

    /// Stdout only; what almost every caller wants.
    fn run(&self, args: &[String], cwd: &Path, timeout: Option<Duration>)
    -> Result<String, GitError> {
        self.run_output(args, cwd, timeout).map(|output| output.stdout)
    }
}

/// [`CommandRunner`] that spawns the `git` executable.
#[derive(Debug, Clone)]
pub struct GitRunner {
    program: String,
    default_timeout: Duration,
    max_output: usize,
}

impl Default for GitRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl GitRunner {
    pub fn new() -> Self {
        Self {
            program: "git".to_string(),
            default_timeout: Duration::from_secs(30),
            max_output: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            default_timeout: settings.command_timeout(),
            max_output: settings.max_output_bytes,
            ..Self::new()
        }
    }

    /// Use a different executable, e.g. an absolute path to git.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

impl CommandRunner for GitRunner {
    fn run_output(
        &self,
        args: &[String],
        cwd: &Path,
        timeout: Option<Duration>,
    ) -> Result<GitOutput, GitError> {
        let timeout = timeout.unwrap_or(self.default_timeout);
        let cmd = Cmd::new(&self.program)
            .args(args.iter().cloned())
            .current_dir(cwd)
            .context(context_name(cwd))
            .timeout(timeout)
            .max_output(self.max_output);
        let command = cmd.display();

        let output = cmd.run().map_err(|e| match e.kind() {
            ErrorKind::TimedOut => GitError::CommandTimeout {
                command: command.clone(),
                timeout,
            },
            ErrorKind::FileTooLarge => GitError::OutputTooLarge {
                command: command.clone(),
                limit: self.max_output,
            },
            _ => GitError::SpawnFailed {
                command: command.clone(),
                error: e.to_string(),
            },
        })?;

        if !output.status.success() {
            return Err(GitError::CommandFailed {
                command,
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let trimmed = |bytes: &[u8]| {
            String::from_utf8_lossy(bytes)
                .trim_end_matches(['\n', '\r'])
                .to_string()
        };
        Ok(GitOutput {
            stdout: trimmed(&output.stdout),
            stderr: trimmed(&output.stderr),
        })
    }
}

fn context_name(cwd: &Path) -> String {
    cwd.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| cwd.display().to_string())
}
