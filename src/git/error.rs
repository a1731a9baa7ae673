//! worktree-hub error types and formatting
//!
//! **`GitError`** is a typed enum for domain errors that can be pattern-matched
//! and tested. Use `.into()` to convert to `anyhow::Error` while preserving the
//! type for pattern matching. Display produces styled output for users and
//! always includes git's own stderr, which usually names the exact conflict.

use std::path::PathBuf;
use std::time::Duration;

use color_print::{cformat, cwrite};

use crate::path::format_path_for_display;
use crate::styling::{ERROR_EMOJI, HINT_EMOJI, format_with_gutter};

/// Marker git prints when `worktree remove` refuses a dirty worktree.
pub(crate) const DIRTY_WORKTREE_MARKER: &str = "contains modified or untracked files";

/// Domain errors for git and worktree operations.
///
/// # Usage
///
/// ```ignore
/// match repo.remove(&path, false) {
///     Err(GitError::DirtyWorktree { .. }) => offer_force_retry(),
///     Err(e) => return Err(e.into()),
///     Ok(()) => {}
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum GitError {
    // Command runner
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },
    SpawnFailed {
        command: String,
        error: String,
    },
    CommandTimeout {
        command: String,
        timeout: Duration,
    },
    OutputTooLarge {
        command: String,
        limit: usize,
    },

    // Parsing
    ParseError {
        message: String,
    },

    // Worktree lifecycle
    DirtyWorktree {
        path: PathBuf,
        stderr: String,
    },
    WorktreeAddFailed {
        branch: String,
        path: PathBuf,
        error: String,
    },
    WorktreeRemovalFailed {
        path: PathBuf,
        error: String,
    },
    ConcurrentMutationRejected {
        repo_root: PathBuf,
    },

    Other {
        message: String,
    },
}

impl GitError {
    /// Raw stderr captured from git, when the error carries it.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            GitError::CommandFailed { stderr, .. } | GitError::DirtyWorktree { stderr, .. } => {
                Some(stderr)
            }
            GitError::WorktreeAddFailed { error, .. }
            | GitError::WorktreeRemovalFailed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// True for a timeout, so callers can offer a retry with a longer bound.
    pub fn is_timeout(&self) -> bool {
        matches!(self, GitError::CommandTimeout { .. })
    }
}

impl std::error::Error for GitError {}

impl std::fmt::Display for GitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitError::CommandFailed {
                command,
                exit_code,
                stderr,
            } => {
                let code = exit_code
                    .map(|c| format!(" (exit code {c})"))
                    .unwrap_or_default();
                let header = cformat!("{ERROR_EMOJI} <red><bold>{command}</> failed{code}</>");
                write!(f, "{}", format_error_block(header, stderr))
            }

            GitError::SpawnFailed { command, error } => {
                cwrite!(
                    f,
                    "{ERROR_EMOJI} <red>Could not run <bold>{command}</>: {error}</>\n\n{HINT_EMOJI} <dim>Check that git is installed and on PATH</>"
                )
            }

            GitError::CommandTimeout { command, timeout } => {
                let secs = timeout.as_secs_f64();
                cwrite!(
                    f,
                    "{ERROR_EMOJI} <red><bold>{command}</> timed out after {secs:.1}s</>\n\n{HINT_EMOJI} <dim>Retry with a longer command-timeout-ms</>"
                )
            }

            GitError::OutputTooLarge { command, limit } => {
                cwrite!(
                    f,
                    "{ERROR_EMOJI} <red><bold>{command}</> produced more than {limit} bytes of output</>"
                )
            }

            GitError::DirtyWorktree { path, stderr } => {
                let path_display = format_path_for_display(path);
                let header = cformat!(
                    "{ERROR_EMOJI} <red>Worktree at <bold>{path_display}</> has modified or untracked files</>"
                );
                write!(f, "{}", format_error_block(header, stderr))?;
                cwrite!(f, "\n\n{HINT_EMOJI} <dim>Commit or stash them, or remove with --force</>")
            }

            GitError::WorktreeAddFailed {
                branch,
                path,
                error,
            } => {
                let path_display = format_path_for_display(path);
                let header = cformat!(
                    "{ERROR_EMOJI} <red>Failed to create worktree for <bold>{branch}</> at <bold>{path_display}</></>"
                );
                write!(f, "{}", format_error_block(header, error))
            }

            GitError::WorktreeRemovalFailed { path, error } => {
                let path_display = format_path_for_display(path);
                let header = cformat!(
                    "{ERROR_EMOJI} <red>Failed to remove worktree at <bold>{path_display}</></>"
                );
                write!(f, "{}", format_error_block(header, error))
            }

            GitError::ConcurrentMutationRejected { repo_root } => {
                let path_display = format_path_for_display(repo_root);
                cwrite!(
                    f,
                    "{ERROR_EMOJI} <red>Another worktree operation is running in <bold>{path_display}</></>\n\n{HINT_EMOJI} <dim>Wait for it to finish, or set mutation-policy = \"queue\"</>"
                )
            }

            GitError::ParseError { message } | GitError::Other { message } => {
                cwrite!(f, "{ERROR_EMOJI} <red>{message}</>")
            }
        }
    }
}

/// Format an error with header and gutter content
fn format_error_block(header: String, error: &str) -> String {
    let trimmed = error.trim();
    if trimmed.is_empty() {
        header
    } else {
        format!("{header}\n{}", format_with_gutter(trimmed, None))
    }
}
