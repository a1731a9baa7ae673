//! Git operations and repository management

use std::path::{Path, PathBuf};

// Submodules
mod error;
mod parse;
mod repository;
mod runner;

// Re-exports from submodules
pub use error::GitError;
pub use parse::{parse_prune_report, parse_status, parse_worktree_list};
pub use repository::{
    BranchCleanup, LockOutcome, MutationHook, PrunePlan, RemoveOutcome, Repository,
};
pub use runner::{CommandRunner, GitOutput, GitRunner};

#[cfg(test)]
pub(crate) use runner::testing;

/// One git worktree, as reported by `git worktree list --porcelain`.
///
/// Records are never edited in place: every refresh parses a fresh set and
/// swaps the whole snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct WorktreeRecord {
    pub path: PathBuf,
    /// Full commit hash; empty for a bare repository entry.
    pub head: String,
    /// Branch name without `refs/heads/`; `None` when detached.
    pub branch: Option<String>,
    pub detached: bool,
    pub bare: bool,
    pub is_main: bool,
    pub locked: bool,
    pub lock_reason: Option<String>,
    pub prunable: bool,
    pub prunable_reason: Option<String>,
}

impl WorktreeRecord {
    /// Abbreviated commit hash for display.
    pub fn short_head(&self) -> &str {
        let end = self.head.len().min(8);
        &self.head[..end]
    }

    /// Whether this record describes `path`, comparing canonical forms.
    pub fn is_at(&self, path: &Path) -> bool {
        crate::path::canonical_or_raw(&self.path) == crate::path::canonical_or_raw(path)
    }
}

/// Working-tree state of one worktree, from `git status --porcelain -b`.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct StatusSummary {
    pub branch: String,
    pub upstream: Option<String>,
    pub ahead: u32,
    pub behind: u32,
    pub staged: u32,
    pub modified: u32,
    pub untracked: u32,
}

impl StatusSummary {
    /// Any staged, modified or untracked file.
    pub fn is_dirty(&self) -> bool {
        self.staged > 0 || self.modified > 0 || self.untracked > 0
    }
}

/// Find the record for `path` in a listing.
pub fn find_worktree<'a>(records: &'a [WorktreeRecord], path: &Path) -> Option<&'a WorktreeRecord> {
    records.iter().find(|r| r.is_at(path))
}
