//! Worktree operations against one repository.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use normalize_path::NormalizePath;

use super::error::DIRTY_WORKTREE_MARKER;
use super::{
    CommandRunner, GitError, StatusSummary, WorktreeRecord, find_worktree, parse_prune_report,
    parse_status, parse_worktree_list,
};
use crate::config::{MutationPolicy, Settings};
use crate::path::canonical_or_raw;
use crate::refresh::{RefreshController, RefreshTrigger};
use crate::status_cache::StatusCache;
use crate::sync::{RepoLocks, WriterGuard};

/// Result of the best-effort branch deletion that may follow a removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchCleanup {
    Deleted,
    /// Another worktree (possibly the main one) has the branch checked out.
    StillCheckedOut(PathBuf),
    /// Cleanup did not apply: forced removal, main or detached worktree.
    Skipped,
    /// git refused; carries its message. Never escalated to an error.
    Failed(String),
}

/// Outcome of [`Repository::remove_with_branch_cleanup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveOutcome {
    pub path: PathBuf,
    pub branch: Option<String>,
    pub branch_cleanup: BranchCleanup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    Changed,
    AlreadyLocked,
    NotLocked,
}

/// Called after every successful mutation, once the writer lock is released.
pub type MutationHook = Arc<dyn Fn() + Send + Sync>;

/// What `git worktree prune` would remove, as git's own dry-run reports it.
///
/// Only [`Repository::prune_preview`] builds one, so applying a prune always
/// follows a preview the caller could show for confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrunePlan {
    root: PathBuf,
    entries: Vec<String>,
}

impl PrunePlan {
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Facade over the `git worktree` subcommands for one repository root.
///
/// Reads (`list`, `status`) run freely. Mutations take the writer lock for
/// the canonical root from the process-wide [`RepoLocks`], so no two handles
/// for one repository interleave structural changes to `.git/worktrees`.
#[derive(Clone)]
pub struct Repository {
    root: PathBuf,
    runner: Arc<dyn CommandRunner>,
    settings: Settings,
    locks: RepoLocks,
    status_cache: Option<StatusCache>,
    mutation_hooks: Vec<MutationHook>,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("root", &self.root)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Repository {
    pub fn new(root: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>, settings: Settings) -> Self {
        Self {
            root: root.into(),
            runner,
            settings,
            locks: RepoLocks::global(),
            status_cache: None,
            mutation_hooks: Vec::new(),
        }
    }

    /// Serialize against `locks` instead of the process-wide registry.
    pub fn with_locks(mut self, locks: RepoLocks) -> Self {
        self.locks = locks;
        self
    }

    /// Run `hook` after every successful mutation made through this handle
    /// or its clones.
    pub fn on_mutation(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.mutation_hooks.push(Arc::new(hook));
        self
    }

    /// Have `controller` publish a fresh snapshot after every mutation.
    ///
    /// The hook holds the controller weakly, so a controller that lists this
    /// same repository does not keep itself alive.
    pub fn with_refresh(self, controller: &RefreshController) -> Self {
        let controller = controller.downgrade();
        self.on_mutation(move || {
            if let Some(controller) = controller.upgrade() {
                controller.request(RefreshTrigger::ModelChange);
            }
        })
    }

    /// Route `status` through `cache` and invalidate it on removal.
    pub fn with_status_cache(mut self, cache: StatusCache) -> Self {
        self.status_cache = Some(cache);
        self
    }

    /// Find the repository containing `path`.
    ///
    /// Works from the main worktree, a linked worktree, or a bare repository.
    pub fn discover(
        path: &Path,
        runner: Arc<dyn CommandRunner>,
        settings: Settings,
    ) -> Result<Self, GitError> {
        let args = to_args(&["rev-parse", "--git-common-dir"]);
        let output = runner.run(&args, path, Some(settings.command_timeout()))?;
        let common_dir = output.trim();
        if common_dir.is_empty() {
            return Err(GitError::ParseError {
                message: format!("git rev-parse printed no directory for {}", path.display()),
            });
        }

        let common_dir = canonical_or_raw(&path.join(common_dir));
        let root = if common_dir.file_name().is_some_and(|n| n == ".git") {
            common_dir
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or(common_dir)
        } else {
            common_dir
        };

        log::debug!("Discovered repository at {}", root.display());
        Ok(Self::new(root, runner, settings))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn status_cache(&self) -> Option<&StatusCache> {
        self.status_cache.as_ref()
    }

    fn git(&self, args: &[&str]) -> Result<String, GitError> {
        self.runner.run(&to_args(args), &self.root, None)
    }

    /// Run `op` under the writer lock, then notify the mutation hooks if it
    /// succeeded.
    fn mutate<T>(&self, op: impl FnOnce() -> Result<T, GitError>) -> Result<T, GitError> {
        let result = {
            let _guard = self.writer()?;
            op()
        };
        if result.is_ok() {
            self.notify_mutation();
        }
        result
    }

    fn notify_mutation(&self) {
        for hook in &self.mutation_hooks {
            hook();
        }
    }

    fn writer(&self) -> Result<WriterGuard, GitError> {
        let lock = self.locks.lock_for(&canonical_or_raw(&self.root));
        match self.settings.mutation_policy {
            MutationPolicy::Queue => Ok(lock.acquire()),
            MutationPolicy::Reject => {
                lock.try_acquire()
                    .ok_or_else(|| GitError::ConcurrentMutationRejected {
                        repo_root: self.root.clone(),
                    })
            }
        }
    }

    /// All worktrees, or the error that prevented listing them.
    pub fn try_list(&self) -> Result<Vec<WorktreeRecord>, GitError> {
        let stdout = self.git(&["worktree", "list", "--porcelain"])?;
        Ok(parse_worktree_list(&stdout))
    }

    /// All worktrees; a failed listing is logged and reads as empty.
    pub fn list(&self) -> Vec<WorktreeRecord> {
        match self.try_list() {
            Ok(records) => records,
            Err(e) => {
                log::warn!("Could not list worktrees in {}: {e:?}", self.root.display());
                Vec::new()
            }
        }
    }

    /// Where a worktree for `branch` would be created.
    pub fn plan_worktree_path(&self, branch: &str) -> PathBuf {
        crate::path::plan_worktree_path(&self.root, branch, &self.settings.worktree_path)
    }

    /// Create a worktree and return its path.
    ///
    /// With `create_new_branch`, runs `worktree add -b <branch> <path> <base>`
    /// (base defaults to `HEAD`); otherwise checks out the existing branch.
    /// Without `target_path` the path comes from [`Self::plan_worktree_path`].
    pub fn add(
        &self,
        branch: &str,
        create_new_branch: bool,
        target_path: Option<&Path>,
        base: Option<&str>,
    ) -> Result<PathBuf, GitError> {
        self.mutate(|| {
            let path = self.target_or_planned(target_path, branch);
            let path_str = path.to_string_lossy();
            let result = if create_new_branch {
                let base = base.unwrap_or("HEAD");
                self.git(&["worktree", "add", "-b", branch, &*path_str, base])
            } else {
                self.git(&["worktree", "add", &*path_str, branch])
            };
            self.finish_add(result, branch, &path)
        })
    }

    /// Create a worktree with a detached HEAD at `commit` and return its path.
    ///
    /// Runs `worktree add --detach <path> <commit>`; `commit` is anything
    /// git resolves to a commit (a sha, tag or branch name). Without
    /// `target_path` the path is planned from `commit`.
    pub fn add_detached(
        &self,
        commit: &str,
        target_path: Option<&Path>,
    ) -> Result<PathBuf, GitError> {
        self.mutate(|| {
            let path = self.target_or_planned(target_path, commit);
            let path_str = path.to_string_lossy();
            let result = self.git(&["worktree", "add", "--detach", &*path_str, commit]);
            self.finish_add(result, commit, &path)
        })
    }

    fn target_or_planned(&self, target_path: Option<&Path>, name: &str) -> PathBuf {
        match target_path {
            Some(path) => self.root.join(path).normalize(),
            None => self.plan_worktree_path(name),
        }
    }

    fn finish_add(
        &self,
        result: Result<String, GitError>,
        checkout: &str,
        path: &Path,
    ) -> Result<PathBuf, GitError> {
        match result {
            Ok(_) => {
                log::info!("Created worktree for {checkout} at {}", path.display());
                Ok(path.to_path_buf())
            }
            Err(GitError::CommandFailed { stderr, .. }) => Err(GitError::WorktreeAddFailed {
                branch: checkout.to_string(),
                path: path.to_path_buf(),
                error: stderr,
            }),
            Err(e) => Err(e),
        }
    }

    /// Remove the worktree at `path`.
    ///
    /// A refusal because of uncommitted or untracked files is reported as
    /// [`GitError::DirtyWorktree`] so callers can offer a forced retry.
    pub fn remove(&self, path: &Path, force: bool) -> Result<(), GitError> {
        self.mutate(|| self.remove_locked(path, force))
    }

    fn remove_locked(&self, path: &Path, force: bool) -> Result<(), GitError> {
        let path_str = path.to_string_lossy();
        let mut args = vec!["worktree", "remove"];
        if force {
            args.push("--force");
        }
        args.push(&*path_str);

        match self.git(&args) {
            Ok(_) => {}
            Err(GitError::CommandFailed { stderr, .. }) if stderr.contains(DIRTY_WORKTREE_MARKER) => {
                return Err(GitError::DirtyWorktree {
                    path: path.to_path_buf(),
                    stderr,
                });
            }
            Err(GitError::CommandFailed { stderr, .. }) => {
                return Err(GitError::WorktreeRemovalFailed {
                    path: path.to_path_buf(),
                    error: stderr,
                });
            }
            Err(e) => return Err(e),
        }

        if let Some(cache) = &self.status_cache {
            cache.invalidate(path);
        }
        log::info!("Removed worktree at {}", path.display());
        Ok(())
    }

    /// Delete the local `branch` unless a worktree still has it checked out.
    ///
    /// Uses `branch -d`, so unmerged branches survive as [`BranchCleanup::Failed`].
    pub fn prune_branch(&self, branch: &str) -> BranchCleanup {
        let cleanup = match self.writer() {
            Ok(_guard) => self.prune_branch_locked(branch),
            Err(e) => return BranchCleanup::Failed(e.to_string()),
        };
        if cleanup == BranchCleanup::Deleted {
            self.notify_mutation();
        }
        cleanup
    }

    fn prune_branch_locked(&self, branch: &str) -> BranchCleanup {
        let records = match self.try_list() {
            Ok(records) => records,
            Err(e) => {
                log::warn!("Skipping cleanup of branch {branch}: {e:?}");
                return BranchCleanup::Failed(e.stderr().unwrap_or_default().to_string());
            }
        };

        if let Some(holder) = records
            .iter()
            .find(|r| r.branch.as_deref() == Some(branch))
        {
            log::debug!(
                "Keeping branch {branch}: checked out at {}",
                holder.path.display()
            );
            return BranchCleanup::StillCheckedOut(holder.path.clone());
        }

        match self.git(&["branch", "-d", branch]) {
            Ok(_) => {
                log::info!("Deleted branch {branch}");
                BranchCleanup::Deleted
            }
            Err(e) => {
                let message = e.stderr().map(str::to_string).unwrap_or_else(|| e.to_string());
                log::warn!("Could not delete branch {branch}: {message}");
                BranchCleanup::Failed(message)
            }
        }
    }

    /// Remove a worktree, then try to delete the branch it had checked out.
    ///
    /// The branch step only runs for a non-forced removal of a linked
    /// worktree, and its failure is reported in the outcome, never as `Err`.
    pub fn remove_with_branch_cleanup(
        &self,
        path: &Path,
        force: bool,
    ) -> Result<RemoveOutcome, GitError> {
        self.mutate(|| {
            let record = self
                .try_list()
                .ok()
                .and_then(|records| find_worktree(&records, path).cloned());

            self.remove_locked(path, force)?;

            let branch = record.as_ref().and_then(|r| r.branch.clone());
            let is_main = record.as_ref().is_some_and(|r| r.is_main);
            let branch_cleanup = match &branch {
                Some(branch) if !force && !is_main => self.prune_branch_locked(branch),
                _ => BranchCleanup::Skipped,
            };

            Ok(RemoveOutcome {
                path: path.to_path_buf(),
                branch,
                branch_cleanup,
            })
        })
    }

    /// `worktree lock [--reason <reason>] <path>`, skipped when already locked.
    pub fn lock(&self, path: &Path, reason: Option<&str>) -> Result<LockOutcome, GitError> {
        self.mutate(|| {
            if self.current_record(path).is_some_and(|r| r.locked) {
                log::info!("{} is already locked", path.display());
                return Ok(LockOutcome::AlreadyLocked);
            }

            let path_str = path.to_string_lossy();
            let mut args = vec!["worktree", "lock"];
            if let Some(reason) = reason {
                args.extend(["--reason", reason]);
            }
            args.push(&*path_str);
            self.git(&args)?;
            Ok(LockOutcome::Changed)
        })
    }

    /// `worktree unlock <path>`, skipped when not locked.
    pub fn unlock(&self, path: &Path) -> Result<LockOutcome, GitError> {
        self.mutate(|| {
            if self.current_record(path).is_some_and(|r| !r.locked) {
                log::info!("{} is not locked", path.display());
                return Ok(LockOutcome::NotLocked);
            }

            let path_str = path.to_string_lossy();
            self.git(&["worktree", "unlock", &*path_str])?;
            Ok(LockOutcome::Changed)
        })
    }

    fn current_record(&self, path: &Path) -> Option<WorktreeRecord> {
        let records = self.try_list().ok()?;
        find_worktree(&records, path).cloned()
    }

    /// `worktree prune [--dry-run]`, returned as one line per entry.
    ///
    /// A real prune here skips the confirmation step; interactive callers go
    /// through [`Self::prune_preview`] and [`Self::prune_apply`] instead.
    pub fn prune(&self, dry_run: bool) -> Result<String, GitError> {
        let plan = self.prune_preview()?;
        if dry_run {
            return Ok(plan.entries.join("\n"));
        }
        Ok(self.prune_apply(&plan)?.join("\n"))
    }

    /// What `worktree prune` would remove; pass the result to
    /// [`Self::prune_apply`] to act on it.
    ///
    /// Entries come from `worktree prune --dry-run --verbose`, so they include
    /// administrative directories the porcelain listing leaves out (e.g. one
    /// whose `gitdir` file is missing). git writes that report to stderr.
    pub fn prune_preview(&self) -> Result<PrunePlan, GitError> {
        Ok(PrunePlan {
            root: self.root.clone(),
            entries: self.prune_candidates()?,
        })
    }

    fn prune_candidates(&self) -> Result<Vec<String>, GitError> {
        let args = to_args(&["worktree", "prune", "--dry-run", "--verbose"]);
        let output = self.runner.run_output(&args, &self.root, None)?;
        let mut entries = parse_prune_report(&output.stdout);
        entries.extend(parse_prune_report(&output.stderr));
        Ok(entries)
    }

    /// Apply a previewed prune and return the entries removed.
    ///
    /// Fails without pruning when the candidates changed since the preview,
    /// so nothing the user did not see gets removed.
    pub fn prune_apply(&self, plan: &PrunePlan) -> Result<Vec<String>, GitError> {
        if plan.root != self.root {
            return Err(GitError::Other {
                message: format!(
                    "Prune plan belongs to {}, not {}",
                    plan.root.display(),
                    self.root.display()
                ),
            });
        }

        self.mutate(|| {
            if self.prune_candidates()? != plan.entries {
                return Err(GitError::Other {
                    message: "Prunable worktrees changed since the preview; preview again"
                        .to_string(),
                });
            }
            if plan.is_empty() {
                return Ok(Vec::new());
            }

            self.git(&["worktree", "prune"])?;
            log::info!("Pruned {} worktree entries", plan.entries.len());
            Ok(plan.entries.clone())
        })
    }

    /// Status of the worktree at `path`, through the cache when one is attached.
    pub fn status(&self, path: &Path) -> Result<StatusSummary, GitError> {
        if let Some(cache) = &self.status_cache {
            return cache.get(path, false);
        }
        let args = to_args(&["status", "--porcelain", "-b"]);
        let stdout = self.runner.run(&args, path, None)?;
        Ok(parse_status(&stdout))
    }

    /// Short names of local branches.
    pub fn local_branches(&self) -> Result<Vec<String>, GitError> {
        let stdout = self.git(&["branch", "--format=%(refname:short)"])?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}

fn to_args(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}
