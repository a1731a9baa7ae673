pub mod list;
pub mod prune;
pub mod status;
pub mod worktree;

pub use list::handle_list;
pub use prune::handle_prune;
pub use status::handle_status;
pub use worktree::{handle_add, handle_lock, handle_open, handle_remove, handle_unlock};

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use normalize_path::NormalizePath;
use worktree_hub::git::{CommandRunner, GitRunner, Repository};
use worktree_hub::path::canonical_or_raw;
use worktree_hub::status_cache::StatusCache;
use worktree_hub::styling::{HINT_EMOJI, eprint, eprintln, stderr};
use worktree_hub::{Settings, git};

/// Everything a command needs: settings, the repository and where we run.
pub struct Context {
    pub settings: Settings,
    pub repo: Repository,
    pub cwd: PathBuf,
}

impl Context {
    pub fn load(directory: Option<&Path>) -> anyhow::Result<Self> {
        let settings = Settings::load().context("Failed to load config")?;

        let current = std::env::current_dir().context("Failed to read current directory")?;
        let cwd = match directory {
            Some(dir) => canonical_or_raw(&current.join(dir)),
            None => canonical_or_raw(&current),
        };

        let runner: Arc<dyn CommandRunner> = Arc::new(GitRunner::from_settings(&settings));
        let cache = StatusCache::new(Arc::clone(&runner), &settings);
        let repo = Repository::discover(&cwd, runner, settings.clone())?.with_status_cache(cache);

        Ok(Self {
            settings,
            repo,
            cwd,
        })
    }

    /// Path of the worktree named by `target`: a branch checked out in some
    /// worktree, otherwise a path relative to the working directory.
    pub fn resolve_worktree(&self, target: &str) -> PathBuf {
        let records = self.repo.list();
        if let Some(record) = records
            .iter()
            .find(|r| r.branch.as_deref() == Some(target))
        {
            return record.path.clone();
        }
        self.cwd.join(target).normalize()
    }

    /// Like [`Self::resolve_worktree`], defaulting to the worktree we run in.
    pub fn resolve_worktree_or_current(&self, target: Option<&str>) -> PathBuf {
        match target {
            Some(target) => self.resolve_worktree(target),
            None => {
                let records = self.repo.list();
                // Deepest worktree containing cwd, so nested worktrees win
                records
                    .iter()
                    .filter(|r| self.cwd.starts_with(&r.path))
                    .max_by_key(|r| r.path.components().count())
                    .map(|r| r.path.clone())
                    .unwrap_or_else(|| self.cwd.clone())
            }
        }
    }
}

/// Ask a yes/no question on stderr; anything but `y` is no.
pub fn confirm(question: &str) -> io::Result<bool> {
    let bold = anstyle::Style::new().bold();

    stderr().flush()?;
    eprint!("{HINT_EMOJI} {question} {bold}[y/N]{bold:#} ");
    stderr().flush()?;

    let mut response = String::new();
    io::stdin().read_line(&mut response)?;

    eprintln!();

    Ok(response.trim().eq_ignore_ascii_case("y"))
}

/// Human description of a worktree for messages: its branch, else its path.
pub fn describe(record: Option<&git::WorktreeRecord>, path: &Path) -> String {
    match record.and_then(|r| r.branch.as_deref()) {
        Some(branch) => branch.to_string(),
        None => worktree_hub::path::format_path_for_display(path),
    }
}
