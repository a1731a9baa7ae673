use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use normalize_path::NormalizePath;

/// Format a filesystem path for user-facing output.
///
/// When the path lives under the user's home directory, it is shown with a
/// leading `~` (e.g., `/Users/alex/projects/wt` -> `~/projects/wt`). Paths
/// outside home are returned unchanged.
pub fn format_path_for_display(path: &Path) -> String {
    if let Some(home) = dirs::home_dir()
        && let Ok(stripped) = path.strip_prefix(&home)
    {
        if stripped.as_os_str().is_empty() {
            return "~".to_string();
        }

        let mut display_path = PathBuf::from("~");
        display_path.push(stripped);
        return display_path.display().to_string();
    }

    path.display().to_string()
}

/// Make a branch name safe for use as one path component.
///
/// Every character outside `[A-Za-z0-9._-]` (path separators included)
/// becomes `_`, so `feature/login` turns into `feature_login`.
pub fn sanitize_branch(branch: &str) -> String {
    branch
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Expand a worktree path template for `branch`, relative to `repo_root`.
///
/// Tokens: `{repo}` (repository directory name), `{branch}` (sanitized),
/// `{date}` (`YYYYMMDD`) and `{time}` (`HHMMSS`). The result is lexically
/// normalized but may still exist on disk; see [`plan_worktree_path`].
pub fn expand_path_template(
    repo_root: &Path,
    branch: &str,
    template: &str,
    now: DateTime<Local>,
) -> PathBuf {
    let repo = repo_root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let relative = template
        .replace("{repo}", &repo)
        .replace("{branch}", &sanitize_branch(branch))
        .replace("{date}", &now.format("%Y%m%d").to_string())
        .replace("{time}", &now.format("%H%M%S").to_string());

    repo_root.join(relative).normalize()
}

/// Pick a directory for a new worktree that does not exist yet.
///
/// When the expanded template is taken, `_1`, `_2`, … are appended to its
/// final component until a free name is found.
pub fn plan_worktree_path(repo_root: &Path, branch: &str, template: &str) -> PathBuf {
    let base = expand_path_template(repo_root, branch, template, Local::now());
    ensure_unique(base)
}

fn ensure_unique(base: PathBuf) -> PathBuf {
    if !base.exists() {
        return base;
    }

    let parent = base.parent().map(Path::to_path_buf).unwrap_or_default();
    let name = base
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "worktree".to_string());

    let mut counter = 1u64;
    loop {
        let candidate = parent.join(format!("{name}_{counter}"));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Canonicalize when possible, falling back to the path as given.
///
/// Prunable worktrees no longer exist on disk, so callers keying caches by
/// path must tolerate canonicalization failure.
pub fn canonical_or_raw(path: &Path) -> PathBuf {
    dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
