use std::sync::Arc;
use std::time::Duration;

use rstest::rstest;
use worktree_hub::StatusCache;
use worktree_hub::git::GitRunner;

use crate::common::{TestRepo, repo};

#[rstest]
fn test_status_counts_real_changes(repo: TestRepo) {
    let path = repo.add_worktree("work", "work");
    std::fs::write(path.join("file.txt"), "changed").unwrap();
    std::fs::write(path.join("staged.txt"), "new").unwrap();
    repo.git_in(&path, &["add", "staged.txt"]);
    std::fs::write(path.join("loose.txt"), "untracked").unwrap();

    let status = repo.repository().status(&path).unwrap();

    assert_eq!(status.branch, "work");
    assert_eq!(status.upstream, None);
    assert_eq!(status.staged, 1);
    assert_eq!(status.modified, 1);
    assert_eq!(status.untracked, 1);
}

#[rstest]
fn test_cache_serves_within_ttl_until_invalidated(repo: TestRepo) {
    let cache = StatusCache::with_ttl(
        Arc::new(GitRunner::new()),
        Duration::from_secs(60),
        None,
    );
    let repository = repo.repository().with_status_cache(cache.clone());

    assert!(!repository.status(repo.root_path()).unwrap().is_dirty());

    std::fs::write(repo.root_path().join("new.txt"), "x").unwrap();
    // Still the cached answer
    assert!(!repository.status(repo.root_path()).unwrap().is_dirty());
    assert!(cache.peek(repo.root_path()).is_some());

    cache.invalidate(repo.root_path());
    assert_eq!(repository.status(repo.root_path()).unwrap().untracked, 1);
}

#[rstest]
fn test_removal_invalidates_cached_status(repo: TestRepo) {
    let path = repo.add_worktree("gone", "gone");
    let cache = StatusCache::with_ttl(
        Arc::new(GitRunner::new()),
        Duration::from_secs(60),
        None,
    );
    let repository = repo.repository().with_status_cache(cache.clone());

    repository.status(&path).unwrap();
    assert!(cache.peek(&path).is_some());

    repository.remove(&path, false).unwrap();
    assert!(cache.peek(&path).is_none());
}
