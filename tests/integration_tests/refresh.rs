use std::sync::Arc;
use std::time::Duration;

use rstest::rstest;
use worktree_hub::refresh::{RefreshController, RefreshTrigger};
use worktree_hub::{Repository, Settings};
use worktree_hub::git::GitRunner;

use crate::common::{TestRepo, repo};

#[rstest]
fn test_snapshot_follows_mutations(repo: TestRepo) {
    let repository = repo.repository();
    let controller =
        RefreshController::new(Arc::new(repository.clone()), Duration::from_millis(20));
    let repository = repository.with_refresh(&controller);
    let updates = controller.subscribe();

    controller.start();
    let first = updates.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(first.trigger, RefreshTrigger::Startup);
    assert_eq!(first.worktrees.len(), 1);

    repository.add("feature", true, None, None).unwrap();
    let second = updates.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(second.trigger, RefreshTrigger::ModelChange);
    assert_eq!(second.worktrees.len(), 2);
    assert!(second.generation > first.generation);
    assert!(Arc::ptr_eq(&second, &controller.snapshot()));

    repository.lock(&second.worktrees[1].path, None).unwrap();
    let third = updates.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(third.trigger, RefreshTrigger::ModelChange);
    assert!(third.worktrees[1].locked);
}

#[rstest]
fn test_filesystem_burst_refreshes_once(repo: TestRepo) {
    let controller =
        RefreshController::new(Arc::new(repo.repository()), Duration::from_millis(50));
    let updates = controller.subscribe();

    for _ in 0..5 {
        controller.notify_filesystem_change(repo.root_path().join(".git/HEAD"));
    }

    let snapshot = updates.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(snapshot.trigger, RefreshTrigger::FileSystem);
    assert!(updates.recv_timeout(Duration::from_millis(300)).is_err());
}

#[rstest]
fn test_unavailable_root_does_not_hide_others(repo: TestRepo) {
    let missing = tempfile::tempdir().unwrap();
    let sources = vec![
        repo.repository(),
        Repository::new(missing.path(), Arc::new(GitRunner::new()), Settings::default()),
    ];
    let controller = RefreshController::new(Arc::new(sources), Duration::from_millis(20));

    controller.start();
    let snapshot = controller.snapshot();

    assert_eq!(snapshot.worktrees.len(), 1);
    assert_eq!(snapshot.unavailable.len(), 1);
    assert_eq!(snapshot.unavailable[0].0, missing.path());
}
