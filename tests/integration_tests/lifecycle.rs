use std::sync::Arc;

use rstest::rstest;
use worktree_hub::git::{
    BranchCleanup, GitError, GitRunner, LockOutcome, Repository, find_worktree,
};
use worktree_hub::sync::RepoLocks;
use worktree_hub::{MutationPolicy, Settings};

use crate::common::{TestRepo, repo};

#[rstest]
fn test_list_reports_single_main(repo: TestRepo) {
    repo.add_worktree("feature", "feature");
    let repository = repo.repository();

    let first = repository.try_list().unwrap();
    let second = repository.try_list().unwrap();

    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
    assert_eq!(first.iter().filter(|r| r.is_main).count(), 1);
    assert!(first[0].is_at(repo.root_path()));
    assert_eq!(first[1].branch.as_deref(), Some("feature"));
    assert_eq!(first[1].head.len(), 40);
}

#[rstest]
fn test_add_plans_path_next_to_repository(repo: TestRepo) {
    let repository = repo.repository();

    let path = repository.add("feature/x", true, None, None).unwrap();

    let expected = repo.temp_path().join(".worktree_main_feature_x");
    assert_eq!(dunce::canonicalize(&path).unwrap(), dunce::canonicalize(&expected).unwrap());
    let record = find_worktree(&repository.list(), &path).cloned().unwrap();
    assert_eq!(record.branch.as_deref(), Some("feature/x"));
    assert!(!record.is_main);
}

#[rstest]
fn test_planned_path_avoids_existing_directory(repo: TestRepo) {
    std::fs::create_dir(repo.temp_path().join(".worktree_main_taken")).unwrap();
    let repository = repo.repository();

    let path = repository.add("taken", true, None, None).unwrap();

    assert!(path.ends_with(".worktree_main_taken_1"));
    assert!(path.is_dir());
}

#[rstest]
fn test_add_checks_out_existing_branch(repo: TestRepo) {
    repo.git(&["branch", "release"]);
    let repository = repo.repository();
    let target = repo.temp_path().join("release");

    let path = repository.add("release", false, Some(&target), None).unwrap();

    assert_eq!(path, target);
    assert_eq!(repo.git_in(&path, &["branch", "--show-current"]), "release");
}

#[rstest]
fn test_add_failure_carries_git_message(repo: TestRepo) {
    let repository = repo.repository();

    let err = repository
        .add("missing-branch", false, None, None)
        .unwrap_err();

    match err {
        GitError::WorktreeAddFailed { branch, error, .. } => {
            assert_eq!(branch, "missing-branch");
            assert!(!error.is_empty());
        }
        other => panic!("expected WorktreeAddFailed, got {other:?}"),
    }
}

#[rstest]
fn test_lock_and_unlock_report_state(repo: TestRepo) {
    let path = repo.add_worktree("held", "held");
    let repository = repo.repository();

    assert_eq!(
        repository.lock(&path, Some("usb stick")).unwrap(),
        LockOutcome::Changed
    );
    assert_eq!(repository.lock(&path, None).unwrap(), LockOutcome::AlreadyLocked);

    let record = find_worktree(&repository.list(), &path).cloned().unwrap();
    assert!(record.locked);
    assert_eq!(record.lock_reason.as_deref(), Some("usb stick"));

    assert_eq!(repository.unlock(&path).unwrap(), LockOutcome::Changed);
    assert_eq!(repository.unlock(&path).unwrap(), LockOutcome::NotLocked);
}

#[rstest]
fn test_remove_dirty_worktree_needs_force(repo: TestRepo) {
    let path = repo.add_worktree("dirty", "dirty");
    std::fs::write(path.join("scratch.txt"), "work in progress").unwrap();
    let repository = repo.repository();

    let err = repository.remove(&path, false).unwrap_err();
    assert!(
        matches!(err, GitError::DirtyWorktree { .. }),
        "expected DirtyWorktree, got {err:?}"
    );
    assert!(path.exists());

    repository.remove(&path, true).unwrap();
    assert!(!path.exists());
    assert_eq!(repository.list().len(), 1);
}

#[rstest]
fn test_remove_deletes_merged_branch(repo: TestRepo) {
    let path = repo.add_worktree("merged", "merged");
    let repository = repo.repository();

    let outcome = repository.remove_with_branch_cleanup(&path, false).unwrap();

    assert_eq!(outcome.branch.as_deref(), Some("merged"));
    assert_eq!(outcome.branch_cleanup, BranchCleanup::Deleted);
    assert!(!repository.local_branches().unwrap().contains(&"merged".to_string()));
}

#[rstest]
fn test_remove_keeps_unmerged_branch(repo: TestRepo) {
    let path = repo.add_worktree("unmerged", "unmerged");
    repo.commit_in(&path, "Work only on the branch");
    let repository = repo.repository();

    let outcome = repository.remove_with_branch_cleanup(&path, false).unwrap();

    match &outcome.branch_cleanup {
        BranchCleanup::Failed(message) => assert!(message.contains("not fully merged")),
        other => panic!("expected Failed cleanup, got {other:?}"),
    }
    assert!(!path.exists());
    assert!(repository.local_branches().unwrap().contains(&"unmerged".to_string()));
}

#[rstest]
fn test_forced_remove_skips_branch_cleanup(repo: TestRepo) {
    let path = repo.add_worktree("forced", "forced");
    let repository = repo.repository();

    let outcome = repository.remove_with_branch_cleanup(&path, true).unwrap();

    assert_eq!(outcome.branch_cleanup, BranchCleanup::Skipped);
    assert!(repository.local_branches().unwrap().contains(&"forced".to_string()));
}

#[rstest]
fn test_prune_preview_then_apply(repo: TestRepo) {
    let path = repo.add_worktree("stale", "stale");
    std::fs::remove_dir_all(&path).unwrap();
    let repository = repo.repository();

    assert!(repository.list().iter().any(|r| r.prunable));

    let plan = repository.prune_preview().unwrap();
    assert_eq!(plan.entries().len(), 1);
    assert!(plan.entries()[0].contains("stale"));
    // Previewing changes nothing
    assert_eq!(repository.list().len(), 2);

    let pruned = repository.prune_apply(&plan).unwrap();
    assert_eq!(pruned, plan.entries());
    assert_eq!(repository.list().len(), 1);
    assert!(repository.prune_preview().unwrap().is_empty());
}

#[rstest]
fn test_prune_preview_names_entries_missing_from_listing(repo: TestRepo) {
    repo.add_worktree("orphan", "orphan");
    let admin = repo.root_path().join(".git/worktrees/orphan");
    std::fs::remove_file(admin.join("gitdir")).unwrap();
    let repository = repo.repository();

    // git no longer lists it, but prune would still delete it
    assert_eq!(repository.list().len(), 1);

    let plan = repository.prune_preview().unwrap();
    assert_eq!(plan.entries(), ["worktrees/orphan: gitdir file does not exist"]);
    assert!(admin.exists());

    repository.prune_apply(&plan).unwrap();
    assert!(!admin.exists());
}

#[rstest]
fn test_add_detached_lists_as_detached(repo: TestRepo) {
    let head = repo.git(&["rev-parse", "HEAD"]);
    let repository = repo.repository();
    let target = repo.temp_path().join("detached");

    let path = repository.add_detached(&head, Some(&target)).unwrap();

    let record = find_worktree(&repository.list(), &path).cloned().unwrap();
    assert!(record.detached);
    assert_eq!(record.branch, None);
    assert_eq!(record.head, head);
    assert_eq!(repo.git(&["branch", "--list"]).lines().count(), 1);
}

#[rstest]
fn test_handles_from_main_and_linked_share_writer_lock(repo: TestRepo) {
    let linked = repo.add_worktree("linked", "linked");
    let settings = Settings {
        mutation_policy: MutationPolicy::Reject,
        ..Default::default()
    };
    let from_main =
        Repository::discover(repo.root_path(), Arc::new(GitRunner::new()), settings.clone())
            .unwrap();
    let from_linked =
        Repository::discover(&linked, Arc::new(GitRunner::new()), settings).unwrap();

    let held = RepoLocks::global().lock_for(from_main.root()).acquire();
    let err = from_linked.add("blocked", true, None, None).unwrap_err();
    assert!(
        matches!(err, GitError::ConcurrentMutationRejected { .. }),
        "{err:?}"
    );

    drop(held);
    from_linked.add("unblocked", true, None, None).unwrap();
}

#[rstest]
fn test_locked_worktree_is_not_prunable(repo: TestRepo) {
    let path = repo.add_worktree("kept", "kept");
    repo.git(&["worktree", "lock", path.to_str().unwrap()]);
    std::fs::remove_dir_all(&path).unwrap();

    assert!(repo.repository().prune_preview().unwrap().is_empty());
}

#[rstest]
fn test_discover_from_linked_worktree(repo: TestRepo) {
    let path = repo.add_worktree("linked", "linked");

    let from_main =
        Repository::discover(repo.root_path(), Arc::new(GitRunner::new()), Settings::default())
            .unwrap();
    let from_linked =
        Repository::discover(&path, Arc::new(GitRunner::new()), Settings::default()).unwrap();

    assert_eq!(from_main.root(), repo.root_path());
    assert_eq!(from_linked.root(), repo.root_path());
}

#[test]
fn test_discover_outside_repository_fails() {
    let dir = tempfile::tempdir().unwrap();
    let result = Repository::discover(
        dir.path(),
        Arc::new(GitRunner::new()),
        Settings::default(),
    );
    assert!(result.is_err());
}

#[test]
fn test_bare_repository_is_main() {
    let repo = TestRepo::bare();
    let repository = repo.repository();

    let records = repository.try_list().unwrap();

    assert_eq!(records.len(), 1);
    assert!(records[0].bare);
    assert!(records[0].is_main);
    assert!(records[0].head.is_empty());
}
