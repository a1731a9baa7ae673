use std::process::{Command, Output};

use insta_cmd::assert_cmd_snapshot;
use rstest::rstest;

use crate::common::{TestRepo, repo};

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn run_ok(repo: &TestRepo, args: &[&str]) -> Output {
    let output = repo.wth().args(args).output().unwrap();
    assert!(
        output.status.success(),
        "wth {args:?} failed:\n{}",
        stderr(&output)
    );
    output
}

/// `wth` with home set to the temp dir, so paths print as `~/...`.
fn snapshot_cmd(repo: &TestRepo, args: &[&str]) -> Command {
    let home = dunce::canonicalize(repo.temp_path()).unwrap();
    let mut cmd = repo.wth();
    cmd.args(args).env("HOME", home).env("COLUMNS", "150");
    cmd
}

/// Masks commit hashes and the padding left after the last table column.
fn snapshot_settings() -> insta::Settings {
    let mut settings = insta::Settings::clone_current();
    settings.add_filter(r"\b[0-9a-f]{7,40}\b", "[SHA]   ");
    settings.add_filter(r"(?m) +$", "");
    settings
}

#[rstest]
fn test_list_table(repo: TestRepo) {
    repo.add_worktree("feature", "feature");

    snapshot_settings().bind(|| {
        assert_cmd_snapshot!(snapshot_cmd(&repo, &["list"]), @r"
        success: true
        exit_code: 0
        ----- stdout -----
        main     ~/main     [SHA]
        feature  ~/feature  [SHA]

        ----- stderr -----
        ");
    });
}

#[rstest]
fn test_list_json(repo: TestRepo) {
    repo.add_worktree("feature", "feature");

    let output = run_ok(&repo, &["list", "--format", "json"]);

    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let worktrees = json["worktrees"].as_array().unwrap();
    assert_eq!(worktrees.len(), 2);
    assert_eq!(worktrees[0]["branch"], "main");
    assert_eq!(worktrees[0]["is_main"], true);
    assert_eq!(worktrees[1]["branch"], "feature");
    assert_eq!(worktrees[1]["status"]["branch"], "feature");
}

#[rstest]
fn test_list_table_shows_branches_without_worktree(repo: TestRepo) {
    repo.git(&["branch", "idle"]);

    let output = run_ok(&repo, &["list", "--branches"]);

    let text = stdout(&output);
    assert!(text.lines().next().unwrap().starts_with("main"));
    assert!(text.lines().any(|l| l.trim_end() == "idle"));
}

#[rstest]
fn test_add_then_remove_by_branch(repo: TestRepo) {
    run_ok(&repo, &["add", "--create", "topic"]);
    let planned = repo.temp_path().join(".worktree_main_topic");
    assert!(planned.is_dir());

    let output = run_ok(&repo, &["remove", "topic"]);

    assert!(!planned.exists());
    assert!(stdout(&output).contains("Deleted branch topic"));
    assert!(repo.git(&["branch", "--list", "topic"]).is_empty());
}

#[rstest]
fn test_remove_dirty_worktree_fails(repo: TestRepo) {
    let path = repo.add_worktree("dirty", "dirty");
    std::fs::write(path.join("scratch.txt"), "x").unwrap();

    let output = repo.wth().args(["remove", "dirty"]).output().unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(path.exists());
}

#[rstest]
fn test_add_detached(repo: TestRepo) {
    run_ok(&repo, &["add", "--detach", "HEAD", "--path", "../pinned"]);

    let listing = repo.git(&["worktree", "list", "--porcelain"]);
    let block = listing.split("\n\n").nth(1).unwrap();
    assert!(block.ends_with("detached"), "{block}");

    let refused = repo
        .wth()
        .args(["add", "--detach", "--create", "HEAD"])
        .output()
        .unwrap();
    assert_eq!(refused.status.code(), Some(2));
}

#[rstest]
fn test_lock_with_reason(repo: TestRepo) {
    let path = repo.add_worktree("held", "held");

    run_ok(&repo, &["lock", "held", "--reason", "on usb"]);

    let listing = repo.git(&["worktree", "list", "--porcelain"]);
    assert!(listing.contains("locked on usb"));
    let output = run_ok(&repo, &["unlock", path.to_str().unwrap()]);
    assert!(stdout(&output).contains("Unlocked held"));
}

#[rstest]
fn test_prune_nothing_to_do(repo: TestRepo) {
    repo.add_worktree("feature", "feature");

    assert_cmd_snapshot!(snapshot_cmd(&repo, &["prune", "--dry-run"]), @r"
    success: true
    exit_code: 0
    ----- stdout -----
    ⚪ Nothing to prune

    ----- stderr -----
    ");
}

#[rstest]
fn test_prune_dry_run_keeps_metadata(repo: TestRepo) {
    let path = repo.add_worktree("stale", "stale");
    std::fs::remove_dir_all(&path).unwrap();

    assert_cmd_snapshot!(snapshot_cmd(&repo, &["prune", "--dry-run"]), @r"
    success: true
    exit_code: 0
    ----- stdout -----
    🟡 Would prune 1 worktree entry:
      worktrees/stale: gitdir file points to non-existent location

    ----- stderr -----
    ");
    assert!(repo.git(&["worktree", "list", "--porcelain"]).contains("prunable"));
}

#[rstest]
fn test_prune_shows_entries_git_does_not_list(repo: TestRepo) {
    repo.add_worktree("orphan", "orphan");
    std::fs::remove_file(repo.root_path().join(".git/worktrees/orphan/gitdir")).unwrap();

    assert_cmd_snapshot!(snapshot_cmd(&repo, &["prune", "--yes"]), @r"
    success: true
    exit_code: 0
    ----- stdout -----
    🟡 Would prune 1 worktree entry:
      worktrees/orphan: gitdir file does not exist
    ✅ Pruned 1 worktree entry

    ----- stderr -----
    ");
    assert!(!repo.root_path().join(".git/worktrees/orphan").exists());
}

#[rstest]
fn test_prune_without_tty_needs_yes(repo: TestRepo) {
    let path = repo.add_worktree("stale", "stale");
    std::fs::remove_dir_all(&path).unwrap();

    let refused = repo.wth().arg("prune").output().unwrap();
    assert_eq!(refused.status.code(), Some(1));
    assert!(stderr(&refused).contains("pass --yes"));
    assert!(repo.git(&["worktree", "list", "--porcelain"]).contains("prunable"));

    run_ok(&repo, &["prune", "--yes"]);
    assert!(!repo.git(&["worktree", "list", "--porcelain"]).contains("prunable"));
}

#[rstest]
fn test_status_json(repo: TestRepo) {
    std::fs::write(repo.root_path().join("new.txt"), "x").unwrap();

    let output = run_ok(&repo, &["status", "--format", "json"]);

    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["branch"], "main");
    assert_eq!(json["untracked"], 1);
}

#[rstest]
fn test_open_without_terminal_prints_path(repo: TestRepo) {
    let path = repo.add_worktree("feature", "feature");

    let output = run_ok(&repo, &["open", "feature"]);

    assert_eq!(stdout(&output).trim(), path.display().to_string());
}

#[test]
fn test_outside_repository_fails() {
    let repo = TestRepo::new();
    let outside = tempfile::tempdir().unwrap();

    let output = repo
        .wth()
        .arg("-C")
        .arg(outside.path())
        .arg("list")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(!stderr(&output).is_empty());
}
