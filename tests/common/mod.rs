use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use insta_cmd::get_cargo_bin;
use rstest::fixture;
use tempfile::TempDir;
use worktree_hub::Settings;
use worktree_hub::git::{GitRunner, Repository};

/// Environment applied to every git and `wth` process a test starts, so the
/// developer's own git config never leaks in.
const ISOLATED_ENV: &[(&str, &str)] = &[
    ("GIT_CONFIG_GLOBAL", "/dev/null"),
    ("GIT_CONFIG_SYSTEM", "/dev/null"),
    ("GIT_AUTHOR_NAME", "Test User"),
    ("GIT_AUTHOR_EMAIL", "test@example.com"),
    ("GIT_COMMITTER_NAME", "Test User"),
    ("GIT_COMMITTER_EMAIL", "test@example.com"),
    ("GIT_AUTHOR_DATE", "2025-01-01T00:00:00Z"),
    ("GIT_COMMITTER_DATE", "2025-01-01T00:00:00Z"),
    ("LC_ALL", "C"),
    ("LANG", "C"),
];

pub struct TestRepo {
    temp_dir: TempDir,
    root: PathBuf,
}

impl TestRepo {
    /// A repository at `<temp>/main` with one commit on `main`.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        // Main repo is a subdirectory so planned worktrees land inside the temp dir
        let root = temp_dir.path().join("main");
        std::fs::create_dir(&root).expect("Failed to create main repo directory");
        // Canonicalize to resolve symlinks (important on macOS where /var is symlink to /private/var)
        let root = dunce::canonicalize(&root).expect("Failed to canonicalize temp path");

        let repo = Self { temp_dir, root };
        repo.git(&["init", "-b", "main"]);
        repo.commit("Initial commit");
        repo
    }

    /// A bare repository at `<temp>/repo.git`.
    pub fn bare() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path().join("repo.git");
        let output = isolated(Command::new("git"))
            .args(["init", "--bare", "-b", "main"])
            .arg(&root)
            .output()
            .expect("Failed to run git init --bare");
        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
        let root = dunce::canonicalize(&root).expect("Failed to canonicalize bare repo");
        Self { temp_dir, root }
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Facade over this repository using the real git runner.
    pub fn repository(&self) -> Repository {
        Repository::new(&self.root, Arc::new(GitRunner::new()), Settings::default())
    }

    /// Run git in the main worktree, panicking on failure.
    pub fn git(&self, args: &[&str]) -> String {
        self.git_in(&self.root, args)
    }

    /// Run git in `dir`, panicking on failure.
    pub fn git_in(&self, dir: &Path, args: &[&str]) -> String {
        let output = isolated(Command::new("git"))
            .args(args)
            .current_dir(dir)
            .output()
            .unwrap_or_else(|e| panic!("Failed to run git {args:?}: {e}"));
        if !output.status.success() {
            panic!(
                "git {args:?} failed:\nstdout: {}\nstderr: {}",
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            );
        }
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    /// Write a file and commit it in `dir`.
    pub fn commit_in(&self, dir: &Path, message: &str) {
        std::fs::write(dir.join("file.txt"), message).expect("Failed to write file");
        self.git_in(dir, &["add", "."]);
        self.git_in(dir, &["commit", "-m", message]);
    }

    pub fn commit(&self, message: &str) {
        self.commit_in(&self.root, message);
    }

    /// Add a worktree for a new branch at `<temp>/<name>`.
    pub fn add_worktree(&self, name: &str, branch: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        self.git(&["worktree", "add", "-b", branch, path.to_str().unwrap()]);
        dunce::canonicalize(&path).expect("Failed to canonicalize worktree path")
    }

    /// `wth` with an isolated environment, running in the main worktree.
    pub fn wth(&self) -> Command {
        let mut cmd = isolated(Command::new(get_cargo_bin("wth")));
        cmd.current_dir(&self.root)
            .env("WORKTREE_HUB_CONFIG_PATH", self.temp_dir.path().join("config.toml"))
            .env("NO_COLOR", "1")
            .env_remove("CLICOLOR_FORCE")
            .env_remove("RUST_LOG");
        cmd
    }
}

fn isolated(mut cmd: Command) -> Command {
    for (key, value) in ISOLATED_ENV {
        cmd.env(key, value);
    }
    cmd
}

#[fixture]
pub fn repo() -> TestRepo {
    TestRepo::new()
}
