//! Shared test utilities for repomirror integration tests.
//!
//! `GitHarness` builds an isolated world in a temp directory: a bare
//! "remote" seeded with one commit, an empty base directory for working
//! copies, and an orchestrator pointed at it that drives the real tool.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use repomirror::{RepositoryRef, SyncConfig, SyncOrchestrator};

/// Runs git synchronously for fixture setup, panicking on failure.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .current_dir(dir)
        .args([
            "-c",
            "user.name=Mirror Test",
            "-c",
            "user.email=mirror@test.invalid",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .expect("Failed to run git");

    assert!(
        output.status.success(),
        "git {:?} failed in {:?}: {}",
        args,
        dir,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Sets a committer identity in a working copy so unflagged commits work.
pub fn configure_identity(dir: &Path) {
    git(dir, &["config", "user.name", "Mirror Test"]);
    git(dir, &["config", "user.email", "mirror@test.invalid"]);
    git(dir, &["config", "commit.gpgsign", "false"]);
}

/// Isolated remote + base directory + orchestrator.
pub struct GitHarness {
    temp_dir: TempDir,
    /// Bare repository acting as the remote.
    pub remote: PathBuf,
    /// Directory the orchestrator clones into.
    pub base_dir: PathBuf,
    pub orchestrator: SyncOrchestrator,
}

impl GitHarness {
    /// A remote named `demo` on branch `main` with a single commit
    /// containing `hello.txt`.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let seed = temp_dir.path().join("seed");
        let remote = temp_dir.path().join("remote").join("demo.git");
        let base_dir = temp_dir.path().join("mirrors");

        std::fs::create_dir_all(&seed).expect("Failed to create seed dir");
        git(&seed, &["init", "-q"]);
        git(&seed, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        std::fs::write(seed.join("hello.txt"), "hello\n").expect("Failed to write seed file");
        git(&seed, &["add", "-A"]);
        git(&seed, &["commit", "-q", "-m", "Initial commit"]);

        std::fs::create_dir_all(remote.parent().unwrap()).expect("Failed to create remote dir");
        git(
            temp_dir.path(),
            &[
                "clone",
                "-q",
                "--bare",
                seed.to_str().unwrap(),
                remote.to_str().unwrap(),
            ],
        );

        let orchestrator = SyncOrchestrator::new(SyncConfig::with_base_dir(&base_dir));

        Self {
            temp_dir,
            remote,
            base_dir,
            orchestrator,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Reference to the seeded remote.
    pub fn reference(&self) -> RepositoryRef {
        RepositoryRef::new("demo", self.remote.to_str().unwrap())
    }

    /// Where the orchestrator keeps the working copy.
    pub fn working_copy(&self) -> PathBuf {
        self.base_dir.join("demo")
    }

    /// Clones through the orchestrator and sets a committer identity.
    pub async fn clone_demo(&self) -> PathBuf {
        self.orchestrator
            .clone_repository(&self.reference())
            .await
            .expect("Clone should succeed");
        let path = self.working_copy();
        configure_identity(&path);
        path
    }

    /// Pushes one commit to the remote from an independent clone, as another
    /// machine would.
    pub fn push_from_elsewhere(&self, file: &str, content: &str, message: &str) {
        let other = self.temp_dir.path().join("elsewhere");
        if !other.exists() {
            git(
                self.temp_dir.path(),
                &[
                    "clone",
                    "-q",
                    self.remote.to_str().unwrap(),
                    other.to_str().unwrap(),
                ],
            );
        } else {
            git(&other, &["pull", "-q"]);
        }

        std::fs::write(other.join(file), content).expect("Failed to write file");
        git(&other, &["add", "-A"]);
        git(&other, &["commit", "-q", "-m", message]);
        git(&other, &["push", "-q"]);
    }

    /// Subject of the remote's latest commit on `main`.
    pub fn remote_head_subject(&self) -> String {
        git(&self.remote, &["log", "-1", "--format=%s", "main"])
            .trim()
            .to_string()
    }
}
