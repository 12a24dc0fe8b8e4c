//! End-to-end tests driving the real git executable against a local bare remote.

mod common;

use common::{configure_identity, git, GitHarness};

use repomirror::{
    ChangeKind, CommitPushOutcome, LocalState, PreconditionReason, RepositoryRef, Step,
    SyncConfig, SyncError, SyncOrchestrator, UpdateReport,
};

#[tokio::test]
async fn test_clone_then_clean_and_up_to_date() {
    let harness = GitHarness::new();
    let reference = harness.reference();

    assert!(!harness.orchestrator.is_present(&reference).unwrap());
    harness
        .orchestrator
        .clone_repository(&reference)
        .await
        .expect("Clone should succeed");
    assert!(harness.orchestrator.is_present(&reference).unwrap());
    assert!(harness.working_copy().join("hello.txt").exists());

    let state = harness.orchestrator.refresh_local_state(&reference).await.unwrap();
    assert_eq!(state, LocalState::Clean);

    let check = harness.orchestrator.check_updates(&reference).await.unwrap();
    let divergence = check.report.divergence().expect("Should have counts");
    assert_eq!(divergence.branch, "main");
    assert!(divergence.is_up_to_date());
}

#[tokio::test]
async fn test_second_clone_is_refused() {
    let harness = GitHarness::new();
    harness.clone_demo().await;

    let err = harness
        .orchestrator
        .clone_repository(&harness.reference())
        .await
        .unwrap_err();
    assert_eq!(err.precondition(), Some(PreconditionReason::AlreadyExists));
}

#[tokio::test]
async fn test_commit_and_push_reaches_remote() {
    let harness = GitHarness::new();
    let dir = harness.clone_demo().await;
    let reference = harness.reference();

    std::fs::write(dir.join("notes.md"), "# Notes\n").unwrap();
    let state = harness.orchestrator.refresh_local_state(&reference).await.unwrap();
    assert_eq!(state.entries().len(), 1);
    assert_eq!(state.entries()[0].kind, ChangeKind::Untracked);
    assert_eq!(state.entries()[0].path, "notes.md");

    let outcome = harness
        .orchestrator
        .commit_and_push(&reference, "Add notes")
        .await
        .expect("Commit and push should succeed");
    assert!(matches!(outcome, CommitPushOutcome::Pushed(_)));
    assert_eq!(harness.remote_head_subject(), "Add notes");

    // Nothing left to do the second time around.
    let outcome = harness
        .orchestrator
        .commit_and_push(&reference, "Add notes again")
        .await
        .unwrap();
    assert_eq!(outcome, CommitPushOutcome::Clean);
    assert_eq!(harness.remote_head_subject(), "Add notes");
}

#[tokio::test]
async fn test_check_updates_then_pull() {
    let harness = GitHarness::new();
    harness.clone_demo().await;
    let reference = harness.reference();

    harness.push_from_elsewhere("remote.txt", "from elsewhere\n", "Remote change");

    let check = harness.orchestrator.check_updates(&reference).await.unwrap();
    assert!(check.fetch.succeeded);
    let divergence = check.report.divergence().unwrap();
    assert_eq!(divergence.behind, 1);
    assert_eq!(divergence.ahead, 0);

    let report = harness.orchestrator.pull(&reference).await.unwrap();
    assert!(report.local_state.unwrap().is_clean());
    assert!(harness.working_copy().join("remote.txt").exists());

    let check = harness.orchestrator.check_updates(&reference).await.unwrap();
    assert!(check.report.divergence().unwrap().is_up_to_date());
}

#[tokio::test]
async fn test_check_updates_counts_local_commits() {
    let harness = GitHarness::new();
    let dir = harness.clone_demo().await;

    std::fs::write(dir.join("local.txt"), "local\n").unwrap();
    git(&dir, &["add", "-A"]);
    git(&dir, &["commit", "-q", "-m", "Local only"]);

    let check = harness
        .orchestrator
        .check_updates(&harness.reference())
        .await
        .unwrap();
    let divergence = check.report.divergence().unwrap();
    assert_eq!(divergence.ahead, 1);
    assert_eq!(divergence.behind, 0);
}

#[tokio::test]
async fn test_show_diff_for_modified_file() {
    let harness = GitHarness::new();
    let dir = harness.clone_demo().await;
    let reference = harness.reference();

    std::fs::write(dir.join("hello.txt"), "changed\n").unwrap();

    let state = harness.orchestrator.refresh_local_state(&reference).await.unwrap();
    assert_eq!(state.entries()[0].kind, ChangeKind::Modified);

    let diff = harness
        .orchestrator
        .show_diff(&reference, &state.entries()[0].path)
        .await
        .unwrap();
    assert!(diff.contains("-hello"));
    assert!(diff.contains("+changed"));

    let untouched = harness
        .orchestrator
        .show_diff(&reference, "does-not-matter.txt")
        .await
        .unwrap();
    assert!(untouched.is_empty());
}

#[tokio::test]
async fn test_check_updates_without_upstream_falls_back() {
    let harness = GitHarness::new();
    let dir = harness.base_dir.join("standalone");
    std::fs::create_dir_all(&dir).unwrap();
    git(&dir, &["init", "-q"]);
    git(&dir, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    configure_identity(&dir);
    std::fs::write(dir.join("a.txt"), "a\n").unwrap();
    git(&dir, &["add", "-A"]);
    git(&dir, &["commit", "-q", "-m", "Only commit"]);

    let check = harness
        .orchestrator
        .check_updates(&RepositoryRef::local("standalone"))
        .await
        .unwrap();

    match check.report {
        UpdateReport::Unavailable { raw, .. } => assert!(raw.contains("main")),
        other => panic!("expected fallback, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_tool_is_a_start_failure() {
    let harness = GitHarness::new();
    harness.clone_demo().await;

    let config = SyncConfig {
        git_program: "repomirror-no-such-tool".to_string(),
        ..SyncConfig::with_base_dir(&harness.base_dir)
    };
    let orchestrator = SyncOrchestrator::new(config);

    let err = orchestrator
        .refresh_local_state(&harness.reference())
        .await
        .unwrap_err();
    assert!(err.is_tool_missing());
    assert!(matches!(err, SyncError::StartFailure { step: Step::Status, .. }));
}

#[tokio::test]
async fn test_operations_on_missing_copy_are_refused() {
    let harness = GitHarness::new();
    let reference = harness.reference();

    let err = harness.orchestrator.pull(&reference).await.unwrap_err();
    assert_eq!(err.precondition(), Some(PreconditionReason::Missing));

    let err = harness
        .orchestrator
        .show_diff(&reference, "hello.txt")
        .await
        .unwrap_err();
    assert_eq!(err.precondition(), Some(PreconditionReason::Missing));
}
