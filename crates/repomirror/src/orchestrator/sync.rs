//! The synchronization orchestrator.

use std::path::Path;
use std::sync::Arc;

use futures_util::future::join_all;

use super::locks::PathLocks;
use super::types::*;
use crate::config::{budget, SyncConfig};
use crate::divergence::{comparison_range, compute_divergence, DivergenceResult};
use crate::error::{PreconditionReason, Result, Step, SyncError};
use crate::progress::{OperationProgress, ProgressBroadcaster, SyncOperation};
use crate::repository::{LocalRepository, RepositoryRef};
use crate::runner::{CommandOutcome, CommandRunner, OutcomeStatus, ProcessRunner};
use crate::sanitize::redact_remote_url;
use crate::status::parse_status;

/// Commit output meaning nothing was staged. This is the only tool failure
/// reinterpreted as success.
pub const NOTHING_TO_COMMIT_MARKERS: &[&str] = &[
    "nothing to commit",
    "nothing added to commit",
    "no changes added to commit",
];

/// Drives clone/refresh/check/pull/diff/commit-and-push against working
/// copies under one base directory.
///
/// Cloning is cheap (shared state is behind `Arc`), so a caller can move a
/// clone into a spawned task per repository. Calls on different repositories
/// run independently; calls on the same repository are serialized.
pub struct SyncOrchestrator<R = ProcessRunner> {
    config: Arc<SyncConfig>,
    runner: Arc<R>,
    locks: Arc<PathLocks>,
    progress: Option<ProgressBroadcaster>,
}

impl<R> Clone for SyncOrchestrator<R> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            runner: Arc::clone(&self.runner),
            locks: Arc::clone(&self.locks),
            progress: self.progress.clone(),
        }
    }
}

impl SyncOrchestrator<ProcessRunner> {
    /// Orchestrator driving the real tool. Terminal credential prompts are
    /// disabled so an unbounded clone cannot block on input.
    pub fn new(config: SyncConfig) -> Self {
        Self::with_runner(config, ProcessRunner::new().env("GIT_TERMINAL_PROMPT", "0"))
    }
}

impl<R: CommandRunner> SyncOrchestrator<R> {
    pub fn with_runner(config: SyncConfig, runner: R) -> Self {
        Self {
            config: Arc::new(config),
            runner: Arc::new(runner),
            locks: Arc::new(PathLocks::new()),
            progress: None,
        }
    }

    /// Reports every operation's phases on `broadcaster`.
    pub fn with_progress(mut self, broadcaster: ProgressBroadcaster) -> Self {
        self.progress = Some(broadcaster);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Binds `reference` to its working-copy path.
    pub fn local_repository(&self, reference: &RepositoryRef) -> Result<LocalRepository> {
        LocalRepository::new(&self.config.base_dir, reference)
    }

    /// Whether the working copy exists right now.
    pub fn is_present(&self, reference: &RepositoryRef) -> Result<bool> {
        Ok(self.local_repository(reference)?.is_present())
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Clones the repository into `base_dir/name`.
    ///
    /// Fails with [`PreconditionReason::AlreadyExists`] without running the
    /// tool if the path is already there. Runs without a timeout unless one is
    /// configured.
    pub async fn clone_repository(&self, reference: &RepositoryRef) -> Result<CommandOutcome> {
        let local = self.local_repository(reference)?;
        let _guard = self.locks.acquire(local.local_path()).await;
        let progress = self.start(SyncOperation::Clone, reference);

        let result = self.clone_locked(&local, &progress).await;
        finish(&progress, &result);
        result
    }

    /// Lists changed paths in the working tree.
    pub async fn refresh_local_state(&self, reference: &RepositoryRef) -> Result<LocalState> {
        let local = self.local_repository(reference)?;
        let _guard = self.locks.acquire(local.local_path()).await;
        let progress = self.start(SyncOperation::RefreshLocalState, reference);

        let result = self.refresh_locked(&local, &progress).await;
        finish(&progress, &result);
        result
    }

    /// Fetches and counts commits ahead of / behind the remote tracking branch.
    ///
    /// When the count cannot be computed (no upstream, unparseable output) the
    /// report carries plain status text instead.
    pub async fn check_updates(&self, reference: &RepositoryRef) -> Result<UpdateCheck> {
        let local = self.local_repository(reference)?;
        let _guard = self.locks.acquire(local.local_path()).await;
        let progress = self.start(SyncOperation::CheckUpdates, reference);

        let result = self.check_updates_locked(&local, &progress).await;
        finish(&progress, &result);
        result
    }

    /// Pulls, then re-reads the working-tree state.
    pub async fn pull(&self, reference: &RepositoryRef) -> Result<PullReport> {
        let local = self.local_repository(reference)?;
        let _guard = self.locks.acquire(local.local_path()).await;
        let progress = self.start(SyncOperation::Pull, reference);

        let result = self.pull_locked(&local, &progress).await;
        finish(&progress, &result);
        result
    }

    /// Raw diff text for one path, exactly as the tool printed it.
    pub async fn show_diff(&self, reference: &RepositoryRef, path: &str) -> Result<String> {
        let local = self.local_repository(reference)?;
        if path.trim().is_empty() {
            return Err(precondition(&local, PreconditionReason::NoPathSelected));
        }

        let _guard = self.locks.acquire(local.local_path()).await;
        let progress = self.start(SyncOperation::ShowDiff, reference);

        let result = self.show_diff_locked(&local, path, &progress).await;
        finish(&progress, &result);
        result
    }

    /// Stages everything, commits with `message` and pushes.
    ///
    /// A clean tree short-circuits before staging; a commit that finds
    /// nothing staged ends successfully without pushing. Any other failure
    /// aborts at that step.
    pub async fn commit_and_push(
        &self,
        reference: &RepositoryRef,
        message: &str,
    ) -> Result<CommitPushOutcome> {
        let local = self.local_repository(reference)?;
        if message.trim().is_empty() {
            return Err(precondition(&local, PreconditionReason::EmptyCommitMessage));
        }

        let _guard = self.locks.acquire(local.local_path()).await;
        let progress = self.start(SyncOperation::CommitAndPush, reference);

        let result = self.commit_and_push_locked(&local, message, &progress).await;
        finish(&progress, &result);
        result
    }

    /// Clones every repository concurrently. Results are in input order.
    pub async fn clone_all(&self, references: &[RepositoryRef]) -> Vec<BatchItem<CommandOutcome>> {
        join_all(references.iter().map(|reference| async move {
            BatchItem {
                repository: reference.clone(),
                result: self.clone_repository(reference).await,
            }
        }))
        .await
    }

    /// Checks every repository for updates concurrently. Results are in input order.
    pub async fn check_updates_all(&self, references: &[RepositoryRef]) -> Vec<BatchItem<UpdateCheck>> {
        join_all(references.iter().map(|reference| async move {
            BatchItem {
                repository: reference.clone(),
                result: self.check_updates(reference).await,
            }
        }))
        .await
    }

    // ========================================================================
    // Lock-held bodies
    // ========================================================================

    async fn clone_locked(
        &self,
        local: &LocalRepository,
        progress: &OperationProgress,
    ) -> Result<CommandOutcome> {
        if local.is_present() {
            return Err(precondition(local, PreconditionReason::AlreadyExists));
        }

        let url = local.reference().remote_url.as_str();
        if url.trim().is_empty() {
            return Err(precondition(local, PreconditionReason::MissingRemoteUrl));
        }

        let base_dir = &self.config.base_dir;
        tokio::fs::create_dir_all(base_dir)
            .await
            .map_err(|e| SyncError::CreateBaseDir {
                path: base_dir.clone(),
                source: e,
            })?;

        log::info!(
            "Cloning {} into {:?}",
            redact_remote_url(url),
            local.local_path()
        );

        let outcome = self
            .git(
                base_dir,
                Step::Clone,
                &["clone", url, local.name()],
                self.config.timeouts.clone,
                progress,
            )
            .await;
        self.check(outcome, Step::Clone)
    }

    async fn refresh_locked(
        &self,
        local: &LocalRepository,
        progress: &OperationProgress,
    ) -> Result<LocalState> {
        self.require_present(local)?;

        let outcome = self
            .git(
                local.local_path(),
                Step::Status,
                &["status", "--porcelain"],
                self.config.timeouts.status,
                progress,
            )
            .await;
        let outcome = self.check(outcome, Step::Status)?;

        Ok(LocalState::from_entries(parse_status(&outcome.stdout)))
    }

    async fn check_updates_locked(
        &self,
        local: &LocalRepository,
        progress: &OperationProgress,
    ) -> Result<UpdateCheck> {
        self.require_present(local)?;
        let dir = local.local_path();

        let fetch = self
            .git(dir, Step::Fetch, &["fetch"], self.config.timeouts.fetch, progress)
            .await;
        if fetch.status == OutcomeStatus::StartFailed {
            return Err(self.fail(fetch, Step::Fetch));
        }
        if !fetch.succeeded {
            log::warn!(
                "Fetch for {} failed, counting against last fetched state: {}",
                local.name(),
                fetch.combined_output()
            );
        }

        let branch = self.current_branch(dir, progress).await;

        let report = match self.count_divergence(dir, &branch, progress).await {
            Ok(result) => UpdateReport::Divergence(result),
            Err(e) if e.is_tool_missing() => return Err(e),
            Err(e) => {
                log::info!(
                    "No divergence counts for {} ({}), falling back to status",
                    local.name(),
                    e
                );
                let status = self
                    .git(
                        dir,
                        Step::FallbackStatus,
                        &["status"],
                        self.config.timeouts.status,
                        progress,
                    )
                    .await;
                let status = self.check(status, Step::FallbackStatus)?;
                UpdateReport::Unavailable {
                    reason: e.to_string(),
                    raw: status.combined_output(),
                }
            }
        };

        Ok(UpdateCheck { fetch, report })
    }

    async fn pull_locked(
        &self,
        local: &LocalRepository,
        progress: &OperationProgress,
    ) -> Result<PullReport> {
        self.require_present(local)?;

        let outcome = self
            .git(
                local.local_path(),
                Step::Pull,
                &["pull"],
                self.config.timeouts.pull,
                progress,
            )
            .await;
        let outcome = self.check(outcome, Step::Pull)?;
        log::info!("Pulled {}", local.name());

        // The pull already changed the working copy; a failed refresh is
        // reported alongside its outcome.
        let (local_state, refresh_error) = match self.refresh_locked(local, progress).await {
            Ok(state) => (Some(state), None),
            Err(e) => {
                log::warn!("Pulled {} but could not refresh its state: {}", local.name(), e);
                (None, Some(e.to_string()))
            }
        };
        Ok(PullReport {
            outcome,
            local_state,
            refresh_error,
        })
    }

    async fn show_diff_locked(
        &self,
        local: &LocalRepository,
        path: &str,
        progress: &OperationProgress,
    ) -> Result<String> {
        self.require_present(local)?;

        let outcome = self
            .git(
                local.local_path(),
                Step::Diff,
                &["diff", "--", path],
                self.config.timeouts.diff,
                progress,
            )
            .await;
        Ok(self.check(outcome, Step::Diff)?.stdout)
    }

    async fn commit_and_push_locked(
        &self,
        local: &LocalRepository,
        message: &str,
        progress: &OperationProgress,
    ) -> Result<CommitPushOutcome> {
        self.require_present(local)?;
        let dir = local.local_path();
        let timeouts = &self.config.timeouts;
        let mut run = CommitPushRun::new(local.name());

        run.advance(CommitPushState::CheckingStatus);
        let status = self
            .git(dir, Step::Status, &["status", "--porcelain"], timeouts.status, progress)
            .await;
        let status = self.check(status, Step::Status)?;
        if status.stdout.trim().is_empty() {
            run.advance(CommitPushState::Clean);
            return Ok(CommitPushOutcome::Clean);
        }

        run.advance(CommitPushState::Staging);
        let staged = self
            .git(dir, Step::Stage, &["add", "-A"], timeouts.local, progress)
            .await;
        if !staged.succeeded {
            run.advance(CommitPushState::StageFailed);
            return Err(self.fail(staged, Step::Stage));
        }

        run.advance(CommitPushState::Committing);
        let commit = self
            .git(dir, Step::Commit, &["commit", "-m", message], timeouts.local, progress)
            .await;
        if !commit.succeeded {
            if is_nothing_to_commit(&commit) {
                run.advance(CommitPushState::NothingToCommit);
                return Ok(CommitPushOutcome::NothingToCommit(commit));
            }
            run.advance(CommitPushState::CommitFailed);
            return Err(self.fail(commit, Step::Commit));
        }

        run.advance(CommitPushState::Pushing);
        let push = self
            .git(dir, Step::Push, &["push"], timeouts.push, progress)
            .await;
        if !push.succeeded {
            run.advance(CommitPushState::PushFailed);
            return Err(self.fail(push, Step::Push));
        }

        run.advance(CommitPushState::Pushed);
        log::info!("Committed and pushed {}", local.name());
        Ok(CommitPushOutcome::Pushed(push))
    }

    // ========================================================================
    // Private helpers
    // ========================================================================

    async fn current_branch(&self, dir: &Path, progress: &OperationProgress) -> String {
        let outcome = self
            .git(
                dir,
                Step::BranchLookup,
                &["rev-parse", "--abbrev-ref", "HEAD"],
                self.config.timeouts.local,
                progress,
            )
            .await;

        let name = outcome.stdout.trim();
        if outcome.succeeded && !name.is_empty() && name != "HEAD" {
            return name.to_string();
        }

        log::warn!(
            "Could not determine current branch in {:?}, assuming '{}'",
            dir,
            self.config.default_branch
        );
        self.config.default_branch.clone()
    }

    async fn count_divergence(
        &self,
        dir: &Path,
        branch: &str,
        progress: &OperationProgress,
    ) -> Result<DivergenceResult> {
        let range = comparison_range(branch);
        let outcome = self
            .git(
                dir,
                Step::DivergenceCount,
                &["rev-list", "--left-right", "--count", &range],
                self.config.timeouts.local,
                progress,
            )
            .await;
        let outcome = self.check(outcome, Step::DivergenceCount)?;

        compute_divergence(branch, &outcome.stdout).map_err(|e| SyncError::ParseFailure {
            step: Step::DivergenceCount,
            reason: e.to_string(),
        })
    }

    fn start(&self, operation: SyncOperation, reference: &RepositoryRef) -> OperationProgress {
        match &self.progress {
            Some(broadcaster) => broadcaster.start_operation(operation, &reference.name),
            None => OperationProgress::disabled(operation, &reference.name),
        }
    }

    fn require_present(&self, local: &LocalRepository) -> Result<()> {
        if local.is_present() {
            Ok(())
        } else {
            Err(precondition(local, PreconditionReason::Missing))
        }
    }

    /// Runs the tool in `dir`. A budget of 0 seconds means no timeout.
    async fn git(
        &self,
        dir: &Path,
        step: Step,
        args: &[&str],
        budget_secs: u64,
        progress: &OperationProgress,
    ) -> CommandOutcome {
        progress.step(step);
        let args: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();

        log::debug!(
            "[{}] {} {} (in {:?})",
            step,
            self.config.git_program,
            args.iter()
                .map(|arg| redact_remote_url(arg))
                .collect::<Vec<_>>()
                .join(" "),
            dir
        );

        self.runner
            .run(&self.config.git_program, &args, dir, budget(budget_secs))
            .await
    }

    fn check(&self, outcome: CommandOutcome, step: Step) -> Result<CommandOutcome> {
        outcome.into_result(step, &self.config.git_program)
    }

    fn fail(&self, outcome: CommandOutcome, step: Step) -> SyncError {
        outcome.into_error(step, &self.config.git_program)
    }
}

/// Tracks and logs the state of one commit-and-push run.
struct CommitPushRun<'a> {
    repository: &'a str,
    state: CommitPushState,
}

impl<'a> CommitPushRun<'a> {
    fn new(repository: &'a str) -> Self {
        Self {
            repository,
            state: CommitPushState::Idle,
        }
    }

    fn advance(&mut self, next: CommitPushState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {:?} -> {:?}",
            self.state,
            next
        );
        log::debug!("{}: {:?} -> {:?}", self.repository, self.state, next);
        self.state = next;
    }
}

fn is_nothing_to_commit(outcome: &CommandOutcome) -> bool {
    matches!(outcome.status, OutcomeStatus::Exited { .. })
        && NOTHING_TO_COMMIT_MARKERS
            .iter()
            .any(|marker| outcome.mentions(marker))
}

fn precondition(local: &LocalRepository, reason: PreconditionReason) -> SyncError {
    SyncError::Precondition {
        path: local.local_path().to_path_buf(),
        reason,
    }
}

fn finish<T>(progress: &OperationProgress, result: &Result<T>) {
    match result {
        Ok(_) => progress.completed("Done"),
        Err(e) => progress.failed(&e.to_string()),
    }
}
