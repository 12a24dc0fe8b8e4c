//! Result types returned by orchestrator operations.

use serde::Serialize;

use crate::divergence::DivergenceResult;
use crate::error::Step;
use crate::runner::CommandOutcome;
use crate::repository::RepositoryRef;
use crate::status::ChangeEntry;

/// Working-tree state of a local copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "entries", rename_all = "camelCase")]
pub enum LocalState {
    /// Status reported no changes.
    Clean,
    /// Changed paths, in the order the tool listed them.
    Changes(Vec<ChangeEntry>),
}

impl LocalState {
    pub fn from_entries(entries: Vec<ChangeEntry>) -> Self {
        if entries.is_empty() {
            LocalState::Clean
        } else {
            LocalState::Changes(entries)
        }
    }

    pub fn is_clean(&self) -> bool {
        matches!(self, LocalState::Clean)
    }

    pub fn entries(&self) -> &[ChangeEntry] {
        match self {
            LocalState::Clean => &[],
            LocalState::Changes(entries) => entries,
        }
    }
}

/// Outcome of checking a repository against its remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCheck {
    /// The fetch that preceded the count. A failed fetch is reported here
    /// rather than aborting, since counts against the last fetched state
    /// are still meaningful.
    pub fetch: CommandOutcome,
    pub report: UpdateReport,
}

/// Divergence counts, or raw status text when they could not be computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum UpdateReport {
    Divergence(DivergenceResult),
    /// Typically no upstream tracking branch is configured.
    Unavailable {
        /// Why the structured count failed.
        reason: String,
        /// Output of a plain status query.
        raw: String,
    },
}

impl UpdateReport {
    pub fn divergence(&self) -> Option<&DivergenceResult> {
        match self {
            UpdateReport::Divergence(result) => Some(result),
            UpdateReport::Unavailable { .. } => None,
        }
    }
}

/// A successful pull and the working-tree state right after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullReport {
    pub outcome: CommandOutcome,
    /// `None` when the follow-up status query failed.
    pub local_state: Option<LocalState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_error: Option<String>,
}

/// States of a commit-and-push run.
///
/// ```text
/// Idle → CheckingStatus → Clean
///                       → Staging → StageFailed
///                                 → Committing → NothingToCommit
///                                              → CommitFailed
///                                              → Pushing → PushFailed
///                                                        → Pushed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CommitPushState {
    Idle,
    CheckingStatus,
    Clean,
    Staging,
    StageFailed,
    Committing,
    NothingToCommit,
    CommitFailed,
    Pushing,
    PushFailed,
    Pushed,
}

impl CommitPushState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CommitPushState::Clean
                | CommitPushState::StageFailed
                | CommitPushState::NothingToCommit
                | CommitPushState::CommitFailed
                | CommitPushState::PushFailed
                | CommitPushState::Pushed
        )
    }

    /// Terminal states that count as success.
    pub fn is_success(self) -> bool {
        matches!(
            self,
            CommitPushState::Clean | CommitPushState::NothingToCommit | CommitPushState::Pushed
        )
    }

    pub fn can_transition_to(self, next: CommitPushState) -> bool {
        use CommitPushState::*;
        matches!(
            (self, next),
            (Idle, CheckingStatus)
                | (CheckingStatus, Clean)
                | (CheckingStatus, Staging)
                | (Staging, StageFailed)
                | (Staging, Committing)
                | (Committing, NothingToCommit)
                | (Committing, CommitFailed)
                | (Committing, Pushing)
                | (Pushing, PushFailed)
                | (Pushing, Pushed)
        )
    }

    /// Terminal failure state for an error raised at `step`.
    ///
    /// A failing status query happens before the run can branch and has no
    /// terminal state of its own.
    pub fn failed_at(step: Step) -> Option<CommitPushState> {
        match step {
            Step::Stage => Some(CommitPushState::StageFailed),
            Step::Commit => Some(CommitPushState::CommitFailed),
            Step::Push => Some(CommitPushState::PushFailed),
            _ => None,
        }
    }
}

/// Successful end of a commit-and-push run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "outcome", rename_all = "camelCase")]
pub enum CommitPushOutcome {
    /// Nothing to do: status was empty. No stage, commit or push ran.
    Clean,
    /// Commit found nothing staged; the failing commit's output is kept.
    NothingToCommit(CommandOutcome),
    /// Push completed; its outcome is kept.
    Pushed(CommandOutcome),
}

impl CommitPushOutcome {
    pub fn state(&self) -> CommitPushState {
        match self {
            CommitPushOutcome::Clean => CommitPushState::Clean,
            CommitPushOutcome::NothingToCommit(_) => CommitPushState::NothingToCommit,
            CommitPushOutcome::Pushed(_) => CommitPushState::Pushed,
        }
    }
}

/// Per-repository result of a batch operation.
#[derive(Debug)]
pub struct BatchItem<T> {
    pub repository: RepositoryRef,
    pub result: crate::error::Result<T>,
}
