//! Operation progress events for live display.
//!
//! The orchestrator reports each operation's phases on a broadcast channel.
//! Sending with no subscribers is fine; events are simply dropped.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::Step;

/// Orchestrator operation an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncOperation {
    Clone,
    RefreshLocalState,
    CheckUpdates,
    Pull,
    ShowDiff,
    CommitAndPush,
}

impl std::fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncOperation::Clone => write!(f, "clone"),
            SyncOperation::RefreshLocalState => write!(f, "refresh"),
            SyncOperation::CheckUpdates => write!(f, "check updates"),
            SyncOperation::Pull => write!(f, "pull"),
            SyncOperation::ShowDiff => write!(f, "diff"),
            SyncOperation::CommitAndPush => write!(f, "commit and push"),
        }
    }
}

/// Phase of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Starting,
    Cloning,
    CheckingStatus,
    Fetching,
    ResolvingBranch,
    Counting,
    Pulling,
    Diffing,
    Staging,
    Committing,
    Pushing,
    Completed,
    Failed,
}

impl From<Step> for SyncPhase {
    fn from(step: Step) -> Self {
        match step {
            Step::Clone => SyncPhase::Cloning,
            Step::Status | Step::FallbackStatus => SyncPhase::CheckingStatus,
            Step::Fetch => SyncPhase::Fetching,
            Step::BranchLookup => SyncPhase::ResolvingBranch,
            Step::DivergenceCount => SyncPhase::Counting,
            Step::Pull => SyncPhase::Pulling,
            Step::Diff => SyncPhase::Diffing,
            Step::Stage => SyncPhase::Staging,
            Step::Commit => SyncPhase::Committing,
            Step::Push => SyncPhase::Pushing,
        }
    }
}

/// A progress event for one operation on one repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncProgressEvent {
    pub operation_id: String,
    pub operation: SyncOperation,
    pub repository: String,
    pub phase: SyncPhase,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Emits events for a single operation run.
pub struct OperationProgress {
    operation_id: String,
    operation: SyncOperation,
    repository: String,
    sender: Option<Arc<broadcast::Sender<SyncProgressEvent>>>,
}

impl OperationProgress {
    fn new(
        operation: SyncOperation,
        repository: &str,
        sender: Option<Arc<broadcast::Sender<SyncProgressEvent>>>,
    ) -> Self {
        Self {
            operation_id: Uuid::new_v4().to_string(),
            operation,
            repository: repository.to_string(),
            sender,
        }
    }

    /// A tracker that reports nowhere.
    pub fn disabled(operation: SyncOperation, repository: &str) -> Self {
        Self::new(operation, repository, None)
    }

    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    pub fn phase(&self, phase: SyncPhase, message: &str) {
        self.emit(phase, message, None);
    }

    pub fn step(&self, step: Step) {
        self.emit(step.into(), &format!("Running {}", step), None);
    }

    pub fn completed(&self, message: &str) {
        self.emit(SyncPhase::Completed, message, None);
    }

    pub fn failed(&self, error: &str) {
        self.emit(SyncPhase::Failed, "Operation failed", Some(error));
    }

    fn emit(&self, phase: SyncPhase, message: &str, error: Option<&str>) {
        let Some(sender) = &self.sender else {
            return;
        };
        // No active receivers is fine
        let _ = sender.send(SyncProgressEvent {
            operation_id: self.operation_id.clone(),
            operation: self.operation,
            repository: self.repository.clone(),
            phase,
            message: message.to_string(),
            error: error.map(str::to_string),
            timestamp: Utc::now(),
        });
    }
}

/// Fan-out of progress events to any number of subscribers.
#[derive(Clone)]
pub struct ProgressBroadcaster {
    sender: Arc<broadcast::Sender<SyncProgressEvent>>,
}

impl ProgressBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncProgressEvent> {
        self.sender.subscribe()
    }

    /// Starts tracking a new operation run.
    pub fn start_operation(&self, operation: SyncOperation, repository: &str) -> OperationProgress {
        let progress = OperationProgress::new(operation, repository, Some(Arc::clone(&self.sender)));
        progress.phase(SyncPhase::Starting, &format!("Starting {}", operation));
        progress
    }
}

impl Default for ProgressBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}
