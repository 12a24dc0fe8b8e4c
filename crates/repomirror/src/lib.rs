pub mod config;
pub mod divergence;
pub mod error;
pub mod orchestrator;
pub mod paths;
pub mod progress;
pub mod repository;
pub mod runner;
pub mod sanitize;
pub mod status;

pub use config::{SyncConfig, TimeoutSettings};
pub use divergence::{compute_divergence, DivergenceResult};
pub use error::{PreconditionReason, Result, Step, SyncError};
pub use orchestrator::{
    BatchItem, CommitPushOutcome, CommitPushState, LocalState, PullReport, SyncOrchestrator,
    UpdateCheck, UpdateReport,
};
pub use progress::{ProgressBroadcaster, SyncOperation, SyncPhase, SyncProgressEvent};
pub use repository::{LocalRepository, RepositoryRef};
pub use runner::{CommandOutcome, CommandRunner, OutcomeStatus, ProcessRunner, ScriptedRunner};
pub use sanitize::redact_remote_url;
pub use status::{parse_status, ChangeEntry, ChangeKind};
