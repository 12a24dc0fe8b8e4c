//! Error types for repository synchronization.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// The tool invocation an error or outcome belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Clone,
    Status,
    Fetch,
    BranchLookup,
    DivergenceCount,
    FallbackStatus,
    Pull,
    Diff,
    Stage,
    Commit,
    Push,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Clone => write!(f, "clone"),
            Step::Status => write!(f, "status"),
            Step::Fetch => write!(f, "fetch"),
            Step::BranchLookup => write!(f, "branch lookup"),
            Step::DivergenceCount => write!(f, "divergence count"),
            Step::FallbackStatus => write!(f, "fallback status"),
            Step::Pull => write!(f, "pull"),
            Step::Diff => write!(f, "diff"),
            Step::Stage => write!(f, "stage"),
            Step::Commit => write!(f, "commit"),
            Step::Push => write!(f, "push"),
        }
    }
}

/// Why an operation refused to run against a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreconditionReason {
    /// Clone target is already present on disk.
    AlreadyExists,
    /// The working copy has not been cloned yet.
    Missing,
    /// A diff was requested without a file path.
    NoPathSelected,
    /// A commit was requested with a blank message.
    EmptyCommitMessage,
    /// A clone was requested without a remote URL.
    MissingRemoteUrl,
}

impl fmt::Display for PreconditionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreconditionReason::AlreadyExists => write!(f, "already exists"),
            PreconditionReason::Missing => write!(f, "local working copy is missing"),
            PreconditionReason::NoPathSelected => write!(f, "no file path selected"),
            PreconditionReason::EmptyCommitMessage => write!(f, "commit message is empty"),
            PreconditionReason::MissingRemoteUrl => write!(f, "no remote URL to clone from"),
        }
    }
}

/// Errors that can occur while synchronizing a repository.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("{step}: failed to start '{program}': {message}")]
    StartFailure {
        step: Step,
        program: String,
        message: String,
    },

    #[error("{step}: timed out after {}s", .timeout.as_secs_f64())]
    Timeout {
        step: Step,
        timeout: Duration,
        /// Whatever the tool wrote to stderr before it was killed.
        stderr: String,
    },

    #[error("{step} failed: {message}")]
    ToolFailure {
        step: Step,
        exit_code: Option<i32>,
        message: String,
    },

    #[error("{step}: could not parse tool output: {reason}")]
    ParseFailure { step: Step, reason: String },

    #[error("'{}': {reason}", .path.display())]
    Precondition {
        path: PathBuf,
        reason: PreconditionReason,
    },

    #[error("Invalid repository name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Failed to read config file '{}': {source}", .path.display())]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{}': {source}", .path.display())]
    ParseConfig {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to create base directory '{}': {source}", .path.display())]
    CreateBaseDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    /// The step this error happened at, if it came from a tool invocation.
    pub fn step(&self) -> Option<Step> {
        match self {
            SyncError::StartFailure { step, .. }
            | SyncError::Timeout { step, .. }
            | SyncError::ToolFailure { step, .. }
            | SyncError::ParseFailure { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// The precondition that was violated, if any.
    pub fn precondition(&self) -> Option<PreconditionReason> {
        match self {
            SyncError::Precondition { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    /// Returns true when the tool itself could not be launched.
    pub fn is_tool_missing(&self) -> bool {
        matches!(self, SyncError::StartFailure { .. })
    }
}

/// Result type for synchronization operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_message_mentions_reason() {
        let err = SyncError::Precondition {
            path: PathBuf::from("/tmp/base/demo"),
            reason: PreconditionReason::AlreadyExists,
        };
        assert_eq!(err.to_string(), "'/tmp/base/demo': already exists");
        assert_eq!(err.precondition(), Some(PreconditionReason::AlreadyExists));
        assert_eq!(err.step(), None);
    }

    #[test]
    fn test_step_is_reported() {
        let err = SyncError::ToolFailure {
            step: Step::Push,
            exit_code: Some(1),
            message: "rejected".to_string(),
        };
        assert_eq!(err.step(), Some(Step::Push));
        assert_eq!(err.to_string(), "push failed: rejected");
        assert!(!err.is_tool_missing());
    }

    #[test]
    fn test_timeout_message() {
        let err = SyncError::Timeout {
            step: Step::Fetch,
            timeout: Duration::from_secs(60),
            stderr: String::new(),
        };
        assert_eq!(err.to_string(), "fetch: timed out after 60s");
    }
}
