//! External command execution.
//!
//! The orchestrator never spawns processes itself; it goes through a
//! [`CommandRunner`], which reports what happened as a [`CommandOutcome`]
//! without interpreting the tool's output.

pub mod process;
pub mod scripted;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{Result, Step, SyncError};

pub use process::ProcessRunner;
pub use scripted::{Invocation, ScriptedRunner};

/// Prefix written to stderr when the program could not be launched.
pub const START_FAILURE_MARKER: &str = "[repomirror] failed to start";

/// Prefix written to stderr when the program was killed for running too long.
pub const TIMEOUT_MARKER: &str = "[repomirror] timed out";

/// Runs an external program to completion (or until its timeout).
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `program` with `args` in `working_dir`.
    ///
    /// `None` waits indefinitely. With `Some(limit)` the process is killed
    /// and reaped once `limit` elapses.
    async fn run(
        &self,
        program: &str,
        args: &[String],
        working_dir: &Path,
        timeout: Option<Duration>,
    ) -> CommandOutcome;
}

/// How a command invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum OutcomeStatus {
    /// The process ran and exited. `code` is `None` when it died from a signal.
    Exited { code: Option<i32> },
    /// The process could not be spawned.
    StartFailed,
    /// The process exceeded its time budget and was killed.
    TimedOut { timeout: Duration },
}

/// Captured result of one external command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutcome {
    /// True iff the process started and exited with status zero.
    pub succeeded: bool,
    pub stdout: String,
    pub stderr: String,
    pub status: OutcomeStatus,
}

impl CommandOutcome {
    /// A zero-exit outcome with the given stdout.
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            stdout: stdout.into(),
            stderr: String::new(),
            status: OutcomeStatus::Exited { code: Some(0) },
        }
    }

    /// An outcome for a process that ran and exited with `code`.
    pub fn exited(code: Option<i32>, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            succeeded: code == Some(0),
            stdout: stdout.into(),
            stderr: stderr.into(),
            status: OutcomeStatus::Exited { code },
        }
    }

    /// An outcome for a process that never started.
    pub fn start_failed(program: &str, reason: impl std::fmt::Display) -> Self {
        Self {
            succeeded: false,
            stdout: String::new(),
            stderr: format!("{} '{}': {}", START_FAILURE_MARKER, program, reason),
            status: OutcomeStatus::StartFailed,
        }
    }

    /// An outcome for a process killed after `timeout`, keeping partial output.
    pub fn timed_out(timeout: Duration, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        let mut stderr = stderr.into();
        if !stderr.is_empty() && !stderr.ends_with('\n') {
            stderr.push('\n');
        }
        stderr.push_str(&format!(
            "{} after {}s",
            TIMEOUT_MARKER,
            timeout.as_secs_f64()
        ));

        Self {
            succeeded: false,
            stdout: stdout.into(),
            stderr,
            status: OutcomeStatus::TimedOut { timeout },
        }
    }

    /// Stdout followed by stderr, trimmed. This is what a user would have
    /// seen in a terminal.
    pub fn combined_output(&self) -> String {
        let stdout = self.stdout.trim();
        let stderr = self.stderr.trim();
        match (stdout.is_empty(), stderr.is_empty()) {
            (true, true) => String::new(),
            (false, true) => stdout.to_string(),
            (true, false) => stderr.to_string(),
            (false, false) => format!("{}\n{}", stdout, stderr),
        }
    }

    /// Case-insensitive search across both captured streams.
    pub fn mentions(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.stdout.to_lowercase().contains(&needle) || self.stderr.to_lowercase().contains(&needle)
    }

    /// Converts a failed outcome into the matching typed error.
    pub fn into_result(self, step: Step, program: &str) -> Result<CommandOutcome> {
        if self.succeeded {
            Ok(self)
        } else {
            Err(self.into_error(step, program))
        }
    }

    /// The typed error describing this outcome's failure.
    pub fn into_error(self, step: Step, program: &str) -> SyncError {
        match self.status {
            OutcomeStatus::StartFailed => SyncError::StartFailure {
                step,
                program: program.to_string(),
                message: self.stderr,
            },
            OutcomeStatus::TimedOut { timeout } => SyncError::Timeout {
                step,
                timeout,
                stderr: self.stderr,
            },
            OutcomeStatus::Exited { code } => SyncError::ToolFailure {
                step,
                exit_code: code,
                message: format_tool_error(&self.stdout, &self.stderr, code),
            },
        }
    }
}

/// Formats a tool error with both stderr and stdout for better debugging.
pub fn format_tool_error(stdout: &str, stderr: &str, code: Option<i32>) -> String {
    let stderr = stderr.trim();
    let stdout = stdout.trim();

    match (stderr.is_empty(), stdout.is_empty()) {
        (true, true) => match code {
            Some(code) => format!("Command failed with exit code {}", code),
            None => "Command terminated by signal".to_string(),
        },
        (true, false) => stdout.to_string(),
        (false, true) => stderr.to_string(),
        (false, false) => format!("{}\n{}", stderr, stdout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_tool_error_empty_output() {
        assert_eq!(
            format_tool_error("", "", Some(1)),
            "Command failed with exit code 1"
        );
        assert_eq!(format_tool_error("", "  ", None), "Command terminated by signal");
    }

    #[test]
    fn test_format_tool_error_stderr_only() {
        assert_eq!(
            format_tool_error("", "fatal: not a git repository\n", Some(128)),
            "fatal: not a git repository"
        );
    }

    #[test]
    fn test_format_tool_error_both() {
        assert_eq!(
            format_tool_error("some output", "some error", Some(1)),
            "some error\nsome output"
        );
    }

    #[test]
    fn test_markers_are_distinct() {
        let start = CommandOutcome::start_failed("git", "No such file or directory");
        let timeout = CommandOutcome::timed_out(Duration::from_secs(2), "", "");
        let exit = CommandOutcome::exited(Some(1), "", "error: boom");

        assert!(start.stderr.starts_with(START_FAILURE_MARKER));
        assert!(!start.stderr.contains(TIMEOUT_MARKER));
        assert!(timeout.stderr.starts_with(TIMEOUT_MARKER));
        assert!(!timeout.stderr.contains(START_FAILURE_MARKER));
        assert!(!exit.stderr.contains(START_FAILURE_MARKER));
        assert!(!exit.stderr.contains(TIMEOUT_MARKER));
        assert!(!start.succeeded && !timeout.succeeded && !exit.succeeded);
    }

    #[test]
    fn test_timed_out_keeps_partial_stderr() {
        let outcome = CommandOutcome::timed_out(Duration::from_millis(500), "", "Receiving objects");
        assert_eq!(outcome.stderr, "Receiving objects\n[repomirror] timed out after 0.5s");
    }

    #[test]
    fn test_into_result_maps_each_failure_kind() {
        let err = CommandOutcome::start_failed("git", "not found")
            .into_result(Step::Fetch, "git")
            .unwrap_err();
        assert!(matches!(err, SyncError::StartFailure { step: Step::Fetch, .. }));

        let err = CommandOutcome::timed_out(Duration::from_secs(1), "", "")
            .into_result(Step::Push, "git")
            .unwrap_err();
        assert!(matches!(err, SyncError::Timeout { step: Step::Push, .. }));

        let err = CommandOutcome::exited(Some(128), "", "fatal: bad revision")
            .into_result(Step::DivergenceCount, "git")
            .unwrap_err();
        match err {
            SyncError::ToolFailure {
                step,
                exit_code,
                message,
            } => {
                assert_eq!(step, Step::DivergenceCount);
                assert_eq!(exit_code, Some(128));
                assert_eq!(message, "fatal: bad revision");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(CommandOutcome::success("ok").into_result(Step::Status, "git").is_ok());
    }

    #[test]
    fn test_combined_output_and_mentions() {
        let outcome = CommandOutcome::exited(
            Some(1),
            "On branch main\nnothing to commit, working tree clean\n",
            "",
        );
        assert_eq!(
            outcome.combined_output(),
            "On branch main\nnothing to commit, working tree clean"
        );
        assert!(outcome.mentions("Nothing To Commit"));
        assert!(!outcome.mentions("rejected"));
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = CommandOutcome::exited(Some(0), "done", "");
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"succeeded\":true"));
        assert!(json.contains("\"kind\":\"exited\""));
        assert!(json.contains("\"code\":0"));
    }
}
