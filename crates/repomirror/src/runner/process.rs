//! Command runner backed by real child processes.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

use super::{CommandOutcome, CommandRunner};

/// How long to keep draining pipes after a timed-out process was killed.
/// Grandchildren (ssh, credential helpers) can hold the pipes open.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Spawns the program as a child process and captures its output.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    env: Vec<(String, String)>,
}

impl ProcessRunner {
    /// Creates a runner that inherits the current environment unchanged.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an environment variable to every spawned process.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        working_dir: &Path,
        timeout: Option<Duration>,
    ) -> CommandOutcome {
        let mut cmd = Command::new(program);
        cmd.current_dir(working_dir)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                log::debug!("Failed to spawn {} in {:?}: {}", program, working_dir, e);
                return CommandOutcome::start_failed(program, e);
            }
        };

        let mut stdout_task = tokio::spawn(read_pipe(child.stdout.take()));
        let mut stderr_task = tokio::spawn(read_pipe(child.stderr.take()));

        let waited = match timeout {
            None => Some(child.wait().await),
            Some(limit) => tokio::time::timeout(limit, child.wait()).await.ok(),
        };

        match waited {
            Some(Ok(status)) => {
                let stdout = collect(&mut stdout_task, None).await;
                let stderr = collect(&mut stderr_task, None).await;
                CommandOutcome::exited(status.code(), stdout, stderr)
            }
            Some(Err(e)) => {
                let _ = child.kill().await;
                let stdout = collect(&mut stdout_task, Some(DRAIN_GRACE)).await;
                let mut stderr = collect(&mut stderr_task, Some(DRAIN_GRACE)).await;
                stderr.push_str(&format!("\nfailed to wait for '{}': {}", program, e));
                CommandOutcome::exited(None, stdout, stderr)
            }
            None => {
                // `kill` also reaps the child.
                if let Err(e) = child.kill().await {
                    log::warn!("Failed to kill timed-out {}: {}", program, e);
                }
                let stdout = collect(&mut stdout_task, Some(DRAIN_GRACE)).await;
                let stderr = collect(&mut stderr_task, Some(DRAIN_GRACE)).await;
                let limit = timeout.unwrap_or_default();
                log::warn!(
                    "{} {} timed out after {:?} in {:?}",
                    program,
                    args.first().map(String::as_str).unwrap_or(""),
                    limit,
                    working_dir
                );
                CommandOutcome::timed_out(limit, stdout, stderr)
            }
        }
    }
}

async fn read_pipe<R>(pipe: Option<R>) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        // Keep whatever arrived before a read error.
        let _ = pipe.read_to_end(&mut buf).await;
    }
    buf
}

async fn collect(task: &mut JoinHandle<Vec<u8>>, grace: Option<Duration>) -> String {
    let bytes = match grace {
        None => task.await.unwrap_or_default(),
        Some(grace) => match tokio::time::timeout(grace, &mut *task).await {
            Ok(joined) => joined.unwrap_or_default(),
            Err(_) => {
                task.abort();
                Vec::new()
            }
        },
    };
    String::from_utf8_lossy(&bytes).into_owned()
}
