//! A command runner that replays canned outcomes.
//!
//! Used to exercise orchestration logic without spawning processes.
//! Responses are keyed by the first argument (the tool subcommand, e.g.
//! `"status"` or `"push"`). Each key holds a queue; the last queued response
//! is repeated once the queue is down to one entry. Subcommands without a
//! scripted response succeed with empty output.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::{CommandOutcome, CommandRunner};

/// One recorded call to [`ScriptedRunner::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub timeout: Option<Duration>,
}

impl Invocation {
    /// The tool subcommand (first argument), or `""` when there were no arguments.
    pub fn subcommand(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or("")
    }
}

#[derive(Default)]
struct Activity {
    active_total: usize,
    peak_total: usize,
    active_by_dir: HashMap<PathBuf, usize>,
    peak_by_dir: HashMap<PathBuf, usize>,
}

/// Canned-response [`CommandRunner`] that records every invocation.
#[derive(Default)]
pub struct ScriptedRunner {
    responses: Mutex<HashMap<String, VecDeque<CommandOutcome>>>,
    calls: Mutex<Vec<Invocation>>,
    activity: Mutex<Activity>,
    delay: Option<Duration>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `outcome` for the next call whose first argument is `subcommand`.
    pub fn with_response(self, subcommand: &str, outcome: CommandOutcome) -> Self {
        self.push_response(subcommand, outcome);
        self
    }

    /// Makes every call take `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queues `outcome` for `subcommand` on a shared runner.
    pub fn push_response(&self, subcommand: &str, outcome: CommandOutcome) {
        lock(&self.responses)
            .entry(subcommand.to_string())
            .or_default()
            .push_back(outcome);
    }

    /// All invocations so far, in call order.
    pub fn calls(&self) -> Vec<Invocation> {
        lock(&self.calls).clone()
    }

    /// Total number of invocations.
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Number of invocations whose first argument was `subcommand`.
    pub fn calls_for(&self, subcommand: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| call.subcommand() == subcommand)
            .count()
    }

    /// Subcommands in call order.
    pub fn subcommands(&self) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .map(|call| call.subcommand().to_string())
            .collect()
    }

    /// Highest number of calls that were in flight at the same time.
    pub fn peak_concurrency(&self) -> usize {
        lock(&self.activity).peak_total
    }

    /// Highest number of calls in flight at the same time for one working directory.
    pub fn peak_concurrency_in(&self, dir: &Path) -> usize {
        lock(&self.activity)
            .peak_by_dir
            .get(dir)
            .copied()
            .unwrap_or(0)
    }

    fn next_response(&self, subcommand: &str) -> CommandOutcome {
        let mut responses = lock(&self.responses);
        match responses.get_mut(subcommand) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_else(|| CommandOutcome::success("")),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| CommandOutcome::success("")),
            None => CommandOutcome::success(""),
        }
    }

    fn enter(&self, dir: &Path) {
        let mut activity = lock(&self.activity);
        activity.active_total += 1;
        activity.peak_total = activity.peak_total.max(activity.active_total);

        let active = {
            let count = activity.active_by_dir.entry(dir.to_path_buf()).or_insert(0);
            *count += 1;
            *count
        };
        let peak = activity.peak_by_dir.entry(dir.to_path_buf()).or_insert(0);
        *peak = (*peak).max(active);
    }

    fn leave(&self, dir: &Path) {
        let mut activity = lock(&self.activity);
        activity.active_total = activity.active_total.saturating_sub(1);
        if let Some(count) = activity.active_by_dir.get_mut(dir) {
            *count = count.saturating_sub(1);
        }
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        working_dir: &Path,
        timeout: Option<Duration>,
    ) -> CommandOutcome {
        let invocation = Invocation {
            program: program.to_string(),
            args: args.to_vec(),
            working_dir: working_dir.to_path_buf(),
            timeout,
        };
        let subcommand = invocation.subcommand().to_string();
        lock(&self.calls).push(invocation);

        self.enter(working_dir);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.leave(working_dir);

        self.next_response(&subcommand)
    }
}
