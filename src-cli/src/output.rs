//! Rendering of orchestrator results, as text or JSON.

use anyhow::Result;
use serde::Serialize;
use serde_json::{json, Value};

use repomirror::{
    BatchItem, CommitPushOutcome, LocalState, PullReport, RepositoryRef, UpdateCheck,
    UpdateReport,
};

pub struct Printer {
    json: bool,
}

impl Printer {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    fn print_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    pub fn repositories(&self, repos: &[RepositoryRef]) -> Result<()> {
        if self.json {
            return self.print_json(repos);
        }
        for repo in repos {
            println!("{}\t{}", repo.name, repo.remote_url);
        }
        Ok(())
    }

    pub fn local_state(&self, name: &str, state: &LocalState) -> Result<()> {
        if self.json {
            return self.print_json(state);
        }
        print_local_state(name, state);
        Ok(())
    }

    pub fn pull(&self, name: &str, report: &PullReport) -> Result<()> {
        if self.json {
            return self.print_json(report);
        }
        let output = report.outcome.combined_output();
        if !output.is_empty() {
            println!("{}", output);
        }
        match (&report.local_state, &report.refresh_error) {
            (Some(state), _) => print_local_state(name, state),
            (None, Some(e)) => eprintln!("{}: pulled, but status failed: {}", name, e),
            (None, None) => {}
        }
        Ok(())
    }

    pub fn diff(&self, text: &str) -> Result<()> {
        if self.json {
            return self.print_json(&json!({ "diff": text }));
        }
        print!("{}", text);
        Ok(())
    }

    pub fn commit_push(&self, name: &str, outcome: &CommitPushOutcome) -> Result<()> {
        if self.json {
            return self.print_json(outcome);
        }
        match outcome {
            CommitPushOutcome::Clean => println!("{}: nothing to push", name),
            CommitPushOutcome::NothingToCommit(_) => println!("{}: nothing to commit", name),
            CommitPushOutcome::Pushed(push) => {
                let output = push.combined_output();
                if !output.is_empty() {
                    println!("{}", output);
                }
                println!("{}: pushed", name);
            }
        }
        Ok(())
    }

    /// Prints every item; failures go to stderr in text mode.
    pub fn batch<T: Serialize>(
        &self,
        items: &[BatchItem<T>],
        render: impl Fn(&str, &T),
    ) -> Result<()> {
        if self.json {
            let values: Vec<Value> = items
                .iter()
                .map(|item| match &item.result {
                    Ok(value) => json!({ "repository": item.repository.name, "result": value }),
                    Err(e) => json!({ "repository": item.repository.name, "error": e.to_string() }),
                })
                .collect();
            return self.print_json(&values);
        }

        for item in items {
            match &item.result {
                Ok(value) => render(&item.repository.name, value),
                Err(e) => eprintln!("{}: {}", item.repository.name, e),
            }
        }
        Ok(())
    }
}

fn print_local_state(name: &str, state: &LocalState) {
    match state {
        LocalState::Clean => println!("{}: clean", name),
        LocalState::Changes(entries) => {
            println!("{}: {} changed", name, entries.len());
            for entry in entries {
                println!("  {:<2} {}", entry.code, entry.path);
            }
        }
    }
}

pub fn render_update_check(name: &str, check: &UpdateCheck) {
    if !check.fetch.succeeded {
        println!("{}: fetch failed: {}", name, check.fetch.combined_output());
    }

    match &check.report {
        UpdateReport::Divergence(result) if result.is_up_to_date() => {
            println!("{} ({}): up to date", name, result.branch);
        }
        UpdateReport::Divergence(result) => {
            println!(
                "{} ({}): {} behind, {} ahead",
                name, result.branch, result.behind, result.ahead
            );
        }
        UpdateReport::Unavailable { reason, raw } => {
            println!("{}: ahead/behind unavailable ({})", name, reason);
            println!("{}", raw);
        }
    }
}

pub fn render_clone(name: &str, _outcome: &repomirror::CommandOutcome) {
    println!("{}: cloned", name);
}
