//! repomirror: keeps local working copies of a GitHub account's repositories
//! in sync with their remotes.
//!
//! # Usage
//!
//! ```text
//! repomirror list <user>
//! repomirror clone <user> [names...]
//! repomirror status <name>
//! repomirror check <name>...
//! repomirror pull <name>
//! repomirror diff <name> <path>
//! repomirror push <name> [-m <message>]
//! ```

mod github;
mod output;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, info};
use tokio::sync::broadcast::error::RecvError;

use repomirror::{
    BatchItem, PreconditionReason, ProgressBroadcaster, RepositoryRef, SyncConfig,
    SyncOrchestrator, SyncPhase,
};

use github::GitHubClient;
use output::Printer;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "repomirror",
    version,
    about = "Clone, check and sync local copies of a GitHub account's repositories",
    long_about = None,
)]
struct Cli {
    /// YAML config file. Defaults to `<config dir>/repomirror/config.yaml` when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the working copies; overrides the config file.
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List a user's repositories.
    List { user: String },

    /// Clone a user's repositories. Clones all of them when no names are given.
    Clone { user: String, names: Vec<String> },

    /// Show changed files in a working copy.
    Status { name: String },

    /// Fetch and report commits behind / ahead of the remote.
    Check {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Pull remote changes into a working copy.
    Pull { name: String },

    /// Show the diff of one file in a working copy.
    Diff { name: String, path: String },

    /// Stage everything, commit and push.
    Push {
        name: String,
        /// Commit message.
        #[arg(short, long, default_value = "Update")]
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.base_dir)?;
    debug!("Working copies under {:?}", config.base_dir);

    let progress = ProgressBroadcaster::default();
    spawn_progress_logger(&progress);

    let orchestrator = SyncOrchestrator::new(config).with_progress(progress);
    let printer = Printer::new(cli.json);

    match cli.command {
        Commands::List { user } => {
            let repos = GitHubClient::from_env()?.list_repositories(&user).await?;
            printer.repositories(&repos)
        }
        Commands::Clone { user, names } => {
            let repos = GitHubClient::from_env()?.list_repositories(&user).await?;
            let selected = select(repos, &names, &user)?;
            let results = orchestrator.clone_all(&selected).await;
            printer.batch(&results, output::render_clone)?;
            fail_on_errors(&results, |reason| reason == Some(PreconditionReason::AlreadyExists))
        }
        Commands::Status { name } => {
            let state = orchestrator
                .refresh_local_state(&RepositoryRef::local(&name))
                .await?;
            printer.local_state(&name, &state)
        }
        Commands::Check { names } => {
            let refs: Vec<RepositoryRef> = names.iter().map(RepositoryRef::local).collect();
            let results = orchestrator.check_updates_all(&refs).await;
            printer.batch(&results, output::render_update_check)?;
            fail_on_errors(&results, |_| false)
        }
        Commands::Pull { name } => {
            let report = orchestrator.pull(&RepositoryRef::local(&name)).await?;
            printer.pull(&name, &report)
        }
        Commands::Diff { name, path } => {
            let diff = orchestrator
                .show_diff(&RepositoryRef::local(&name), &path)
                .await?;
            printer.diff(&diff)
        }
        Commands::Push { name, message } => {
            let outcome = orchestrator
                .commit_and_push(&RepositoryRef::local(&name), &message)
                .await?;
            printer.commit_push(&name, &outcome)
        }
    }
}

/// Explicit `--config` must exist; the default location is optional.
fn load_config(path: Option<&Path>, base_dir: Option<PathBuf>) -> Result<SyncConfig> {
    let mut config = match path {
        Some(path) => SyncConfig::load(path)?,
        None => {
            let default_path = dirs::config_dir().map(|dir| dir.join("repomirror").join("config.yaml"));
            SyncConfig::load_or_default(default_path.as_deref())?
        }
    };

    if let Some(base_dir) = base_dir {
        config.base_dir = base_dir;
    }
    Ok(config)
}

/// Picks `names` out of the listing, or everything when `names` is empty.
fn select(repos: Vec<RepositoryRef>, names: &[String], user: &str) -> Result<Vec<RepositoryRef>> {
    if names.is_empty() {
        return Ok(repos);
    }

    names
        .iter()
        .map(|name| {
            repos
                .iter()
                .find(|repo| &repo.name == name)
                .cloned()
                .with_context(|| format!("No repository named '{}' for {}", name, user))
        })
        .collect()
}

/// Errors for which `tolerated` returns true are reported but do not fail the run.
fn fail_on_errors<T>(
    results: &[BatchItem<T>],
    tolerated: impl Fn(Option<PreconditionReason>) -> bool,
) -> Result<()> {
    let failed = results
        .iter()
        .filter(|item| match &item.result {
            Ok(_) => false,
            Err(e) => !tolerated(e.precondition()),
        })
        .count();

    if failed > 0 {
        return Err(anyhow!("{} of {} repositories failed", failed, results.len()));
    }
    Ok(())
}

fn spawn_progress_logger(broadcaster: &ProgressBroadcaster) {
    let mut rx = broadcaster.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) if event.phase == SyncPhase::Failed => {
                    debug!(
                        "[{}] {} failed: {}",
                        event.repository,
                        event.operation,
                        event.error.unwrap_or_default()
                    );
                }
                Ok(event) => {
                    info!("[{}] {}: {}", event.repository, event.operation, event.message);
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Progress logger skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    fn listing() -> Vec<RepositoryRef> {
        vec![
            RepositoryRef::new("alpha", "git@github.com:me/alpha.git"),
            RepositoryRef::new("beta", "git@github.com:me/beta.git"),
        ]
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_push_message_defaults_to_update() {
        let cli = Cli::try_parse_from(["repomirror", "push", "alpha"]).unwrap();
        match cli.command {
            Commands::Push { name, message } => {
                assert_eq!(name, "alpha");
                assert_eq!(message, "Update");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["repomirror", "status", "alpha", "--json", "--base-dir", "/tmp/m"])
            .unwrap();
        assert!(cli.json);
        assert_eq!(cli.base_dir, Some(PathBuf::from("/tmp/m")));
    }

    #[test]
    fn test_check_requires_a_name() {
        assert!(Cli::try_parse_from(["repomirror", "check"]).is_err());
    }

    #[test]
    fn test_select_all_when_no_names() {
        assert_eq!(select(listing(), &[], "me").unwrap().len(), 2);
    }

    #[test]
    fn test_select_by_name() {
        let selected = select(listing(), &["beta".to_string()], "me").unwrap();
        assert_eq!(selected, vec![RepositoryRef::new("beta", "git@github.com:me/beta.git")]);
    }

    #[test]
    fn test_select_unknown_name() {
        let err = select(listing(), &["gamma".to_string()], "me").unwrap_err();
        assert!(err.to_string().contains("gamma"));
    }

    #[test]
    fn test_base_dir_override() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("config.yaml");
        std::fs::write(&dir, "baseDir: /from/config\ndefaultBranch: main\n").unwrap();

        let config = load_config(Some(&dir), None).unwrap();
        assert_eq!(config.base_dir, PathBuf::from("/from/config"));
        assert_eq!(config.default_branch, "main");

        let config = load_config(Some(&dir), Some(PathBuf::from("/override"))).unwrap();
        assert_eq!(config.base_dir, PathBuf::from("/override"));
    }

    #[test]
    fn test_explicit_missing_config_is_an_error() {
        let missing = Path::new("/definitely/not/here/repomirror.yaml");
        assert!(load_config(Some(missing), None).is_err());
    }
}
