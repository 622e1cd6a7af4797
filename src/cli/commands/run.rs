//! `run`: one pass over the repository.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::adapters::github_issues::{GitHubClient, GitHubClientConfig, GitHubTracker};
use crate::cli::output::{key_value_table, list_table, output, truncate, CommandOutput};
use crate::cli::types::RunArgs;
use crate::domain::models::{OutcomeStatus, PassReport};
use crate::domain::ports::SystemClock;
use crate::infrastructure::config::{ConfigError, ConfigLoader};
use crate::infrastructure::credentials::GitHubToken;
use crate::services::{ReaperConfig, RunLock, StaleReaper};

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct RunOutput {
    pub report: PassReport,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        let r = &self.report;
        let mut lines = vec![format!(
            "Pass over {}{}",
            r.repository,
            if r.dry_run { " (dry run)" } else { "" }
        )];

        let summary = key_value_table([
            ("Scanned", r.scanned.to_string()),
            (if r.dry_run { "Would mark stale" } else { "Marked stale" }, r.marked_stale.to_string()),
            (if r.dry_run { "Would close" } else { "Closed" }, r.closed.to_string()),
            (if r.dry_run { "Would unmark" } else { "Unmarked" }, r.unmarked.to_string()),
            ("Exempt", r.exempt_skipped.to_string()),
            ("Deferred", r.deferred.to_string()),
            ("Errors", r.errors.to_string()),
        ]);
        lines.push(summary.to_string());

        let actions: Vec<_> = r.actions().collect();
        if !actions.is_empty() {
            let mut table = list_table(&["issue", "kind", "action", "status", "error"]);
            for outcome in actions {
                table.add_row(vec![
                    format!("#{}", outcome.number),
                    outcome.kind.as_str().to_string(),
                    outcome.decision.as_str().to_string(),
                    status_label(outcome.status).to_string(),
                    outcome.error.as_deref().map(|e| truncate(e, 60)).unwrap_or_default(),
                ]);
            }
            lines.push(String::new());
            lines.push(table.to_string());
        }

        if r.cancelled {
            lines.push("\nPass was cancelled before every issue was handled.".to_string());
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

const fn status_label(status: OutcomeStatus) -> &'static str {
    match status {
        OutcomeStatus::NoOp => "-",
        OutcomeStatus::Applied => "applied",
        OutcomeStatus::Planned => "planned",
        OutcomeStatus::Deferred => "deferred",
        OutcomeStatus::Failed => "failed",
    }
}

/// Cancel `token` on Ctrl-C or once `deadline` elapses.
fn spawn_canceller(token: CancellationToken, deadline: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            () = tokio::time::sleep(deadline) => {
                tracing::warn!(deadline_secs = deadline.as_secs(), "pass deadline reached, cancelling");
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "failed to listen for Ctrl-C");
                    return;
                }
                tracing::warn!("interrupted, cancelling pass");
            }
            () = token.cancelled() => return,
        }
        token.cancel();
    })
}

pub async fn execute(args: RunArgs, config_path: Option<&Path>, json: bool) -> Result<()> {
    let (config, _logger) = super::bootstrap(config_path, &args.overrides())?;

    let repository = ConfigLoader::resolve_repository(&config)?;
    let policy = ConfigLoader::build_policy(&config)?;
    let token = GitHubToken::from_env(&config.github.token_env)?;

    let lock_dir = config.run_lock_dir.clone().unwrap_or_else(RunLock::default_dir);
    let _lock = RunLock::acquire(&lock_dir, &repository)?;

    let client = GitHubClient::new(GitHubClientConfig {
        api_url: config.github.api_url.clone(),
        token: token.expose().to_string(),
        request_timeout: Duration::from_secs(config.github.request_timeout_secs),
        requests_per_hour: config.github.requests_per_hour,
    })
    .context("failed to create GitHub client")?;
    let tracker = GitHubTracker::from_slug(Arc::new(client), &repository)?;

    let reaper = StaleReaper::new(Arc::new(tracker), policy, Arc::new(SystemClock))
        .map_err(ConfigError::from)?
        .with_config(ReaperConfig {
            concurrency: config.github.concurrency,
            request_timeout: Duration::from_secs(config.github.request_timeout_secs),
        });

    let cancel = CancellationToken::new();
    let canceller = spawn_canceller(cancel.clone(), Duration::from_secs(config.github.pass_timeout_secs));
    let result = reaper.run_pass(&cancel).await;
    canceller.abort();

    let report = result.with_context(|| format!("stale pass over {repository} failed"))?;
    let cancelled = report.cancelled;
    output(&RunOutput { report }, json);

    if cancelled {
        anyhow::bail!("stale pass over {repository} was cancelled");
    }
    Ok(())
}
