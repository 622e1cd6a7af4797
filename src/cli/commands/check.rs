//! `check`: validate configuration and preview messages without touching the tracker.

use std::path::Path;

use anyhow::Result;
use chrono::{Duration, Utc};
use serde::Serialize;

use crate::cli::output::{key_value_table, output, CommandOutput};
use crate::cli::types::CheckArgs;
use crate::domain::models::{Issue, Policy};
use crate::infrastructure::config::{ConfigError, ConfigLoader};
use crate::infrastructure::credentials::GitHubToken;
use crate::services::{MessageContext, MessageTemplates};

#[derive(Debug, Serialize)]
pub struct CheckOutput {
    pub repository: String,
    pub token_env: String,
    pub policy: Policy,
    pub sample_stale_message: String,
    pub sample_close_message: String,
}

impl CheckOutput {
    /// Render both messages for an issue idle just past the stale threshold.
    pub fn new(repository: String, token_env: String, policy: Policy) -> Result<Self, ConfigError> {
        let templates = MessageTemplates::from_policy(&policy)?;
        let now = Utc::now();
        let idle = Duration::days(i64::from(policy.days_before_stale) + 1);
        let issue = Issue::new(1, "Example issue", now - idle)
            .with_url(format!("https://github.com/{repository}/issues/1"));
        let ctx = MessageContext::new(&issue, &policy, now);

        Ok(Self {
            sample_stale_message: templates.render_stale(&ctx)?,
            sample_close_message: templates.render_close(&ctx)?,
            repository,
            token_env,
            policy,
        })
    }
}

impl CommandOutput for CheckOutput {
    fn to_human(&self) -> String {
        let p = &self.policy;
        let exempt = if p.exempt_labels.is_empty() {
            "(none)".to_string()
        } else {
            p.exempt_labels.iter().cloned().collect::<Vec<_>>().join(", ")
        };
        let table = key_value_table([
            ("Repository", self.repository.clone()),
            ("Token from", format!("${}", self.token_env)),
            ("Days before stale", p.days_before_stale.to_string()),
            (
                "Days before close",
                p.days_before_close.map_or_else(|| "never".to_string(), |d| d.to_string()),
            ),
            ("Stale label", p.stale_label.clone()),
            ("Exempt labels", exempt),
            ("Pull requests", if p.include_pull_requests { "included" } else { "excluded" }.to_string()),
            (
                "Max operations",
                p.max_operations.map_or_else(|| "unlimited".to_string(), |m| m.to_string()),
            ),
            ("Dry run", p.dry_run.to_string()),
        ]);

        format!(
            "Configuration OK\n\n{table}\n\nStale message:\n{}\n\nClose message:\n{}",
            self.sample_stale_message, self.sample_close_message
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub fn execute(args: CheckArgs, config_path: Option<&Path>, json: bool) -> Result<()> {
    let (config, _logger) = super::bootstrap(config_path, &args.policy.overrides())?;

    let repository = ConfigLoader::resolve_repository(&config)?;
    let policy = ConfigLoader::build_policy(&config)?;
    GitHubToken::from_env(&config.github.token_env)?;

    output(&CheckOutput::new(repository, config.github.token_env.clone(), policy)?, json);
    Ok(())
}
