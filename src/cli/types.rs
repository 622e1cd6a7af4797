//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::infrastructure::config::{ConfigOverrides, GitHubOverrides, PolicyOverrides};

#[derive(Parser, Debug)]
#[command(name = "stale-reaper")]
#[command(about = "Marks inactive issues as stale and closes them", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file [default: .github/stale-reaper.yaml]
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one pass over the repository's open issues
    Run(RunArgs),

    /// Validate configuration and preview the rendered messages
    Check(CheckArgs),
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub policy: PolicyArgs,

    /// Issues processed concurrently
    #[arg(long)]
    pub concurrency: Option<usize>,
}

#[derive(Args, Debug, Default)]
pub struct CheckArgs {
    #[command(flatten)]
    pub policy: PolicyArgs,
}

/// Policy flags shared by every subcommand
#[derive(Args, Debug, Default)]
pub struct PolicyArgs {
    /// Repository as owner/name [env: GITHUB_REPOSITORY]
    #[arg(short, long)]
    pub repo: Option<String>,

    /// Idle days before an issue is marked stale
    #[arg(long)]
    pub days_before_stale: Option<i64>,

    /// Days after marking before closing (-1 never closes)
    #[arg(long, allow_negative_numbers = true)]
    pub days_before_close: Option<i64>,

    /// Label marking staleness
    #[arg(long)]
    pub stale_issue_label: Option<String>,

    /// Labels exempting an issue (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub exempt_issue_labels: Option<Vec<String>>,

    /// Comment template posted when marking stale
    #[arg(long)]
    pub stale_issue_message: Option<String>,

    /// Comment template posted when closing
    #[arg(long)]
    pub close_issue_message: Option<String>,

    /// Apply the policy to pull requests too
    #[arg(long)]
    pub include_pull_requests: bool,

    /// Upper bound on mutating API calls for the pass
    #[arg(long)]
    pub max_operations: Option<u32>,

    /// Report decisions without changing anything
    #[arg(long)]
    pub dry_run: bool,
}

impl PolicyArgs {
    /// Overrides for the configuration loader; unset flags leave lower layers alone
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            repository: self.repo.clone(),
            policy: PolicyOverrides {
                days_before_stale: self.days_before_stale,
                days_before_close: self.days_before_close,
                stale_issue_message: self.stale_issue_message.clone(),
                close_issue_message: self.close_issue_message.clone(),
                exempt_issue_labels: self.exempt_issue_labels.clone(),
                stale_issue_label: self.stale_issue_label.clone(),
                include_pull_requests: self.include_pull_requests.then_some(true),
                max_operations: self.max_operations,
                dry_run: self.dry_run.then_some(true),
            },
            github: GitHubOverrides::default(),
        }
    }
}

impl RunArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        let mut overrides = self.policy.overrides();
        overrides.github.concurrency = self.concurrency;
        overrides
    }
}
