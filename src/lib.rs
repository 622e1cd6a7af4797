//! Stale-issue reaper
//!
//! Scans the open issues of one repository, marks issues that have been idle
//! past a threshold as stale (label plus templated comment), and closes issues
//! that stay stale past a second threshold. Issues carrying an exemption label
//! are never touched.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): issue and policy models, the decision logic, ports
//! - **Adapters** (`adapters`): GitHub REST and in-memory issue trackers
//! - **Service Layer** (`services`): the reaper pass, message templates, run lock
//! - **Infrastructure Layer** (`infrastructure`): configuration, logging, credentials
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use stale_reaper::{InMemoryTracker, Policy, StaleReaper, SystemClock};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let clock = Arc::new(SystemClock);
//!     let tracker = Arc::new(InMemoryTracker::new("octo/repo", clock.clone()));
//!     let reaper = StaleReaper::new(tracker, Policy::default(), clock)?;
//!     let report = reaper.run_pass(&CancellationToken::new()).await?;
//!     println!("marked {} issues stale", report.marked_stale);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use adapters::{GitHubTracker, InMemoryTracker};
pub use domain::models::{
    Config, Decision, Issue, IssueKind, IssueOutcome, IssueState, OutcomeStatus, PassReport, Policy,
};
pub use domain::ports::{Clock, IssueTracker, ManualClock, SystemClock};
pub use domain::{DomainError, DomainResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{MessageTemplates, RunLock, StaleReaper};
