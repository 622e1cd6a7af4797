pub mod config;
pub mod issue;
pub mod policy;
pub mod report;

pub use config::{Config, GitHubConfig, LoggingConfig, PolicyConfig};
pub use issue::{label_matches, Issue, IssueKind, IssueState};
pub use policy::{Decision, Policy};
pub use report::{IssueOutcome, OutcomeStatus, PassReport};
