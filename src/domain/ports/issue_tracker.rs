//! Issue tracker port.
//!
//! The reaper reads and mutates issues exclusively through this trait. The
//! tracker is the system of record: labels, comments, activity timestamps
//! and the stale marker all live there.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::Issue;

/// Operations the reaper needs from an issue tracker.
///
/// Implementations must populate [`Issue::stale_marked_at`] for issues that
/// carry `stale_label`, using whatever history the tracker keeps.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Repository identifier (`owner/name`) used in logs, reports and run locks.
    fn repository(&self) -> &str;

    /// List every open issue, plus open pull requests when requested.
    ///
    /// Either returns the complete list or fails; callers rely on this to
    /// keep the fetch stage all-or-nothing.
    async fn list_open_issues(
        &self,
        stale_label: &str,
        include_pull_requests: bool,
    ) -> DomainResult<Vec<Issue>>;

    /// Add a label to an issue.
    async fn add_label(&self, number: u64, label: &str) -> DomainResult<()>;

    /// Remove a label from an issue. Removing an absent label is not an error.
    async fn remove_label(&self, number: u64, label: &str) -> DomainResult<()>;

    /// Post a comment on an issue.
    async fn create_comment(&self, number: u64, body: &str) -> DomainResult<()>;

    /// Transition an issue to closed.
    async fn close_issue(&self, number: u64) -> DomainResult<()>;
}
