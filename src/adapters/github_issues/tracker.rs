//! [`IssueTracker`] implementation backed by the GitHub REST API.
//!
//! The stale marker is recovered from the issue's event history: the most
//! recent `labeled` event for the stale label starts the current episode.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Issue, IssueKind, IssueState};
use crate::domain::ports::IssueTracker;

use super::client::GitHubClient;
use super::models::{GitHubIssue, GitHubIssueEvent};

/// Reason recorded on issues the reaper closes.
const CLOSE_REASON: &str = "not_planned";

/// GitHub-backed issue tracker for one repository.
#[derive(Debug)]
pub struct GitHubTracker {
    client: Arc<GitHubClient>,
    owner: String,
    repo: String,
    slug: String,
}

impl GitHubTracker {
    /// Create a tracker for `owner/repo`.
    pub fn new(client: Arc<GitHubClient>, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        let owner = owner.into();
        let repo = repo.into();
        let slug = format!("{owner}/{repo}");
        Self {
            client,
            owner,
            repo,
            slug,
        }
    }

    /// Create a tracker from an `owner/repo` slug.
    pub fn from_slug(client: Arc<GitHubClient>, slug: &str) -> DomainResult<Self> {
        let (owner, repo) = parse_slug(slug)?;
        Ok(Self::new(client, owner, repo))
    }

    /// Convert a GitHub issue to the domain model.
    fn to_issue(raw: &GitHubIssue) -> Issue {
        Issue {
            number: raw.number,
            title: raw.title.clone(),
            url: raw.html_url.clone(),
            kind: if raw.pull_request.is_some() {
                IssueKind::PullRequest
            } else {
                IssueKind::Issue
            },
            state: if raw.state.eq_ignore_ascii_case("closed") {
                IssueState::Closed
            } else {
                IssueState::Open
            },
            labels: raw.labels.iter().map(|l| l.name.clone()).collect(),
            last_activity_at: raw.updated_at,
            stale_marked_at: None,
        }
    }

    /// Time the stale label was most recently applied.
    pub fn stale_marker(events: &[GitHubIssueEvent], stale_label: &str) -> Option<DateTime<Utc>> {
        events
            .iter()
            .filter(|e| e.is_labeled_with(stale_label))
            .map(|e| e.created_at)
            .max()
    }
}

/// Split an `owner/repo` slug.
pub fn parse_slug(slug: &str) -> DomainResult<(&str, &str)> {
    match slug.trim().split_once('/') {
        Some((owner, repo))
            if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') =>
        {
            Ok((owner, repo))
        }
        _ => Err(DomainError::ValidationFailed(format!(
            "repository must look like 'owner/name', got '{slug}'"
        ))),
    }
}

#[async_trait]
impl IssueTracker for GitHubTracker {
    fn repository(&self) -> &str {
        &self.slug
    }

    async fn list_open_issues(
        &self,
        stale_label: &str,
        include_pull_requests: bool,
    ) -> DomainResult<Vec<Issue>> {
        tracing::info!(repository = %self.slug, "fetching open issues");

        let raw = self
            .client
            .list_open_issues(&self.owner, &self.repo)
            .await
            .map_err(DomainError::into_fetch_failure)?;

        let mut issues = Vec::with_capacity(raw.len());
        for item in raw
            .iter()
            // GitHub returns pull requests from the issues endpoint.
            .filter(|i| include_pull_requests || i.pull_request.is_none())
        {
            let mut issue = Self::to_issue(item);
            if issue.has_label(stale_label) {
                let events = self
                    .client
                    .list_issue_events(&self.owner, &self.repo, issue.number)
                    .await
                    .map_err(DomainError::into_fetch_failure)?;
                issue.stale_marked_at = Self::stale_marker(&events, stale_label);
            }
            issues.push(issue);
        }

        tracing::info!(
            repository = %self.slug,
            fetched = raw.len(),
            kept = issues.len(),
            "open issues fetched"
        );
        Ok(issues)
    }

    async fn add_label(&self, number: u64, label: &str) -> DomainResult<()> {
        self.client
            .add_labels(&self.owner, &self.repo, number, &[label])
            .await
    }

    async fn remove_label(&self, number: u64, label: &str) -> DomainResult<()> {
        self.client
            .remove_label(&self.owner, &self.repo, number, label)
            .await
    }

    async fn create_comment(&self, number: u64, body: &str) -> DomainResult<()> {
        self.client
            .post_comment(&self.owner, &self.repo, number, body)
            .await
    }

    async fn close_issue(&self, number: u64) -> DomainResult<()> {
        self.client
            .update_issue_state(&self.owner, &self.repo, number, "closed", Some(CLOSE_REASON))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_slug() {
        assert_eq!(parse_slug("octo/repo").unwrap(), ("octo", "repo"));
        assert_eq!(parse_slug(" octo/repo ").unwrap(), ("octo", "repo"));
        assert!(parse_slug("octo").is_err());
        assert!(parse_slug("/repo").is_err());
        assert!(parse_slug("octo/").is_err());
        assert!(parse_slug("a/b/c").is_err());
    }

    #[test]
    fn test_stale_marker_uses_latest_labeled_event() {
        let events: Vec<GitHubIssueEvent> = serde_json::from_str(
            r#"[
                { "event": "labeled", "created_at": "2024-01-01T00:00:00Z", "label": { "name": "stale" } },
                { "event": "unlabeled", "created_at": "2024-01-03T00:00:00Z", "label": { "name": "stale" } },
                { "event": "labeled", "created_at": "2024-02-05T00:00:00Z", "label": { "name": "stale" } },
                { "event": "labeled", "created_at": "2024-02-06T00:00:00Z", "label": { "name": "bug" } }
            ]"#,
        )
        .unwrap();
        let marker = GitHubTracker::stale_marker(&events, "stale").unwrap();
        assert_eq!(marker.to_rfc3339(), "2024-02-05T00:00:00+00:00");
        assert!(GitHubTracker::stale_marker(&events, "wontfix").is_none());
    }

    #[test]
    fn test_to_issue_maps_kind_and_labels() {
        let raw: GitHubIssue = serde_json::from_str(
            r#"{
                "number": 5,
                "title": "PR",
                "state": "open",
                "labels": [{ "name": "stale" }],
                "pull_request": { "url": "u" },
                "updated_at": "2024-01-16T12:00:00Z",
                "html_url": "https://github.com/o/r/pull/5"
            }"#,
        )
        .unwrap();
        let issue = GitHubTracker::to_issue(&raw);
        assert_eq!(issue.kind, IssueKind::PullRequest);
        assert_eq!(issue.state, IssueState::Open);
        assert!(issue.has_label("stale"));
        assert!(issue.stale_marked_at.is_none());
    }
}
