//! GitHub Issues API response and request models.
//!
//! These structs map to the GitHub REST API v3 JSON payloads.
//! They are used internally by the GitHub adapter and are not
//! part of the public domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::models::label_matches;

/// An issue returned by the GitHub API.
///
/// Note: issues and pull requests share the same endpoint. Pull requests
/// include a non-null `pull_request` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubIssue {
    /// Sequential number within the repository (e.g., 42 → "#42").
    pub number: u64,
    /// Issue title.
    pub title: String,
    /// Current state: "open" or "closed".
    pub state: String,
    /// Labels applied to the issue.
    #[serde(default)]
    pub labels: Vec<GitHubLabel>,
    /// Present when this item is actually a pull request, not an issue.
    #[serde(default)]
    pub pull_request: Option<GitHubPullRequestRef>,
    /// Last update of any kind: comment, label change, reopen, edit.
    pub updated_at: DateTime<Utc>,
    /// URL to view the issue in the GitHub UI.
    #[serde(default)]
    pub html_url: String,
}

/// A label applied to a GitHub issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubLabel {
    /// The label name (e.g., "bug", "stale").
    pub name: String,
}

/// Reference object present on pull requests (absent on plain issues).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubPullRequestRef {
    /// API URL of the pull request resource.
    pub url: String,
}

/// One entry of an issue's event history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubIssueEvent {
    /// Event type, e.g. "labeled", "unlabeled", "closed".
    pub event: String,
    /// When the event happened.
    pub created_at: DateTime<Utc>,
    /// Label involved, for "labeled" and "unlabeled" events.
    #[serde(default)]
    pub label: Option<GitHubLabel>,
}

impl GitHubIssueEvent {
    /// Whether this event applied `label`, in any letter case.
    pub fn is_labeled_with(&self, label: &str) -> bool {
        self.event == "labeled" && self.label.as_ref().is_some_and(|l| label_matches(&l.name, label))
    }
}

/// Request body for posting a comment on an issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubCommentRequest {
    /// The comment body (plain text or Markdown).
    pub body: String,
}

/// Request body for adding labels to an issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubLabelsRequest {
    pub labels: Vec<String>,
}

/// Request body for updating (patching) an issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubIssueUpdateRequest {
    /// New state: "open" or "closed".
    pub state: String,
    /// "completed" or "not_planned" when closing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_issue_deserialization() {
        let json = r#"{
            "id": 1,
            "number": 42,
            "title": "Fix login bug",
            "body": "Users cannot log in after the last deploy.",
            "state": "open",
            "labels": [
                { "name": "bug", "color": "d73a4a" },
                { "name": "stale", "color": "ededed" }
            ],
            "pull_request": null,
            "updated_at": "2024-01-15T10:30:00Z",
            "html_url": "https://github.com/org/repo/issues/42",
            "created_at": "2024-01-14T08:00:00Z"
        }"#;
        let issue: GitHubIssue = serde_json::from_str(json).unwrap();
        assert_eq!(issue.number, 42);
        assert_eq!(issue.state, "open");
        assert_eq!(issue.labels.len(), 2);
        assert_eq!(issue.labels[1].name, "stale");
        assert!(issue.pull_request.is_none());
        assert_eq!(issue.updated_at.to_rfc3339(), "2024-01-15T10:30:00+00:00");
    }

    #[test]
    fn test_pr_detection_via_pull_request_field() {
        let json = r#"{
            "number": 99,
            "title": "Add feature X",
            "state": "open",
            "labels": [],
            "pull_request": { "url": "https://api.github.com/repos/org/repo/pulls/99" },
            "updated_at": "2024-01-16T12:00:00Z",
            "html_url": "https://github.com/org/repo/pull/99"
        }"#;
        let issue: GitHubIssue = serde_json::from_str(json).unwrap();
        assert!(issue.pull_request.is_some());
    }

    #[test]
    fn test_event_label_match() {
        let json = r#"[
            { "event": "labeled", "created_at": "2024-01-10T00:00:00Z", "label": { "name": "stale" } },
            { "event": "labeled", "created_at": "2024-01-11T00:00:00Z", "label": { "name": "bug" } },
            { "event": "commented", "created_at": "2024-01-12T00:00:00Z" }
        ]"#;
        let events: Vec<GitHubIssueEvent> = serde_json::from_str(json).unwrap();
        assert!(events[0].is_labeled_with("stale"));
        assert!(!events[1].is_labeled_with("stale"));
        assert!(!events[2].is_labeled_with("stale"));
    }

    #[test]
    fn test_close_request_serialization() {
        let req = GitHubIssueUpdateRequest {
            state: "closed".to_string(),
            state_reason: Some("not_planned".to_string()),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["state"], "closed");
        assert_eq!(json["state_reason"], "not_planned");

        let reopen = GitHubIssueUpdateRequest {
            state: "open".to_string(),
            state_reason: None,
        };
        let json = serde_json::to_string(&reopen).unwrap();
        assert!(!json.contains("state_reason"));
    }
}
