//! Issue model as seen by the reaper.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Label names are case-insensitive on GitHub: `Stale` and `stale` are
/// the same label.
pub fn label_matches(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

/// Tracker-side state of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

impl IssueState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

/// Whether the item is a plain issue or a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Issue,
    PullRequest,
}

impl IssueKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Issue => "issue",
            Self::PullRequest => "pull_request",
        }
    }
}

/// An issue (or pull request) in the target repository.
///
/// `stale_marked_at` is the time the stale label was applied in the current
/// episode. Trackers derive it from their own history; the reaper never
/// stores it anywhere else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Number unique within the repository.
    pub number: u64,
    pub title: String,
    /// Browser URL, empty when the tracker has none.
    #[serde(default)]
    pub url: String,
    pub kind: IssueKind,
    pub state: IssueState,
    pub labels: BTreeSet<String>,
    /// Last recorded activity (comment, label change, commit reference, reopen).
    pub last_activity_at: DateTime<Utc>,
    #[serde(default)]
    pub stale_marked_at: Option<DateTime<Utc>>,
}

impl Issue {
    /// Create an open issue with no labels.
    pub fn new(number: u64, title: impl Into<String>, last_activity_at: DateTime<Utc>) -> Self {
        Self {
            number,
            title: title.into(),
            url: String::new(),
            kind: IssueKind::Issue,
            state: IssueState::Open,
            labels: BTreeSet::new(),
            last_activity_at,
            stale_marked_at: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.insert(label.into());
        self
    }

    pub fn with_kind(mut self, kind: IssueKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_stale_marker(mut self, marked_at: DateTime<Utc>) -> Self {
        self.stale_marked_at = Some(marked_at);
        self
    }

    /// Whether the issue carries `label`, compared as GitHub does.
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| label_matches(l, label))
    }

    /// Drop every label matching `label`. Returns whether one was removed.
    pub fn remove_label(&mut self, label: &str) -> bool {
        let before = self.labels.len();
        self.labels.retain(|l| !label_matches(l, label));
        self.labels.len() != before
    }

    pub fn is_open(&self) -> bool {
        self.state == IssueState::Open
    }

    /// Time elapsed since the last recorded activity, never negative.
    pub fn idle_for(&self, now: DateTime<Utc>) -> chrono::Duration {
        (now - self.last_activity_at).max(chrono::Duration::zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_new_issue_is_open_and_unlabelled() {
        let issue = Issue::new(7, "Crash on start", at(1));
        assert!(issue.is_open());
        assert!(issue.labels.is_empty());
        assert_eq!(issue.kind, IssueKind::Issue);
        assert!(issue.stale_marked_at.is_none());
    }

    #[test]
    fn test_idle_for() {
        let issue = Issue::new(1, "t", at(1));
        assert_eq!(issue.idle_for(at(11)), Duration::days(10));
    }

    #[test]
    fn test_idle_for_clamps_future_activity() {
        let issue = Issue::new(1, "t", at(11));
        assert_eq!(issue.idle_for(at(1)), Duration::zero());
    }

    #[test]
    fn test_has_label_ignores_case() {
        let issue = Issue::new(1, "t", at(1)).with_label("Stale");
        assert!(issue.has_label("stale"));
        assert!(issue.has_label("STALE"));
        assert!(!issue.has_label("stal"));
    }

    #[test]
    fn test_remove_label_ignores_case() {
        let mut issue = Issue::new(1, "t", at(1)).with_label("Stale").with_label("bug");
        assert!(issue.remove_label("stale"));
        assert!(!issue.remove_label("stale"));
        assert_eq!(issue.labels.len(), 1);
    }

    #[test]
    fn test_labels_are_a_set() {
        let issue = Issue::new(1, "t", at(1)).with_label("bug").with_label("bug");
        assert_eq!(issue.labels.len(), 1);
        assert!(issue.has_label("bug"));
    }
}
