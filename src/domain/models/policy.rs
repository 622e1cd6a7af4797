//! Staleness policy and the per-issue decision it produces.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::issue::{label_matches, Issue, IssueKind};

pub const DEFAULT_STALE_LABEL: &str = "stale";

pub const DEFAULT_STALE_MESSAGE: &str = "This issue has been automatically marked as stale because it has not had \
recent activity for {{ days_before_stale }} days. It will be closed in {{ days_before_close }} days if no further \
activity occurs. Remove the `{{ stale_label }}` label or comment to keep it open.";

pub const DEFAULT_CLOSE_MESSAGE: &str = "This issue was closed because it has been stale for \
{{ days_before_close }} days with no activity.";

/// What the reaper should do with one issue at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Closed, or a pull request while pull requests are excluded.
    Ineligible,
    /// Carries an exempt label; never touched.
    Exempt,
    /// Not stale and not idle long enough.
    Active,
    /// Idle past the stale threshold: label and comment.
    MarkStale,
    /// Stale, close window not yet elapsed.
    AwaitClose,
    /// Stale long enough: comment and close.
    Close,
    /// Stale but active since marking: remove the label.
    Unmark,
}

impl Decision {
    /// Number of tracker mutations this decision costs.
    pub const fn operations(self) -> u32 {
        match self {
            Self::MarkStale | Self::Close => 2,
            Self::Unmark => 1,
            Self::Ineligible | Self::Exempt | Self::Active | Self::AwaitClose => 0,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ineligible => "ineligible",
            Self::Exempt => "exempt",
            Self::Active => "active",
            Self::MarkStale => "mark_stale",
            Self::AwaitClose => "await_close",
            Self::Close => "close",
            Self::Unmark => "unmark",
        }
    }
}

/// Validated, immutable policy for one pass.
///
/// Built by [`ConfigLoader::build_policy`](crate::infrastructure::config::ConfigLoader::build_policy)
/// from the loaded configuration. Shared across workers behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Policy {
    pub days_before_stale: u32,
    /// `None` disables closing.
    pub days_before_close: Option<u32>,
    pub stale_label: String,
    pub exempt_labels: BTreeSet<String>,
    pub stale_message: String,
    pub close_message: String,
    pub include_pull_requests: bool,
    /// Updates this close to the stale marker are the reaper's own.
    #[serde(with = "duration_secs")]
    pub activity_grace: Duration,
    /// Upper bound on mutating calls per pass.
    pub max_operations: Option<u32>,
    pub dry_run: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            days_before_stale: 30,
            days_before_close: Some(5),
            stale_label: DEFAULT_STALE_LABEL.to_string(),
            exempt_labels: BTreeSet::new(),
            stale_message: DEFAULT_STALE_MESSAGE.to_string(),
            close_message: DEFAULT_CLOSE_MESSAGE.to_string(),
            include_pull_requests: false,
            activity_grace: Duration::seconds(60),
            max_operations: None,
            dry_run: false,
        }
    }
}

impl Policy {
    /// Whether any of the issue's labels is exempt, ignoring case.
    pub fn is_exempt(&self, issue: &Issue) -> bool {
        issue
            .labels
            .iter()
            .any(|l| self.exempt_labels.iter().any(|exempt| label_matches(l, exempt)))
    }

    pub fn is_stale(&self, issue: &Issue) -> bool {
        issue.has_label(&self.stale_label)
    }

    /// Decide what to do with `issue` at `now`.
    ///
    /// Exemption is checked before anything else. For stale issues, activity
    /// after the marker wins over the close window. An issue that carries the
    /// stale label but has no recorded marker is treated as marked at its
    /// last activity.
    pub fn evaluate(&self, issue: &Issue, now: DateTime<Utc>) -> Decision {
        if !issue.is_open() {
            return Decision::Ineligible;
        }
        if issue.kind == IssueKind::PullRequest && !self.include_pull_requests {
            return Decision::Ineligible;
        }
        if self.is_exempt(issue) {
            return Decision::Exempt;
        }

        if self.is_stale(issue) {
            let marked_at = issue.stale_marked_at.unwrap_or(issue.last_activity_at);
            if issue.last_activity_at > marked_at + self.activity_grace {
                return Decision::Unmark;
            }
            return match self.days_before_close {
                Some(days) if now - marked_at >= Duration::days(i64::from(days)) => Decision::Close,
                _ => Decision::AwaitClose,
            };
        }

        if issue.idle_for(now) >= Duration::days(i64::from(self.days_before_stale)) {
            Decision::MarkStale
        } else {
            Decision::Active
        }
    }
}

mod duration_secs {
    use chrono::Duration;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.num_seconds())
    }
}
