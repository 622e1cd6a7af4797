//! In-memory issue tracker.
//!
//! Behaves like a real tracker as far as the reaper can observe: every
//! mutation bumps the issue's last activity, label names ignore case, label
//! application times are
//! remembered so stale markers can be reported, and closed issues drop out
//! of the open listing. Failures and latency can be injected per operation.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Issue, IssueKind, IssueState};
use crate::domain::ports::{Clock, IssueTracker};

/// Tracker operations, used to record calls and inject failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackerOperation {
    List,
    AddLabel,
    RemoveLabel,
    Comment,
    Close,
}

impl TrackerOperation {
    const fn name(self) -> &'static str {
        match self {
            Self::List => "list_issues",
            Self::AddLabel => "add_label",
            Self::RemoveLabel => "remove_label",
            Self::Comment => "create_comment",
            Self::Close => "close_issue",
        }
    }
}

/// A call made against the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerCall {
    pub operation: TrackerOperation,
    pub number: Option<u64>,
    /// Label name or comment body.
    pub detail: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    issues: BTreeMap<u64, Issue>,
    label_applied_at: HashMap<u64, HashMap<String, DateTime<Utc>>>,
    comments: HashMap<u64, Vec<String>>,
    calls: Vec<TrackerCall>,
    failures: HashSet<(Option<u64>, TrackerOperation)>,
    latency: HashMap<TrackerOperation, Duration>,
}

/// Issue tracker held entirely in memory.
pub struct InMemoryTracker {
    repository: String,
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
}

impl std::fmt::Debug for InMemoryTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTracker")
            .field("repository", &self.repository)
            .finish_non_exhaustive()
    }
}

impl InMemoryTracker {
    pub fn new(repository: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository: repository.into(),
            clock,
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed an issue. Its labels count as applied at its stale marker, or at
    /// its last activity when it has none.
    pub fn insert(&self, issue: Issue) {
        let applied_at = issue.stale_marked_at.unwrap_or(issue.last_activity_at);
        let mut state = self.state();
        state.label_applied_at.insert(
            issue.number,
            issue.labels.iter().map(|l| (l.to_lowercase(), applied_at)).collect(),
        );
        state.issues.insert(issue.number, issue);
    }

    /// Simulate outside activity (a comment by someone else) at the current time.
    pub fn record_activity(&self, number: u64) {
        let now = self.clock.now();
        if let Some(issue) = self.state().issues.get_mut(&number) {
            issue.last_activity_at = now;
        }
    }

    /// Simulate someone removing a label by hand.
    pub fn remove_label_externally(&self, number: u64, label: &str) {
        let now = self.clock.now();
        let mut state = self.state();
        if let Some(issue) = state.issues.get_mut(&number) {
            issue.remove_label(label);
            issue.last_activity_at = now;
        }
        if let Some(times) = state.label_applied_at.get_mut(&number) {
            times.remove(&label.to_lowercase());
        }
    }

    /// Simulate an external reopen.
    pub fn reopen(&self, number: u64) {
        let now = self.clock.now();
        if let Some(issue) = self.state().issues.get_mut(&number) {
            issue.state = IssueState::Open;
            issue.last_activity_at = now;
        }
    }

    /// Make `operation` fail, for one issue or (with `None`) for all.
    pub fn fail_on(&self, number: Option<u64>, operation: TrackerOperation) {
        self.state().failures.insert((number, operation));
    }

    /// Stop failing `operation`.
    pub fn heal(&self, number: Option<u64>, operation: TrackerOperation) {
        self.state().failures.remove(&(number, operation));
    }

    /// Delay every call of `operation`.
    pub fn set_latency(&self, operation: TrackerOperation, latency: Duration) {
        self.state().latency.insert(operation, latency);
    }

    /// Current snapshot of an issue, open or closed.
    pub fn issue(&self, number: u64) -> Option<Issue> {
        self.state().issues.get(&number).cloned()
    }

    pub fn comments(&self, number: u64) -> Vec<String> {
        self.state().comments.get(&number).cloned().unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<TrackerCall> {
        self.state().calls.clone()
    }

    /// Calls that changed something (everything except listing).
    pub fn mutations(&self) -> Vec<TrackerCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.operation != TrackerOperation::List)
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Record the call, wait out any latency, and apply injected failures.
    async fn enter(
        &self,
        operation: TrackerOperation,
        number: Option<u64>,
        detail: Option<&str>,
    ) -> DomainResult<()> {
        let latency = {
            let mut state = self.state();
            state.calls.push(TrackerCall {
                operation,
                number,
                detail: detail.map(str::to_string),
            });
            state.latency.get(&operation).copied()
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let state = self.state();
        if state.failures.contains(&(number, operation)) || state.failures.contains(&(None, operation)) {
            return Err(DomainError::Api {
                operation: operation.name(),
                status: 500,
                body: "injected failure".to_string(),
            });
        }
        if let Some(n) = number {
            if !state.issues.contains_key(&n) {
                return Err(DomainError::IssueNotFound(n));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl IssueTracker for InMemoryTracker {
    fn repository(&self) -> &str {
        &self.repository
    }

    async fn list_open_issues(
        &self,
        stale_label: &str,
        include_pull_requests: bool,
    ) -> DomainResult<Vec<Issue>> {
        self.enter(TrackerOperation::List, None, None)
            .await
            .map_err(DomainError::into_fetch_failure)?;

        let state = self.state();
        Ok(state
            .issues
            .values()
            .filter(|i| i.is_open())
            .filter(|i| include_pull_requests || i.kind != IssueKind::PullRequest)
            .map(|i| {
                let mut issue = i.clone();
                issue.stale_marked_at = if issue.has_label(stale_label) {
                    state
                        .label_applied_at
                        .get(&issue.number)
                        .and_then(|times| times.get(&stale_label.to_lowercase()))
                        .copied()
                } else {
                    None
                };
                issue
            })
            .collect())
    }

    async fn add_label(&self, number: u64, label: &str) -> DomainResult<()> {
        self.enter(TrackerOperation::AddLabel, Some(number), Some(label)).await?;
        let now = self.clock.now();
        let mut guard = self.state();
        let state = &mut *guard;
        if let Some(issue) = state.issues.get_mut(&number) {
            // An existing label in another case is the same label.
            if !issue.has_label(label) {
                issue.labels.insert(label.to_string());
                issue.last_activity_at = now;
                state
                    .label_applied_at
                    .entry(number)
                    .or_default()
                    .insert(label.to_lowercase(), now);
            }
        }
        Ok(())
    }

    async fn remove_label(&self, number: u64, label: &str) -> DomainResult<()> {
        self.enter(TrackerOperation::RemoveLabel, Some(number), Some(label)).await?;
        let now = self.clock.now();
        let mut state = self.state();
        if let Some(issue) = state.issues.get_mut(&number) {
            if issue.remove_label(label) {
                issue.last_activity_at = now;
            }
        }
        if let Some(times) = state.label_applied_at.get_mut(&number) {
            times.remove(&label.to_lowercase());
        }
        Ok(())
    }

    async fn create_comment(&self, number: u64, body: &str) -> DomainResult<()> {
        self.enter(TrackerOperation::Comment, Some(number), Some(body)).await?;
        let now = self.clock.now();
        let mut state = self.state();
        if let Some(issue) = state.issues.get_mut(&number) {
            issue.last_activity_at = now;
        }
        state.comments.entry(number).or_default().push(body.to_string());
        Ok(())
    }

    async fn close_issue(&self, number: u64) -> DomainResult<()> {
        self.enter(TrackerOperation::Close, Some(number), None).await?;
        let now = self.clock.now();
        if let Some(issue) = self.state().issues.get_mut(&number) {
            issue.state = IssueState::Closed;
            issue.last_activity_at = now;
        }
        Ok(())
    }
}
