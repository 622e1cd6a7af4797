//! Pass summary returned by the reaper.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::issue::IssueKind;
use super::policy::Decision;

/// How a decision ended up being carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Nothing to do for this issue.
    NoOp,
    /// All tracker mutations succeeded.
    Applied,
    /// Dry run: the mutation was only reported.
    Planned,
    /// Operations budget exhausted; left for the next pass.
    Deferred,
    /// A tracker mutation failed.
    Failed,
}

/// Result of processing a single issue.
#[derive(Debug, Clone, Serialize)]
pub struct IssueOutcome {
    pub number: u64,
    pub kind: IssueKind,
    pub decision: Decision,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IssueOutcome {
    pub const fn new(number: u64, kind: IssueKind, decision: Decision, status: OutcomeStatus) -> Self {
        Self {
            number,
            kind,
            decision,
            status,
            error: None,
        }
    }

    pub fn failed(number: u64, kind: IssueKind, decision: Decision, error: impl Into<String>) -> Self {
        Self {
            number,
            kind,
            decision,
            status: OutcomeStatus::Failed,
            error: Some(error.into()),
        }
    }

    /// Whether the decision was (or in a dry run, would have been) carried out.
    pub const fn took_effect(&self) -> bool {
        matches!(self.status, OutcomeStatus::Applied | OutcomeStatus::Planned)
    }
}

/// Counts and per-issue outcomes of one pass.
///
/// In a dry run the `marked_stale`, `closed` and `unmarked` counters hold
/// planned actions.
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub repository: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    /// The pass was cancelled before every issue was handled.
    pub cancelled: bool,
    pub scanned: usize,
    pub marked_stale: usize,
    pub closed: usize,
    pub unmarked: usize,
    pub exempt_skipped: usize,
    pub deferred: usize,
    pub errors: usize,
    pub outcomes: Vec<IssueOutcome>,
}

impl PassReport {
    pub fn new(repository: impl Into<String>, started_at: DateTime<Utc>, dry_run: bool) -> Self {
        Self {
            repository: repository.into(),
            started_at,
            finished_at: None,
            dry_run,
            cancelled: false,
            scanned: 0,
            marked_stale: 0,
            closed: 0,
            unmarked: 0,
            exempt_skipped: 0,
            deferred: 0,
            errors: 0,
            outcomes: Vec::new(),
        }
    }

    /// Fold one issue outcome into the counters.
    pub fn record(&mut self, outcome: IssueOutcome) {
        self.scanned += 1;
        match outcome.status {
            OutcomeStatus::Failed => self.errors += 1,
            OutcomeStatus::Deferred => self.deferred += 1,
            OutcomeStatus::NoOp | OutcomeStatus::Applied | OutcomeStatus::Planned => {}
        }
        if outcome.took_effect() {
            match outcome.decision {
                Decision::MarkStale => self.marked_stale += 1,
                Decision::Close => self.closed += 1,
                Decision::Unmark => self.unmarked += 1,
                _ => {}
            }
        }
        if outcome.decision == Decision::Exempt {
            self.exempt_skipped += 1;
        }
        self.outcomes.push(outcome);
    }

    pub fn finish(&mut self, at: DateTime<Utc>) {
        self.outcomes.sort_by_key(|o| o.number);
        self.finished_at = Some(at);
    }

    /// Outcomes that changed (or would change) something on the tracker.
    pub fn actions(&self) -> impl Iterator<Item = &IssueOutcome> {
        self.outcomes.iter().filter(|o| o.status != OutcomeStatus::NoOp)
    }
}
