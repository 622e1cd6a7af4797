//! The stale-issue reaper.
//!
//! One call to [`StaleReaper::run_pass`] fetches every open issue, decides
//! what to do with each one under the [`Policy`], and applies the resulting
//! label, comment and close calls through the [`IssueTracker`] port. All
//! state lives on the issues themselves.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Decision, Issue, IssueOutcome, OutcomeStatus, PassReport, Policy};
use crate::domain::ports::{Clock, IssueTracker};
use crate::services::templates::{MessageContext, MessageTemplates, TemplateError};

/// Execution settings for a pass.
#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// Issues processed concurrently.
    pub concurrency: usize,
    /// Timeout applied to each mutating tracker call.
    pub request_timeout: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Remaining mutating calls for the pass; `None` is unlimited.
struct Budget(Option<AtomicU32>);

impl Budget {
    fn new(limit: Option<u32>) -> Self {
        Self(limit.map(AtomicU32::new))
    }

    fn try_reserve(&self, operations: u32) -> bool {
        self.0.as_ref().is_none_or(|remaining| {
            remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |r| r.checked_sub(operations))
                .is_ok()
        })
    }
}

/// Applies a staleness policy to one repository.
pub struct StaleReaper {
    tracker: Arc<dyn IssueTracker>,
    policy: Arc<Policy>,
    templates: MessageTemplates,
    clock: Arc<dyn Clock>,
    config: ReaperConfig,
}

impl StaleReaper {
    /// Create a reaper. Fails when either message template is invalid.
    pub fn new(
        tracker: Arc<dyn IssueTracker>,
        policy: Policy,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, TemplateError> {
        let templates = MessageTemplates::from_policy(&policy)?;
        Ok(Self {
            tracker,
            policy: Arc::new(policy),
            templates,
            clock,
            config: ReaperConfig::default(),
        })
    }

    pub fn with_config(mut self, config: ReaperConfig) -> Self {
        self.config = config;
        self
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Run one pass over the repository.
    ///
    /// Returns `Err` only when the open issues cannot be fetched, in which
    /// case nothing was mutated. Per-issue failures are recorded in the
    /// report. Once `cancel` fires no further mutation starts and calls in
    /// flight are abandoned.
    pub async fn run_pass(&self, cancel: &CancellationToken) -> DomainResult<PassReport> {
        let repository = self.tracker.repository().to_string();
        let started_at = self.clock.now();
        let mut report = PassReport::new(&repository, started_at, self.policy.dry_run);

        tracing::info!(
            repository = %repository,
            dry_run = self.policy.dry_run,
            days_before_stale = self.policy.days_before_stale,
            days_before_close = ?self.policy.days_before_close,
            "starting stale pass"
        );

        let issues = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(DomainError::Cancelled("list_issues").into_fetch_failure());
            }
            result = self.tracker.list_open_issues(
                &self.policy.stale_label,
                self.policy.include_pull_requests,
            ) => result.map_err(DomainError::into_fetch_failure)?,
        };

        let now = self.clock.now();
        let budget = Budget::new(self.policy.max_operations);
        let outcomes: Vec<IssueOutcome> = stream::iter(issues)
            .map(|issue| self.process(issue, now, &budget, cancel))
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        for outcome in outcomes {
            report.record(outcome);
        }
        report.cancelled = cancel.is_cancelled();
        report.finish(self.clock.now());

        tracing::info!(
            repository = %repository,
            scanned = report.scanned,
            marked_stale = report.marked_stale,
            closed = report.closed,
            unmarked = report.unmarked,
            exempt_skipped = report.exempt_skipped,
            deferred = report.deferred,
            errors = report.errors,
            cancelled = report.cancelled,
            "stale pass finished"
        );
        Ok(report)
    }

    async fn process(
        &self,
        issue: Issue,
        now: DateTime<Utc>,
        budget: &Budget,
        cancel: &CancellationToken,
    ) -> IssueOutcome {
        let decision = self.policy.evaluate(&issue, now);
        let span = tracing::info_span!("issue", issue = issue.number, action = decision.as_str());
        let outcome = |status| IssueOutcome::new(issue.number, issue.kind, decision, status);

        if decision.operations() == 0 {
            tracing::debug!(parent: &span, "nothing to do");
            return outcome(OutcomeStatus::NoOp);
        }
        if !budget.try_reserve(decision.operations()) {
            tracing::info!(parent: &span, "operations budget exhausted, deferring");
            return outcome(OutcomeStatus::Deferred);
        }
        if self.policy.dry_run {
            tracing::info!(parent: &span, "dry run, not applying");
            return outcome(OutcomeStatus::Planned);
        }

        let result = async {
            match decision {
                Decision::MarkStale => self.mark_stale(&issue, now, cancel).await,
                Decision::Close => self.close(&issue, now, cancel).await,
                Decision::Unmark => self.unmark(&issue, cancel).await,
                Decision::Ineligible | Decision::Exempt | Decision::Active | Decision::AwaitClose => Ok(()),
            }
        }
        .instrument(span.clone())
        .await;

        match result {
            Ok(()) => {
                tracing::info!(parent: &span, "applied");
                outcome(OutcomeStatus::Applied)
            }
            Err(err) => {
                tracing::warn!(parent: &span, error = %err, "action failed");
                IssueOutcome::failed(issue.number, issue.kind, decision, err.to_string())
            }
        }
    }

    /// Label first, then comment. A failed comment takes the label back off
    /// so the next pass retries both.
    async fn mark_stale(&self, issue: &Issue, now: DateTime<Utc>, cancel: &CancellationToken) -> DomainResult<()> {
        let body = self
            .templates
            .render_stale(&MessageContext::new(issue, &self.policy, now))
            .map_err(|e| DomainError::Template(e.to_string()))?;
        let label = self.policy.stale_label.as_str();

        self.call("add_label", cancel, self.tracker.add_label(issue.number, label))
            .await?;

        if let Err(err) = self
            .call("create_comment", cancel, self.tracker.create_comment(issue.number, &body))
            .await
        {
            // Runs even after cancellation, the label must not outlive a failed mark.
            if let Err(rollback) = self
                .timed("remove_label", self.tracker.remove_label(issue.number, label))
                .await
            {
                tracing::error!(error = %rollback, "could not remove stale label after failed comment");
            }
            return Err(err);
        }
        Ok(())
    }

    async fn close(&self, issue: &Issue, now: DateTime<Utc>, cancel: &CancellationToken) -> DomainResult<()> {
        let body = self
            .templates
            .render_close(&MessageContext::new(issue, &self.policy, now))
            .map_err(|e| DomainError::Template(e.to_string()))?;

        self.call("create_comment", cancel, self.tracker.create_comment(issue.number, &body))
            .await?;
        self.call("close_issue", cancel, self.tracker.close_issue(issue.number))
            .await
    }

    async fn unmark(&self, issue: &Issue, cancel: &CancellationToken) -> DomainResult<()> {
        self.call(
            "remove_label",
            cancel,
            self.tracker.remove_label(issue.number, &self.policy.stale_label),
        )
        .await
    }

    /// A tracker call bounded by the request timeout and the pass cancellation.
    async fn call<F>(&self, operation: &'static str, cancel: &CancellationToken, fut: F) -> DomainResult<()>
    where
        F: Future<Output = DomainResult<()>>,
    {
        if cancel.is_cancelled() {
            return Err(DomainError::Cancelled(operation));
        }
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(DomainError::Cancelled(operation)),
            result = self.timed(operation, fut) => result,
        }
    }

    async fn timed<F>(&self, operation: &'static str, fut: F) -> DomainResult<()>
    where
        F: Future<Output = DomainResult<()>>,
    {
        let elapsed = self.config.request_timeout;
        tokio::time::timeout(elapsed, fut)
            .await
            .unwrap_or_else(|_| Err(DomainError::Timeout { operation, elapsed }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited_budget() {
        let budget = Budget::new(None);
        assert!(budget.try_reserve(u32::MAX));
        assert!(budget.try_reserve(u32::MAX));
    }

    #[test]
    fn test_budget_rejects_what_does_not_fit() {
        let budget = Budget::new(Some(3));
        assert!(budget.try_reserve(2));
        assert!(!budget.try_reserve(2));
        assert!(budget.try_reserve(1));
        assert!(!budget.try_reserve(1));
    }

    #[test]
    fn test_zero_budget() {
        let budget = Budget::new(Some(0));
        assert!(!budget.try_reserve(1));
    }
}
