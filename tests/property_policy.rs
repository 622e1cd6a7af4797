use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

use stale_reaper::adapters::memory::{InMemoryTracker, TrackerOperation};
use stale_reaper::{Decision, Issue, ManualClock, Policy, StaleReaper};

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn policy(days_before_stale: u32, days_before_close: u32) -> Policy {
    Policy {
        days_before_stale,
        days_before_close: Some(days_before_close),
        exempt_labels: ["nostale".to_string(), "security".to_string()].into_iter().collect(),
        ..Policy::default()
    }
}

/// Run one pass at `now` and return the tracker calls that changed something.
fn run_pass(issue: Issue, policy: Policy, now: DateTime<Utc>) -> Vec<TrackerOperation> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let clock = Arc::new(ManualClock::new(now));
    let tracker = Arc::new(InMemoryTracker::new("octo/repo", clock.clone()));
    tracker.insert(issue);

    let reaper = StaleReaper::new(tracker.clone(), policy, clock).unwrap();
    runtime
        .block_on(reaper.run_pass(&CancellationToken::new()))
        .unwrap();
    tracker.mutations().into_iter().map(|c| c.operation).collect()
}

proptest! {
    /// Property: exempt issues are never mutated
    ///
    /// Whatever the idle time, stale state or thresholds, an issue carrying
    /// an exempt label sees no tracker mutation.
    #[test]
    fn prop_exempt_issues_never_mutated(
        idle_days in 0i64..1000,
        stale in any::<bool>(),
        marked_days_ago in 0i64..1000,
        days_before_stale in 0u32..90,
        days_before_close in 0u32..30,
        exempt in prop::sample::select(vec!["nostale", "security"]),
    ) {
        let now = epoch() + Duration::days(2000);
        let mut issue = Issue::new(1, "t", now - Duration::days(idle_days)).with_label(exempt);
        if stale {
            issue = issue.with_label("stale").with_stale_marker(now - Duration::days(marked_days_ago));
        }

        let mutations = run_pass(issue, policy(days_before_stale, days_before_close), now);
        prop_assert!(mutations.is_empty());
    }

    /// Property: an idle, unlabelled issue is marked with exactly one label
    /// and one comment
    #[test]
    fn prop_idle_issue_marked_exactly_once(
        days_before_stale in 0u32..90,
        extra_idle in 0i64..500,
    ) {
        let now = epoch() + Duration::days(2000);
        let idle = Duration::days(i64::from(days_before_stale) + extra_idle);
        let issue = Issue::new(1, "t", now - idle);

        let mutations = run_pass(issue, policy(days_before_stale, 5), now);
        prop_assert_eq!(mutations, vec![TrackerOperation::AddLabel, TrackerOperation::Comment]);
    }

    /// Property: a stale issue past the close window with no activity is
    /// closed with exactly one comment
    #[test]
    fn prop_stale_issue_closed_with_one_comment(
        days_before_close in 0u32..30,
        extra in 0i64..200,
    ) {
        let now = epoch() + Duration::days(2000);
        let marked = now - Duration::days(i64::from(days_before_close) + extra);
        let issue = Issue::new(1, "t", marked).with_label("stale").with_stale_marker(marked);

        let mutations = run_pass(issue, policy(30, days_before_close), now);
        prop_assert_eq!(mutations, vec![TrackerOperation::Comment, TrackerOperation::Close]);
    }

    /// Property: activity after the marker always wins over closing
    #[test]
    fn prop_activity_beats_close(
        marked_days_ago in 0i64..400,
        activity_secs_after in 61i64..86_400,
        days_before_close in 0u32..30,
    ) {
        let now = epoch() + Duration::days(2000);
        let marked = now - Duration::days(marked_days_ago);
        let issue = Issue::new(1, "t", marked + Duration::seconds(activity_secs_after))
            .with_label("stale")
            .with_stale_marker(marked);

        let decision = policy(30, days_before_close).evaluate(&issue, now);
        prop_assert_eq!(decision, Decision::Unmark);
    }

    /// Property: below the stale threshold nothing happens
    #[test]
    fn prop_recent_issue_is_active(
        days_before_stale in 1u32..90,
        idle_secs in 0i64..86_400,
    ) {
        let now = epoch() + Duration::days(2000);
        let idle = Duration::days(i64::from(days_before_stale) - 1) + Duration::seconds(idle_secs.min(86_399));
        let issue = Issue::new(1, "t", now - idle);

        prop_assert_eq!(policy(days_before_stale, 5).evaluate(&issue, now), Decision::Active);
    }
}
