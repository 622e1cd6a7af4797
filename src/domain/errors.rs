//! Domain errors for the stale-issue reaper.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while talking to the issue tracker or running a pass.
///
/// [`DomainError::FetchFailed`] is fatal to a pass. Every other variant is
/// produced by a single tracker call and, when it happens during the
/// mutation stage, only affects the issue being processed.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Failed to fetch open issues: {0}")]
    FetchFailed(String),

    #[error("{operation} returned {status}: {body}")]
    Api {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("{operation} request failed: {reason}")]
    Request {
        operation: &'static str,
        reason: String,
    },

    #[error("{operation} response could not be parsed: {reason}")]
    Parse {
        operation: &'static str,
        reason: String,
    },

    #[error("{operation} timed out after {}s", .elapsed.as_secs())]
    Timeout {
        operation: &'static str,
        elapsed: Duration,
    },

    #[error("{0} skipped: pass was cancelled")]
    Cancelled(&'static str),

    #[error("Issue not found: #{0}")]
    IssueNotFound(u64),

    #[error("Template rendering failed: {0}")]
    Template(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

impl DomainError {
    /// Wrap a lower-level error as a fetch-stage failure.
    pub fn into_fetch_failure(self) -> Self {
        match self {
            Self::FetchFailed(_) => self,
            other => Self::FetchFailed(other.to_string()),
        }
    }

    /// Whether this error is the fatal fetch-stage failure.
    pub const fn is_fetch_failure(&self) -> bool {
        matches!(self, Self::FetchFailed(_))
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_fetch_failure_wraps_message() {
        let err = DomainError::Api {
            operation: "list_issues",
            status: 401,
            body: "Bad credentials".to_string(),
        };
        let fetch = err.into_fetch_failure();
        assert!(fetch.is_fetch_failure());
        assert_eq!(
            fetch.to_string(),
            "Failed to fetch open issues: list_issues returned 401: Bad credentials"
        );
    }

    #[test]
    fn test_into_fetch_failure_is_not_double_wrapped() {
        let err = DomainError::FetchFailed("network down".to_string());
        assert_eq!(
            err.into_fetch_failure().to_string(),
            "Failed to fetch open issues: network down"
        );
    }

    #[test]
    fn test_timeout_message() {
        let err = DomainError::Timeout {
            operation: "close_issue",
            elapsed: Duration::from_secs(30),
        };
        assert_eq!(err.to_string(), "close_issue timed out after 30s");
    }
}
