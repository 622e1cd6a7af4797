//! GitHub HTTP client with rate limiting.
//!
//! Wraps the GitHub REST API v3, providing typed methods for the
//! operations the tracker adapter needs. Includes a token-bucket rate
//! limiter to stay within the authenticated hourly API limit, and a
//! per-request timeout.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use crate::domain::errors::{DomainError, DomainResult};
use crate::infrastructure::logging::SecretScrubber;

use super::models::{
    GitHubCommentRequest, GitHubIssue, GitHubIssueEvent, GitHubIssueUpdateRequest,
    GitHubLabelsRequest,
};

/// Base URL for the GitHub REST API v3.
pub const GITHUB_API_BASE: &str = "https://api.github.com";

/// Page size used for every list endpoint (GitHub's maximum).
const PER_PAGE: usize = 100;

/// Token-bucket rate limiter.
///
/// Allows up to `capacity` requests per `window`. When the bucket is
/// exhausted, [`acquire`](RateLimiter::acquire) sleeps until the window
/// resets and a token becomes available.
#[derive(Debug)]
pub struct RateLimiter {
    /// Maximum tokens in the bucket.
    capacity: u32,
    /// Current available tokens.
    tokens: u32,
    /// Duration of the refill window.
    window: Duration,
    /// When the current window started.
    window_start: Instant,
}

impl RateLimiter {
    /// Create a new rate limiter with the given capacity and window.
    pub fn new(capacity: u32, window: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            tokens: capacity,
            window,
            window_start: Instant::now(),
        }
    }

    /// Acquire a single token, sleeping if necessary.
    ///
    /// If the current window has elapsed, the bucket is refilled.
    /// If no tokens are available, this method sleeps until the
    /// window resets.
    pub async fn acquire(&mut self) {
        let elapsed = self.window_start.elapsed();
        if elapsed >= self.window {
            self.tokens = self.capacity;
            self.window_start = Instant::now();
        }

        if self.tokens > 0 {
            self.tokens -= 1;
        } else {
            let remaining = self.window.saturating_sub(elapsed);
            tracing::warn!(
                sleep_ms = u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX),
                "GitHub rate limit reached, sleeping"
            );
            tokio::time::sleep(remaining).await;
            self.tokens = self.capacity - 1;
            self.window_start = Instant::now();
        }
    }
}

/// Settings for [`GitHubClient`].
#[derive(Clone)]
pub struct GitHubClientConfig {
    /// API base URL; GitHub Enterprise installs use `https://host/api/v3`.
    pub api_url: String,
    /// Personal access token or installation token.
    pub token: String,
    /// Timeout applied to every request.
    pub request_timeout: Duration,
    /// Token-bucket capacity per hour.
    pub requests_per_hour: u32,
}

impl fmt::Debug for GitHubClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubClientConfig")
            .field("api_url", &self.api_url)
            .field("token", &"[REDACTED]")
            .field("request_timeout", &self.request_timeout)
            .field("requests_per_hour", &self.requests_per_hour)
            .finish()
    }
}

/// HTTP client for the GitHub REST API v3.
///
/// Transport failures map to [`DomainError::Request`] or
/// [`DomainError::Timeout`], non-2xx responses to [`DomainError::Api`].
/// Response bodies are scrubbed of credentials before they end up in an
/// error.
#[derive(Clone)]
pub struct GitHubClient {
    http: Client,
    token: String,
    base: Url,
    request_timeout: Duration,
    rate_limiter: Arc<Mutex<RateLimiter>>,
    scrubber: SecretScrubber,
}

impl fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubClient")
            .field("base", &self.base.as_str())
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl GitHubClient {
    /// Create a new client.
    pub fn new(config: GitHubClientConfig) -> DomainResult<Self> {
        let base = Url::parse(&config.api_url).map_err(|e| {
            DomainError::ValidationFailed(format!("invalid API URL '{}': {e}", config.api_url))
        })?;
        if base.cannot_be_a_base() {
            return Err(DomainError::ValidationFailed(format!(
                "API URL '{}' cannot be used as a base URL",
                config.api_url
            )));
        }

        let http = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("stale-reaper/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DomainError::Request {
                operation: "build_client",
                reason: e.to_string(),
            })?;

        let rate_limiter = RateLimiter::new(config.requests_per_hour, Duration::from_secs(3_600));
        let scrubber = SecretScrubber::new().with_secret(&config.token);

        Ok(Self {
            http,
            token: config.token,
            base,
            request_timeout: config.request_timeout,
            rate_limiter: Arc::new(Mutex::new(rate_limiter)),
            scrubber,
        })
    }

    /// Build an endpoint URL from path segments, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> DomainResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| {
                DomainError::ValidationFailed(format!("API URL '{}' has no path", self.base))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Acquire a rate-limit token and build an authorized request.
    async fn rate_limited_request(&self, method: Method, url: Url) -> RequestBuilder {
        self.rate_limiter.lock().await.acquire().await;
        self.http
            .request(method, url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    /// Send a request and turn non-success statuses into errors.
    async fn execute(&self, operation: &'static str, request: RequestBuilder) -> DomainResult<Response> {
        let resp = request
            .send()
            .await
            .map_err(|e| self.transport_error(operation, &e))?;

        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Err(DomainError::Api {
            operation,
            status,
            body: self.scrubber.scrub(&body),
        })
    }

    fn transport_error(&self, operation: &'static str, err: &reqwest::Error) -> DomainError {
        if err.is_timeout() {
            DomainError::Timeout {
                operation,
                elapsed: self.request_timeout,
            }
        } else {
            DomainError::Request {
                operation,
                reason: self.scrubber.scrub(&err.to_string()),
            }
        }
    }

    async fn parse<T: DeserializeOwned>(operation: &'static str, resp: Response) -> DomainResult<T> {
        resp.json::<T>().await.map_err(|e| DomainError::Parse {
            operation,
            reason: e.to_string(),
        })
    }

    /// Fetch every page of a list endpoint.
    async fn paginate<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> DomainResult<Vec<T>> {
        let mut items = Vec::new();
        for page in 1u32.. {
            let mut url = self.endpoint(segments)?;
            {
                let mut pairs = url.query_pairs_mut();
                for (key, value) in query {
                    pairs.append_pair(key, value);
                }
                pairs.append_pair("per_page", &PER_PAGE.to_string());
                pairs.append_pair("page", &page.to_string());
            }

            let req = self.rate_limited_request(Method::GET, url).await;
            let resp = self.execute(operation, req).await?;
            let batch: Vec<T> = Self::parse(operation, resp).await?;

            tracing::debug!(operation, page, count = batch.len(), "fetched page");
            let last_page = batch.len() < PER_PAGE;
            items.extend(batch);
            if last_page {
                break;
            }
        }
        Ok(items)
    }

    /// List all open issues of a repository.
    ///
    /// Note: GitHub's `/issues` endpoint also returns pull requests.
    /// Callers are responsible for filtering them out via the
    /// `pull_request` field.
    pub async fn list_open_issues(&self, owner: &str, repo: &str) -> DomainResult<Vec<GitHubIssue>> {
        self.paginate(
            "list_issues",
            &["repos", owner, repo, "issues"],
            &[("state", "open")],
        )
        .await
    }

    /// List the event history of an issue, oldest first.
    pub async fn list_issue_events(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
    ) -> DomainResult<Vec<GitHubIssueEvent>> {
        let number = issue_number.to_string();
        self.paginate(
            "list_issue_events",
            &["repos", owner, repo, "issues", &number, "events"],
            &[],
        )
        .await
    }

    /// Add labels to an issue.
    pub async fn add_labels(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
        labels: &[&str],
    ) -> DomainResult<()> {
        let number = issue_number.to_string();
        let url = self.endpoint(&["repos", owner, repo, "issues", &number, "labels"])?;
        let body = GitHubLabelsRequest {
            labels: labels.iter().map(|l| (*l).to_string()).collect(),
        };

        let req = self.rate_limited_request(Method::POST, url).await.json(&body);
        self.execute("add_labels", req).await?;
        Ok(())
    }

    /// Remove a label from an issue. A 404 (label not present) is success.
    pub async fn remove_label(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
        label: &str,
    ) -> DomainResult<()> {
        let number = issue_number.to_string();
        let url = self.endpoint(&["repos", owner, repo, "issues", &number, "labels", label])?;

        let req = self.rate_limited_request(Method::DELETE, url).await;
        match self.execute("remove_label", req).await {
            Ok(_) => Ok(()),
            Err(DomainError::Api { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                tracing::debug!(issue = issue_number, label, "label already absent");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Post a comment on an issue.
    pub async fn post_comment(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
        comment: &str,
    ) -> DomainResult<()> {
        let number = issue_number.to_string();
        let url = self.endpoint(&["repos", owner, repo, "issues", &number, "comments"])?;
        let body = GitHubCommentRequest {
            body: comment.to_string(),
        };

        let req = self.rate_limited_request(Method::POST, url).await.json(&body);
        self.execute("post_comment", req).await?;
        Ok(())
    }

    /// Update the state of an issue (`"open"` or `"closed"`).
    pub async fn update_issue_state(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
        state: &str,
        state_reason: Option<&str>,
    ) -> DomainResult<()> {
        let number = issue_number.to_string();
        let url = self.endpoint(&["repos", owner, repo, "issues", &number])?;
        let body = GitHubIssueUpdateRequest {
            state: state.to_string(),
            state_reason: state_reason.map(str::to_string),
        };

        let req = self.rate_limited_request(Method::PATCH, url).await.json(&body);
        self.execute("update_issue_state", req).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(api_url: &str) -> GitHubClient {
        GitHubClient::new(GitHubClientConfig {
            api_url: api_url.to_string(),
            token: "ghp_test_token_1234567890".to_string(),
            request_timeout: Duration::from_secs(5),
            requests_per_hour: 5_000,
        })
        .unwrap()
    }

    #[test]
    fn test_rate_limiter_creation() {
        let rl = RateLimiter::new(5_000, Duration::from_secs(3_600));
        assert_eq!(rl.capacity, 5_000);
        assert_eq!(rl.tokens, 5_000);
    }

    #[test]
    fn test_rate_limiter_zero_capacity_is_clamped() {
        let rl = RateLimiter::new(0, Duration::from_secs(3_600));
        assert_eq!(rl.capacity, 1);
    }

    #[tokio::test]
    async fn test_rate_limiter_acquire_decrements_tokens() {
        let mut rl = RateLimiter::new(5, Duration::from_secs(60));
        rl.acquire().await;
        assert_eq!(rl.tokens, 4);
        rl.acquire().await;
        assert_eq!(rl.tokens, 3);
    }

    #[test]
    fn test_endpoint_encodes_label_segment() {
        let c = client("https://api.github.com");
        let url = c
            .endpoint(&["repos", "octo", "repo", "issues", "7", "labels", "needs info/triage"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/octo/repo/issues/7/labels/needs%20info%2Ftriage"
        );
    }

    #[test]
    fn test_endpoint_keeps_enterprise_prefix() {
        let c = client("https://ghe.example.com/api/v3/");
        let url = c.endpoint(&["repos", "octo", "repo", "issues"]).unwrap();
        assert_eq!(url.as_str(), "https://ghe.example.com/api/v3/repos/octo/repo/issues");
    }

    #[test]
    fn test_invalid_api_url_rejected() {
        let result = GitHubClient::new(GitHubClientConfig {
            api_url: "not a url".to_string(),
            token: "t".to_string(),
            request_timeout: Duration::from_secs(5),
            requests_per_hour: 10,
        });
        assert!(matches!(result, Err(DomainError::ValidationFailed(_))));
    }

    #[test]
    fn test_debug_does_not_leak_token() {
        let c = client("https://api.github.com");
        let debug = format!("{c:?}");
        assert!(!debug.contains("ghp_test_token_1234567890"));
    }
}
