//! GitHub Issues adapter.
//!
//! Lists open issues (and optionally pull requests) of one repository,
//! recovers stale markers from issue events, and applies label, comment
//! and close mutations.

pub mod client;
pub mod models;
pub mod tracker;

pub use client::{GitHubClient, GitHubClientConfig, GITHUB_API_BASE};
pub use tracker::{parse_slug, GitHubTracker};
