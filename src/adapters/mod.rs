//! Issue tracker adapters.

pub mod github_issues;
pub mod memory;

pub use github_issues::GitHubTracker;
pub use memory::InMemoryTracker;
