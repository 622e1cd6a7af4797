//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment:
//! - Programmatic defaults
//! - YAML file loading
//! - Environment variable and command-line overrides
//! - Validation and policy construction

pub mod loader;

pub use loader::{ConfigError, ConfigLoader, ConfigOverrides, GitHubOverrides, PolicyOverrides};
