//! Tracker credentials
//!
//! The token is only ever read from the process environment, never from
//! configuration files.

use std::fmt;

use crate::infrastructure::config::ConfigError;

/// API token for the issue tracker
#[derive(Clone)]
pub struct GitHubToken(String);

impl GitHubToken {
    /// Read the token from the environment variable `var`
    pub fn from_env(var: &str) -> Result<Self, ConfigError> {
        std::env::var(var)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(Self)
            .ok_or_else(|| ConfigError::MissingToken(var.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for GitHubToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("GitHubToken([REDACTED])")
    }
}
