use std::path::{Path, PathBuf};

use chrono::Duration;
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::Serialize;
use thiserror::Error;

use crate::adapters::github_issues::parse_slug;
use crate::domain::models::{label_matches, Config, Policy};
use crate::services::templates::{MessageTemplates, TemplateError};

/// Project config file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = ".github/stale-reaper.yaml";

/// Prefix of environment variable overrides
pub const ENV_PREFIX: &str = "STALE_REAPER_";

/// Repository fallback set by GitHub Actions runners
pub const REPOSITORY_ENV: &str = "GITHUB_REPOSITORY";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid days-before-stale: {0}. Must be at least 0")]
    InvalidDaysBeforeStale(i64),

    #[error("Invalid days-before-close: {0}. Must be at least 0, or -1 to never close")]
    InvalidDaysBeforeClose(i64),

    #[error("Stale label cannot be empty")]
    EmptyStaleLabel,

    #[error("Stale label '{0}' is also listed as exempt")]
    StaleLabelExempt(String),

    #[error("Invalid concurrency: {0}. Must be at least 1")]
    InvalidConcurrency(usize),

    #[error("Invalid {0}: must be at least 1")]
    InvalidTimeout(&'static str),

    #[error(
        "activity-grace-secs ({grace}) must exceed request-timeout-secs ({timeout}), \
         or a slow stale comment reads as new activity"
    )]
    GraceTooShort { grace: u64, timeout: u64 },

    #[error("Invalid requests-per-hour: {0}. Must be at least 1")]
    InvalidRateLimit(u32),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error(transparent)]
    InvalidTemplate(#[from] TemplateError),

    #[error("Invalid repository: {0}")]
    InvalidRepository(String),

    #[error("No repository configured: set `repository`, pass --repo, or export {REPOSITORY_ENV}")]
    MissingRepository,

    #[error("Missing GitHub token: environment variable {0} is not set")]
    MissingToken(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Load(Box::new(err))
    }
}

/// Command-line overrides, merged above every other source
///
/// Only fields that are set end up in the merged configuration.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    pub policy: PolicyOverrides,
    pub github: GitHubOverrides,
}

/// Policy fields settable from the command line
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PolicyOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_before_stale: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_before_close: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale_issue_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_issue_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exempt_issue_labels: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale_issue_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_pull_requests: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_operations: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
}

/// Connection fields settable from the command line
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct GitHubOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. `path`, or .github/stale-reaper.yaml when it exists
    /// 3. Environment variables (STALE_REAPER_* prefix, `__` separates sections)
    /// 4. Command-line overrides
    ///
    /// An explicitly given file must exist. The result is validated.
    pub fn load(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Config, ConfigError> {
        let figment = Self::figment(path, overrides)?;
        let config: Config = figment.extract()?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, without env or CLI layers
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .extract()?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn figment(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Figment, ConfigError> {
        let file = match path {
            Some(path) if !path.exists() => return Err(ConfigError::FileNotFound(path.to_path_buf())),
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(DEFAULT_CONFIG_PATH),
        };

        Ok(Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(file))
            .merge(Self::env_provider())
            .merge(Serialized::defaults(overrides)))
    }

    /// `STALE_REAPER_POLICY__DAYS_BEFORE_STALE` becomes `policy.days-before-stale`.
    fn env_provider() -> Env {
        Env::prefixed(ENV_PREFIX).map(|key| key.as_str().replace("__", ".").replace('_', "-").into())
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let policy = &config.policy;
        if policy.days_before_stale < 0 || policy.days_before_stale > i64::from(u32::MAX) {
            return Err(ConfigError::InvalidDaysBeforeStale(policy.days_before_stale));
        }
        if policy.days_before_close < -1 || policy.days_before_close > i64::from(u32::MAX) {
            return Err(ConfigError::InvalidDaysBeforeClose(policy.days_before_close));
        }

        let stale_label = policy.stale_issue_label.trim();
        if stale_label.is_empty() {
            return Err(ConfigError::EmptyStaleLabel);
        }
        if policy.exempt_issue_labels.iter().any(|l| label_matches(l, stale_label)) {
            return Err(ConfigError::StaleLabelExempt(stale_label.to_string()));
        }

        MessageTemplates::new(
            policy.stale_issue_message.as_str(),
            policy.close_issue_message.as_str(),
        )?;

        let github = &config.github;
        if github.concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency(github.concurrency));
        }
        if github.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout("request-timeout-secs"));
        }
        if github.pass_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout("pass-timeout-secs"));
        }
        // The stale comment can land up to one request timeout after the label.
        if policy.activity_grace_secs <= github.request_timeout_secs {
            return Err(ConfigError::GraceTooShort {
                grace: policy.activity_grace_secs,
                timeout: github.request_timeout_secs,
            });
        }
        if github.requests_per_hour == 0 {
            return Err(ConfigError::InvalidRateLimit(github.requests_per_hour));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        if let Some(ref repository) = config.repository {
            parse_slug(repository).map_err(|e| ConfigError::InvalidRepository(e.to_string()))?;
        }

        Ok(())
    }

    /// Build the immutable pass policy from validated configuration
    pub fn build_policy(config: &Config) -> Result<Policy, ConfigError> {
        let raw = &config.policy;
        let days_before_stale = u32::try_from(raw.days_before_stale)
            .map_err(|_| ConfigError::InvalidDaysBeforeStale(raw.days_before_stale))?;
        let days_before_close = match raw.days_before_close {
            -1 => None,
            days => Some(u32::try_from(days).map_err(|_| ConfigError::InvalidDaysBeforeClose(days))?),
        };
        let activity_grace = i64::try_from(raw.activity_grace_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);

        Ok(Policy {
            days_before_stale,
            days_before_close,
            stale_label: raw.stale_issue_label.trim().to_string(),
            exempt_labels: raw.exempt_issue_labels.iter().cloned().collect(),
            stale_message: raw.stale_issue_message.clone(),
            close_message: raw.close_issue_message.clone(),
            include_pull_requests: raw.include_pull_requests,
            activity_grace,
            max_operations: raw.max_operations,
            dry_run: raw.dry_run,
        })
    }

    /// Repository slug from configuration, falling back to `GITHUB_REPOSITORY`
    pub fn resolve_repository(config: &Config) -> Result<String, ConfigError> {
        let slug = config
            .repository
            .clone()
            .or_else(|| std::env::var(REPOSITORY_ENV).ok())
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::MissingRepository)?;
        parse_slug(&slug).map_err(|e| ConfigError::InvalidRepository(e.to_string()))?;
        Ok(slug.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, yaml: &str) -> PathBuf {
        let path = dir.path().join("stale-reaper.yaml");
        fs::write(&path, yaml).unwrap();
        path
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        ConfigLoader::validate(&config).expect("Default config should be valid");
        let policy = ConfigLoader::build_policy(&config).unwrap();
        assert_eq!(policy, Policy::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r"
repository: octo/repo
policy:
  days-before-stale: 60
  days-before-close: -1
  exempt-issue-labels: nostale,security
logging:
  level: debug
",
        );

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.repository.as_deref(), Some("octo/repo"));
        assert_eq!(config.logging.level, "debug");

        let policy = ConfigLoader::build_policy(&config).unwrap();
        assert_eq!(policy.days_before_stale, 60);
        assert_eq!(policy.days_before_close, None);
        assert!(policy.exempt_labels.contains("security"));
    }

    #[test]
    fn test_missing_explicit_file() {
        let result = ConfigLoader::load(Some(Path::new("/nonexistent/reaper.yaml")), &ConfigOverrides::default());
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_env_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "policy:\n  days-before-stale: 60\n");

        let config = temp_env::with_vars(
            [
                ("STALE_REAPER_POLICY__DAYS_BEFORE_STALE", Some("90")),
                ("STALE_REAPER_POLICY__STALE_ISSUE_LABEL", Some("inactive")),
                ("STALE_REAPER_GITHUB__CONCURRENCY", Some("8")),
            ],
            || ConfigLoader::load(Some(&path), &ConfigOverrides::default()),
        )
        .unwrap();

        assert_eq!(config.policy.days_before_stale, 90);
        assert_eq!(config.policy.stale_issue_label, "inactive");
        assert_eq!(config.github.concurrency, 8);
    }

    #[test]
    fn test_cli_overrides_env() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "policy:\n  dry-run: false\n");
        let overrides = ConfigOverrides {
            repository: Some("octo/cli".to_string()),
            policy: PolicyOverrides {
                days_before_stale: Some(10),
                exempt_issue_labels: Some(vec!["pinned".to_string()]),
                dry_run: Some(true),
                ..PolicyOverrides::default()
            },
            ..ConfigOverrides::default()
        };

        let config = temp_env::with_var("STALE_REAPER_POLICY__DAYS_BEFORE_STALE", Some("90"), || {
            ConfigLoader::load(Some(&path), &overrides)
        })
        .unwrap();

        assert_eq!(config.repository.as_deref(), Some("octo/cli"));
        assert_eq!(config.policy.days_before_stale, 10);
        assert_eq!(config.policy.exempt_issue_labels, vec!["pinned"]);
        assert!(config.policy.dry_run);
        // Untouched fields keep their defaults
        assert_eq!(config.policy.days_before_close, 5);
    }

    #[test]
    fn test_validate_negative_stale_days() {
        let mut config = Config::default();
        config.policy.days_before_stale = -3;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidDaysBeforeStale(-3))
        ));
    }

    #[test]
    fn test_validate_close_days_below_minus_one() {
        let mut config = Config::default();
        config.policy.days_before_close = -2;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidDaysBeforeClose(-2))
        ));
    }

    #[test]
    fn test_validate_zero_close_days_allowed() {
        let mut config = Config::default();
        config.policy.days_before_close = 0;
        assert!(ConfigLoader::validate(&config).is_ok());
        let policy = ConfigLoader::build_policy(&config).unwrap();
        assert_eq!(policy.days_before_close, Some(0));
    }

    #[test]
    fn test_validate_stale_label_cannot_be_exempt() {
        let mut config = Config::default();
        config.policy.exempt_issue_labels = vec!["stale".to_string()];
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::StaleLabelExempt(_))
        ));
    }

    #[test]
    fn test_validate_stale_label_exempt_in_other_case() {
        let mut config = Config::default();
        config.policy.exempt_issue_labels = vec!["Stale".to_string()];
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::StaleLabelExempt(_))
        ));
    }

    #[test]
    fn test_validate_empty_stale_label() {
        let mut config = Config::default();
        config.policy.stale_issue_label = "  ".to_string();
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::EmptyStaleLabel)));
    }

    #[test]
    fn test_validate_bad_template() {
        let mut config = Config::default();
        config.policy.stale_issue_message = "{% if %}".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidTemplate(_))
        ));
    }

    #[test]
    fn test_validate_zero_concurrency() {
        let mut config = Config::default();
        config.github.concurrency = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidConcurrency(0))
        ));
    }

    #[test]
    fn test_validate_zero_timeouts() {
        let mut config = Config::default();
        config.github.request_timeout_secs = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidTimeout("request-timeout-secs"))
        ));

        let mut config = Config::default();
        config.github.pass_timeout_secs = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidTimeout("pass-timeout-secs"))
        ));
    }

    #[test]
    fn test_validate_grace_must_outlast_request_timeout() {
        let mut config = Config::default();
        config.github.request_timeout_secs = 120;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::GraceTooShort { grace: 60, timeout: 120 })
        ));

        config.policy.activity_grace_secs = 120;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::GraceTooShort { .. })
        ));

        config.policy.activity_grace_secs = 121;
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();
        match ConfigLoader::validate(&config) {
            Err(ConfigError::InvalidLogLevel(level)) => assert_eq!(level, "invalid"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        match ConfigLoader::validate(&config) {
            Err(ConfigError::InvalidLogFormat(format)) => assert_eq!(format, "xml"),
            other => panic!("Expected InvalidLogFormat error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_malformed_repository() {
        let config = Config {
            repository: Some("just-a-name".to_string()),
            ..Config::default()
        };
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidRepository(_))
        ));
    }

    #[test]
    fn test_resolve_repository_prefers_config() {
        let config = Config {
            repository: Some("octo/configured".to_string()),
            ..Config::default()
        };
        let slug = temp_env::with_var(REPOSITORY_ENV, Some("octo/env"), || {
            ConfigLoader::resolve_repository(&config)
        })
        .unwrap();
        assert_eq!(slug, "octo/configured");
    }

    #[test]
    fn test_resolve_repository_from_env() {
        let slug = temp_env::with_var(REPOSITORY_ENV, Some("octo/env"), || {
            ConfigLoader::resolve_repository(&Config::default())
        })
        .unwrap();
        assert_eq!(slug, "octo/env");
    }

    #[test]
    fn test_resolve_repository_missing() {
        let result = temp_env::with_var_unset(REPOSITORY_ENV, || {
            ConfigLoader::resolve_repository(&Config::default())
        });
        assert!(matches!(result, Err(ConfigError::MissingRepository)));
    }
}
