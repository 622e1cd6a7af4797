use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};

use super::policy::{DEFAULT_CLOSE_MESSAGE, DEFAULT_STALE_LABEL, DEFAULT_STALE_MESSAGE};

/// Main configuration structure for the reaper
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Target repository as `owner/name`
    #[serde(default)]
    pub repository: Option<String>,

    /// Staleness policy
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Issue tracker connection settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Directory holding per-repository run locks (defaults to the system temp dir)
    #[serde(default)]
    pub run_lock_dir: Option<PathBuf>,
}

/// Policy options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PolicyConfig {
    /// Idle days before an issue is marked stale
    #[serde(default = "default_days_before_stale")]
    pub days_before_stale: i64,

    /// Days after marking before a stale issue is closed; -1 never closes
    #[serde(default = "default_days_before_close")]
    pub days_before_close: i64,

    /// Comment template posted when marking stale
    #[serde(default = "default_stale_message")]
    pub stale_issue_message: String,

    /// Comment template posted when closing
    #[serde(default = "default_close_message")]
    pub close_issue_message: String,

    /// Labels that exempt an issue entirely
    #[serde(default, deserialize_with = "deserialize_label_list")]
    pub exempt_issue_labels: Vec<String>,

    /// Label used to mark staleness
    #[serde(default = "default_stale_label")]
    pub stale_issue_label: String,

    /// Apply the policy to pull requests too
    #[serde(default)]
    pub include_pull_requests: bool,

    /// Seconds after the stale marker during which updates are not activity
    #[serde(default = "default_activity_grace_secs")]
    pub activity_grace_secs: u64,

    /// Upper bound on mutating API calls per pass
    #[serde(default)]
    pub max_operations: Option<u32>,

    /// Report decisions without mutating anything
    #[serde(default)]
    pub dry_run: bool,
}

const fn default_days_before_stale() -> i64 {
    30
}

const fn default_days_before_close() -> i64 {
    5
}

fn default_stale_message() -> String {
    DEFAULT_STALE_MESSAGE.to_string()
}

fn default_close_message() -> String {
    DEFAULT_CLOSE_MESSAGE.to_string()
}

fn default_stale_label() -> String {
    DEFAULT_STALE_LABEL.to_string()
}

const fn default_activity_grace_secs() -> u64 {
    60
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            days_before_stale: default_days_before_stale(),
            days_before_close: default_days_before_close(),
            stale_issue_message: default_stale_message(),
            close_issue_message: default_close_message(),
            exempt_issue_labels: Vec::new(),
            stale_issue_label: default_stale_label(),
            include_pull_requests: false,
            activity_grace_secs: default_activity_grace_secs(),
            max_operations: None,
            dry_run: false,
        }
    }
}

/// Accept either a YAML sequence or a comma-separated string.
fn deserialize_label_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum LabelList {
        Joined(String),
        List(Vec<String>),
    }

    let labels = match LabelList::deserialize(deserializer)? {
        LabelList::Joined(raw) => raw.split(',').map(str::to_string).collect(),
        LabelList::List(list) => list,
    };
    Ok(labels
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect())
}

/// GitHub connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GitHubConfig {
    /// Base URL of the REST API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Name of the environment variable holding the token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Timeout applied to every API call
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Deadline for the whole pass
    #[serde(default = "default_pass_timeout_secs")]
    pub pass_timeout_secs: u64,

    /// Issues processed concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Token-bucket capacity per hour
    #[serde(default = "default_requests_per_hour")]
    pub requests_per_hour: u32,
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

const fn default_request_timeout_secs() -> u64 {
    30
}

const fn default_pass_timeout_secs() -> u64 {
    900
}

const fn default_concurrency() -> usize {
    4
}

const fn default_requests_per_hour() -> u32 {
    5_000
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token_env: default_token_env(),
            request_timeout_secs: default_request_timeout_secs(),
            pass_timeout_secs: default_pass_timeout_secs(),
            concurrency: default_concurrency(),
            requests_per_hour: default_requests_per_hour(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files (stderr only when unset)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// File rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_option_names() {
        let yaml = r"
policy:
  days-before-stale: 60
  days-before-close: 7
  stale-issue-label: inactive
  exempt-issue-labels: nostale, pinned
  stale-issue-message: going stale
  close-issue-message: closing
";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.policy.days_before_stale, 60);
        assert_eq!(config.policy.days_before_close, 7);
        assert_eq!(config.policy.stale_issue_label, "inactive");
        assert_eq!(config.policy.exempt_issue_labels, vec!["nostale", "pinned"]);
        assert_eq!(config.policy.stale_issue_message, "going stale");
        assert_eq!(config.policy.close_issue_message, "closing");
    }

    #[test]
    fn test_exempt_labels_as_sequence() {
        let yaml = "policy:\n  exempt-issue-labels: [nostale, ' security ', '']\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.policy.exempt_issue_labels, vec!["nostale", "security"]);
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.repository.is_none());
        assert_eq!(config.policy.days_before_stale, 30);
        assert_eq!(config.policy.days_before_close, 5);
        assert_eq!(config.policy.stale_issue_label, "stale");
        assert!(config.policy.exempt_issue_labels.is_empty());
        assert_eq!(config.github.token_env, "GITHUB_TOKEN");
        assert_eq!(config.github.concurrency, 4);
        assert_eq!(config.logging.level, "info");
    }
}
