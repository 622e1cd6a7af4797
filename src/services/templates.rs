//! Comment templates posted by the reaper.
//!
//! Messages are minijinja templates. Unknown variables are errors, so a typo
//! in a configured message is caught when the templates are compiled rather
//! than on the first issue that needs it.

use chrono::{DateTime, Utc};
use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;
use thiserror::Error;

use crate::domain::models::{Issue, Policy};

/// Template errors
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("invalid {name} template: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("failed to render {name} template: {reason}")]
    Render { name: &'static str, reason: String },
}

/// Variables available to both templates.
#[derive(Debug, Clone, Serialize)]
pub struct MessageContext<'a> {
    pub number: u64,
    pub title: &'a str,
    pub url: &'a str,
    pub kind: &'static str,
    pub idle_days: i64,
    pub days_before_stale: u32,
    /// -1 when closing is disabled.
    pub days_before_close: i64,
    pub stale_label: &'a str,
}

impl<'a> MessageContext<'a> {
    pub fn new(issue: &'a Issue, policy: &'a Policy, now: DateTime<Utc>) -> Self {
        Self {
            number: issue.number,
            title: &issue.title,
            url: &issue.url,
            kind: issue.kind.as_str(),
            idle_days: issue.idle_for(now).num_days(),
            days_before_stale: policy.days_before_stale,
            days_before_close: policy.days_before_close.map_or(-1, i64::from),
            stale_label: &policy.stale_label,
        }
    }
}

const STALE: &str = "stale";
const CLOSE: &str = "close";

/// Compiled stale and close message templates
#[derive(Debug)]
pub struct MessageTemplates {
    env: Environment<'static>,
}

impl MessageTemplates {
    /// Compile both templates and try them against a sample issue.
    pub fn new(stale: impl Into<String>, close: impl Into<String>) -> Result<Self, TemplateError> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        for (name, source) in [(STALE, stale.into()), (CLOSE, close.into())] {
            env.add_template_owned(name, source)
                .map_err(|e| TemplateError::Invalid {
                    name,
                    reason: e.to_string(),
                })?;
        }

        let templates = Self { env };
        // Undefined variables only show up when rendering.
        let issue = Issue::new(1, "Sample issue", Utc::now());
        let policy = Policy::default();
        let sample = MessageContext::new(&issue, &policy, Utc::now());
        for name in [STALE, CLOSE] {
            templates.render(name, &sample).map_err(|e| match e {
                TemplateError::Render { name, reason } => TemplateError::Invalid { name, reason },
                other => other,
            })?;
        }
        Ok(templates)
    }

    /// Templates taken from the policy's messages
    pub fn from_policy(policy: &Policy) -> Result<Self, TemplateError> {
        Self::new(policy.stale_message.as_str(), policy.close_message.as_str())
    }

    fn render(&self, name: &'static str, ctx: &MessageContext<'_>) -> Result<String, TemplateError> {
        self.env
            .get_template(name)
            .and_then(|template| template.render(ctx))
            .map_err(|e| TemplateError::Render {
                name,
                reason: e.to_string(),
            })
    }

    pub fn render_stale(&self, ctx: &MessageContext<'_>) -> Result<String, TemplateError> {
        self.render(STALE, ctx)
    }

    pub fn render_close(&self, ctx: &MessageContext<'_>) -> Result<String, TemplateError> {
        self.render(CLOSE, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_default_messages_render() {
        let policy = Policy::default();
        let templates = MessageTemplates::from_policy(&policy).unwrap();
        let issue = Issue::new(42, "Flaky test", now() - Duration::days(31));
        let ctx = MessageContext::new(&issue, &policy, now());

        let stale = templates.render_stale(&ctx).unwrap();
        assert!(stale.contains("30 days"));
        assert!(stale.contains("closed in 5 days"));
        assert!(stale.contains("`stale`"));

        let close = templates.render_close(&ctx).unwrap();
        assert!(close.contains("stale for 5 days"));
    }

    #[test]
    fn test_issue_variables() {
        let policy = Policy::default();
        let templates =
            MessageTemplates::new("#{{ number }} {{ title }} ({{ kind }}) idle {{ idle_days }}", "bye").unwrap();
        let issue = Issue::new(7, "Crash", now() - Duration::days(40));
        let ctx = MessageContext::new(&issue, &policy, now());
        assert_eq!(templates.render_stale(&ctx).unwrap(), "#7 Crash (issue) idle 40");
    }

    #[test]
    fn test_plain_text_passes_through() {
        let templates = MessageTemplates::new("Going stale.", "Closing.").unwrap();
        let policy = Policy::default();
        let issue = Issue::new(1, "t", now());
        let ctx = MessageContext::new(&issue, &policy, now());
        assert_eq!(templates.render_close(&ctx).unwrap(), "Closing.");
    }

    #[test]
    fn test_syntax_error_rejected() {
        let err = MessageTemplates::new("{{ number ", "ok").unwrap_err();
        assert!(matches!(err, TemplateError::Invalid { name: "stale", .. }));
    }

    #[test]
    fn test_unknown_variable_rejected() {
        let err = MessageTemplates::new("ok", "{{ asignee }}").unwrap_err();
        assert!(matches!(err, TemplateError::Invalid { name: "close", .. }));
    }

    #[test]
    fn test_close_disabled_renders_minus_one() {
        let policy = Policy {
            days_before_close: None,
            ..Policy::default()
        };
        let templates = MessageTemplates::new("{{ days_before_close }}", "x").unwrap();
        let issue = Issue::new(1, "t", now());
        let ctx = MessageContext::new(&issue, &policy, now());
        assert_eq!(templates.render_stale(&ctx).unwrap(), "-1");
    }
}
