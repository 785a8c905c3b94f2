//! Factory configuration, deserialized from `config.toml`.
//!
//! Every field carries a serde default so a partial (or absent) file still
//! yields a runnable configuration.

use serde::{Deserialize, Serialize};

use crate::bot::BotKind;
use crate::review::ApprovalPolicy;

/// Top-level configuration for a factory process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactoryConfig {
    /// Retained-history cap per event kind.
    #[serde(default = "default_event_history_cap")]
    pub event_history_cap: usize,

    /// Bounded queue depth for each bus subscriber.
    #[serde(default = "default_subscriber_queue_capacity")]
    pub subscriber_queue_capacity: usize,

    /// SQLite database URL; `None` selects the default data-dir location.
    #[serde(default)]
    pub database_url: Option<String>,

    /// One entry per bot instance the orchestrator should run.
    #[serde(default)]
    pub bots: Vec<BotEntry>,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            event_history_cap: default_event_history_cap(),
            subscriber_queue_capacity: default_subscriber_queue_capacity(),
            database_url: None,
            bots: Vec::new(),
        }
    }
}

/// Configuration for a single bot instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotEntry {
    /// Stable identifier; the orchestrator enforces one active instance
    /// per id.
    pub bot_id: String,
    pub kind: BotKind,

    /// Seconds between execute ticks. The 5-minute PR-detection target is
    /// an SLA, not a deadline; the default sits well inside it.
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,

    /// Non-fatal error count that forces the bot into Error.
    #[serde(default = "default_error_threshold")]
    pub error_threshold: u32,

    /// Minimum analyzer confidence for auto-approval of low/no-risk PRs.
    #[serde(default = "default_auto_approve_confidence_threshold")]
    pub auto_approve_confidence_threshold: f64,

    /// Human reviewer queue for flagged and moderate-risk reviews.
    #[serde(default)]
    pub reviewers: Vec<String>,

    #[serde(default)]
    pub approval_policy: ApprovalPolicy,
}

fn default_event_history_cap() -> usize {
    4096
}

fn default_subscriber_queue_capacity() -> usize {
    256
}

fn default_poll_interval_seconds() -> u64 {
    60
}

fn default_error_threshold() -> u32 {
    5
}

fn default_auto_approve_confidence_threshold() -> f64 {
    0.85
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FactoryConfig::default();
        assert_eq!(config.event_history_cap, 4096);
        assert_eq!(config.subscriber_queue_capacity, 256);
        assert!(config.database_url.is_none());
        assert!(config.bots.is_empty());
    }

    #[test]
    fn test_minimal_bot_entry_gets_defaults() {
        let toml = r#"
            [[bots]]
            bot_id = "pr-review-1"
            kind = "pr-review"
        "#;
        let config: FactoryConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.bots.len(), 1);
        let bot = &config.bots[0];
        assert_eq!(bot.poll_interval_seconds, 60);
        assert_eq!(bot.error_threshold, 5);
        assert!((bot.auto_approve_confidence_threshold - 0.85).abs() < f64::EPSILON);
        assert_eq!(bot.approval_policy, ApprovalPolicy::Unanimous);
        assert!(bot.reviewers.is_empty());
    }

    #[test]
    fn test_full_bot_entry_parses() {
        let toml = r#"
            event_history_cap = 128

            [[bots]]
            bot_id = "pr-review-1"
            kind = "pr-review"
            poll_interval_seconds = 30
            error_threshold = 3
            auto_approve_confidence_threshold = 0.9
            reviewers = ["rivera", "chen"]
            approval_policy = "single-critical"
        "#;
        let config: FactoryConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.event_history_cap, 128);
        let bot = &config.bots[0];
        assert_eq!(bot.kind, BotKind::PrReview);
        assert_eq!(bot.poll_interval_seconds, 30);
        assert_eq!(bot.reviewers, vec!["rivera", "chen"]);
        assert_eq!(bot.approval_policy, ApprovalPolicy::SingleCritical);
    }

    #[test]
    fn test_unknown_kind_fails_to_parse() {
        let toml = r#"
            [[bots]]
            bot_id = "x"
            kind = "juggler"
        "#;
        assert!(toml::from_str::<FactoryConfig>(toml).is_err());
    }
}
