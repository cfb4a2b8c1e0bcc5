//! Configuration for the topic replicator.
//!
//! Everything is read from the process environment at startup. Required
//! variables fail fast with [`ReplicationError::MissingEnv`] before any broker
//! connection is attempted; optional ones fall back to defaults.
//!
//! # Environment
//!
//! | Variable | Required | Default |
//! |----------|----------|---------|
//! | `SOURCE_KAFKA_URL` | yes | |
//! | `SOURCE_TOPICS` | yes (whitespace-separated) | |
//! | `GROUP_ID` | yes | |
//! | `DESTINATION_KAFKA_URL` | yes | |
//! | `LOG_LEVEL` | no | `info` |
//! | `KAFKA_AUTO_OFFSET_RESET` | no | `earliest` |
//! | `KAFKA_OPERATION_TIMEOUT` | no | `30s` |
//!
//! # Quick Start
//!
//! ```rust
//! use topic_replicator::config::ReplicationConfig;
//!
//! let config = ReplicationConfig::for_testing(&["orders", "payments"]);
//! assert_eq!(config.jobs().len(), 2);
//! ```
//!
//! # Configuration Structure
//!
//! ```text
//! ReplicationConfig
//! ├── source_kafka_url: String
//! ├── source_topics: Vec<String>     # deduplicated, first-seen order
//! ├── group_id: String               # shared by every worker
//! ├── destination_kafka_url: String
//! ├── log_level: String
//! └── kafka: KafkaClientConfig       # librdkafka tuning
//! ```

use crate::error::{ReplicationError, Result};
use crate::job::ReplicationJob;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

pub const SOURCE_KAFKA_URL: &str = "SOURCE_KAFKA_URL";
pub const SOURCE_TOPICS: &str = "SOURCE_TOPICS";
pub const GROUP_ID: &str = "GROUP_ID";
pub const DESTINATION_KAFKA_URL: &str = "DESTINATION_KAFKA_URL";
pub const LOG_LEVEL: &str = "LOG_LEVEL";
pub const KAFKA_AUTO_OFFSET_RESET: &str = "KAFKA_AUTO_OFFSET_RESET";
pub const KAFKA_OPERATION_TIMEOUT: &str = "KAFKA_OPERATION_TIMEOUT";

// ═══════════════════════════════════════════════════════════════════════════════
// Environment resolution
// ═══════════════════════════════════════════════════════════════════════════════

/// Read a required variable from the process environment.
pub fn resolve(name: &str) -> Result<String> {
    resolve_with(|key| std::env::var(key).ok(), name)
}

/// Read a required variable through `lookup`.
///
/// Unset, empty and whitespace-only values are all treated as missing. The
/// returned value is trimmed.
pub fn resolve_with<F>(lookup: F, name: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup_optional(&lookup, name).ok_or_else(|| ReplicationError::MissingEnv {
        name: name.to_string(),
    })
}

fn lookup_optional<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Split a whitespace-separated topic list, dropping repeats.
pub fn parse_topics(raw: &str) -> Vec<String> {
    let mut topics: Vec<String> = Vec::new();
    for topic in raw.split_whitespace() {
        if !topics.iter().any(|seen| seen == topic) {
            topics.push(topic.to_string());
        }
    }
    topics
}

// ═══════════════════════════════════════════════════════════════════════════════
// Top-level config
// ═══════════════════════════════════════════════════════════════════════════════

/// Process configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationConfig {
    pub source_kafka_url: String,

    /// Topics to replicate. Each one gets its own worker.
    pub source_topics: Vec<String>,

    /// Consumer group shared by all workers.
    pub group_id: String,

    pub destination_kafka_url: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub kafka: KafkaClientConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ReplicationConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through `lookup`.
    ///
    /// Required variables are resolved in a fixed order, so the first missing
    /// one is the one reported.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let source_kafka_url = resolve_with(&lookup, SOURCE_KAFKA_URL)?;
        let source_topics = parse_topics(&resolve_with(&lookup, SOURCE_TOPICS)?);
        let group_id = resolve_with(&lookup, GROUP_ID)?;
        let destination_kafka_url = resolve_with(&lookup, DESTINATION_KAFKA_URL)?;

        let log_level = lookup_optional(&lookup, LOG_LEVEL).unwrap_or_else(default_log_level);

        let mut kafka = KafkaClientConfig::default();
        if let Some(reset) = lookup_optional(&lookup, KAFKA_AUTO_OFFSET_RESET) {
            kafka.auto_offset_reset = reset.parse()?;
        }
        if let Some(timeout) = lookup_optional(&lookup, KAFKA_OPERATION_TIMEOUT) {
            kafka.operation_timeout = timeout;
        }

        Ok(Self {
            source_kafka_url,
            source_topics,
            group_id,
            destination_kafka_url,
            log_level,
            kafka,
        })
    }

    /// Create a config against placeholder brokers, for testing.
    pub fn for_testing(topics: &[&str]) -> Self {
        Self {
            source_kafka_url: "source:9092".to_string(),
            source_topics: topics.iter().map(|t| t.to_string()).collect(),
            group_id: "test-group".to_string(),
            destination_kafka_url: "destination:9092".to_string(),
            log_level: default_log_level(),
            kafka: KafkaClientConfig::default(),
        }
    }

    /// One job per source topic, in configuration order.
    pub fn jobs(&self) -> Vec<ReplicationJob> {
        self.source_topics
            .iter()
            .map(|topic| {
                ReplicationJob::new(
                    &self.source_kafka_url,
                    topic,
                    &self.group_id,
                    &self.destination_kafka_url,
                )
            })
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// KafkaClientConfig: librdkafka tuning shared by every worker
// ═══════════════════════════════════════════════════════════════════════════════

/// Where a consumer group with no committed offset starts reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OffsetReset {
    #[default]
    Earliest,
    Latest,
}

impl OffsetReset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Earliest => "earliest",
            Self::Latest => "latest",
        }
    }
}

impl FromStr for OffsetReset {
    type Err = ReplicationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "earliest" => Ok(Self::Earliest),
            "latest" => Ok(Self::Latest),
            other => Err(ReplicationError::Config(format!(
                "{KAFKA_AUTO_OFFSET_RESET} must be 'earliest' or 'latest', got '{other}'"
            ))),
        }
    }
}

/// Client settings applied to every consumer, producer and admin client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KafkaClientConfig {
    /// Minimum bytes the broker accumulates before answering a fetch.
    #[serde(default = "default_fetch_min_bytes")]
    pub fetch_min_bytes: u32,

    /// Upper bound on a single fetch response.
    #[serde(default = "default_fetch_max_bytes")]
    pub fetch_max_bytes: u32,

    #[serde(default)]
    pub auto_offset_reset: OffsetReset,

    /// How often stored offsets are committed in the background.
    #[serde(default = "default_auto_commit_interval")]
    pub auto_commit_interval: String,

    #[serde(default = "default_session_timeout")]
    pub session_timeout: String,

    /// How long the producer keeps retrying one message before failing it.
    #[serde(default = "default_message_timeout")]
    pub message_timeout: String,

    /// Timeout for admin requests and metadata probes.
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout: String,
}

fn default_fetch_min_bytes() -> u32 {
    10_000 // 10KB
}

fn default_fetch_max_bytes() -> u32 {
    10_000_000 // 10MB
}

fn default_auto_commit_interval() -> String {
    "5s".to_string()
}

fn default_session_timeout() -> String {
    "10s".to_string()
}

fn default_message_timeout() -> String {
    "30s".to_string()
}

fn default_operation_timeout() -> String {
    "30s".to_string()
}

impl Default for KafkaClientConfig {
    fn default() -> Self {
        Self {
            fetch_min_bytes: default_fetch_min_bytes(),
            fetch_max_bytes: default_fetch_max_bytes(),
            auto_offset_reset: OffsetReset::default(),
            auto_commit_interval: default_auto_commit_interval(),
            session_timeout: default_session_timeout(),
            message_timeout: default_message_timeout(),
            operation_timeout: default_operation_timeout(),
        }
    }
}

impl KafkaClientConfig {
    pub fn auto_commit_interval_duration(&self) -> Duration {
        humantime::parse_duration(&self.auto_commit_interval).unwrap_or(Duration::from_secs(5))
    }

    pub fn session_timeout_duration(&self) -> Duration {
        humantime::parse_duration(&self.session_timeout).unwrap_or(Duration::from_secs(10))
    }

    pub fn message_timeout_duration(&self) -> Duration {
        humantime::parse_duration(&self.message_timeout).unwrap_or(Duration::from_secs(30))
    }

    pub fn operation_timeout_duration(&self) -> Duration {
        humantime::parse_duration(&self.operation_timeout).unwrap_or(Duration::from_secs(30))
    }
}
