// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for the topic replicator.
//!
//! Errors are categorized by the stage of the pipeline that produced them
//! and carry the topic/partition/offset context that was known at the time,
//! so the log line emitted before the process exits is enough to locate the
//! failing message.
//!
//! # Error Categories
//!
//! | Error Type | Fatal | Description |
//! |------------|-------|-------------|
//! | `MissingEnv` | Yes | Required environment variable unset or empty |
//! | `Config` | Yes | Configuration present but unusable |
//! | `Provisioning` | No | Destination topic creation failed (logged, replication proceeds) |
//! | `Connect` | Yes | Broker client could not be created or reached |
//! | `Read` | Yes | Consumer failed to deliver the next message |
//! | `Write` | Yes | Producer failed to publish a message |
//! | `Commit` | Yes | Consumed offset could not be stored after forwarding |
//! | `Cancelled` | Yes | Shutdown signalled while waiting for a message |
//! | `InvalidState` | Yes | Supervisor used out of order (e.g. started twice) |
//! | `Internal` | Yes | Worker task panicked or could not be joined |
//!
//! # Escalation
//!
//! There is no local recovery: every fatal error that reaches a worker's
//! loop ends that worker, the supervisor stops the others, and the binary
//! exits non-zero. Use [`ReplicationError::is_fatal()`] to tell the one
//! tolerated category apart.

use thiserror::Error;

/// Result type alias for replication operations.
pub type Result<T> = std::result::Result<T, ReplicationError>;

/// Errors that can occur while replicating topics.
#[derive(Error, Debug)]
pub enum ReplicationError {
    /// A required environment variable is unset or empty.
    #[error("Configuration error: the environment variable {name} must be set")]
    MissingEnv { name: String },

    /// Configuration is present but cannot be used.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Destination topic provisioning failed for a reason other than
    /// "topic already exists".
    ///
    /// Not fatal: the first write to a missing topic will surface the
    /// problem instead.
    #[error("Provisioning error ({topics}): {message}", topics = .topics.join(", "))]
    Provisioning { topics: Vec<String>, message: String },

    /// Could not build or reach a broker client.
    #[error("Connect error ({role} {broker}, topic {topic}): {message}")]
    Connect {
        role: &'static str,
        broker: String,
        topic: String,
        message: String,
    },

    /// The consumer failed to deliver the next message.
    ///
    /// `partition`/`offset` are the last position successfully read, if any.
    #[error("Read error (topic {topic}, {position}): {message}", position = fmt_position(.partition, .offset))]
    Read {
        topic: String,
        partition: Option<i32>,
        offset: Option<i64>,
        message: String,
    },

    /// The producer failed to publish a message.
    #[error("Write error (topic {topic}, {position}): {message}", position = fmt_at(.partition, .offset))]
    Write {
        topic: String,
        partition: i32,
        offset: i64,
        message: String,
    },

    /// The consumed offset could not be stored after a successful forward.
    #[error("Commit error (topic {topic}, {position}): {message}", position = fmt_at(.partition, .offset))]
    Commit {
        topic: String,
        partition: i32,
        offset: i64,
        message: String,
    },

    /// Shutdown was signalled while the worker was waiting for a message.
    #[error("Read cancelled (topic {topic})")]
    Cancelled { topic: String },

    /// Operation not valid in the current state.
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// Unexpected internal error (worker panic, join failure).
    #[error("Internal error: {0}")]
    Internal(String),
}

fn fmt_position(partition: &Option<i32>, offset: &Option<i64>) -> String {
    match (*partition, *offset) {
        (Some(p), Some(o)) => format!("partition {p}, offset {o}"),
        (Some(p), None) => format!("partition {p}"),
        _ => "no position yet".to_string(),
    }
}

fn fmt_at(partition: &i32, offset: &i64) -> String {
    fmt_position(&Some(*partition), &Some(*offset))
}

impl ReplicationError {
    /// Whether this error must terminate the process.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::MissingEnv { .. } => true,
            Self::Config(_) => true,
            Self::Provisioning { .. } => false, // logged, replication proceeds
            Self::Connect { .. } => true,
            Self::Read { .. } => true,
            Self::Write { .. } => true,
            Self::Commit { .. } => true,
            Self::Cancelled { .. } => true,
            Self::InvalidState { .. } => true,
            Self::Internal(_) => true,
        }
    }

    /// Stable label for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingEnv { .. } | Self::Config(_) => "config",
            Self::Provisioning { .. } => "provisioning",
            Self::Connect { .. } => "connect",
            Self::Read { .. } => "read",
            Self::Write { .. } => "write",
            Self::Commit { .. } => "commit",
            Self::Cancelled { .. } => "cancelled",
            Self::InvalidState { .. } | Self::Internal(_) => "internal",
        }
    }

    /// Topic the error is attributed to, if any.
    pub fn topic(&self) -> Option<&str> {
        match self {
            Self::Connect { topic, .. }
            | Self::Read { topic, .. }
            | Self::Write { topic, .. }
            | Self::Commit { topic, .. }
            | Self::Cancelled { topic } => Some(topic),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_env_is_fatal() {
        let err = ReplicationError::MissingEnv {
            name: "GROUP_ID".to_string(),
        };
        assert!(err.is_fatal());
        assert_eq!(err.kind(), "config");
        assert!(err.to_string().contains("GROUP_ID"));
    }

    #[test]
    fn test_provisioning_not_fatal() {
        let err = ReplicationError::Provisioning {
            topics: vec!["orders".to_string(), "payments".to_string()],
            message: "authorization failed".to_string(),
        };
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "Provisioning error (orders, payments): authorization failed");
    }

    #[test]
    fn test_read_error_formatting() {
        let err = ReplicationError::Read {
            topic: "orders".to_string(),
            partition: Some(1),
            offset: Some(42),
            message: "broker transport failure".to_string(),
        };
        assert!(err.is_fatal());
        let msg = err.to_string();
        assert!(msg.contains("orders"));
        assert!(msg.contains("partition 1, offset 42"));
        assert!(msg.contains("broker transport failure"));
    }

    #[test]
    fn test_read_error_before_first_message() {
        let err = ReplicationError::Read {
            topic: "orders".to_string(),
            partition: None,
            offset: None,
            message: "end of stream".to_string(),
        };
        assert!(err.to_string().contains("no position yet"));
    }

    #[test]
    fn test_write_error_formatting() {
        let err = ReplicationError::Write {
            topic: "payments".to_string(),
            partition: 0,
            offset: 7,
            message: "message timed out".to_string(),
        };
        assert!(err.is_fatal());
        assert_eq!(err.kind(), "write");
        assert_eq!(err.topic(), Some("payments"));
        assert!(err.to_string().contains("partition 0, offset 7"));
    }

    #[test]
    fn test_cancelled_is_fatal() {
        let err = ReplicationError::Cancelled {
            topic: "orders".to_string(),
        };
        assert!(err.is_fatal());
        assert_eq!(err.kind(), "cancelled");
    }

    #[test]
    fn test_invalid_state_formatting() {
        let err = ReplicationError::InvalidState {
            expected: "Created".to_string(),
            actual: "Running".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid state: expected Created, got Running");
        assert_eq!(err.kind(), "internal");
    }

    #[test]
    fn test_internal_has_no_topic() {
        let err = ReplicationError::Internal("worker panicked".to_string());
        assert!(err.is_fatal());
        assert_eq!(err.topic(), None);
    }
}
