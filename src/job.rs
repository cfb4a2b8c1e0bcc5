// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Replication jobs and the messages they carry.
//!
//! A [`ReplicationJob`] binds one source topic to the destination cluster.
//! It is built once per worker at startup and never mutated afterwards.
//! Destination topics share the source topic's name; there is no renaming.

use serde::{Deserialize, Serialize};

/// Immutable description of one topic's replication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationJob {
    source_broker_address: String,
    source_topic: String,
    consumer_group_id: String,
    destination_broker_address: String,
}

impl ReplicationJob {
    pub fn new(
        source_broker_address: impl Into<String>,
        source_topic: impl Into<String>,
        consumer_group_id: impl Into<String>,
        destination_broker_address: impl Into<String>,
    ) -> Self {
        Self {
            source_broker_address: source_broker_address.into(),
            source_topic: source_topic.into(),
            consumer_group_id: consumer_group_id.into(),
            destination_broker_address: destination_broker_address.into(),
        }
    }

    /// Create a job against placeholder brokers, for testing.
    pub fn for_testing(topic: &str) -> Self {
        Self::new("source:9092", topic, "test-group", "destination:9092")
    }

    pub fn source_broker_address(&self) -> &str {
        &self.source_broker_address
    }

    pub fn source_topic(&self) -> &str {
        &self.source_topic
    }

    pub fn consumer_group_id(&self) -> &str {
        &self.consumer_group_id
    }

    pub fn destination_broker_address(&self) -> &str {
        &self.destination_broker_address
    }

    /// Topic name written to on the destination cluster.
    pub fn destination_topic(&self) -> &str {
        &self.source_topic
    }
}

/// A message read from a source topic.
///
/// Forwarded unmodified apart from [`Message::topic`], which is rebound to
/// the destination topic by [`Message::for_destination`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub value: Vec<u8>,
    /// Milliseconds since the Unix epoch, if the broker supplied one.
    pub timestamp: Option<i64>,
}

impl Message {
    /// Copy of this message addressed to `topic`.
    pub fn for_destination(&self, topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            ..self.clone()
        }
    }

    /// Value rendered for log output (lossy UTF-8).
    pub fn value_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.value)
    }
}
