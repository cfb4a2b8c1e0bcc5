// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Broker client integration traits.
//!
//! Defines what the replication core needs from a message broker:
//!
//! - [`MessageSource`]: an ordered consumer bound to one topic and group
//! - [`MessageSink`]: a producer publishing to the destination cluster
//! - [`TopicAdmin`]: idempotent topic creation
//! - [`BrokerConnector`]: builds a source/sink pair for a job
//!
//! The Kafka implementations live in [`crate::kafka`]; in-memory ones for
//! tests and dry runs live in [`memory`].
//!
//! # Example
//!
//! ```rust,no_run
//! use topic_replicator::broker::{BoxFuture, BrokerResult, Delivery, MessageSink};
//! use topic_replicator::job::Message;
//!
//! struct StdoutSink;
//!
//! impl MessageSink for StdoutSink {
//!     fn send<'a>(&'a self, message: &'a Message) -> BoxFuture<'a, Delivery> {
//!         Box::pin(async move {
//!             println!("{}: {}", message.topic, message.value_lossy());
//!             Ok(Delivery { partition: 0, offset: 0 })
//!         })
//!     }
//! }
//! ```

pub mod memory;

use crate::job::{Message, ReplicationJob};
use crate::provision::TopicSpec;
use std::future::Future;
use std::pin::Pin;

/// Result type for broker client operations.
pub type BrokerResult<T> = std::result::Result<T, BrokerError>;

/// Type alias for boxed async futures (reduces trait signature complexity).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = BrokerResult<T>> + Send + 'a>>;

/// Simplified error for broker client operations.
///
/// The replication core only logs the cause, so the client's error is
/// flattened to its message here and given topic/offset context by the
/// caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerError(pub String);

impl BrokerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl std::fmt::Display for BrokerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BrokerError {}

/// Where the destination broker placed a forwarded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub partition: i32,
    pub offset: i64,
}

/// Ordered consumer bound to one topic and consumer group.
pub trait MessageSource: Send + 'static {
    /// Wait for the next message.
    ///
    /// Messages are returned in the order the consumer delivers them; the
    /// caller never has more than one `recv` outstanding.
    fn recv(&mut self) -> BoxFuture<'_, Message>;

    /// Mark `message` as processed so its offset becomes eligible for commit.
    ///
    /// Called only after the message was forwarded successfully.
    fn ack(&mut self, message: &Message) -> BrokerResult<()>;
}

/// Producer publishing to the destination cluster.
pub trait MessageSink: Send + Sync + 'static {
    /// Publish `message` to `message.topic` and wait for the acknowledgement.
    fn send<'a>(&'a self, message: &'a Message) -> BoxFuture<'a, Delivery>;
}

/// Outcome of creating one topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicCreation {
    Created,
    AlreadyExists,
    Failed(String),
}

/// Administrative operations on the destination cluster.
pub trait TopicAdmin: Send + Sync {
    /// Create every topic in `specs` in a single request.
    ///
    /// Returns one outcome per spec, in request order. A topic that already
    /// exists must be reported as [`TopicCreation::AlreadyExists`], never as
    /// a failure. An `Err` means the request as a whole failed.
    fn create_topics<'a>(
        &'a self,
        specs: &'a [TopicSpec],
    ) -> BoxFuture<'a, Vec<(String, TopicCreation)>>;
}

/// Builds the consumer/producer pair a worker owns.
///
/// Each call returns a fresh client: workers never share a source or sink.
pub trait BrokerConnector: Send + Sync + 'static {
    type Source: MessageSource;
    type Sink: MessageSink;

    /// Connect a consumer for `job.source_topic()` in `job.consumer_group_id()`.
    fn connect_source<'a>(&'a self, job: &'a ReplicationJob) -> BoxFuture<'a, Self::Source>;

    /// Connect a producer to `job.destination_broker_address()`.
    fn connect_sink<'a>(&'a self, job: &'a ReplicationJob) -> BoxFuture<'a, Self::Sink>;
}
