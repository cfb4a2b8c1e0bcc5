// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-memory broker clients for testing and dry runs.
//!
//! - [`MemorySource`] replays a scripted list of messages, then either fails
//!   with "end of stream" or blocks forever.
//! - [`MemorySink`] records what it was asked to publish and can be told to
//!   fail after N deliveries.
//! - [`MemoryAdmin`] keeps a topic catalogue with "already exists" semantics.
//! - [`MemoryConnector`] hands each worker its own source and sink.
//!
//! All handles are cheap to clone and share their recordings, so a test can
//! keep a handle after the original has moved into a worker.

use super::{
    BoxFuture, BrokerConnector, BrokerError, BrokerResult, Delivery, MessageSink, MessageSource,
    TopicAdmin, TopicCreation,
};
use crate::job::{Message, ReplicationJob};
use crate::provision::TopicSpec;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Error returned by a [`MemorySource`] once its script is exhausted.
pub const END_OF_STREAM: &str = "end of stream";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Build messages for `topic` on partition 0 with sequential offsets.
pub fn messages(topic: &str, values: &[&str]) -> Vec<Message> {
    values
        .iter()
        .enumerate()
        .map(|(i, value)| Message {
            topic: topic.to_string(),
            partition: 0,
            offset: i as i64,
            key: None,
            value: value.as_bytes().to_vec(),
            timestamp: None,
        })
        .collect()
}

/// Shared record of acknowledged `(partition, offset)` pairs.
#[derive(Debug, Clone, Default)]
pub struct AckLog(Arc<Mutex<Vec<(i32, i64)>>>);

impl AckLog {
    pub fn offsets(&self) -> Vec<(i32, i64)> {
        lock(&self.0).clone()
    }

    fn push(&self, partition: i32, offset: i64) {
        lock(&self.0).push((partition, offset));
    }
}

/// Scripted consumer.
pub struct MemorySource {
    pending: VecDeque<Message>,
    block_when_empty: bool,
    acks: AckLog,
}

impl MemorySource {
    /// Replay `messages`, then fail every further read with [`END_OF_STREAM`].
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            pending: messages.into(),
            block_when_empty: false,
            acks: AckLog::default(),
        }
    }

    /// Wait forever instead of failing once the script is exhausted.
    pub fn blocking_when_empty(mut self) -> Self {
        self.block_when_empty = true;
        self
    }

    /// Handle on the offsets this source has acknowledged.
    pub fn acks(&self) -> AckLog {
        self.acks.clone()
    }
}

impl MessageSource for MemorySource {
    fn recv(&mut self) -> BoxFuture<'_, Message> {
        Box::pin(async move {
            match self.pending.pop_front() {
                Some(message) => Ok(message),
                None if self.block_when_empty => std::future::pending().await,
                None => Err(BrokerError::new(END_OF_STREAM)),
            }
        })
    }

    fn ack(&mut self, message: &Message) -> BrokerResult<()> {
        self.acks.push(message.partition, message.offset);
        Ok(())
    }
}

#[derive(Debug)]
struct SinkState {
    sent: Mutex<Vec<Message>>,
    attempts: AtomicUsize,
    fail_after: AtomicUsize,
    next_offsets: Mutex<HashMap<(String, i32), i64>>,
}

/// Recording producer.
#[derive(Debug, Clone)]
pub struct MemorySink {
    state: Arc<SinkState>,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            state: Arc::new(SinkState {
                sent: Mutex::new(Vec::new()),
                attempts: AtomicUsize::new(0),
                fail_after: AtomicUsize::new(usize::MAX),
                next_offsets: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Fail every delivery after the first `n` succeed.
    pub fn fail_after(&self, n: usize) {
        self.state.fail_after.store(n, Ordering::SeqCst);
    }

    /// Messages that were published successfully, in publish order.
    pub fn sent(&self) -> Vec<Message> {
        lock(&self.state.sent).clone()
    }

    /// Values that were published successfully, in publish order.
    pub fn values(&self) -> Vec<Vec<u8>> {
        lock(&self.state.sent).iter().map(|m| m.value.clone()).collect()
    }

    /// Number of publish attempts, including failed ones.
    pub fn attempts(&self) -> usize {
        self.state.attempts.load(Ordering::SeqCst)
    }
}

impl MessageSink for MemorySink {
    fn send<'a>(&'a self, message: &'a Message) -> BoxFuture<'a, Delivery> {
        Box::pin(async move {
            let attempt = self.state.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt >= self.state.fail_after.load(Ordering::SeqCst) {
                return Err(BrokerError::new("simulated delivery failure"));
            }

            let offset = {
                let mut offsets = lock(&self.state.next_offsets);
                let next = offsets
                    .entry((message.topic.clone(), message.partition))
                    .or_insert(0);
                let offset = *next;
                *next += 1;
                offset
            };
            lock(&self.state.sent).push(message.clone());

            Ok(Delivery {
                partition: message.partition,
                offset,
            })
        })
    }
}

/// Topic catalogue with idempotent creation.
#[derive(Debug, Default)]
pub struct MemoryAdmin {
    topics: Mutex<BTreeMap<String, TopicSpec>>,
    requests: Mutex<Vec<Vec<TopicSpec>>>,
    request_failure: Mutex<Option<String>>,
    rejected: Mutex<HashMap<String, String>>,
}

impl MemoryAdmin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `names` already present (1 partition, RF 1).
    pub fn with_existing(names: &[&str]) -> Self {
        let admin = Self::new();
        {
            let mut topics = lock(&admin.topics);
            for name in names {
                topics.insert(name.to_string(), TopicSpec::new(*name, 1, 1));
            }
        }
        admin
    }

    /// Fail whole requests with `message` (e.g. broker unreachable).
    pub fn fail_requests(&self, message: &str) {
        *lock(&self.request_failure) = Some(message.to_string());
    }

    /// Reject creation of `name` with `reason` (e.g. authorization failure).
    pub fn reject_topic(&self, name: &str, reason: &str) {
        lock(&self.rejected).insert(name.to_string(), reason.to_string());
    }

    pub fn topic(&self, name: &str) -> Option<TopicSpec> {
        lock(&self.topics).get(name).cloned()
    }

    /// Requests received so far, one entry per `create_topics` call.
    pub fn requests(&self) -> Vec<Vec<TopicSpec>> {
        lock(&self.requests).clone()
    }
}

impl TopicAdmin for MemoryAdmin {
    fn create_topics<'a>(
        &'a self,
        specs: &'a [TopicSpec],
    ) -> BoxFuture<'a, Vec<(String, TopicCreation)>> {
        Box::pin(async move {
            lock(&self.requests).push(specs.to_vec());

            if let Some(message) = lock(&self.request_failure).clone() {
                return Err(BrokerError::new(message));
            }

            let rejected = lock(&self.rejected);
            let mut topics = lock(&self.topics);
            let outcomes = specs
                .iter()
                .map(|spec| {
                    let outcome = if let Some(reason) = rejected.get(&spec.name) {
                        TopicCreation::Failed(reason.clone())
                    } else if topics.contains_key(&spec.name) {
                        TopicCreation::AlreadyExists
                    } else {
                        topics.insert(spec.name.clone(), spec.clone());
                        TopicCreation::Created
                    };
                    (spec.name.clone(), outcome)
                })
                .collect();
            Ok(outcomes)
        })
    }
}

/// Connector serving scripted sources and recording sinks.
#[derive(Debug, Default)]
pub struct MemoryConnector {
    scripts: Mutex<HashMap<String, Vec<Message>>>,
    block_when_empty: bool,
    sink_fail_after: Mutex<HashMap<String, usize>>,
    sinks: Mutex<HashMap<String, MemorySink>>,
    acks: Mutex<HashMap<String, AckLog>>,
    sources_connected: AtomicUsize,
    sinks_connected: AtomicUsize,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sources block once their script is exhausted instead of failing.
    pub fn blocking_when_empty(mut self) -> Self {
        self.block_when_empty = true;
        self
    }

    /// Script the messages the source for `topic` will replay.
    pub fn script(self, topic: &str, values: &[&str]) -> Self {
        lock(&self.scripts).insert(topic.to_string(), messages(topic, values));
        self
    }

    /// Make the sink connected for `topic` fail after `n` deliveries.
    pub fn fail_sink_after(self, topic: &str, n: usize) -> Self {
        lock(&self.sink_fail_after).insert(topic.to_string(), n);
        self
    }

    /// Sink handed to the worker for `topic`, once connected.
    pub fn sink(&self, topic: &str) -> Option<MemorySink> {
        lock(&self.sinks).get(topic).cloned()
    }

    /// Offsets acknowledged by the source for `topic`, once connected.
    pub fn acks(&self, topic: &str) -> Vec<(i32, i64)> {
        lock(&self.acks)
            .get(topic)
            .map(AckLog::offsets)
            .unwrap_or_default()
    }

    pub fn sources_connected(&self) -> usize {
        self.sources_connected.load(Ordering::SeqCst)
    }

    pub fn sinks_connected(&self) -> usize {
        self.sinks_connected.load(Ordering::SeqCst)
    }
}

impl BrokerConnector for MemoryConnector {
    type Source = MemorySource;
    type Sink = MemorySink;

    fn connect_source<'a>(&'a self, job: &'a ReplicationJob) -> BoxFuture<'a, MemorySource> {
        Box::pin(async move {
            let topic = job.source_topic();
            let script = lock(&self.scripts).remove(topic).unwrap_or_default();
            let mut source = MemorySource::new(script);
            if self.block_when_empty {
                source = source.blocking_when_empty();
            }
            lock(&self.acks).insert(topic.to_string(), source.acks());
            self.sources_connected.fetch_add(1, Ordering::SeqCst);
            Ok(source)
        })
    }

    fn connect_sink<'a>(&'a self, job: &'a ReplicationJob) -> BoxFuture<'a, MemorySink> {
        Box::pin(async move {
            let topic = job.destination_topic();
            let sink = MemorySink::new();
            if let Some(n) = lock(&self.sink_fail_after).get(topic) {
                sink.fail_after(*n);
            }
            lock(&self.sinks).insert(topic.to_string(), sink.clone());
            self.sinks_connected.fetch_add(1, Ordering::SeqCst);
            Ok(sink)
        })
    }
}
