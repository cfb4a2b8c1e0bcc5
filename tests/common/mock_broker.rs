//! Mock broker connector for supervisor tests.
//!
//! Wraps [`MemoryConnector`] and adds failure injection at connect time:
//! refused connections per topic and role, and panics inside a worker.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use topic_replicator::broker::memory::{MemoryConnector, MemorySink, MemorySource};
use topic_replicator::broker::{BoxFuture, BrokerConnector, BrokerError};
use topic_replicator::ReplicationJob;

/// Which client a connect failure applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Source,
    Destination,
}

/// Connector that can refuse or panic for chosen topics.
///
/// # Example
/// ```rust,ignore
/// let mock = MockConnector::new(MemoryConnector::new().script("orders", &["m1"]));
/// mock.refuse("payments", Role::Destination, "connection refused");
/// ```
pub struct MockConnector {
    inner: MemoryConnector,
    refusals: Mutex<HashMap<(String, Role), String>>,
    panics: Mutex<Vec<String>>,
    connect_attempts: AtomicUsize,
}

impl MockConnector {
    pub fn new(inner: MemoryConnector) -> Self {
        Self {
            inner,
            refusals: Mutex::new(HashMap::new()),
            panics: Mutex::new(Vec::new()),
            connect_attempts: AtomicUsize::new(0),
        }
    }

    /// Fail connecting `role` for `topic` with `message`.
    pub fn refuse(&self, topic: &str, role: Role, message: &str) {
        self.refusals
            .lock()
            .unwrap()
            .insert((topic.to_string(), role), message.to_string());
    }

    /// Panic while connecting the source for `topic`.
    pub fn panic_on(&self, topic: &str) {
        self.panics.lock().unwrap().push(topic.to_string());
    }

    pub fn inner(&self) -> &MemoryConnector {
        &self.inner
    }

    /// Source and sink connect attempts, including refused ones.
    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    fn refusal(&self, topic: &str, role: Role) -> Option<String> {
        self.refusals
            .lock()
            .unwrap()
            .get(&(topic.to_string(), role))
            .cloned()
    }
}

impl BrokerConnector for MockConnector {
    type Source = MemorySource;
    type Sink = MemorySink;

    fn connect_source<'a>(&'a self, job: &'a ReplicationJob) -> BoxFuture<'a, MemorySource> {
        Box::pin(async move {
            self.connect_attempts.fetch_add(1, Ordering::SeqCst);
            let should_panic = self
                .panics
                .lock()
                .unwrap()
                .iter()
                .any(|t| t == job.source_topic());
            if should_panic {
                panic!("injected panic for {}", job.source_topic());
            }
            if let Some(message) = self.refusal(job.source_topic(), Role::Source) {
                return Err(BrokerError::new(message));
            }
            self.inner.connect_source(job).await
        })
    }

    fn connect_sink<'a>(&'a self, job: &'a ReplicationJob) -> BoxFuture<'a, MemorySink> {
        Box::pin(async move {
            self.connect_attempts.fetch_add(1, Ordering::SeqCst);
            if let Some(message) = self.refusal(job.destination_topic(), Role::Destination) {
                return Err(BrokerError::new(message));
            }
            self.inner.connect_sink(job).await
        })
    }
}
