// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Kafka implementations of the broker traits, on top of `rdkafka`.
//!
//! - [`KafkaSource`]: a `StreamConsumer` subscribed to one topic. Offsets are
//!   stored explicitly after each successful forward and committed by
//!   librdkafka's background auto-commit.
//! - [`KafkaSink`]: a `FutureProducer` using the `consistent_random`
//!   partitioner.
//! - [`KafkaAdmin`]: topic creation through an `AdminClient`.
//! - [`KafkaConnector`]: builds a source/sink pair per job and probes both
//!   clusters for metadata before handing them out.

use crate::broker::{
    BoxFuture, BrokerConnector, BrokerError, BrokerResult, Delivery, MessageSink, MessageSource,
    TopicAdmin, TopicCreation,
};
use crate::config::KafkaClientConfig;
use crate::job::{Message, ReplicationJob};
use crate::provision::TopicSpec;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message as _;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::types::RDKafkaErrorCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

fn broker_error(e: KafkaError) -> BrokerError {
    BrokerError::new(e.to_string())
}

fn millis(duration: Duration) -> String {
    duration.as_millis().to_string()
}

/// Client config for a consumer in `job`'s group.
pub fn consumer_config(job: &ReplicationJob, config: &KafkaClientConfig) -> ClientConfig {
    let mut client = ClientConfig::new();
    client
        .set("bootstrap.servers", job.source_broker_address())
        .set("group.id", job.consumer_group_id())
        .set("enable.auto.commit", "true")
        .set("enable.auto.offset.store", "false")
        .set(
            "auto.commit.interval.ms",
            millis(config.auto_commit_interval_duration()),
        )
        .set("auto.offset.reset", config.auto_offset_reset.as_str())
        .set("session.timeout.ms", millis(config.session_timeout_duration()))
        .set("fetch.min.bytes", config.fetch_min_bytes.to_string())
        .set("fetch.max.bytes", config.fetch_max_bytes.to_string());
    client
}

/// Client config for a producer publishing to `job`'s destination.
pub fn producer_config(job: &ReplicationJob, config: &KafkaClientConfig) -> ClientConfig {
    let mut client = ClientConfig::new();
    client
        .set("bootstrap.servers", job.destination_broker_address())
        .set("partitioner", "consistent_random")
        .set("message.timeout.ms", millis(config.message_timeout_duration()));
    client
}

// ═══════════════════════════════════════════════════════════════════════════════
// Source
// ═══════════════════════════════════════════════════════════════════════════════

/// Consumer subscribed to a single topic.
pub struct KafkaSource {
    consumer: Arc<StreamConsumer>,
}

impl KafkaSource {
    pub fn connect(job: &ReplicationJob, config: &KafkaClientConfig) -> BrokerResult<Self> {
        let consumer: StreamConsumer = consumer_config(job, config)
            .create()
            .map_err(broker_error)?;
        consumer
            .subscribe(&[job.source_topic()])
            .map_err(broker_error)?;
        Ok(Self {
            consumer: Arc::new(consumer),
        })
    }

    /// Fetch cluster metadata, returning the number of brokers seen.
    pub async fn probe(&self, timeout: Duration) -> BrokerResult<usize> {
        let consumer = Arc::clone(&self.consumer);
        tokio::task::spawn_blocking(move || {
            consumer
                .fetch_metadata(None, timeout)
                .map(|metadata| metadata.brokers().len())
                .map_err(broker_error)
        })
        .await
        .map_err(|e| BrokerError::new(format!("metadata probe join error: {e}")))?
    }
}

impl MessageSource for KafkaSource {
    fn recv(&mut self) -> BoxFuture<'_, Message> {
        Box::pin(async move {
            let borrowed = self.consumer.recv().await.map_err(broker_error)?;
            Ok(Message {
                topic: borrowed.topic().to_string(),
                partition: borrowed.partition(),
                offset: borrowed.offset(),
                key: borrowed.key().map(<[u8]>::to_vec),
                // Tombstones are forwarded as empty values.
                value: borrowed.payload().map(<[u8]>::to_vec).unwrap_or_default(),
                timestamp: borrowed.timestamp().to_millis(),
            })
        })
    }

    fn ack(&mut self, message: &Message) -> BrokerResult<()> {
        // The legacy per-topic store commits `offset + 1`, the next to read.
        self.consumer
            .store_offset(&message.topic, message.partition, message.offset)
            .map_err(broker_error)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Sink
// ═══════════════════════════════════════════════════════════════════════════════

/// Producer publishing to the destination cluster.
#[derive(Clone)]
pub struct KafkaSink {
    producer: FutureProducer,
    queue_timeout: Duration,
}

impl KafkaSink {
    pub fn connect(job: &ReplicationJob, config: &KafkaClientConfig) -> BrokerResult<Self> {
        let producer: FutureProducer = producer_config(job, config)
            .create()
            .map_err(broker_error)?;
        Ok(Self {
            producer,
            queue_timeout: config.operation_timeout_duration(),
        })
    }

    /// Fetch cluster metadata, returning the number of brokers seen.
    pub async fn probe(&self, timeout: Duration) -> BrokerResult<usize> {
        let producer = self.producer.clone();
        tokio::task::spawn_blocking(move || {
            producer
                .client()
                .fetch_metadata(None, timeout)
                .map(|metadata| metadata.brokers().len())
                .map_err(broker_error)
        })
        .await
        .map_err(|e| BrokerError::new(format!("metadata probe join error: {e}")))?
    }
}

impl MessageSink for KafkaSink {
    fn send<'a>(&'a self, message: &'a Message) -> BoxFuture<'a, Delivery> {
        Box::pin(async move {
            let mut record =
                FutureRecord::<[u8], [u8]>::to(&message.topic).payload(message.value.as_slice());
            if let Some(key) = message.key.as_deref() {
                record = record.key(key);
            }
            if let Some(timestamp) = message.timestamp {
                record = record.timestamp(timestamp);
            }

            let (partition, offset) = self
                .producer
                .send(record, self.queue_timeout)
                .await
                .map_err(|(e, _)| broker_error(e))?;
            Ok(Delivery { partition, offset })
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Admin
// ═══════════════════════════════════════════════════════════════════════════════

/// Topic administration against one cluster.
pub struct KafkaAdmin {
    admin: AdminClient<DefaultClientContext>,
    operation_timeout: Duration,
}

impl KafkaAdmin {
    pub fn connect(broker_address: &str, config: &KafkaClientConfig) -> BrokerResult<Self> {
        let admin = ClientConfig::new()
            .set("bootstrap.servers", broker_address)
            .create()
            .map_err(broker_error)?;
        Ok(Self {
            admin,
            operation_timeout: config.operation_timeout_duration(),
        })
    }
}

impl TopicAdmin for KafkaAdmin {
    fn create_topics<'a>(
        &'a self,
        specs: &'a [TopicSpec],
    ) -> BoxFuture<'a, Vec<(String, TopicCreation)>> {
        Box::pin(async move {
            let topics: Vec<NewTopic<'_>> = specs
                .iter()
                .map(|spec| {
                    NewTopic::new(
                        &spec.name,
                        spec.partition_count,
                        TopicReplication::Fixed(spec.replication_factor),
                    )
                })
                .collect();
            let options = AdminOptions::new().operation_timeout(Some(self.operation_timeout));

            let results = self
                .admin
                .create_topics(&topics, &options)
                .await
                .map_err(broker_error)?;

            Ok(results
                .into_iter()
                .map(|result| match result {
                    Ok(name) => (name, TopicCreation::Created),
                    Err((name, RDKafkaErrorCode::TopicAlreadyExists)) => {
                        (name, TopicCreation::AlreadyExists)
                    }
                    Err((name, code)) => (name, TopicCreation::Failed(code.to_string())),
                })
                .collect())
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Connector
// ═══════════════════════════════════════════════════════════════════════════════

/// Builds Kafka clients for each worker.
#[derive(Debug, Clone, Default)]
pub struct KafkaConnector {
    config: KafkaClientConfig,
}

impl KafkaConnector {
    pub fn new(config: KafkaClientConfig) -> Self {
        Self { config }
    }
}

impl BrokerConnector for KafkaConnector {
    type Source = KafkaSource;
    type Sink = KafkaSink;

    fn connect_source<'a>(&'a self, job: &'a ReplicationJob) -> BoxFuture<'a, KafkaSource> {
        Box::pin(async move {
            let source = KafkaSource::connect(job, &self.config)?;
            let brokers = source
                .probe(self.config.operation_timeout_duration())
                .await?;
            info!(
                broker = %job.source_broker_address(),
                topic = %job.source_topic(),
                brokers,
                "Connected to source kafka"
            );
            Ok(source)
        })
    }

    fn connect_sink<'a>(&'a self, job: &'a ReplicationJob) -> BoxFuture<'a, KafkaSink> {
        Box::pin(async move {
            let sink = KafkaSink::connect(job, &self.config)?;
            let brokers = sink.probe(self.config.operation_timeout_duration()).await?;
            info!(
                broker = %job.destination_broker_address(),
                topic = %job.destination_topic(),
                brokers,
                "Connected to destination kafka"
            );
            Ok(sink)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OffsetReset;

    #[test]
    fn test_consumer_config_settings() {
        let job = ReplicationJob::new("src:9092", "orders", "bridge", "dst:9092");
        let config = KafkaClientConfig {
            auto_offset_reset: OffsetReset::Latest,
            ..Default::default()
        };
        let client = consumer_config(&job, &config);

        assert_eq!(client.get("bootstrap.servers"), Some("src:9092"));
        assert_eq!(client.get("group.id"), Some("bridge"));
        assert_eq!(client.get("enable.auto.commit"), Some("true"));
        assert_eq!(client.get("enable.auto.offset.store"), Some("false"));
        assert_eq!(client.get("auto.offset.reset"), Some("latest"));
        assert_eq!(client.get("fetch.min.bytes"), Some("10000"));
        assert_eq!(client.get("fetch.max.bytes"), Some("10000000"));
        assert_eq!(client.get("auto.commit.interval.ms"), Some("5000"));
    }

    #[test]
    fn test_producer_config_settings() {
        let job = ReplicationJob::new("src:9092", "orders", "bridge", "dst:9092");
        let client = producer_config(&job, &KafkaClientConfig::default());

        assert_eq!(client.get("bootstrap.servers"), Some("dst:9092"));
        assert_eq!(client.get("partitioner"), Some("consistent_random"));
        assert_eq!(client.get("message.timeout.ms"), Some("30000"));
    }

    #[tokio::test]
    async fn test_clients_create_without_broker() {
        // librdkafka connects lazily, so creation succeeds with nothing listening.
        // The consumer needs a runtime to spawn onto.
        let job = ReplicationJob::new("127.0.0.1:1", "orders", "bridge", "127.0.0.1:1");
        let config = KafkaClientConfig::default();

        assert!(KafkaSource::connect(&job, &config).is_ok());
        assert!(KafkaSink::connect(&job, &config).is_ok());
        assert!(KafkaAdmin::connect("127.0.0.1:1", &config).is_ok());
    }

    #[tokio::test]
    async fn test_probe_fails_without_broker() {
        let job = ReplicationJob::new("127.0.0.1:1", "orders", "bridge", "127.0.0.1:1");
        let sink = KafkaSink::connect(&job, &KafkaClientConfig::default()).unwrap();

        let result = sink.probe(Duration::from_millis(200)).await;
        assert!(result.is_err());
    }
}
