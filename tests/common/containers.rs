// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Testcontainers setup for Kafka.
//!
//! Each test cluster is a single-node Kafka container. Replication tests run
//! two of them, one as source and one as destination.

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message as _;
use rdkafka::producer::{FutureProducer, FutureRecord};
use std::time::Duration;
use testcontainers::{clients::Cli, Container};
use testcontainers_modules::kafka::{Kafka, KAFKA_PORT};

/// Start a single-node Kafka container.
pub fn kafka_container(docker: &Cli) -> Container<'_, Kafka> {
    docker.run(Kafka::default())
}

/// Bootstrap address for a container.
pub fn bootstrap_servers(container: &Container<'_, Kafka>) -> String {
    let port = container.get_host_port_ipv4(KAFKA_PORT);
    format!("127.0.0.1:{}", port)
}

/// A Kafka cluster for one side of a replication test.
pub struct TestCluster<'a> {
    #[allow(dead_code)] // Kept alive for container lifetime
    container: Container<'a, Kafka>,
    pub bootstrap: String,
}

impl<'a> TestCluster<'a> {
    pub fn new(docker: &'a Cli) -> Self {
        let container = kafka_container(docker);
        let bootstrap = bootstrap_servers(&container);
        Self {
            container,
            bootstrap,
        }
    }

    /// Publish `values` to `topic` in order, all to partition 0.
    pub async fn produce(&self, topic: &str, values: &[&str]) {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &self.bootstrap)
            .set("message.timeout.ms", "10000")
            .create()
            .expect("Failed to create producer");

        for value in values {
            producer
                .send(
                    FutureRecord::<(), str>::to(topic).payload(*value).partition(0),
                    Duration::from_secs(5),
                )
                .await
                .expect("Failed to produce");
        }
    }

    /// Read up to `count` values from `topic` with a fresh consumer group.
    ///
    /// Stops early once `timeout` elapses without a message.
    pub async fn consume(&self, topic: &str, count: usize, timeout: Duration) -> Vec<String> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.bootstrap)
            .set("group.id", format!("verify-{topic}-{}", std::process::id()))
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "false")
            .create()
            .expect("Failed to create consumer");
        consumer.subscribe(&[topic]).expect("Failed to subscribe");

        let mut values = Vec::new();
        while values.len() < count {
            match tokio::time::timeout(timeout, consumer.recv()).await {
                Ok(Ok(message)) => values.push(
                    String::from_utf8_lossy(message.payload().unwrap_or_default()).into_owned(),
                ),
                Ok(Err(e)) => panic!("consume failed: {e}"),
                Err(_) => break,
            }
        }
        values
    }
}
