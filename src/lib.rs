//! # Topic Replicator
//!
//! Copies messages from a set of Kafka topics on a source cluster to
//! same-named topics on a destination cluster, preserving per-partition order
//! and committing consumer progress only after each message is forwarded.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                            topic-replicator                              │
//! │                                                                          │
//! │  ┌────────────┐   ┌─────────────┐   ┌──────────────────────────────────┐ │
//! │  │ config     │──►│ provision   │──►│ ReplicationSupervisor (JoinSet)  │ │
//! │  │ (env vars) │   │ (2 parts,   │   │                                  │ │
//! │  └────────────┘   │  RF 1)      │   │  TopicReplicator   per topic:    │ │
//! │                   └─────────────┘   │  consume ─► produce ─► store off │ │
//! │                                     └──────────────────────────────────┘ │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Broker access goes through the traits in [`broker`]; [`kafka`] implements
//! them with `rdkafka` and [`broker::memory`] implements them in memory.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use topic_replicator::{KafkaConnector, Logger, ReplicationConfig, ReplicationSupervisor};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ReplicationConfig::from_env().expect("configuration");
//!     let logger = Logger::from_level(&config.log_level);
//!
//!     let supervisor = ReplicationSupervisor::new(KafkaConnector::new(config.kafka.clone()), logger);
//!     let err = supervisor.run_all(config.jobs()).await.unwrap_err();
//!     eprintln!("replication stopped: {err}");
//! }
//! ```

pub mod broker;
pub mod config;
pub mod error;
pub mod job;
pub mod kafka;
pub mod logging;
pub mod metrics;
pub mod provision;
pub mod supervisor;

// Re-exports for convenience
pub use broker::{BrokerConnector, BrokerError, MessageSink, MessageSource, TopicAdmin};
pub use config::{KafkaClientConfig, ReplicationConfig};
pub use error::{ReplicationError, Result};
pub use job::{Message, ReplicationJob};
pub use kafka::{KafkaAdmin, KafkaConnector};
pub use logging::Logger;
pub use provision::{provision, provision_and_continue, ProvisionReport, TopicSpec};
pub use supervisor::{
    ReplicationSupervisor, ShutdownHandle, SupervisorState, TopicReplicator, WorkerState,
};
