//! Metrics for observability.
//!
//! Emits through the `metrics` facade; the binary decides whether a recorder
//! is installed. Covers:
//! - Messages read and forwarded per topic
//! - Forward latency
//! - Worker and supervisor state
//! - Topic provisioning
//!
//! # Metric Naming Convention
//!
//! All metrics are prefixed with `replication_` and follow Prometheus conventions:
//! - Counters end in `_total`
//! - Gauges represent current state
//! - Histograms track distributions (duration, size)
//!
//! # Usage
//!
//! ```rust,no_run
//! use topic_replicator::metrics;
//! use std::time::Duration;
//!
//! metrics::record_message_read("orders", 512);
//! metrics::record_message_forwarded("orders", Duration::from_millis(3));
//! ```

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record a message read from a source topic.
pub fn record_message_read(topic: &str, bytes: usize) {
    counter!("replication_messages_read_total", "topic" => topic.to_string()).increment(1);
    counter!("replication_bytes_read_total", "topic" => topic.to_string()).increment(bytes as u64);
}

/// Record a message acknowledged by the destination.
pub fn record_message_forwarded(topic: &str, latency: Duration) {
    counter!("replication_messages_forwarded_total", "topic" => topic.to_string()).increment(1);
    histogram!("replication_forward_duration_seconds", "topic" => topic.to_string())
        .record(latency.as_secs_f64());
}

/// Record a stored consumer offset.
pub fn record_offset_stored(topic: &str, partition: i32, offset: i64) {
    gauge!(
        "replication_stored_offset",
        "topic" => topic.to_string(),
        "partition" => partition.to_string()
    )
    .set(offset as f64);
}

/// Record a broker connection attempt for a worker.
pub fn record_connect(topic: &str, role: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "replication_connects_total",
        "topic" => topic.to_string(),
        "role" => role.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Record a worker-terminating error by kind.
pub fn record_error(topic: &str, error_type: &str) {
    counter!("replication_errors_total", "topic" => topic.to_string(), "error_type" => error_type.to_string()).increment(1);
}

/// Record a worker state transition.
pub fn record_worker_state(topic: &str, state: &str) {
    counter!(
        "replication_worker_transitions_total",
        "topic" => topic.to_string(),
        "state" => state.to_string()
    )
    .increment(1);
}

/// Gauge for number of running workers.
pub fn set_active_workers(count: usize) {
    gauge!("replication_active_workers").set(count as f64);
}

/// Gauge for supervisor state.
pub fn set_supervisor_state(state: &str) {
    // Numeric for alerting
    let value = match state {
        "Created" => 0.0,
        "Running" => 1.0,
        "Stopped" => 2.0,
        "Failed" => 3.0,
        _ => -1.0,
    };
    gauge!("replication_supervisor_state").set(value);
}

/// Record topics created or found during provisioning.
pub fn record_topics_provisioned(created: usize, existing: usize) {
    counter!("replication_topics_created_total").increment(created as u64);
    counter!("replication_topics_existing_total").increment(existing as u64);
}

/// Record topics that could not be provisioned.
pub fn record_provisioning_failure(topics: usize) {
    counter!("replication_provisioning_failures_total").increment(topics as u64);
}
