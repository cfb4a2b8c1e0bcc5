// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Destination topic provisioning.
//!
//! Every source topic is created on the destination cluster before the
//! workers start, with a fixed layout. Creation is idempotent: a topic that
//! already exists counts as provisioned. Any other failure is reported as a
//! non-fatal [`ReplicationError::Provisioning`] so the caller can log it and
//! carry on.

use crate::broker::{TopicAdmin, TopicCreation};
use crate::error::{ReplicationError, Result};
use crate::metrics;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Partition count for every provisioned topic.
pub const PROVISION_PARTITIONS: i32 = 2;

/// Replication factor for every provisioned topic.
pub const PROVISION_REPLICATION_FACTOR: i32 = 1;

/// Layout of a topic to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSpec {
    pub name: String,
    pub partition_count: i32,
    pub replication_factor: i32,
}

impl TopicSpec {
    pub fn new(name: impl Into<String>, partition_count: i32, replication_factor: i32) -> Self {
        Self {
            name: name.into(),
            partition_count,
            replication_factor,
        }
    }

    /// Spec with the fixed provisioning layout.
    pub fn provisioned(name: impl Into<String>) -> Self {
        Self::new(name, PROVISION_PARTITIONS, PROVISION_REPLICATION_FACTOR)
    }
}

/// What a successful provisioning run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    /// Topics created by this run.
    pub created: Vec<String>,
    /// Topics that were already present.
    pub existing: Vec<String>,
}

/// Ensure every topic in `topics` exists on the destination.
///
/// Issues a single admin request. Returns `Provisioning` listing every
/// topic that could not be created, or every topic when the request itself
/// failed.
pub async fn provision(admin: &impl TopicAdmin, topics: &[String]) -> Result<ProvisionReport> {
    if topics.is_empty() {
        return Ok(ProvisionReport::default());
    }

    let specs: Vec<TopicSpec> = topics.iter().map(TopicSpec::provisioned).collect();

    let outcomes = admin.create_topics(&specs).await.map_err(|e| {
        metrics::record_provisioning_failure(topics.len());
        ReplicationError::Provisioning {
            topics: topics.to_vec(),
            message: e.to_string(),
        }
    })?;

    let mut report = ProvisionReport::default();
    let mut failed = Vec::new();
    let mut reasons = Vec::new();

    for (name, outcome) in outcomes {
        match outcome {
            TopicCreation::Created => {
                info!(topic = %name, partitions = PROVISION_PARTITIONS, "Created destination topic");
                report.created.push(name);
            }
            TopicCreation::AlreadyExists => {
                debug!(topic = %name, "Destination topic already exists");
                report.existing.push(name);
            }
            TopicCreation::Failed(reason) => {
                reasons.push(format!("{name}: {reason}"));
                failed.push(name);
            }
        }
    }

    if !failed.is_empty() {
        metrics::record_provisioning_failure(failed.len());
        return Err(ReplicationError::Provisioning {
            topics: failed,
            message: reasons.join("; "),
        });
    }

    Ok(report)
}

/// Provision `topics` and log the outcome instead of returning an error.
///
/// Replication starts either way. A destination topic that is still
/// missing surfaces later as a write error in its worker.
pub async fn provision_and_continue(
    admin: &impl TopicAdmin,
    topics: &[String],
) -> Option<ProvisionReport> {
    match provision(admin, topics).await {
        Ok(report) => {
            metrics::record_topics_provisioned(report.created.len(), report.existing.len());
            info!(
                created = ?report.created,
                existing = ?report.existing,
                "Destination topics provisioned"
            );
            Some(report)
        }
        Err(e) => {
            warn!(kind = e.kind(), error = %e, "Topic provisioning failed, continuing");
            None
        }
    }
}
