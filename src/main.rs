// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! `topic-replicator` binary.
//!
//! Exit status is 0 when a signal stopped replication and 1 on any
//! configuration or replication error.

use std::process::ExitCode;
use topic_replicator::{
    metrics, provision_and_continue, KafkaAdmin, KafkaConnector, Logger, ReplicationConfig,
    ReplicationSupervisor, SupervisorState,
};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let config = ReplicationConfig::from_env();
    let logger = match &config {
        Ok(config) => Logger::from_level(&config.log_level),
        // LOG_LEVEL still applies when another variable is missing.
        Err(_) => Logger::from_env(),
    };
    if let Err(e) = logger.install_global() {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    info!(
        source = %config.source_kafka_url,
        destination = %config.destination_kafka_url,
        group_id = %config.group_id,
        topics = ?config.source_topics,
        "Starting topic replicator"
    );

    provision_destination(&config).await;

    let supervisor = ReplicationSupervisor::new(KafkaConnector::new(config.kafka.clone()), logger);

    let shutdown = supervisor.shutdown_handle();
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown signal received");
        shutdown.trigger();
    });

    match supervisor.run_all(config.jobs()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if supervisor.state() == SupervisorState::Stopped => {
            info!(reason = %e, "Replication stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(kind = e.kind(), error = %e, "Replication failed");
            ExitCode::FAILURE
        }
    }
}

/// Create destination topics. Failures are logged and ignored.
async fn provision_destination(config: &ReplicationConfig) {
    let admin = match KafkaAdmin::connect(&config.destination_kafka_url, &config.kafka) {
        Ok(admin) => admin,
        Err(e) => {
            metrics::record_provisioning_failure(config.source_topics.len());
            warn!(error = %e, "Could not create admin client, skipping topic provisioning");
            return;
        }
    };

    provision_and_continue(&admin, &config.source_topics).await;
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
                return;
            }
            Err(e) => warn!(error = %e, "Could not install SIGTERM handler"),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
}
