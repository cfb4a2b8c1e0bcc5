// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Replication supervisor.
//!
//! Fans out one [`TopicReplicator`] per job and waits on all of them:
//! 1. Spawns every worker into a `JoinSet`, under the supervisor's logger
//! 2. Waits for the first worker to finish (workers only finish on error)
//! 3. Signals shutdown, aborts the rest and drains the set
//! 4. Returns the first worker's error
//!
//! Workers share nothing but the shutdown signal and the connector that
//! builds their clients.

mod replicator;
mod types;

pub use replicator::{run_worker, TopicReplicator};
pub use types::{SupervisorState, WorkerState};

use crate::broker::BrokerConnector;
use crate::error::{ReplicationError, Result};
use crate::job::ReplicationJob;
use crate::logging::Logger;
use crate::metrics;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tracing::instrument::WithSubscriber;
use tracing::{debug, error, info};

/// Cloneable trigger for the supervisor's shutdown signal.
#[derive(Debug, Clone)]
pub struct ShutdownHandle(Arc<watch::Sender<bool>>);

impl ShutdownHandle {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self(Arc::new(tx))
    }

    /// Cancel every worker's pending read.
    pub fn trigger(&self) {
        self.0.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.0.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.0.subscribe()
    }
}

/// Runs one worker per topic and stops them all on the first failure.
pub struct ReplicationSupervisor<C: BrokerConnector> {
    connector: Arc<C>,
    logger: Logger,

    /// Supervisor state (broadcast to watchers)
    state_tx: watch::Sender<SupervisorState>,
    state_rx: watch::Receiver<SupervisorState>,

    shutdown: ShutdownHandle,

    /// Per-topic worker state, in spawn order
    workers: Mutex<Vec<(String, watch::Receiver<WorkerState>)>>,
}

impl<C: BrokerConnector> ReplicationSupervisor<C> {
    pub fn new(connector: C, logger: Logger) -> Self {
        Self::with_connector(Arc::new(connector), logger)
    }

    /// Share a connector the caller keeps a handle on.
    pub fn with_connector(connector: Arc<C>, logger: Logger) -> Self {
        let (state_tx, state_rx) = watch::channel(SupervisorState::Created);
        Self {
            connector,
            logger,
            state_tx,
            state_rx,
            shutdown: ShutdownHandle::new(),
            workers: Mutex::new(Vec::new()),
        }
    }

    pub fn connector(&self) -> &Arc<C> {
        &self.connector
    }

    /// Handle that stops every worker when triggered.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn state(&self) -> SupervisorState {
        *self.state_rx.borrow()
    }

    pub fn state_receiver(&self) -> watch::Receiver<SupervisorState> {
        self.state_rx.clone()
    }

    /// Current state of each worker, in spawn order.
    pub fn worker_states(&self) -> Vec<(String, WorkerState)> {
        self.workers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(topic, rx)| (topic.clone(), *rx.borrow()))
            .collect()
    }

    /// Replicate every job until one worker fails or shutdown is triggered.
    ///
    /// Always returns an error: the first worker's. If shutdown was triggered
    /// through [`ShutdownHandle`] that error is `Cancelled` and the state
    /// ends as `Stopped`; otherwise it ends as `Failed`.
    pub async fn run_all(&self, jobs: Vec<ReplicationJob>) -> Result<()> {
        let dispatch = self.logger.dispatch().clone();
        self.supervise(jobs).with_subscriber(dispatch).await
    }

    async fn supervise(&self, jobs: Vec<ReplicationJob>) -> Result<()> {
        if self.state() != SupervisorState::Created {
            return Err(ReplicationError::InvalidState {
                expected: SupervisorState::Created.to_string(),
                actual: self.state().to_string(),
            });
        }
        if jobs.is_empty() {
            return Err(ReplicationError::Config(
                "no source topics to replicate".to_string(),
            ));
        }

        let worker_count = jobs.len();
        info!(workers = worker_count, "Starting replication supervisor");

        let mut set = JoinSet::new();
        for job in jobs {
            let topic = job.source_topic().to_string();
            let (state_tx, state_rx) = watch::channel(WorkerState::Connecting);
            self.workers
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push((topic.clone(), state_rx));

            let connector = Arc::clone(&self.connector);
            let shutdown_rx = self.shutdown.subscribe();
            let worker = async move {
                match run_worker(&*connector, job, state_tx, shutdown_rx).await {
                    Ok(never) => match never {},
                    Err(e) => e,
                }
            };
            set.spawn(worker.with_subscriber(self.logger.dispatch().clone()));

            info!(topic = %topic, "Spawned replication worker");
        }

        self.state_tx.send_replace(SupervisorState::Running);
        metrics::set_supervisor_state("Running");
        metrics::set_active_workers(worker_count);

        let first = match set.join_next().await {
            Some(Ok(e)) => e,
            Some(Err(join_error)) => internal_error(join_error),
            None => ReplicationError::Internal("worker set empty".to_string()),
        };

        // A real failure racing a shutdown signal still counts as a failure.
        let requested =
            self.shutdown.is_triggered() && matches!(first, ReplicationError::Cancelled { .. });
        if requested {
            info!(error = %first, "Shutdown requested, stopping workers");
        } else {
            error!(
                topic = first.topic().unwrap_or_default(),
                kind = first.kind(),
                error = %first,
                "Replication worker failed, stopping all workers"
            );
        }

        self.shutdown.trigger();
        set.abort_all();
        while let Some(result) = set.join_next().await {
            match result {
                Ok(e) => debug!(error = %e, "Worker stopped"),
                Err(e) if e.is_cancelled() => debug!("Worker aborted"),
                Err(e) => debug!(error = %internal_error(e), "Worker failed during drain"),
            }
        }
        metrics::set_active_workers(0);

        let final_state = if requested {
            SupervisorState::Stopped
        } else {
            SupervisorState::Failed
        };
        self.state_tx.send_replace(final_state);
        metrics::set_supervisor_state(&final_state.to_string());
        info!(state = %final_state, "Replication supervisor finished");

        Err(first)
    }
}

fn internal_error(e: JoinError) -> ReplicationError {
    if e.is_panic() {
        let payload = e.into_panic();
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        ReplicationError::Internal(format!("worker panicked: {message}"))
    } else {
        ReplicationError::Internal(format!("worker task failed: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::memory::{messages, MemoryConnector, MemorySource};
    use crate::broker::{BoxFuture, BrokerError, Delivery, MessageSink};
    use crate::config::ReplicationConfig;
    use crate::job::Message;
    use std::sync::OnceLock;

    /// Sink that raises the shutdown signal and then fails the send, as
    /// when a signal arrives while a forward is in flight.
    struct SignalThenFailSink {
        shutdown: ShutdownHandle,
    }

    impl MessageSink for SignalThenFailSink {
        fn send<'a>(&'a self, _message: &'a Message) -> BoxFuture<'a, Delivery> {
            Box::pin(async move {
                self.shutdown.trigger();
                Err(BrokerError::new("NOT_LEADER_FOR_PARTITION"))
            })
        }
    }

    #[derive(Default)]
    struct SignalThenFailConnector {
        shutdown: OnceLock<ShutdownHandle>,
    }

    impl BrokerConnector for SignalThenFailConnector {
        type Source = MemorySource;
        type Sink = SignalThenFailSink;

        fn connect_source<'a>(&'a self, job: &'a ReplicationJob) -> BoxFuture<'a, MemorySource> {
            let source = MemorySource::new(messages(job.source_topic(), &["m1"]));
            Box::pin(async move { Ok(source) })
        }

        fn connect_sink<'a>(&'a self, _job: &'a ReplicationJob) -> BoxFuture<'a, SignalThenFailSink> {
            Box::pin(async move {
                let shutdown = self
                    .shutdown
                    .get()
                    .cloned()
                    .ok_or_else(|| BrokerError::new("shutdown handle not set"))?;
                Ok(SignalThenFailSink { shutdown })
            })
        }
    }

    fn supervisor(connector: MemoryConnector) -> ReplicationSupervisor<MemoryConnector> {
        let (logger, _logs) = Logger::capturing();
        ReplicationSupervisor::new(connector, logger)
    }

    #[test]
    fn test_initial_state() {
        let supervisor = supervisor(MemoryConnector::new());

        assert_eq!(supervisor.state(), SupervisorState::Created);
        assert!(supervisor.worker_states().is_empty());
        assert!(!supervisor.shutdown_handle().is_triggered());
    }

    #[test]
    fn test_shutdown_handle_is_shared() {
        let supervisor = supervisor(MemoryConnector::new());
        let handle = supervisor.shutdown_handle();
        let rx = handle.subscribe();

        supervisor.shutdown_handle().trigger();

        assert!(handle.is_triggered());
        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn test_empty_job_list_is_config_error() {
        let supervisor = supervisor(MemoryConnector::new());

        let err = supervisor.run_all(vec![]).await.unwrap_err();

        assert_eq!(err.kind(), "config");
        assert_eq!(supervisor.state(), SupervisorState::Created);
    }

    #[tokio::test]
    async fn test_failure_surfaces_and_state_is_failed() {
        let connector = MemoryConnector::new().script("orders", &["o1"]);
        let supervisor = supervisor(connector);
        let jobs = ReplicationConfig::for_testing(&["orders"]).jobs();

        let err = supervisor.run_all(jobs).await.unwrap_err();

        assert_eq!(err.kind(), "read");
        assert_eq!(supervisor.state(), SupervisorState::Failed);
        assert_eq!(
            supervisor.worker_states(),
            vec![("orders".to_string(), WorkerState::Terminated)]
        );
    }

    #[tokio::test]
    async fn test_run_all_twice_is_invalid() {
        let supervisor = supervisor(MemoryConnector::new());
        let jobs = ReplicationConfig::for_testing(&["orders"]).jobs();

        let _ = supervisor.run_all(jobs.clone()).await;
        let err = supervisor.run_all(jobs).await.unwrap_err();

        assert!(matches!(err, ReplicationError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_triggered_shutdown_ends_stopped() {
        let connector = MemoryConnector::new().blocking_when_empty();
        let supervisor = supervisor(connector);
        supervisor.shutdown_handle().trigger();

        let err = supervisor
            .run_all(ReplicationConfig::for_testing(&["orders", "payments"]).jobs())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "cancelled");
        assert_eq!(supervisor.state(), SupervisorState::Stopped);
    }

    #[tokio::test]
    async fn test_write_failure_during_shutdown_ends_failed() {
        let (logger, logs) = Logger::capturing();
        let supervisor = ReplicationSupervisor::new(SignalThenFailConnector::default(), logger);
        let _ = supervisor.connector().shutdown.set(supervisor.shutdown_handle());

        let err = supervisor
            .run_all(ReplicationConfig::for_testing(&["orders"]).jobs())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "write");
        assert!(supervisor.shutdown_handle().is_triggered());
        assert_eq!(supervisor.state(), SupervisorState::Failed);
        assert!(logs.contains("Replication worker failed, stopping all workers"));
        assert!(!logs.contains("Shutdown requested, stopping workers"));
    }

    #[test]
    fn test_internal_error_from_cancelled_join() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let join_error = rt.block_on(async {
            let handle = tokio::spawn(std::future::pending::<()>());
            handle.abort();
            handle.await.unwrap_err()
        });

        let err = internal_error(join_error);
        assert_eq!(err.kind(), "internal");
        assert!(err.to_string().contains("worker task failed"));
    }
}
