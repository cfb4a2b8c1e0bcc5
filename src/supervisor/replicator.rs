// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Topic replicator: the per-topic read → forward loop.
//!
//! Each worker:
//! 1. Connects its own consumer and producer (`Connecting`)
//! 2. Waits for the next message or for shutdown (`Reading`)
//! 3. Publishes it to the same-named destination topic and waits for the
//!    ack (`Forwarding`)
//! 4. Stores the consumed offset, then goes back to 2
//!
//! Reads and forwards are strictly sequential, so destination order per
//! partition matches source order.
//!
//! # Failure
//!
//! There is no retry. The first error of any kind ends the worker in
//! `Terminated` and is returned to the supervisor. A failed forward is
//! never acked, so its offset is re-read after a restart.

use super::types::WorkerState;
use crate::broker::{BrokerConnector, BrokerError, MessageSink, MessageSource};
use crate::error::{ReplicationError, Result};
use crate::job::{Message, ReplicationJob};
use crate::metrics;
use std::convert::Infallible;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, error, info, info_span, Instrument, Span};

/// Resolves once shutdown is signalled.
///
/// Stays pending if the sender is dropped without signalling.
async fn cancelled(shutdown_rx: &mut watch::Receiver<bool>) {
    let closed = shutdown_rx.wait_for(|stop| *stop).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}

fn worker_span(job: &ReplicationJob) -> Span {
    info_span!(
        "replicator",
        topic = %job.source_topic(),
        group_id = %job.consumer_group_id()
    )
}

/// Connect a worker's clients through `connector`, then run it.
///
/// Shutdown while connecting ends the worker with `Cancelled`.
pub async fn run_worker<C: BrokerConnector>(
    connector: &C,
    job: ReplicationJob,
    state_tx: watch::Sender<WorkerState>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<Infallible> {
    let span = worker_span(&job);
    state_tx.send_replace(WorkerState::Connecting);
    metrics::record_worker_state(job.source_topic(), "Connecting");

    let connect = async {
        let source = connector
            .connect_source(&job)
            .await
            .map_err(|e| connect_error(&job, "source", job.source_broker_address(), e))?;
        metrics::record_connect(job.source_topic(), "source", true);

        let sink = connector
            .connect_sink(&job)
            .await
            .map_err(|e| connect_error(&job, "destination", job.destination_broker_address(), e))?;
        metrics::record_connect(job.source_topic(), "destination", true);

        Ok::<_, ReplicationError>((source, sink))
    }
    .instrument(span.clone());

    let connected = tokio::select! {
        biased;

        _ = cancelled(&mut shutdown_rx) => Err(ReplicationError::Cancelled {
            topic: job.source_topic().to_string(),
        }),
        result = connect => result,
    };

    match connected {
        Ok((source, sink)) => {
            TopicReplicator::new(job, source, sink, state_tx)
                .run(shutdown_rx)
                .await
        }
        Err(e) => {
            span.in_scope(|| error!(error = %e, "Failed to connect replication worker"));
            state_tx.send_replace(WorkerState::Terminated);
            metrics::record_worker_state(job.source_topic(), "Terminated");
            metrics::record_error(job.source_topic(), e.kind());
            Err(e)
        }
    }
}

fn connect_error(
    job: &ReplicationJob,
    role: &'static str,
    broker: &str,
    e: BrokerError,
) -> ReplicationError {
    metrics::record_connect(job.source_topic(), role, false);
    ReplicationError::Connect {
        role,
        broker: broker.to_string(),
        topic: job.source_topic().to_string(),
        message: e.to_string(),
    }
}

/// Copies one source topic to the destination cluster.
pub struct TopicReplicator<Src, Snk> {
    job: ReplicationJob,
    source: Src,
    sink: Snk,
    state_tx: watch::Sender<WorkerState>,
    /// Last position read, for error context.
    last_partition: Option<i32>,
    last_offset: Option<i64>,
}

impl<Src: MessageSource, Snk: MessageSink> TopicReplicator<Src, Snk> {
    /// Bind connected clients to `job`. State is published on `state_tx`.
    pub fn new(
        job: ReplicationJob,
        source: Src,
        sink: Snk,
        state_tx: watch::Sender<WorkerState>,
    ) -> Self {
        Self {
            job,
            source,
            sink,
            state_tx,
            last_partition: None,
            last_offset: None,
        }
    }

    pub fn job(&self) -> &ReplicationJob {
        &self.job
    }

    /// Run the loop until the first error, which is returned.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) -> Result<Infallible> {
        let span = worker_span(&self.job);

        async move {
            info!("Replication worker started");
            self.replicate(&mut shutdown_rx).await
        }
        .instrument(span)
        .await
    }

    async fn replicate(&mut self, shutdown_rx: &mut watch::Receiver<bool>) -> Result<Infallible> {
        loop {
            let message = self.read(shutdown_rx).await?;
            self.forward(message).await?;
        }
    }

    async fn read(&mut self, shutdown_rx: &mut watch::Receiver<bool>) -> Result<Message> {
        self.set_state(WorkerState::Reading);

        let received = tokio::select! {
            biased;

            _ = cancelled(shutdown_rx) => None,
            result = self.source.recv() => Some(result),
        };

        match received {
            None => {
                info!("Shutdown signal received, cancelling read");
                Err(self.terminate(ReplicationError::Cancelled {
                    topic: self.job.source_topic().to_string(),
                }))
            }
            Some(Err(e)) => {
                error!(
                    topic = %self.job.source_topic(),
                    partition = ?self.last_partition,
                    offset = ?self.last_offset,
                    error = %e,
                    "Failed to read message"
                );
                Err(self.terminate(ReplicationError::Read {
                    topic: self.job.source_topic().to_string(),
                    partition: self.last_partition,
                    offset: self.last_offset,
                    message: e.to_string(),
                }))
            }
            Some(Ok(message)) => {
                self.last_partition = Some(message.partition);
                self.last_offset = Some(message.offset);
                metrics::record_message_read(self.job.source_topic(), message.value.len());
                debug!(
                    partition = message.partition,
                    offset = message.offset,
                    "Read message"
                );
                Ok(message)
            }
        }
    }

    async fn forward(&mut self, message: Message) -> Result<()> {
        self.set_state(WorkerState::Forwarding);

        let outgoing = message.for_destination(self.job.destination_topic());
        let started = Instant::now();

        let sent = self.sink.send(&outgoing).await;
        match sent {
            Ok(delivery) => {
                info!(
                    topic = %outgoing.topic,
                    partition = message.partition,
                    offset = message.offset,
                    value = %message.value_lossy(),
                    destination_partition = delivery.partition,
                    destination_offset = delivery.offset,
                    "Forwarded message"
                );
                metrics::record_message_forwarded(self.job.source_topic(), started.elapsed());
            }
            Err(e) => {
                error!(
                    topic = %outgoing.topic,
                    partition = message.partition,
                    offset = message.offset,
                    value = %message.value_lossy(),
                    error = %e,
                    "Failed to forward message"
                );
                return Err(self.terminate(ReplicationError::Write {
                    topic: outgoing.topic,
                    partition: message.partition,
                    offset: message.offset,
                    message: e.to_string(),
                }));
            }
        }

        if let Err(e) = self.source.ack(&message) {
            error!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                error = %e,
                "Failed to store consumed offset"
            );
            return Err(self.terminate(ReplicationError::Commit {
                topic: self.job.source_topic().to_string(),
                partition: message.partition,
                offset: message.offset,
                message: e.to_string(),
            }));
        }
        metrics::record_offset_stored(self.job.source_topic(), message.partition, message.offset);

        Ok(())
    }

    fn set_state(&self, state: WorkerState) {
        let current = *self.state_tx.borrow();
        if current != state {
            self.state_tx.send_replace(state);
            metrics::record_worker_state(self.job.source_topic(), &state.to_string());
        }
    }

    fn terminate(&self, error: ReplicationError) -> ReplicationError {
        self.set_state(WorkerState::Terminated);
        metrics::record_error(self.job.source_topic(), error.kind());
        error
    }
}
