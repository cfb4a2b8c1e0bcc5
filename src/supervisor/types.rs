//! Supervisor and worker state types.
//!
//! # Worker Transitions
//!
//! ```text
//! Connecting ──→ Reading ──→ Forwarding
//!     │             ↑  │          │
//!     │             └──┼──────────┘
//!     │                │          │
//!     ↓                ↓          ↓
//!            Terminated
//! ```
//!
//! Any error (connect, read, cancel, write, commit) moves a worker straight
//! to `Terminated`; there is no way back.
//!
//! # Supervisor Transitions
//!
//! ```text
//! Created ──run_all()──→ Running ──first worker error──→ Failed
//!                           │
//!                           └──shutdown triggered──→ Stopped
//! ```

/// State of one topic's worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Building and probing the consumer and producer.
    Connecting,

    /// Waiting for the next message from the source topic.
    Reading,

    /// Publishing a message and waiting for the destination's ack.
    Forwarding,

    /// Stopped after an error. Final.
    Terminated,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerState::Connecting => write!(f, "Connecting"),
            WorkerState::Reading => write!(f, "Reading"),
            WorkerState::Forwarding => write!(f, "Forwarding"),
            WorkerState::Terminated => write!(f, "Terminated"),
        }
    }
}

/// State of the replication supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Created, no workers spawned yet.
    Created,

    /// Workers are running.
    Running,

    /// Workers were stopped by a shutdown signal.
    Stopped,

    /// A worker failed and the rest were stopped.
    Failed,
}

impl std::fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SupervisorState::Created => write!(f, "Created"),
            SupervisorState::Running => write!(f, "Running"),
            SupervisorState::Stopped => write!(f, "Stopped"),
            SupervisorState::Failed => write!(f, "Failed"),
        }
    }
}
