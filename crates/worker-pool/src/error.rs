//! Error types for the worker pool

use crate::types::{ActorId, ConnectionId, Pid, WorkerId};

/// Errors raised by a [`ProcessLauncher`](crate::launcher::ProcessLauncher)
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    /// The launch command has no program
    #[error("worker command is empty")]
    EmptyCommand,

    /// The OS refused to spawn the process
    #[error("failed to spawn worker process {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The launcher has no record of the process
    #[error("unknown worker process: {0}")]
    UnknownProcess(Pid),

    /// Killing or reaping the process failed
    #[error("failed to terminate worker process {pid}: {source}")]
    Terminate {
        pid: Pid,
        #[source]
        source: std::io::Error,
    },

    /// The launcher declined the request
    #[error("launch rejected: {0}")]
    Rejected(String),
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Worker pool errors
///
/// Lookups that find nothing return `None` instead of an error. Everything
/// here is either a launch failure or a caller bug; the pool is left
/// untouched when one is returned.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// Invalid pool configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The process launcher failed; fatal for the node
    #[error("launch error: {0}")]
    Launch(#[from] LaunchError),

    /// The worker is not registered (never was, or already disconnected)
    #[error("worker is not registered: {0}")]
    NotRegistered(WorkerId),

    /// No worker is registered over the connection
    #[error("no worker registered on connection {0}")]
    UnknownConnection(ConnectionId),

    /// A worker is already registered over the connection
    #[error("connection {0} already has a registered worker")]
    AlreadyRegistered(ConnectionId),

    /// The worker was pushed while already idle
    #[error("worker is already idle: {0}")]
    AlreadyIdle(WorkerId),

    /// The operation requires a busy worker
    #[error("worker is idle: {0}")]
    WorkerIdle(WorkerId),

    /// Another worker already idles for the actor
    #[error("actor {actor} already has idle worker {occupant}")]
    ActorSlotOccupied { actor: ActorId, occupant: WorkerId },

    /// The worker is bound to a different actor
    #[error("worker {worker} is already bound to actor {actor}")]
    ActorAlreadyAssigned { worker: WorkerId, actor: ActorId },

    /// Index invariant violation
    #[error("worker pool indexes are inconsistent: {0}")]
    Corrupted(String),

    /// The pool service is no longer running
    #[error("worker pool service has stopped")]
    ServiceStopped,
}

impl PoolError {
    /// Whether the error is a caller bug rather than a runtime failure
    pub fn is_precondition_violation(&self) -> bool {
        matches!(
            self,
            Self::NotRegistered(_)
                | Self::UnknownConnection(_)
                | Self::AlreadyRegistered(_)
                | Self::AlreadyIdle(_)
                | Self::WorkerIdle(_)
                | Self::ActorSlotOccupied { .. }
                | Self::ActorAlreadyAssigned { .. }
        )
    }
}
