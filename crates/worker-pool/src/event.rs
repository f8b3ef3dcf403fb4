//! Pool events
//!
//! Launch completion and registration arrive independently and in any order.
//! Modeling both as events applied one at a time turns the reconciliation of
//! pending pids with registrations into a sequential join on [`Pid`].

use serde::{Deserialize, Serialize};

use crate::error::PoolError;
use crate::pool::WorkerPool;
use crate::types::{ConnectionId, Pid, WorkerId, WorkerRegistration};

/// Something that happened to a worker process outside the pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PoolEvent {
    /// A worker process was launched by someone other than the pool
    StartRequested { pid: Pid },

    /// A worker process connected and identified itself
    Registered { registration: WorkerRegistration },

    /// A worker's connection went away
    Disconnected { connection: ConnectionId },
}

/// Result of applying a [`PoolEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// The pid was recorded as pending (`false` if it already was, or is
    /// registered)
    StartRecorded(bool),

    /// The worker was registered under this handle
    Registered(WorkerId),

    /// The worker was removed; `was_idle` tells whether a task may have been
    /// interrupted
    Disconnected { worker: WorkerId, was_idle: bool },
}

impl WorkerPool {
    /// Apply an event to the pool
    pub fn apply(&mut self, event: PoolEvent) -> Result<EventOutcome, PoolError> {
        match event {
            PoolEvent::StartRequested { pid } => {
                Ok(EventOutcome::StartRecorded(self.add_started_worker(pid)))
            }
            PoolEvent::Registered { registration } => {
                self.register_worker(registration).map(EventOutcome::Registered)
            }
            PoolEvent::Disconnected { connection } => {
                let (worker, was_idle) = self.disconnect_connection(connection)?;
                Ok(EventOutcome::Disconnected { worker, was_idle })
            }
        }
    }
}
