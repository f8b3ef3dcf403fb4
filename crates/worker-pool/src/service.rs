//! Async host for the worker pool
//!
//! [`PoolService`] owns a [`WorkerPool`] on a single tokio task and applies
//! [`PoolCommand`]s in arrival order. Any number of [`PoolHandle`]s can be
//! cloned out to the connection layer and the dispatcher.
//!
//! ```text
//! connection layer ──┐
//!                    ├──► mpsc<PoolCommand> ──► PoolService ──► WorkerPool
//! dispatcher ────────┘         (replies via oneshot)
//! ```

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use crate::error::PoolError;
use crate::event::{EventOutcome, PoolEvent};
use crate::pool::WorkerPool;
use crate::types::{ActorId, ConnectionId, Pid, Worker, WorkerId, WorkerRegistration};

type Reply<T> = oneshot::Sender<T>;

/// Request sent to a running [`PoolService`]
#[derive(Debug)]
pub enum PoolCommand {
    StartWorker {
        force_start: bool,
        reply: Reply<Result<Option<Pid>, PoolError>>,
    },
    Register {
        registration: WorkerRegistration,
        reply: Reply<Result<WorkerId, PoolError>>,
    },
    Apply {
        event: PoolEvent,
        reply: Reply<Result<EventOutcome, PoolError>>,
    },
    RegisteredWorker {
        connection: ConnectionId,
        reply: Reply<Option<Worker>>,
    },
    AssignActor {
        worker: WorkerId,
        actor: ActorId,
        reply: Reply<Result<(), PoolError>>,
    },
    Push {
        worker: WorkerId,
        reply: Reply<Result<Option<WorkerId>, PoolError>>,
    },
    Pop {
        actor: Option<ActorId>,
        reply: Reply<Option<WorkerId>>,
    },
    Disconnect {
        worker: WorkerId,
        reply: Reply<Result<bool, PoolError>>,
    },
    Stats {
        reply: Reply<PoolStats>,
    },
}

/// Point-in-time counters of a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Registered workers, idle or busy
    pub registered: usize,
    /// Idle generic workers
    pub idle: usize,
    /// Idle actor workers
    pub idle_actors: usize,
    /// Launched workers that have not registered
    pub started: usize,
}

impl PoolStats {
    fn of(pool: &WorkerPool) -> Self {
        Self {
            registered: pool.size(),
            idle: pool.num_idle_workers(),
            idle_actors: pool.num_idle_actor_workers(),
            started: pool.num_started_workers(),
        }
    }

    /// Registered workers currently lent out
    pub fn busy(&self) -> usize {
        self.registered - self.idle - self.idle_actors
    }
}

/// Single-writer task that owns the pool
pub struct PoolService {
    pool: WorkerPool,
    commands: mpsc::Receiver<PoolCommand>,
    shutdown_rx: watch::Receiver<bool>,
}

impl PoolService {
    /// Create the service and its first handle
    ///
    /// The command queue capacity comes from the pool's configuration.
    pub fn new(pool: WorkerPool) -> (Self, PoolHandle) {
        let (commands_tx, commands) = mpsc::channel(pool.config().command_queue_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let service = Self {
            pool,
            commands,
            shutdown_rx,
        };
        let handle = PoolHandle {
            commands: commands_tx,
            shutdown_tx: Arc::new(shutdown_tx),
        };
        (service, handle)
    }

    /// Spawn the service on the current tokio runtime
    ///
    /// The join handle resolves to the number of worker terminations that
    /// failed during shutdown.
    pub fn spawn(pool: WorkerPool) -> (PoolHandle, JoinHandle<usize>) {
        let (service, handle) = Self::new(pool);
        (handle, tokio::spawn(service.run()))
    }

    /// Serve commands until shutdown is requested or every handle is dropped
    #[instrument(skip(self))]
    pub async fn run(mut self) -> usize {
        info!("Worker pool service started");

        loop {
            tokio::select! {
                biased;
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        debug!("Pool service: shutdown requested");
                        break;
                    }
                }
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => {
                        debug!("Pool service: all handles dropped");
                        break;
                    }
                },
            }
        }

        let failures = self.pool.shutdown();
        info!(failures, "Worker pool service stopped");
        failures
    }

    fn handle(&mut self, command: PoolCommand) {
        // A dropped reply receiver only means the caller stopped waiting.
        match command {
            PoolCommand::StartWorker { force_start, reply } => {
                let _ = reply.send(self.pool.start_worker(force_start));
            }
            PoolCommand::Register {
                registration,
                reply,
            } => {
                let _ = reply.send(self.pool.register_worker(registration));
            }
            PoolCommand::Apply { event, reply } => {
                let _ = reply.send(self.pool.apply(event));
            }
            PoolCommand::RegisteredWorker { connection, reply } => {
                let _ = reply.send(self.pool.registered_worker(connection).cloned());
            }
            PoolCommand::AssignActor {
                worker,
                actor,
                reply,
            } => {
                let _ = reply.send(self.pool.assign_actor(worker, actor));
            }
            PoolCommand::Push { worker, reply } => {
                let _ = reply.send(self.pool.push_worker(worker));
            }
            PoolCommand::Pop { actor, reply } => {
                let _ = reply.send(self.pool.pop_worker(actor));
            }
            PoolCommand::Disconnect { worker, reply } => {
                let _ = reply.send(self.pool.disconnect_worker(worker));
            }
            PoolCommand::Stats { reply } => {
                let _ = reply.send(PoolStats::of(&self.pool));
            }
        }
    }
}

/// Cloneable client of a [`PoolService`]
///
/// Every method fails with [`PoolError::ServiceStopped`] once the service
/// has exited.
#[derive(Clone)]
pub struct PoolHandle {
    commands: mpsc::Sender<PoolCommand>,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl PoolHandle {
    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> PoolCommand,
    ) -> Result<T, PoolError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| PoolError::ServiceStopped)?;
        rx.await.map_err(|_| PoolError::ServiceStopped)
    }

    pub async fn start_worker(&self, force_start: bool) -> Result<Option<Pid>, PoolError> {
        self.request(|reply| PoolCommand::StartWorker { force_start, reply })
            .await?
    }

    pub async fn register_worker(
        &self,
        registration: WorkerRegistration,
    ) -> Result<WorkerId, PoolError> {
        self.request(|reply| PoolCommand::Register {
            registration,
            reply,
        })
        .await?
    }

    pub async fn apply(&self, event: PoolEvent) -> Result<EventOutcome, PoolError> {
        self.request(|reply| PoolCommand::Apply { event, reply })
            .await?
    }

    pub async fn registered_worker(
        &self,
        connection: ConnectionId,
    ) -> Result<Option<Worker>, PoolError> {
        self.request(|reply| PoolCommand::RegisteredWorker { connection, reply })
            .await
    }

    pub async fn assign_actor(&self, worker: WorkerId, actor: ActorId) -> Result<(), PoolError> {
        self.request(|reply| PoolCommand::AssignActor {
            worker,
            actor,
            reply,
        })
        .await?
    }

    pub async fn push_worker(&self, worker: WorkerId) -> Result<Option<WorkerId>, PoolError> {
        self.request(|reply| PoolCommand::Push { worker, reply })
            .await?
    }

    pub async fn pop_worker(&self, actor: Option<ActorId>) -> Result<Option<WorkerId>, PoolError> {
        self.request(|reply| PoolCommand::Pop { actor, reply }).await
    }

    pub async fn disconnect_worker(&self, worker: WorkerId) -> Result<bool, PoolError> {
        self.request(|reply| PoolCommand::Disconnect { worker, reply })
            .await?
    }

    pub async fn stats(&self) -> Result<PoolStats, PoolError> {
        self.request(|reply| PoolCommand::Stats { reply }).await
    }

    /// Ask the service to stop; it terminates all workers on the way out
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Whether the service has exited
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}
