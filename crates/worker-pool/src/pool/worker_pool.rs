//! The worker pool

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use super::idle::{ActorIdleIndex, IdleQueue};
use super::pending::PendingStartSet;
use super::registry::RegisteredSet;
use crate::config::{ActorSlotPolicy, WorkerPoolConfig};
use crate::error::PoolError;
use crate::launcher::ProcessLauncher;
use crate::types::{ActorId, ConnectionId, Pid, Worker, WorkerId, WorkerRegistration, WorkerState};

/// Pool of worker processes for one node
///
/// Workers are launched through a [`ProcessLauncher`], register later over
/// their own connection, and are then lent to the dispatcher with
/// [`pop_worker`](Self::pop_worker) and returned with
/// [`push_worker`](Self::push_worker).
///
/// The pool is driven from a single thread of control. Wrap it in a
/// [`SharedWorkerPool`](crate::SharedWorkerPool) or run it inside a
/// [`PoolService`](crate::PoolService) to use it from several tasks.
///
/// # Example
///
/// ```
/// use node_worker_pool::launcher::InMemoryLauncher;
/// use node_worker_pool::{ConnectionId, WorkerPool, WorkerPoolConfig, WorkerRegistration};
///
/// let config = WorkerPoolConfig::new(vec!["worker".to_string()]);
/// let mut pool = WorkerPool::lazy(config, InMemoryLauncher::starting_at(100))?;
///
/// let pid = pool.start_worker(false)?.unwrap();
/// let worker = pool.register_worker(WorkerRegistration::new(pid, ConnectionId(1)))?;
/// pool.push_worker(worker)?;
///
/// assert_eq!(pool.pop_worker(None), Some(worker));
/// assert_eq!(pool.pop_worker(None), None);
/// # Ok::<(), node_worker_pool::PoolError>(())
/// ```
pub struct WorkerPool {
    config: WorkerPoolConfig,
    launcher: Box<dyn ProcessLauncher>,
    pending: PendingStartSet,
    registered: RegisteredSet,
    idle: IdleQueue,
    actor_idle: ActorIdleIndex,
}

impl WorkerPool {
    /// Create a pool and start `config.num_workers` workers right away
    pub fn new(
        config: WorkerPoolConfig,
        launcher: impl ProcessLauncher + 'static,
    ) -> Result<Self, PoolError> {
        let num_workers = config.num_workers;
        let mut pool = Self::lazy(config, launcher)?;

        info!(num_workers, "Starting initial workers");
        for _ in 0..num_workers {
            pool.start_worker(true)?;
        }
        Ok(pool)
    }

    /// Create a pool with zero workers; `config.num_workers` is ignored
    pub fn lazy(
        config: WorkerPoolConfig,
        launcher: impl ProcessLauncher + 'static,
    ) -> Result<Self, PoolError> {
        config.validate()?;
        Ok(Self {
            config,
            launcher: Box::new(launcher),
            pending: PendingStartSet::default(),
            registered: RegisteredSet::default(),
            idle: IdleQueue::default(),
            actor_idle: ActorIdleIndex::default(),
        })
    }

    pub fn config(&self) -> &WorkerPoolConfig {
        &self.config
    }

    /// Launch a new worker process
    ///
    /// Unless `force_start` is set, nothing is launched while a previously
    /// launched worker has yet to register. Returns the pid of the launched
    /// process, or `None` when throttled. A launch failure is fatal for the
    /// node and is never retried here.
    ///
    /// A pid already held by a registered worker is not recorded as pending,
    /// so such a launch does not throttle later starts.
    pub fn start_worker(&mut self, force_start: bool) -> Result<Option<Pid>, PoolError> {
        if !force_start && !self.pending.is_empty() {
            debug!(
                pending = self.pending.len(),
                "Worker start throttled: a started worker has not registered yet"
            );
            return Ok(None);
        }

        let pid = match self.launcher.launch(&self.config.worker_command) {
            Ok(pid) => pid,
            Err(e) => {
                error!(command = ?self.config.worker_command, "Failed to start worker: {}", e);
                return Err(e.into());
            }
        };

        if self.registered.contains_pid(pid) {
            // The OS reused the pid of a worker whose disconnect has not
            // arrived yet; its registration will still be accepted.
            warn!(
                %pid,
                "Started worker reuses the pid of a registered worker; not tracked as pending"
            );
        } else if !self.pending.insert(pid, Utc::now()) {
            warn!(%pid, "Started worker reuses the pid of a pending worker");
        } else {
            info!(%pid, pending = self.pending.len(), "Started worker process");
        }
        self.debug_validate();
        Ok(Some(pid))
    }

    /// Register a worker that connected to the node agent
    ///
    /// The worker starts out busy; it becomes available once pushed. The pid
    /// is removed from the pending set if it was there, and accepted either
    /// way.
    pub fn register_worker(
        &mut self,
        registration: WorkerRegistration,
    ) -> Result<WorkerId, PoolError> {
        let pid = registration.pid;
        let connection = registration.connection;

        let id = match self.registered.insert(registration) {
            Some(id) => id,
            None => {
                warn!(%connection, %pid, "Rejected duplicate worker registration");
                return Err(PoolError::AlreadyRegistered(connection));
            }
        };

        if !self.pending.remove(pid) {
            debug!(%pid, "Registered worker was not started by this pool");
        }

        info!(worker = %id, %pid, %connection, "Registered worker");
        self.debug_validate();
        Ok(id)
    }

    /// Worker that registered over `connection`, if any
    pub fn registered_worker(&self, connection: ConnectionId) -> Option<&Worker> {
        self.registered.by_connection(connection)
    }

    /// Registered worker by handle
    pub fn worker(&self, id: WorkerId) -> Option<&Worker> {
        self.registered.get(id)
    }

    /// All registered workers, in no particular order
    pub fn workers(&self) -> impl Iterator<Item = &Worker> {
        self.registered.iter()
    }

    /// Bind a busy worker to an actor
    ///
    /// The binding is permanent: a worker bound to one actor cannot be moved
    /// to another. Binding again to the same actor does nothing.
    pub fn assign_actor(&mut self, id: WorkerId, actor: ActorId) -> Result<(), PoolError> {
        let worker = self
            .registered
            .get_mut(id)
            .ok_or(PoolError::NotRegistered(id))?;

        if worker.is_idle() {
            warn!(worker = %id, "Cannot bind an idle worker to an actor");
            return Err(PoolError::WorkerIdle(id));
        }
        match worker.actor_id() {
            Some(existing) if existing == actor => return Ok(()),
            Some(existing) => {
                warn!(worker = %id, %existing, requested = %actor, "Worker already bound to an actor");
                return Err(PoolError::ActorAlreadyAssigned {
                    worker: id,
                    actor: existing,
                });
            }
            None => worker.set_actor_id(actor),
        }

        debug!(worker = %id, %actor, "Bound worker to actor");
        Ok(())
    }

    /// Return a worker to the pool
    ///
    /// Generic workers go to the idle queue, actor workers to their actor's
    /// slot. When the slot is taken the configured [`ActorSlotPolicy`]
    /// applies; with [`ActorSlotPolicy::Replace`] the displaced worker is
    /// marked busy and returned so the caller can dispose of it.
    pub fn push_worker(&mut self, id: WorkerId) -> Result<Option<WorkerId>, PoolError> {
        let worker = self.registered.get(id).ok_or_else(|| {
            warn!(worker = %id, "Push of unregistered worker");
            PoolError::NotRegistered(id)
        })?;

        if worker.is_idle() {
            warn!(worker = %id, state = %worker.state(), "Worker pushed twice");
            return Err(PoolError::AlreadyIdle(id));
        }

        let Some(actor) = worker.actor_id() else {
            self.idle.push(id);
            self.set_state(id, WorkerState::IdleGeneric);
            debug!(worker = %id, idle = self.idle.len(), "Worker idle");
            self.debug_validate();
            return Ok(None);
        };

        let displaced = match self.actor_idle.get(actor) {
            Some(occupant) => match self.config.actor_slot_policy {
                ActorSlotPolicy::Reject => {
                    warn!(worker = %id, %actor, %occupant, "Actor already has an idle worker");
                    return Err(PoolError::ActorSlotOccupied { actor, occupant });
                }
                ActorSlotPolicy::Replace => Some(occupant),
            },
            None => None,
        };

        self.actor_idle.insert(actor, id);
        self.set_state(id, WorkerState::IdleActor(actor));
        if let Some(occupant) = displaced {
            self.set_state(occupant, WorkerState::Busy);
            warn!(worker = %id, %actor, displaced = %occupant, "Replaced idle actor worker");
        }

        debug!(worker = %id, %actor, "Actor worker idle");
        self.debug_validate();
        Ok(displaced)
    }

    /// Borrow an idle worker
    ///
    /// With `None`, any idle generic worker is returned. With an actor, only
    /// the worker idling for that actor is. The worker stays registered and
    /// must be pushed back or disconnected by the caller.
    pub fn pop_worker(&mut self, actor: Option<ActorId>) -> Option<WorkerId> {
        let id = match actor {
            None => self.idle.pop()?,
            Some(actor) => self.actor_idle.take(actor)?,
        };

        self.set_state(id, WorkerState::Busy);
        debug!(worker = %id, actor = ?actor, "Worker popped");
        self.debug_validate();
        Some(id)
    }

    /// Remove a registered worker from every index
    ///
    /// Returns whether the worker was idle, i.e. `false` means it may have
    /// been running a task when its connection went away.
    pub fn disconnect_worker(&mut self, id: WorkerId) -> Result<bool, PoolError> {
        let worker = self.registered.remove(id).ok_or_else(|| {
            warn!(worker = %id, "Disconnect of unregistered worker");
            PoolError::NotRegistered(id)
        })?;

        let was_idle = match worker.state() {
            WorkerState::Busy => false,
            WorkerState::IdleGeneric => self.idle.remove(id),
            WorkerState::IdleActor(actor) => self.actor_idle.remove(actor, id),
        };

        info!(worker = %id, pid = %worker.pid(), was_idle, "Disconnected worker");
        self.debug_validate();
        Ok(was_idle)
    }

    /// Disconnect the worker registered over `connection`
    pub fn disconnect_connection(
        &mut self,
        connection: ConnectionId,
    ) -> Result<(WorkerId, bool), PoolError> {
        let id = self
            .registered
            .by_connection(connection)
            .map(Worker::id)
            .ok_or(PoolError::UnknownConnection(connection))?;
        let was_idle = self.disconnect_worker(id)?;
        Ok((id, was_idle))
    }

    /// Number of registered workers, idle or busy
    ///
    /// Launched processes that have not registered are not counted.
    pub fn size(&self) -> usize {
        self.registered.len()
    }

    /// Number of idle generic workers
    pub fn num_idle_workers(&self) -> usize {
        self.idle.len()
    }

    /// Number of idle actor workers
    pub fn num_idle_actor_workers(&self) -> usize {
        self.actor_idle.len()
    }

    /// Number of launched workers that have not registered yet
    pub fn num_started_workers(&self) -> usize {
        self.pending.len()
    }

    /// Record `pid` as launched without going through the launcher
    ///
    /// Returns `false` if the pid is already pending or registered.
    pub fn add_started_worker(&mut self, pid: Pid) -> bool {
        if self.registered.contains_pid(pid) {
            return false;
        }
        let added = self.pending.insert(pid, Utc::now());
        self.debug_validate();
        added
    }

    /// When `pid` was recorded as launched, if it is still pending
    pub fn started_at(&self, pid: Pid) -> Option<DateTime<Utc>> {
        self.pending.started_at(pid)
    }

    /// Pending pids launched before `cutoff`, oldest first
    ///
    /// The pool never expires pending entries itself; callers use this to
    /// find workers that will likely never register.
    pub fn started_workers_before(&self, cutoff: DateTime<Utc>) -> Vec<Pid> {
        self.pending.started_before(cutoff)
    }

    /// Forget a pending pid; `false` if it was not pending
    pub fn remove_started_worker(&mut self, pid: Pid) -> bool {
        let removed = self.pending.remove(pid);
        if removed {
            debug!(%pid, "Forgot started worker");
        }
        removed
    }

    /// Terminate every worker process and empty the pool
    ///
    /// Terminates pending and registered workers through the launcher and
    /// returns how many terminations failed. Safe to call more than once.
    pub fn shutdown(&mut self) -> usize {
        let mut pids: Vec<Pid> = self.pending.pids().collect();
        pids.extend(self.registered.iter().map(Worker::pid));
        if pids.is_empty() {
            return 0;
        }
        pids.sort();
        pids.dedup();

        let mut failures = 0;
        for pid in &pids {
            if let Err(e) = self.launcher.terminate(*pid) {
                warn!(%pid, "Failed to terminate worker: {}", e);
                failures += 1;
            }
        }

        self.pending.clear();
        self.registered.clear();
        self.idle.clear();
        self.actor_idle.clear();

        info!(terminated = pids.len() - failures, failures, "Worker pool shut down");
        failures
    }

    /// Check that the idle indexes agree with the stored worker states
    ///
    /// Returns the first inconsistency found.
    pub fn validate(&self) -> Result<(), PoolError> {
        for (connection, id) in self.registered.connections() {
            match self.registered.get(id) {
                Some(w) if w.connection() == connection => {}
                _ => {
                    return Err(PoolError::Corrupted(format!(
                        "connection {} maps to {} which is not registered on it",
                        connection, id
                    )))
                }
            }
        }

        for pid in self.pending.pids() {
            if self.registered.contains_pid(pid) {
                return Err(PoolError::Corrupted(format!(
                    "pid {} is both pending and registered",
                    pid
                )));
            }
        }

        let mut queued = std::collections::HashSet::new();
        for id in self.idle.iter() {
            if !queued.insert(id) {
                return Err(PoolError::Corrupted(format!("{} queued twice", id)));
            }
            match self.registered.get(id).map(Worker::state) {
                Some(WorkerState::IdleGeneric) => {}
                state => {
                    return Err(PoolError::Corrupted(format!(
                        "{} is in the idle queue with state {:?}",
                        id, state
                    )))
                }
            }
        }

        for (actor, id) in self.actor_idle.iter() {
            if queued.contains(&id) {
                return Err(PoolError::Corrupted(format!(
                    "{} is in both idle indexes",
                    id
                )));
            }
            match self.registered.get(id) {
                Some(w)
                    if w.state() == WorkerState::IdleActor(actor)
                        && w.actor_id() == Some(actor) => {}
                _ => {
                    return Err(PoolError::Corrupted(format!(
                        "{} holds the idle slot of actor {} without idling for it",
                        id, actor
                    )))
                }
            }
        }

        for worker in self.registered.iter() {
            let indexed = match worker.state() {
                WorkerState::Busy => true,
                WorkerState::IdleGeneric => queued.contains(&worker.id()),
                WorkerState::IdleActor(actor) => self.actor_idle.get(actor) == Some(worker.id()),
            };
            if !indexed {
                return Err(PoolError::Corrupted(format!(
                    "{} is {} but missing from its idle index",
                    worker.id(),
                    worker.state()
                )));
            }
        }

        Ok(())
    }

    fn set_state(&mut self, id: WorkerId, state: WorkerState) {
        if let Some(worker) = self.registered.get_mut(id) {
            worker.set_state(state);
        }
    }

    fn debug_validate(&self) {
        debug_assert_eq!(self.validate().map_err(|e| e.to_string()), Ok(()));
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
