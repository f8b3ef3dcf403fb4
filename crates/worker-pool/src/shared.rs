//! Lock-guarded pool for multi-threaded hosts

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::PoolError;
use crate::event::{EventOutcome, PoolEvent};
use crate::pool::WorkerPool;
use crate::types::{ActorId, ConnectionId, Pid, Worker, WorkerId, WorkerRegistration};

/// A [`WorkerPool`] behind a single exclusive lock
///
/// The pool's invariants span several collections, so every method takes the
/// lock exactly once for its whole duration. Lookups return owned copies of
/// the worker record.
#[derive(Clone)]
pub struct SharedWorkerPool {
    inner: Arc<Mutex<WorkerPool>>,
}

impl SharedWorkerPool {
    pub fn new(pool: WorkerPool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(pool)),
        }
    }

    /// Run several operations under one lock acquisition
    pub fn with<R>(&self, f: impl FnOnce(&mut WorkerPool) -> R) -> R {
        f(&mut *self.inner.lock())
    }

    pub fn start_worker(&self, force_start: bool) -> Result<Option<Pid>, PoolError> {
        self.inner.lock().start_worker(force_start)
    }

    pub fn register_worker(&self, registration: WorkerRegistration) -> Result<WorkerId, PoolError> {
        self.inner.lock().register_worker(registration)
    }

    pub fn registered_worker(&self, connection: ConnectionId) -> Option<Worker> {
        self.inner.lock().registered_worker(connection).cloned()
    }

    pub fn worker(&self, id: WorkerId) -> Option<Worker> {
        self.inner.lock().worker(id).cloned()
    }

    pub fn assign_actor(&self, id: WorkerId, actor: ActorId) -> Result<(), PoolError> {
        self.inner.lock().assign_actor(id, actor)
    }

    pub fn push_worker(&self, id: WorkerId) -> Result<Option<WorkerId>, PoolError> {
        self.inner.lock().push_worker(id)
    }

    pub fn pop_worker(&self, actor: Option<ActorId>) -> Option<WorkerId> {
        self.inner.lock().pop_worker(actor)
    }

    pub fn disconnect_worker(&self, id: WorkerId) -> Result<bool, PoolError> {
        self.inner.lock().disconnect_worker(id)
    }

    pub fn disconnect_connection(
        &self,
        connection: ConnectionId,
    ) -> Result<(WorkerId, bool), PoolError> {
        self.inner.lock().disconnect_connection(connection)
    }

    pub fn add_started_worker(&self, pid: Pid) -> bool {
        self.inner.lock().add_started_worker(pid)
    }

    pub fn apply(&self, event: PoolEvent) -> Result<EventOutcome, PoolError> {
        self.inner.lock().apply(event)
    }

    pub fn size(&self) -> usize {
        self.inner.lock().size()
    }

    pub fn num_idle_workers(&self) -> usize {
        self.inner.lock().num_idle_workers()
    }

    pub fn num_idle_actor_workers(&self) -> usize {
        self.inner.lock().num_idle_actor_workers()
    }

    pub fn num_started_workers(&self) -> usize {
        self.inner.lock().num_started_workers()
    }

    pub fn shutdown(&self) -> usize {
        self.inner.lock().shutdown()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::launcher::InMemoryLauncher;
    use crate::WorkerPoolConfig;

    fn shared_pool() -> SharedWorkerPool {
        let pool = WorkerPool::lazy(
            WorkerPoolConfig::new(vec!["worker".to_string()]),
            InMemoryLauncher::new(),
        )
        .unwrap();
        SharedWorkerPool::new(pool)
    }

    #[test]
    fn test_connection_lifecycle() {
        let pool = shared_pool();
        assert!(pool.add_started_worker(Pid(5)));
        assert_eq!(pool.num_started_workers(), 1);

        let actor = ActorId::new();
        let generic = pool
            .register_worker(WorkerRegistration::new(5, ConnectionId(1)))
            .unwrap();
        let bound = pool
            .register_worker(WorkerRegistration::new(6, ConnectionId(2)).with_actor(actor))
            .unwrap();
        assert_eq!(pool.num_started_workers(), 0);

        pool.push_worker(generic).unwrap();
        pool.push_worker(bound).unwrap();
        assert_eq!(pool.num_idle_workers(), 1);
        assert_eq!(pool.num_idle_actor_workers(), 1);

        assert_eq!(pool.disconnect_connection(ConnectionId(2)).unwrap(), (bound, true));
        assert_eq!(pool.num_idle_actor_workers(), 0);
        assert!(matches!(
            pool.disconnect_connection(ConnectionId(2)),
            Err(PoolError::UnknownConnection(ConnectionId(2)))
        ));
        assert_eq!(pool.size(), 1);
    }

    #[test]
    fn test_concurrent_pop_never_double_books() {
        let pool = shared_pool();
        for pid in 0..32u32 {
            let id = pool
                .register_worker(WorkerRegistration::new(pid, ConnectionId(pid as u64)))
                .unwrap();
            pool.push_worker(id).unwrap();
        }

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                thread::spawn(move || {
                    let mut popped = Vec::new();
                    while let Some(id) = pool.pop_worker(None) {
                        popped.push(id);
                    }
                    popped
                })
            })
            .collect();

        let mut all: Vec<WorkerId> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort();
        all.dedup();

        assert_eq!(all.len(), 32);
        assert_eq!(pool.size(), 32);
        assert!(pool.with(|p| p.validate()).is_ok());
    }

    #[test]
    fn test_concurrent_borrow_and_return() {
        let pool = shared_pool();
        for pid in 0..4u32 {
            let id = pool
                .register_worker(WorkerRegistration::new(pid, ConnectionId(pid as u64)))
                .unwrap();
            pool.push_worker(id).unwrap();
        }

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pool = pool.clone();
                thread::spawn(move || {
                    for _ in 0..200 {
                        if let Some(id) = pool.pop_worker(None) {
                            assert!(!pool.worker(id).unwrap().is_idle());
                            pool.push_worker(id).unwrap();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(pool.with(|p| p.num_idle_workers()), 4);
        assert!(pool.with(|p| p.validate()).is_ok());
    }

    #[test]
    fn test_lookup_returns_copy() {
        let pool = shared_pool();
        let id = pool
            .register_worker(WorkerRegistration::new(1, ConnectionId(1)))
            .unwrap();

        let worker = pool.registered_worker(ConnectionId(1)).unwrap();
        assert_eq!(worker.id(), id);
        assert!(pool.disconnect_worker(id).is_ok());
        assert!(pool.registered_worker(ConnectionId(1)).is_none());
        assert_eq!(pool.shutdown(), 0);
    }
}
