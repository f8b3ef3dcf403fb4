//! Arena of registered workers

use std::collections::HashMap;

use crate::types::{ConnectionId, Pid, Worker, WorkerId, WorkerRegistration};

/// Every connected worker, idle or busy
///
/// The arena is the only owner of [`Worker`] records. Other indexes and
/// callers hold [`WorkerId`]s.
#[derive(Debug, Default)]
pub(crate) struct RegisteredSet {
    workers: HashMap<WorkerId, Worker>,
    by_connection: HashMap<ConnectionId, WorkerId>,
    next_id: u64,
}

impl RegisteredSet {
    /// Insert a worker; `None` if the connection already has one
    pub(crate) fn insert(&mut self, registration: WorkerRegistration) -> Option<WorkerId> {
        if self.by_connection.contains_key(&registration.connection) {
            return None;
        }
        self.next_id += 1;
        let id = WorkerId(self.next_id);
        self.by_connection.insert(registration.connection, id);
        self.workers.insert(id, Worker::new(id, registration));
        Some(id)
    }

    pub(crate) fn remove(&mut self, id: WorkerId) -> Option<Worker> {
        let worker = self.workers.remove(&id)?;
        self.by_connection.remove(&worker.connection());
        Some(worker)
    }

    pub(crate) fn get(&self, id: WorkerId) -> Option<&Worker> {
        self.workers.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: WorkerId) -> Option<&mut Worker> {
        self.workers.get_mut(&id)
    }

    pub(crate) fn by_connection(&self, connection: ConnectionId) -> Option<&Worker> {
        self.by_connection
            .get(&connection)
            .and_then(|id| self.workers.get(id))
    }

    pub(crate) fn contains_pid(&self, pid: Pid) -> bool {
        self.workers.values().any(|w| w.pid() == pid)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Worker> {
        self.workers.values()
    }

    pub(crate) fn connections(&self) -> impl Iterator<Item = (ConnectionId, WorkerId)> + '_ {
        self.by_connection.iter().map(|(c, id)| (*c, *id))
    }

    pub(crate) fn len(&self) -> usize {
        self.workers.len()
    }

    /// Drop every worker; ids keep increasing afterwards
    pub(crate) fn clear(&mut self) {
        self.workers.clear();
        self.by_connection.clear();
    }
}
