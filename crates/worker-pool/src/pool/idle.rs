//! Idle worker indexes

use std::collections::HashMap;

use crate::types::{ActorId, WorkerId};

/// Idle workers without actor affinity
///
/// Served LIFO: the most recently returned worker is lent out first.
#[derive(Debug, Default)]
pub(crate) struct IdleQueue {
    workers: Vec<WorkerId>,
}

impl IdleQueue {
    pub(crate) fn push(&mut self, id: WorkerId) {
        self.workers.push(id);
    }

    pub(crate) fn pop(&mut self) -> Option<WorkerId> {
        self.workers.pop()
    }

    /// Remove a specific worker; `false` if it was not queued
    pub(crate) fn remove(&mut self, id: WorkerId) -> bool {
        match self.workers.iter().position(|w| *w == id) {
            Some(pos) => {
                self.workers.remove(pos);
                true
            }
            None => false,
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = WorkerId> + '_ {
        self.workers.iter().copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.workers.len()
    }

    pub(crate) fn clear(&mut self) {
        self.workers.clear();
    }
}

/// Idle workers keyed by the actor they serve, one per actor
#[derive(Debug, Default)]
pub(crate) struct ActorIdleIndex {
    workers: HashMap<ActorId, WorkerId>,
}

impl ActorIdleIndex {
    pub(crate) fn get(&self, actor: ActorId) -> Option<WorkerId> {
        self.workers.get(&actor).copied()
    }

    /// Put `id` in the actor's slot, returning the previous occupant
    pub(crate) fn insert(&mut self, actor: ActorId, id: WorkerId) -> Option<WorkerId> {
        self.workers.insert(actor, id)
    }

    pub(crate) fn take(&mut self, actor: ActorId) -> Option<WorkerId> {
        self.workers.remove(&actor)
    }

    /// Clear the actor's slot only if `id` holds it
    pub(crate) fn remove(&mut self, actor: ActorId, id: WorkerId) -> bool {
        if self.get(actor) == Some(id) {
            self.workers.remove(&actor);
            true
        } else {
            false
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (ActorId, WorkerId)> + '_ {
        self.workers.iter().map(|(a, w)| (*a, *w))
    }

    pub(crate) fn len(&self) -> usize {
        self.workers.len()
    }

    pub(crate) fn clear(&mut self) {
        self.workers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_queue_is_lifo() {
        let mut queue = IdleQueue::default();
        queue.push(WorkerId(1));
        queue.push(WorkerId(2));

        assert_eq!(queue.pop(), Some(WorkerId(2)));
        assert_eq!(queue.pop(), Some(WorkerId(1)));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_idle_queue_remove() {
        let mut queue = IdleQueue::default();
        queue.push(WorkerId(1));
        queue.push(WorkerId(2));

        assert!(queue.remove(WorkerId(1)));
        assert!(!queue.remove(WorkerId(1)));
        assert_eq!(queue.iter().collect::<Vec<_>>(), vec![WorkerId(2)]);
    }

    #[test]
    fn test_actor_index_remove_checks_occupant() {
        let mut index = ActorIdleIndex::default();
        let actor = ActorId::new();
        index.insert(actor, WorkerId(1));

        assert!(!index.remove(actor, WorkerId(2)));
        assert_eq!(index.get(actor), Some(WorkerId(1)));
        assert!(index.remove(actor, WorkerId(1)));
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn test_actor_index_insert_returns_previous() {
        let mut index = ActorIdleIndex::default();
        let actor = ActorId::new();

        assert_eq!(index.insert(actor, WorkerId(1)), None);
        assert_eq!(index.insert(actor, WorkerId(2)), Some(WorkerId(1)));
        assert_eq!(index.take(actor), Some(WorkerId(2)));
        assert_eq!(index.take(actor), None);
    }
}
