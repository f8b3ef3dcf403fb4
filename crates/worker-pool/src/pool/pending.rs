//! Processes launched but not yet registered

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::types::Pid;

/// Pids of launched workers awaiting registration, with their launch time
///
/// Advisory only: it throttles redundant launches, it does not gate
/// registration.
#[derive(Debug, Default)]
pub(crate) struct PendingStartSet {
    started: HashMap<Pid, DateTime<Utc>>,
}

impl PendingStartSet {
    /// Record a launch; `false` if the pid was already pending
    pub(crate) fn insert(&mut self, pid: Pid, started_at: DateTime<Utc>) -> bool {
        if self.started.contains_key(&pid) {
            return false;
        }
        self.started.insert(pid, started_at);
        true
    }

    pub(crate) fn remove(&mut self, pid: Pid) -> bool {
        self.started.remove(&pid).is_some()
    }

    pub(crate) fn started_at(&self, pid: Pid) -> Option<DateTime<Utc>> {
        self.started.get(&pid).copied()
    }

    /// Pids launched strictly before `cutoff`, oldest first
    pub(crate) fn started_before(&self, cutoff: DateTime<Utc>) -> Vec<Pid> {
        let mut stale: Vec<(DateTime<Utc>, Pid)> = self
            .started
            .iter()
            .filter(|(_, at)| **at < cutoff)
            .map(|(pid, at)| (*at, *pid))
            .collect();
        stale.sort();
        stale.into_iter().map(|(_, pid)| pid).collect()
    }

    pub(crate) fn pids(&self) -> impl Iterator<Item = Pid> + '_ {
        self.started.keys().copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.started.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.started.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.started.clear();
    }
}
