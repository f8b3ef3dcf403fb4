//! Identifiers and worker records
//!
//! Every cross-index reference in the pool is one of the small `Copy` ids
//! defined here. Workers themselves live in a single arena and are addressed
//! by [`WorkerId`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Operating system process identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pid(pub u32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Pid {
    fn from(pid: u32) -> Self {
        Self(pid)
    }
}

/// Identity of a connection owned by the connection layer
///
/// The pool never dereferences a connection; it only uses the id to find
/// the worker that registered over it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Identity of a long-lived actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub Uuid);

impl ActorId {
    /// Generate a new time-ordered actor id
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable handle of a registered worker
///
/// Allocated by the pool on registration and never reused by the same pool,
/// so a stale handle held after disconnect can only miss, never alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub u64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Lifecycle state of a registered worker
///
/// Disconnected workers are removed from the arena, so there is no
/// `Disconnected` variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "actor_id")]
pub enum WorkerState {
    /// Registered and lent out (or not yet pushed after registration)
    Busy,
    /// Idle in the generic queue
    IdleGeneric,
    /// Idle in the actor index under the given actor
    IdleActor(ActorId),
}

impl WorkerState {
    /// Whether the worker can currently be popped
    pub fn is_idle(&self) -> bool {
        !matches!(self, Self::Busy)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "busy"),
            Self::IdleGeneric => write!(f, "idle"),
            Self::IdleActor(actor) => write!(f, "idle(actor {})", actor),
        }
    }
}

/// What a worker process reports when it registers with the node agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRegistration {
    /// Process id of the registering worker
    pub pid: Pid,
    /// Connection the worker registered over
    pub connection: ConnectionId,
    /// Actor the worker is already bound to, if any
    pub actor_id: Option<ActorId>,
}

impl WorkerRegistration {
    /// Registration of a generic worker
    pub fn new(pid: impl Into<Pid>, connection: ConnectionId) -> Self {
        Self {
            pid: pid.into(),
            connection,
            actor_id: None,
        }
    }

    /// Bind the registration to an actor
    pub fn with_actor(mut self, actor_id: ActorId) -> Self {
        self.actor_id = Some(actor_id);
        self
    }
}

/// A registered worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    id: WorkerId,
    pid: Pid,
    connection: ConnectionId,
    actor_id: Option<ActorId>,
    state: WorkerState,
    registered_at: DateTime<Utc>,
}

impl Worker {
    pub(crate) fn new(id: WorkerId, registration: WorkerRegistration) -> Self {
        Self {
            id,
            pid: registration.pid,
            connection: registration.connection,
            actor_id: registration.actor_id,
            state: WorkerState::Busy,
            registered_at: Utc::now(),
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    /// Actor this worker is bound to (`None` for generic workers)
    pub fn actor_id(&self) -> Option<ActorId> {
        self.actor_id
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    pub fn is_idle(&self) -> bool {
        self.state.is_idle()
    }

    pub(crate) fn set_state(&mut self, state: WorkerState) {
        self.state = state;
    }

    pub(crate) fn set_actor_id(&mut self, actor_id: ActorId) {
        self.actor_id = Some(actor_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_builder() {
        let actor = ActorId::new();
        let registration = WorkerRegistration::new(42, ConnectionId(7)).with_actor(actor);

        assert_eq!(registration.pid, Pid(42));
        assert_eq!(registration.connection, ConnectionId(7));
        assert_eq!(registration.actor_id, Some(actor));
    }

    #[test]
    fn test_new_worker_starts_busy() {
        let worker = Worker::new(WorkerId(1), WorkerRegistration::new(42, ConnectionId(7)));
        assert_eq!(worker.state(), WorkerState::Busy);
        assert!(!worker.is_idle());
        assert!(worker.actor_id().is_none());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(WorkerState::Busy.to_string(), "busy");
        assert_eq!(WorkerState::IdleGeneric.to_string(), "idle");
        assert!(WorkerState::IdleActor(ActorId::new())
            .to_string()
            .starts_with("idle(actor "));
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_value(WorkerState::IdleGeneric).unwrap();
        assert_eq!(json, serde_json::json!({"state": "idle_generic"}));

        let actor = ActorId::new();
        let json = serde_json::to_value(WorkerState::IdleActor(actor)).unwrap();
        assert_eq!(json["state"], "idle_actor");
        assert_eq!(json["actor_id"], actor.0.to_string());
    }
}
