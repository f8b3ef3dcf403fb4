//! Worker pool bookkeeping
//!
//! This module provides [`WorkerPool`], the single-writer core that owns:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        WorkerPool                            │
//! │                                                              │
//! │  start_worker ──► ProcessLauncher ──► PendingStartSet        │
//! │                                            │ (join on pid)   │
//! │  register_worker ─────────────────────────►▼                 │
//! │                                     RegisteredSet (arena)    │
//! │                                       │            ▲         │
//! │                             push_worker│            │pop_worker
//! │                                       ▼            │         │
//! │                        ┌──────────────┴───────────┴──┐      │
//! │                        │ IdleQueue │ ActorIdleIndex  │      │
//! │                        └─────────────────────────────┘      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A worker's [`WorkerState`](crate::types::WorkerState) is stored on the
//! worker itself; the idle indexes are a cache of it, checked by
//! [`WorkerPool::validate`].

mod idle;
mod pending;
mod registry;
mod worker_pool;

pub use worker_pool::WorkerPool;
