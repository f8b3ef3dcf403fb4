//! # Node Worker Pool
//!
//! Node-local manager of worker processes for a distributed task engine.
//!
//! ## Features
//!
//! - **Throttled launches**: a new worker is only launched while no earlier
//!   launch is still waiting to register, unless forced
//! - **Launch/registration join**: pending pids are reconciled with
//!   registrations that may arrive in any order
//! - **Actor affinity**: idle workers bound to an actor are only lent out for
//!   that actor
//! - **No double booking**: a worker is in at most one idle index, and never
//!   idle while lent out
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │           PoolService / SharedWorkerPool                     │
//! │  (single writer: async command loop, or one exclusive lock) │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        WorkerPool                            │
//! │  (pending pids, registered arena, idle queue, actor index)  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ProcessLauncher                          │
//! │  (CommandLauncher for real processes, InMemoryLauncher)     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use node_worker_pool::prelude::*;
//!
//! let config = WorkerPoolConfig::new(vec!["worker".to_string()]);
//! let mut pool = WorkerPool::lazy(config, InMemoryLauncher::starting_at(100))?;
//!
//! let pid = pool.start_worker(false)?.unwrap();
//! assert_eq!((pool.num_started_workers(), pool.size()), (1, 0));
//!
//! let worker = pool.register_worker(WorkerRegistration::new(pid, ConnectionId(1)))?;
//! assert_eq!((pool.num_started_workers(), pool.size()), (0, 1));
//!
//! pool.push_worker(worker)?;
//! assert_eq!(pool.pop_worker(None), Some(worker));
//! assert_eq!(pool.pop_worker(None), None);
//!
//! assert!(!pool.disconnect_worker(worker)?);
//! assert_eq!(pool.size(), 0);
//! # Ok::<(), PoolError>(())
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod launcher;
pub mod pool;
pub mod service;
pub mod shared;
pub mod types;

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::{ActorSlotPolicy, WorkerPoolConfig};
    pub use crate::error::{LaunchError, PoolError};
    pub use crate::event::{EventOutcome, PoolEvent};
    pub use crate::launcher::{CommandLauncher, InMemoryLauncher, ProcessLauncher};
    pub use crate::pool::WorkerPool;
    pub use crate::service::{PoolHandle, PoolService, PoolStats};
    pub use crate::shared::SharedWorkerPool;
    pub use crate::types::{
        ActorId, ConnectionId, Pid, Worker, WorkerId, WorkerRegistration, WorkerState,
    };
}

// Re-export key types at crate root
pub use config::{ActorSlotPolicy, WorkerPoolConfig};
pub use error::{ConfigError, LaunchError, PoolError};
pub use event::{EventOutcome, PoolEvent};
pub use pool::WorkerPool;
pub use service::{PoolCommand, PoolHandle, PoolService, PoolStats};
pub use shared::SharedWorkerPool;
pub use types::{ActorId, ConnectionId, Pid, Worker, WorkerId, WorkerRegistration, WorkerState};
