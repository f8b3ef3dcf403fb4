//! Worker pool configuration

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// What to do when an actor worker is pushed while another worker already
/// idles for the same actor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorSlotPolicy {
    /// Refuse the push; nothing changes
    #[default]
    Reject,
    /// The pushed worker takes the slot and the previous occupant becomes busy
    Replace,
}

impl std::str::FromStr for ActorSlotPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "replace" => Ok(Self::Replace),
            other => Err(ConfigError::InvalidValue {
                key: "actor_slot_policy".to_string(),
                message: format!("expected `reject` or `replace`, got `{}`", other),
            }),
        }
    }
}

impl std::fmt::Display for ActorSlotPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reject => write!(f, "reject"),
            Self::Replace => write!(f, "replace"),
        }
    }
}

/// Worker pool configuration
///
/// # Example
///
/// ```
/// use node_worker_pool::{ActorSlotPolicy, WorkerPoolConfig};
///
/// let config = WorkerPoolConfig::new(vec!["python".into(), "worker.py".into()])
///     .with_num_workers(4)
///     .with_actor_slot_policy(ActorSlotPolicy::Replace);
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerPoolConfig {
    /// Number of workers to start eagerly on construction
    pub num_workers: usize,

    /// Command used to launch a worker process (program followed by args)
    pub worker_command: Vec<String>,

    /// Behaviour when an actor's idle slot is already taken
    pub actor_slot_policy: ActorSlotPolicy,

    /// Capacity of the command channel of the async pool service
    pub command_queue_capacity: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            num_workers: 0,
            worker_command: vec![],
            actor_slot_policy: ActorSlotPolicy::default(),
            command_queue_capacity: 256,
        }
    }
}

impl WorkerPoolConfig {
    /// Create a configuration that launches workers with `worker_command`
    pub fn new(worker_command: Vec<String>) -> Self {
        Self {
            worker_command,
            ..Default::default()
        }
    }

    /// Build a configuration from environment variables
    ///
    /// - `WORKER_POOL_NUM_WORKERS`: workers started eagerly (default: 0)
    /// - `WORKER_POOL_COMMAND`: whitespace separated launch command
    /// - `WORKER_POOL_ACTOR_SLOT_POLICY`: `reject` or `replace` (default: reject)
    /// - `WORKER_POOL_QUEUE_CAPACITY`: service command queue size (default: 256)
    ///
    /// Values that fail to parse fall back to their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let num_workers = std::env::var("WORKER_POOL_NUM_WORKERS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.num_workers);

        let worker_command = std::env::var("WORKER_POOL_COMMAND")
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let actor_slot_policy = std::env::var("WORKER_POOL_ACTOR_SLOT_POLICY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.actor_slot_policy);

        let command_queue_capacity = std::env::var("WORKER_POOL_QUEUE_CAPACITY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.command_queue_capacity);

        Self {
            num_workers,
            worker_command,
            actor_slot_policy,
            command_queue_capacity,
        }
    }

    /// Set the number of eagerly started workers
    pub fn with_num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    /// Set the actor slot policy
    pub fn with_actor_slot_policy(mut self, policy: ActorSlotPolicy) -> Self {
        self.actor_slot_policy = policy;
        self
    }

    /// Set the service command queue capacity
    pub fn with_command_queue_capacity(mut self, capacity: usize) -> Self {
        self.command_queue_capacity = capacity;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.worker_command.first() {
            Some(program) if !program.trim().is_empty() => {}
            _ => {
                return Err(ConfigError::InvalidValue {
                    key: "worker_command".into(),
                    message: "must name a program".into(),
                })
            }
        }
        if self.command_queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "command_queue_capacity".into(),
                message: "must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WorkerPoolConfig::default();
        assert_eq!(config.num_workers, 0);
        assert!(config.worker_command.is_empty());
        assert_eq!(config.actor_slot_policy, ActorSlotPolicy::Reject);
        assert_eq!(config.command_queue_capacity, 256);
    }

    #[test]
    fn test_config_builder() {
        let config = WorkerPoolConfig::new(vec!["worker".into(), "--node".into()])
            .with_num_workers(3)
            .with_actor_slot_policy(ActorSlotPolicy::Replace)
            .with_command_queue_capacity(16);

        assert_eq!(config.worker_command, vec!["worker", "--node"]);
        assert_eq!(config.num_workers, 3);
        assert_eq!(config.actor_slot_policy, ActorSlotPolicy::Replace);
        assert_eq!(config.command_queue_capacity, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        assert!(WorkerPoolConfig::default().validate().is_err());
        assert!(WorkerPoolConfig::new(vec!["  ".into()]).validate().is_err());
        assert!(WorkerPoolConfig::new(vec!["worker".into()])
            .with_command_queue_capacity(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_actor_slot_policy_parse() {
        assert_eq!("reject".parse::<ActorSlotPolicy>().unwrap(), ActorSlotPolicy::Reject);
        assert_eq!(" Replace ".parse::<ActorSlotPolicy>().unwrap(), ActorSlotPolicy::Replace);
        assert!("overwrite".parse::<ActorSlotPolicy>().is_err());
    }

    #[test]
    fn test_config_serde() {
        let config = WorkerPoolConfig::new(vec!["worker".into()])
            .with_actor_slot_policy(ActorSlotPolicy::Replace);
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["actor_slot_policy"], "replace");

        let back: WorkerPoolConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }
}
