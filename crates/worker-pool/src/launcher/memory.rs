//! In-memory launcher for testing

use std::sync::Arc;

use parking_lot::Mutex;

use super::ProcessLauncher;
use crate::error::LaunchError;
use crate::types::Pid;

/// A call made on an [`InMemoryLauncher`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LauncherCall {
    Launch { command: Vec<String>, pid: Pid },
    Terminate { pid: Pid },
}

struct LauncherState {
    next_pid: u32,
    calls: Vec<LauncherCall>,
    running: Vec<Pid>,
    fail_launches: bool,
}

/// In-memory implementation of [`ProcessLauncher`]
///
/// Hands out sequential pids without starting anything. Clones share state,
/// so a test can keep one clone and give the other to the pool.
///
/// # Example
///
/// ```
/// use node_worker_pool::launcher::{InMemoryLauncher, ProcessLauncher};
///
/// let launcher = InMemoryLauncher::starting_at(100);
/// let mut handle = launcher.clone();
/// let pid = handle.launch(&["worker".to_string()]).unwrap();
///
/// assert_eq!(pid.0, 100);
/// assert_eq!(launcher.launch_count(), 1);
/// ```
#[derive(Clone)]
pub struct InMemoryLauncher {
    state: Arc<Mutex<LauncherState>>,
}

impl InMemoryLauncher {
    /// Create a launcher whose first pid is 1000
    pub fn new() -> Self {
        Self::starting_at(1000)
    }

    /// Create a launcher whose first pid is `first_pid`
    pub fn starting_at(first_pid: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(LauncherState {
                next_pid: first_pid,
                calls: vec![],
                running: vec![],
                fail_launches: false,
            })),
        }
    }

    /// Make subsequent launches fail (or succeed again)
    pub fn set_fail_launches(&self, fail: bool) {
        self.state.lock().fail_launches = fail;
    }

    /// All calls made so far, in order
    pub fn calls(&self) -> Vec<LauncherCall> {
        self.state.lock().calls.clone()
    }

    /// Number of successful launches
    pub fn launch_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, LauncherCall::Launch { .. }))
            .count()
    }

    /// Pids launched and not yet terminated
    pub fn running(&self) -> Vec<Pid> {
        self.state.lock().running.clone()
    }

    /// Pids terminated so far, in order
    pub fn terminated(&self) -> Vec<Pid> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                LauncherCall::Terminate { pid } => Some(*pid),
                _ => None,
            })
            .collect()
    }
}

impl Default for InMemoryLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessLauncher for InMemoryLauncher {
    fn launch(&mut self, command: &[String]) -> Result<Pid, LaunchError> {
        if command.is_empty() {
            return Err(LaunchError::EmptyCommand);
        }
        let mut state = self.state.lock();
        if state.fail_launches {
            return Err(LaunchError::Rejected("launches disabled".into()));
        }
        let pid = Pid(state.next_pid);
        state.next_pid += 1;
        state.running.push(pid);
        state.calls.push(LauncherCall::Launch {
            command: command.to_vec(),
            pid,
        });
        Ok(pid)
    }

    fn terminate(&mut self, pid: Pid) -> Result<(), LaunchError> {
        let mut state = self.state.lock();
        let pos = state
            .running
            .iter()
            .position(|p| *p == pid)
            .ok_or(LaunchError::UnknownProcess(pid))?;
        state.running.remove(pos);
        state.calls.push(LauncherCall::Terminate { pid });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_pids() {
        let mut launcher = InMemoryLauncher::starting_at(10);
        let cmd = vec!["worker".to_string()];

        assert_eq!(launcher.launch(&cmd).unwrap(), Pid(10));
        assert_eq!(launcher.launch(&cmd).unwrap(), Pid(11));
        assert_eq!(launcher.running(), vec![Pid(10), Pid(11)]);
    }

    #[test]
    fn test_failure_injection() {
        let launcher = InMemoryLauncher::new();
        let mut handle = launcher.clone();
        launcher.set_fail_launches(true);

        let err = handle.launch(&["worker".to_string()]).unwrap_err();
        assert!(matches!(err, LaunchError::Rejected(_)));
        assert_eq!(launcher.launch_count(), 0);

        launcher.set_fail_launches(false);
        assert!(handle.launch(&["worker".to_string()]).is_ok());
    }

    #[test]
    fn test_terminate_records_call() {
        let mut launcher = InMemoryLauncher::starting_at(5);
        let pid = launcher.launch(&["worker".to_string()]).unwrap();

        launcher.terminate(pid).unwrap();
        assert!(launcher.running().is_empty());
        assert_eq!(launcher.terminated(), vec![pid]);
        assert!(matches!(
            launcher.terminate(pid),
            Err(LaunchError::UnknownProcess(_))
        ));
    }
}
