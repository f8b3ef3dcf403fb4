//! Process launcher backed by `std::process::Command`

use std::collections::HashMap;
use std::process::{Child, Command, Stdio};

use tracing::{debug, warn};

use super::ProcessLauncher;
use crate::error::LaunchError;
use crate::types::Pid;

/// Launches worker processes as children of the current process
///
/// Children are kept until they are terminated or reaped so that exited
/// workers never linger as zombies.
#[derive(Debug, Default)]
pub struct CommandLauncher {
    env: Vec<(String, String)>,
    children: HashMap<Pid, Child>,
}

impl CommandLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an environment variable passed to every launched worker
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Number of children that have not been terminated or reaped
    pub fn num_children(&self) -> usize {
        self.children.len()
    }

    /// Collect children that exited on their own
    ///
    /// Returns their pids. Exits are not reported to the pool; the caller
    /// decides whether a reaped pid that never registered is stale.
    pub fn reap_exited(&mut self) -> Vec<Pid> {
        let mut exited = Vec::new();
        self.children.retain(|pid, child| match child.try_wait() {
            Ok(Some(status)) => {
                debug!(%pid, %status, "Worker process exited");
                exited.push(*pid);
                false
            }
            Ok(None) => true,
            Err(e) => {
                warn!(%pid, "Failed to poll worker process: {}", e);
                true
            }
        });
        exited.sort();
        exited
    }
}

impl ProcessLauncher for CommandLauncher {
    fn launch(&mut self, command: &[String]) -> Result<Pid, LaunchError> {
        let (program, args) = command.split_first().ok_or(LaunchError::EmptyCommand)?;

        let mut cmd = Command::new(program);
        cmd.args(args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::inherit());
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        let child = cmd.spawn().map_err(|source| LaunchError::Spawn {
            program: program.clone(),
            source,
        })?;
        let pid = Pid(child.id());
        self.children.insert(pid, child);
        Ok(pid)
    }

    fn terminate(&mut self, pid: Pid) -> Result<(), LaunchError> {
        let mut child = self
            .children
            .remove(&pid)
            .ok_or(LaunchError::UnknownProcess(pid))?;

        // An already exited child still has to be waited on.
        if let Ok(Some(_)) = child.try_wait() {
            return Ok(());
        }
        child
            .kill()
            .map_err(|source| LaunchError::Terminate { pid, source })?;
        child
            .wait()
            .map_err(|source| LaunchError::Terminate { pid, source })?;
        Ok(())
    }
}
