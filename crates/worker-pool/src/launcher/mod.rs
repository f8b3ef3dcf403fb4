//! Worker process launching
//!
//! The pool never touches the OS directly; it asks a [`ProcessLauncher`] to
//! start or terminate processes and only keeps the returned [`Pid`].
//!
//! - [`CommandLauncher`] - spawns real processes with `std::process::Command`
//! - [`InMemoryLauncher`] - hands out fake pids and records calls, for tests

mod command;
mod memory;

pub use command::CommandLauncher;
pub use memory::{InMemoryLauncher, LauncherCall};

use crate::error::LaunchError;
use crate::types::Pid;

/// Starts and stops worker processes on behalf of the pool
pub trait ProcessLauncher: Send {
    /// Start a process running `command` (program followed by arguments)
    ///
    /// Returns as soon as the process exists; the worker registers with the
    /// node agent later, independently of this call.
    fn launch(&mut self, command: &[String]) -> Result<Pid, LaunchError>;

    /// Terminate a process previously returned by [`launch`](Self::launch)
    fn terminate(&mut self, pid: Pid) -> Result<(), LaunchError>;
}

impl<L: ProcessLauncher + ?Sized> ProcessLauncher for Box<L> {
    fn launch(&mut self, command: &[String]) -> Result<Pid, LaunchError> {
        (**self).launch(command)
    }

    fn terminate(&mut self, pid: Pid) -> Result<(), LaunchError> {
        (**self).terminate(pid)
    }
}
