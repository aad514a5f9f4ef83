// src/exec/process.rs

//! External (out-of-process) job handles.
//!
//! A task may own a handle to the process that does its work. The registry
//! is the handle's only owner; it kills the process on cancel and asks it to
//! respawn on restart. Display code only learns whether a handle exists.

use std::fmt;

use tokio::sync::mpsc;
use tracing::debug;

use crate::errors::{RendertrackError, Result};

/// Trait abstracting a kill/restart capable job process.
///
/// Production code uses [`ChildProcessHandle`]; tests provide their own
/// implementation that just records the calls.
pub trait ExternalProcess: Send + fmt::Debug {
    /// Stop the process. Must not block.
    fn kill(&mut self) -> Result<()>;

    /// Stop the process and start a fresh run of it. Must not block; the
    /// process side reports the new run through the supervisor channel.
    fn restart(&mut self) -> Result<()>;

    /// Short human-readable description (command line, pid, ...).
    fn describe(&self) -> String;
}

/// Control request forwarded to the task that owns a child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessControl {
    Kill,
    Restart,
}

/// Handle to a child process managed by [`crate::exec::command`].
///
/// The handle itself never touches the process; it forwards control
/// requests to the runner task, which owns the `tokio::process::Child`.
pub struct ChildProcessHandle {
    task: String,
    cmd: String,
    control: mpsc::UnboundedSender<ProcessControl>,
}

impl ChildProcessHandle {
    /// Create a handle plus the receiving end the runner listens on.
    pub fn new(
        task: impl Into<String>,
        cmd: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<ProcessControl>) {
        let (control, rx) = mpsc::unbounded_channel();
        let handle = Self {
            task: task.into(),
            cmd: cmd.into(),
            control,
        };
        (handle, rx)
    }

    fn send(&self, request: ProcessControl) -> Result<()> {
        debug!(task = %self.task, ?request, "forwarding process control request");
        self.control
            .send(request)
            .map_err(|_| RendertrackError::ProcessError {
                task: self.task.clone(),
                reason: "process runner is gone".to_string(),
            })
    }
}

impl fmt::Debug for ChildProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildProcessHandle")
            .field("task", &self.task)
            .field("cmd", &self.cmd)
            .finish_non_exhaustive()
    }
}

impl ExternalProcess for ChildProcessHandle {
    fn kill(&mut self) -> Result<()> {
        self.send(ProcessControl::Kill)
    }

    fn restart(&mut self) -> Result<()> {
        self.send(ProcessControl::Restart)
    }

    fn describe(&self) -> String {
        self.cmd.clone()
    }
}
