// src/exec/mod.rs

//! Job execution layer.
//!
//! Jobs report to the supervisor through a [`TaskReporter`]; they never see
//! registry state directly.
//!
//! - [`process`] defines the [`ExternalProcess`] handle a task may own.
//! - [`command`] runs a shell command and derives progress from its stdout.
//! - [`simulated`] renders frames in-process on a blocking worker thread.

pub mod command;
pub mod process;
pub mod simulated;

use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::{JobKind, JobSettings};
use crate::engine::{SupervisorHandle, TaskReporter};
use crate::task::TaskSpec;
use crate::types::TaskState;

pub use process::{ChildProcessHandle, ExternalProcess, ProcessControl};

/// How often a worker re-checks its published state while waiting.
pub const STATE_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Register `job` with the supervisor and spawn its worker.
///
/// The start is enqueued before this returns, so jobs spawned in order are
/// registered (and queued) in that order.
pub fn spawn_job(job: &JobSettings, supervisor: &SupervisorHandle) -> JoinHandle<()> {
    let spec = TaskSpec::new(job.name.clone(), job.frame_range, job.capabilities)
        .with_message(job.message.clone());

    match &job.kind {
        JobKind::Simulated { frame_time } => {
            let reporter = supervisor.start_task(spec);
            simulated::spawn_simulated(reporter, *frame_time)
        }
        JobKind::Command { cmd, frame_pattern } => {
            let (handle, control_rx) = ChildProcessHandle::new(job.name.clone(), cmd.clone());
            let reporter = supervisor.start_task(spec.with_process(Box::new(handle)));
            tokio::spawn(command::run_command(
                reporter,
                cmd.clone(),
                frame_pattern.clone(),
                control_rx,
            ))
        }
    }
}

/// Outcome of waiting while a run is not `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// The run is (again) running.
    Running,
    /// The run was canceled, finished, retired or the supervisor is gone.
    Stop,
}

/// Block the current (non-async) thread while `reporter`'s run is queued,
/// unregistered or paused.
pub fn wait_while_held(reporter: &TaskReporter) -> Wait {
    loop {
        match held_state(reporter) {
            Some(wait) => return wait,
            None => std::thread::sleep(STATE_POLL_INTERVAL),
        }
    }
}

/// `None` while the run should keep waiting.
fn held_state(reporter: &TaskReporter) -> Option<Wait> {
    if reporter.is_retired() || !reporter.is_connected() {
        return Some(Wait::Stop);
    }
    if !reporter.is_registered() {
        return None;
    }
    match reporter.state() {
        TaskState::Running => Some(Wait::Running),
        TaskState::Queued | TaskState::Paused => None,
        TaskState::Canceled | TaskState::Finished => Some(Wait::Stop),
    }
}
