// src/engine/mod.rs

//! Supervision engine for rendertrack.
//!
//! This module ties together:
//! - the task registry and its concurrency queue
//! - the cross-thread channel workers and the display use to reach it
//! - the main supervisor loop that reacts to:
//!   - task start / progress / end / restart / failure reports
//!   - pause, resume, cancel, restart and removal requests
//!   - periodic ticks (stale estimate refresh)
//!   - shutdown
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use std::sync::Arc;
use std::time::Duration;

use crate::exec::ExternalProcess;
use crate::registry::RegistryOptions;
use crate::task::TaskSpec;

/// Identity of a job (the node that renders), stable for the job's lifetime.
pub type TaskId = String;

/// Counter distinguishing successive runs of the same identity.
pub type Generation = u64;

/// Default period of the supervisor's refresh tick.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(500);

/// Options used by both the core and the async shell.
#[derive(Debug, Clone, Copy)]
pub struct SupervisorOptions {
    pub registry: RegistryOptions,
    /// How often stale estimates are re-evaluated.
    pub refresh_interval: Duration,
    /// If true, stop the supervisor once every task has ended (used by the
    /// CLI, which only lives as long as its jobs).
    pub exit_when_idle: bool,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            registry: RegistryOptions::default(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            exit_when_idle: false,
        }
    }
}

/// Events flowing into the supervisor from workers and the display.
///
/// Render events carry the worker's [`RunSignal`], which identifies the run
/// (and therefore the generation) they belong to.
#[derive(Debug)]
pub enum SupervisorEvent {
    /// A job started (or was started again while active).
    TaskStarted {
        spec: TaskSpec,
        run: Arc<RunSignal>,
    },
    /// A job reported progress in `[0, 1]`.
    TaskProgressed {
        task: TaskId,
        run: Arc<RunSignal>,
        progress: f64,
    },
    /// A job ended.
    TaskEnded {
        task: TaskId,
        run: Arc<RunSignal>,
    },
    /// A job restarted itself; `run` is the signal of the new run.
    TaskRestarted {
        task: TaskId,
        run: Arc<RunSignal>,
        process: Option<Box<dyn ExternalProcess>>,
    },
    /// The external process of a job terminated abnormally.
    TaskFailed {
        task: TaskId,
        run: Arc<RunSignal>,
        reason: String,
    },
    PauseRequested {
        tasks: Vec<TaskId>,
    },
    ResumeRequested {
        tasks: Vec<TaskId>,
    },
    CancelRequested {
        tasks: Vec<TaskId>,
    },
    RestartRequested {
        tasks: Vec<TaskId>,
    },
    /// Remove finished/canceled rows from the table.
    RemoveRequested {
        tasks: Vec<TaskId>,
    },
    ClearFinishedRequested,
    SelectionChanged {
        tasks: Vec<TaskId>,
    },
    /// The "queue renders" toggle changed.
    QueueRendersToggled {
        enabled: bool,
    },
    /// Periodic refresh.
    Tick,
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

impl SupervisorEvent {
    /// Short name for logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            SupervisorEvent::TaskStarted { .. } => "task_started",
            SupervisorEvent::TaskProgressed { .. } => "task_progressed",
            SupervisorEvent::TaskEnded { .. } => "task_ended",
            SupervisorEvent::TaskRestarted { .. } => "task_restarted",
            SupervisorEvent::TaskFailed { .. } => "task_failed",
            SupervisorEvent::PauseRequested { .. } => "pause_requested",
            SupervisorEvent::ResumeRequested { .. } => "resume_requested",
            SupervisorEvent::CancelRequested { .. } => "cancel_requested",
            SupervisorEvent::RestartRequested { .. } => "restart_requested",
            SupervisorEvent::RemoveRequested { .. } => "remove_requested",
            SupervisorEvent::ClearFinishedRequested => "clear_finished_requested",
            SupervisorEvent::SelectionChanged { .. } => "selection_changed",
            SupervisorEvent::QueueRendersToggled { .. } => "queue_renders_toggled",
            SupervisorEvent::Tick => "tick",
            SupervisorEvent::ShutdownRequested => "shutdown_requested",
        }
    }
}

pub mod channel;
pub mod core;
pub mod event_handlers;
pub mod queue;
pub mod runtime;

pub use channel::{channel, RunSignal, SupervisorHandle, SupervisorMessage, SupervisorQuery, TaskReporter};
pub use core::CoreSupervisor;
pub use event_handlers::CoreStep;
pub use queue::ConcurrencyQueue;
pub use runtime::{spawn_supervisor, spawn_supervisor_with_clock, Supervisor};
