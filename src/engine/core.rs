// src/engine/core.rs

//! Pure core supervisor state machine.
//!
//! This module contains a synchronous, deterministic "core" that consumes
//! [`SupervisorEvent`]s and produces:
//! - an updated registry state
//! - the display notices the IO shell should forward
//!
//! The async/IO-heavy shell (`engine::runtime::Supervisor`) is responsible
//! for reading the channel, ticking, answering queries and talking to the
//! display. The core has no channels and does not perform any IO, so it can
//! be unit tested without Tokio.

use tracing::info;

use crate::engine::SupervisorEvent;
use crate::engine::event_handlers::{
    handle_task_ended, handle_task_failed, handle_task_progressed, handle_task_request,
    handle_task_restarted, handle_task_started, CoreStep, TaskRequest,
};
use crate::registry::TaskRegistry;

/// Pure core supervisor state.
#[derive(Debug)]
pub struct CoreSupervisor {
    registry: TaskRegistry,
    exit_when_idle: bool,
    /// Whether any task was ever started; an empty registry at startup is
    /// not "idle" for `exit_when_idle` purposes.
    seen_task: bool,
}

impl CoreSupervisor {
    pub fn new(registry: TaskRegistry, exit_when_idle: bool) -> Self {
        Self {
            registry,
            exit_when_idle,
            seen_task: false,
        }
    }

    /// Read access for queries and tests.
    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Handle a single event, updating the registry and returning the
    /// resulting notices for the IO shell.
    pub fn step(&mut self, event: SupervisorEvent) -> CoreStep {
        let registry = &mut self.registry;

        match event {
            SupervisorEvent::TaskStarted { spec, run } => {
                self.seen_task = true;
                handle_task_started(registry, spec, run);
            }
            SupervisorEvent::TaskProgressed { task, run, progress } => {
                handle_task_progressed(registry, &task, &run, progress);
            }
            SupervisorEvent::TaskEnded { task, run } => {
                handle_task_ended(registry, &task, &run);
            }
            SupervisorEvent::TaskRestarted { task, run, process } => {
                handle_task_restarted(registry, &task, run, process);
            }
            SupervisorEvent::TaskFailed { task, run, reason } => {
                handle_task_failed(registry, &task, &run, reason);
            }
            SupervisorEvent::PauseRequested { tasks } => {
                handle_task_request(registry, TaskRequest::Pause, &tasks);
            }
            SupervisorEvent::ResumeRequested { tasks } => {
                handle_task_request(registry, TaskRequest::Resume, &tasks);
            }
            SupervisorEvent::CancelRequested { tasks } => {
                handle_task_request(registry, TaskRequest::Cancel, &tasks);
            }
            SupervisorEvent::RestartRequested { tasks } => {
                handle_task_request(registry, TaskRequest::Restart, &tasks);
            }
            SupervisorEvent::RemoveRequested { tasks } => {
                handle_task_request(registry, TaskRequest::Remove, &tasks);
            }
            SupervisorEvent::ClearFinishedRequested => {
                registry.clear_finished();
            }
            SupervisorEvent::SelectionChanged { tasks } => {
                registry.set_selection(&tasks);
            }
            SupervisorEvent::QueueRendersToggled { enabled } => {
                registry.set_queue_renders(enabled);
            }
            SupervisorEvent::Tick => {
                registry.refresh_estimates();
            }
            SupervisorEvent::ShutdownRequested => {
                return CoreStep {
                    notices: registry.take_notices(),
                    keep_running: false,
                };
            }
        }

        let mut keep_running = true;
        if self.exit_when_idle && self.seen_task && self.registry.is_idle() {
            info!("all tasks ended; supervisor done");
            keep_running = false;
        }

        CoreStep {
            notices: self.registry.take_notices(),
            keep_running,
        }
    }
}
