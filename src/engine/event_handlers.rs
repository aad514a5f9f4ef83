// src/engine/event_handlers.rs

//! Event handling logic for the core supervisor.

use std::sync::Arc;

use tracing::debug;

use crate::display::DisplayNotice;
use crate::engine::channel::RunSignal;
use crate::engine::TaskId;
use crate::exec::ExternalProcess;
use crate::registry::TaskRegistry;
use crate::task::TaskSpec;

/// Decision returned by the core after handling a single `SupervisorEvent`.
#[derive(Debug, Clone, Default)]
pub struct CoreStep {
    /// Row changes the IO shell should forward to the display, in order.
    pub notices: Vec<DisplayNotice>,
    /// Whether the outer supervisor loop should keep running.
    pub keep_running: bool,
}

/// User request kinds that apply to a list of tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRequest {
    Pause,
    Resume,
    Cancel,
    Restart,
    Remove,
}

/// Handle a task start (possibly of an already active identity).
pub fn handle_task_started(registry: &mut TaskRegistry, spec: TaskSpec, run: Arc<RunSignal>) {
    let id = spec.id.clone();
    let generation = registry.start_task(spec);
    registry.attach_signal(&id, generation, run);
}

/// Handle a progress report from a worker.
///
/// The continue/abort answer has already been given to the worker from its
/// run signal; here we only apply the update (or discard it when stale).
pub fn handle_task_progressed(
    registry: &mut TaskRegistry,
    task: &str,
    run: &RunSignal,
    progress: f64,
) {
    let Some(generation) = run.generation() else {
        debug!(task = %task, "progress from an unregistered run discarded");
        return;
    };
    let keep_going = registry.apply_update(task, generation, progress);
    debug!(task = %task, generation, progress, keep_going, "progress applied");
}

/// Handle the end of a run.
pub fn handle_task_ended(registry: &mut TaskRegistry, task: &str, run: &RunSignal) {
    match run.generation() {
        Some(generation) => registry.end_task_at(task, generation),
        None => debug!(task = %task, "end from an unregistered run discarded"),
    }
}

/// Handle a restart reported by the job itself.
pub fn handle_task_restarted(
    registry: &mut TaskRegistry,
    task: &str,
    run: Arc<RunSignal>,
    process: Option<Box<dyn ExternalProcess>>,
) {
    match registry.on_task_restarted(task, process) {
        Some(generation) => registry.attach_signal(task, generation, run),
        None => {
            debug!(task = %task, "restart of unknown or finished task; run retired");
            run.retire();
        }
    }
}

/// Handle an abnormal termination of a job's external process.
pub fn handle_task_failed(registry: &mut TaskRegistry, task: &str, run: &RunSignal, reason: String) {
    match run.generation() {
        Some(generation) => registry.fail_task(task, generation, reason),
        None => debug!(task = %task, "failure from an unregistered run discarded"),
    }
}

/// Apply a user request to each listed task.
///
/// Requests that a task's capabilities or state do not allow are skipped.
pub fn handle_task_request(registry: &mut TaskRegistry, request: TaskRequest, tasks: &[TaskId]) {
    let mut applied = 0usize;

    for task in tasks {
        let ok = match request {
            TaskRequest::Pause => registry.pause_request(task),
            TaskRequest::Resume => registry.resume_request(task),
            TaskRequest::Cancel => registry.cancel_request(task),
            TaskRequest::Restart => registry.restart_request(task),
            TaskRequest::Remove => registry.remove_task_from_table(task),
        };
        if ok {
            applied += 1;
        }
    }

    debug!(?request, requested = tasks.len(), applied, "user request handled");
}
