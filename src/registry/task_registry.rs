// src/registry/task_registry.rs

//! The set of live tasks and every mutation applied to them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::display::DisplayNotice;
use crate::engine::channel::RunSignal;
use crate::engine::queue::ConcurrencyQueue;
use crate::engine::{Generation, TaskId};
use crate::exec::ExternalProcess;
use crate::registry::selection::{controls_for, ControlState};
use crate::task::estimator::EstimatorConfig;
use crate::task::model::{FrameRange, Task, TaskRow, TaskSpec};
use crate::task::transitions::Transition;
use crate::types::{QueueMode, TaskState};

/// Behaviour knobs of the registry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegistryOptions {
    pub estimator: EstimatorConfig,
    /// Parallel (unconstrained) or queued renders.
    pub queue_mode: QueueMode,
    /// Concurrent-running limit applied while `queue_mode` is `Queued`.
    pub max_concurrent: usize,
    /// Drop finished tasks from the table as soon as they end.
    pub remove_finished: bool,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            estimator: EstimatorConfig::default(),
            queue_mode: QueueMode::Parallel,
            max_concurrent: 1,
            remove_finished: false,
        }
    }
}

impl RegistryOptions {
    fn concurrency_limit(&self) -> Option<usize> {
        if self.queue_mode.is_queued() {
            Some(self.max_concurrent.max(1))
        } else {
            None
        }
    }
}

/// Owner of every [`Task`].
///
/// It is responsible for:
/// - creating tasks and treating duplicate starts as restarts
/// - validating progress updates against identity and generation
/// - pause / resume / cancel requests gated by capabilities
/// - handing concurrency slots out through the [`ConcurrencyQueue`]
/// - collecting [`DisplayNotice`]s for the display collaborator
///
/// It is single-writer: only the supervisor task calls `&mut self` methods.
/// Tasks never leave the registry; callers get [`TaskRow`] projections.
#[derive(Debug)]
pub struct TaskRegistry {
    options: RegistryOptions,
    clock: Arc<dyn Clock>,
    tasks: HashMap<TaskId, Task>,
    /// Display order (insertion order of visible rows).
    order: Vec<TaskId>,
    /// Last generation issued per identity, kept after removal so a
    /// re-created identity never reuses a generation.
    generations: HashMap<TaskId, Generation>,
    queue: ConcurrencyQueue,
    selection: Vec<TaskId>,
    outbox: Vec<DisplayNotice>,
}

impl TaskRegistry {
    pub fn new(options: RegistryOptions) -> Self {
        Self::with_clock(options, Arc::new(SystemClock))
    }

    pub fn with_clock(options: RegistryOptions, clock: Arc<dyn Clock>) -> Self {
        Self {
            queue: ConcurrencyQueue::new(options.concurrency_limit()),
            options,
            clock,
            tasks: HashMap::new(),
            order: Vec::new(),
            generations: HashMap::new(),
            selection: Vec::new(),
            outbox: Vec::new(),
        }
    }

    pub fn options(&self) -> &RegistryOptions {
        &self.options
    }

    pub fn queue(&self) -> &ConcurrencyQueue {
        &self.queue
    }

    /// Drain the display notices produced since the last call.
    pub fn take_notices(&mut self) -> Vec<DisplayNotice> {
        std::mem::take(&mut self.outbox)
    }

    // ------------------------------------------------------------------
    // Render collaborator operations
    // ------------------------------------------------------------------

    /// Register a new task, or restart the active task with the same id.
    ///
    /// Returns the generation of the run that `spec` describes.
    pub fn start_task(&mut self, spec: TaskSpec) -> Generation {
        let now = self.clock.now();
        let id = spec.id.clone();

        if let Some(existing) = self.tasks.get(&id) {
            if !existing.state.is_terminal() {
                info!(task = %id, "start for an active task; treating as restart");
                let TaskSpec {
                    message,
                    frame_range,
                    process,
                    ..
                } = spec;
                return self
                    .restart_inner(&id, process, Some((message, frame_range)), now)
                    .unwrap_or(existing_generation(&self.generations, &id));
            }
            // A finished or canceled row of a previous run is replaced.
            self.drop_task(&id);
        }

        let generation = self.generations.get(&id).map_or(0, |g| g + 1);
        self.generations.insert(id.clone(), generation);

        let task = Task::new(spec, generation, self.options.estimator, now);
        info!(
            task = %id,
            generation,
            frames = task.frame_range.frame_count(),
            can_pause = task.capabilities.can_pause,
            can_cancel = task.capabilities.can_cancel,
            "task started"
        );
        self.tasks.insert(id.clone(), task);
        self.order.push(id.clone());

        self.queue.request(&id);
        let admitted = self.queue.admit();
        for admitted_id in &admitted {
            self.apply_admit(admitted_id, now, admitted_id != &id);
        }
        if !self.queue.holds_slot(&id) {
            info!(task = %id, running = self.queue.running_count(), "task queued");
        }

        self.emit_added(&id, now);
        generation
    }

    /// Progress update at the task's current generation.
    ///
    /// Returns `true` if the job should keep going, `false` if it should
    /// stop (unknown task, not running, or a cancel was just delivered).
    pub fn update_task(&mut self, id: &str, progress: f64) -> bool {
        match self.tasks.get(id) {
            Some(task) => {
                let generation = task.generation;
                self.apply_update(id, generation, progress)
            }
            None => {
                debug!(task = %id, "progress for unknown task ignored");
                false
            }
        }
    }

    /// Progress update from a specific run of `id`.
    ///
    /// Updates from any other generation are discarded and answered with
    /// `false`.
    pub fn apply_update(&mut self, id: &str, generation: Generation, progress: f64) -> bool {
        let now = self.clock.now();
        let Some(task) = self.tasks.get_mut(id) else {
            debug!(task = %id, "progress for unknown task ignored");
            return false;
        };

        if task.generation != generation {
            debug!(
                task = %id,
                generation,
                current = task.generation,
                "stale progress update discarded"
            );
            return false;
        }

        if task.cancel_pending {
            task.cancel_pending = false;
            task.publish();
            info!(task = %id, generation, "cancel delivered to job");
            return false;
        }

        if task.state != TaskState::Running {
            debug!(task = %id, state = %task.state, "progress for non-running task ignored");
            return false;
        }

        if progress.is_nan() {
            warn!(task = %id, "NaN progress ignored");
            return true;
        }
        let progress = progress.clamp(0.0, 1.0);
        if progress < task.progress {
            debug!(
                task = %id,
                progress,
                current = task.progress,
                "regressing progress ignored"
            );
            return true;
        }

        task.progress = progress;
        task.estimator.sample(now, progress);
        task.shown_remaining = task.remaining(now);

        if progress >= 1.0 {
            self.finish(id, now);
        } else {
            self.emit_updated(id, now);
        }
        true
    }

    /// The job ended. Ends the current generation.
    pub fn end_task(&mut self, id: &str) {
        if let Some(generation) = self.tasks.get(id).map(|t| t.generation) {
            self.end_task_at(id, generation);
        } else {
            debug!(task = %id, "end for unknown task ignored");
        }
    }

    /// The run `generation` of `id` ended.
    pub fn end_task_at(&mut self, id: &str, generation: Generation) {
        let now = self.clock.now();
        let Some(task) = self.tasks.get_mut(id) else {
            debug!(task = %id, "end for unknown task ignored");
            return;
        };

        if task.generation != generation {
            debug!(task = %id, generation, current = task.generation, "stale end discarded");
            return;
        }

        if task.state == TaskState::Canceled {
            // The canceled job has stopped; only now is its slot free.
            task.cancel_pending = false;
            task.publish();
            debug!(task = %id, "canceled task ended");
            self.queue.release(id);
            self.admit_waiting(now);
            return;
        }

        self.finish(id, now);
    }

    /// A new run of `id` started (the job was restarted).
    ///
    /// Returns the new generation, or `None` if `id` is unknown or terminal.
    pub fn on_task_restarted(
        &mut self,
        id: &str,
        process: Option<Box<dyn ExternalProcess>>,
    ) -> Option<Generation> {
        let now = self.clock.now();
        self.restart_inner(id, process, None, now)
    }

    fn restart_inner(
        &mut self,
        id: &str,
        process: Option<Box<dyn ExternalProcess>>,
        respec: Option<(String, FrameRange)>,
        now: Instant,
    ) -> Option<Generation> {
        let Some(task) = self.tasks.get_mut(id) else {
            debug!(task = %id, "restart for unknown task ignored");
            return None;
        };
        let Some(to) = Transition::Restart.target(task.state, task.capabilities) else {
            debug!(task = %id, state = %task.state, "restart of terminal task ignored");
            return None;
        };

        task.generation += 1;
        task.state = to;
        task.progress = 0.0;
        task.cancel_pending = false;
        task.failure = None;
        task.estimator.reset(now);
        task.shown_remaining = task.remaining(now);
        if let Some(process) = process {
            task.process = Some(process);
        }
        if let Some((message, frame_range)) = respec {
            task.message = message;
            task.frame_range = frame_range;
        }
        // Workers still holding the previous run's signal must stop.
        if let Some(old) = task.signal.take() {
            old.retire();
        }

        let generation = task.generation;
        self.generations.insert(id.to_string(), generation);
        info!(task = %id, generation, state = %to, "task restarted");

        self.emit_updated(id, now);
        self.admit_waiting(now);
        Some(generation)
    }

    /// The external process of run `generation` terminated abnormally.
    pub fn fail_task(&mut self, id: &str, generation: Generation, reason: impl Into<String>) {
        let now = self.clock.now();
        let Some(task) = self.tasks.get_mut(id) else {
            debug!(task = %id, "failure for unknown task ignored");
            return;
        };
        if task.generation != generation {
            debug!(task = %id, generation, current = task.generation, "stale failure discarded");
            return;
        }
        let reason: String = reason.into();
        if task.state == TaskState::Canceled {
            // A canceled job whose process then died is gone as well.
            debug!(task = %id, reason = %reason, "canceled task's process exited");
            self.queue.release(id);
            self.admit_waiting(now);
            return;
        }
        let Some(to) = Transition::Fail.target(task.state, task.capabilities) else {
            return;
        };

        warn!(task = %id, generation, reason = %reason, "external process failed");
        task.state = to;
        task.failure = Some(reason);
        task.cancel_pending = false;
        task.publish();

        self.queue.release(id);
        self.emit_updated(id, now);
        self.admit_waiting(now);
    }

    /// Attach the worker-side signal of run `generation`.
    ///
    /// If the run is already outdated the signal is retired instead, so the
    /// worker holding it stops at its next update.
    pub fn attach_signal(&mut self, id: &str, generation: Generation, signal: Arc<RunSignal>) {
        signal.assign_generation(generation);
        match self.tasks.get_mut(id) {
            Some(task) if task.generation == generation => task.attach_signal(signal),
            _ => {
                debug!(task = %id, generation, "signal for outdated run retired");
                signal.retire();
            }
        }
    }

    // ------------------------------------------------------------------
    // User requests
    // ------------------------------------------------------------------

    /// Pause a running task. No-op (returns `false`) without `can_pause`.
    pub fn pause_request(&mut self, id: &str) -> bool {
        let now = self.clock.now();
        let Some(task) = self.tasks.get_mut(id) else {
            return false;
        };
        let Some(to) = Transition::Pause.target(task.state, task.capabilities) else {
            debug!(task = %id, state = %task.state, "pause request ignored");
            return false;
        };

        task.state = to;
        task.estimator.pause(now);
        task.publish();
        info!(task = %id, "task paused");

        self.emit_updated(id, now);
        true
    }

    /// Resume a paused task.
    pub fn resume_request(&mut self, id: &str) -> bool {
        let now = self.clock.now();
        let Some(task) = self.tasks.get_mut(id) else {
            return false;
        };
        let Some(to) = Transition::Resume.target(task.state, task.capabilities) else {
            debug!(task = %id, state = %task.state, "resume request ignored");
            return false;
        };

        task.state = to;
        task.estimator.resume(now);
        task.publish();
        info!(task = %id, "task resumed");

        self.emit_updated(id, now);
        true
    }

    /// Cancel a running task. No-op (returns `false`) without `can_cancel`.
    ///
    /// The job is told at its next progress update; an external process is
    /// killed right away. The task keeps its concurrency slot until the job
    /// reports its end.
    pub fn cancel_request(&mut self, id: &str) -> bool {
        let now = self.clock.now();
        let Some(task) = self.tasks.get_mut(id) else {
            return false;
        };
        let Some(to) = Transition::Cancel.target(task.state, task.capabilities) else {
            debug!(task = %id, state = %task.state, "cancel request ignored");
            return false;
        };

        task.state = to;
        task.cancel_pending = true;
        if let Some(process) = task.process.as_mut() {
            if let Err(e) = process.kill() {
                warn!(task = %id, error = %e, "failed to kill external process");
            }
        }
        task.publish();
        info!(task = %id, generation = task.generation, "task canceled");

        self.emit_updated(id, now);
        true
    }

    /// Restart control: resumes a paused in-process task, or asks an external
    /// process to respawn. The process side then reports the new run through
    /// [`on_task_restarted`](Self::on_task_restarted).
    pub fn restart_request(&mut self, id: &str) -> bool {
        let Some(task) = self.tasks.get_mut(id) else {
            return false;
        };
        if task.state.is_terminal() {
            debug!(task = %id, "restart request for terminal task ignored");
            return false;
        }

        let paused = task.state == TaskState::Paused;
        match task.process.as_mut() {
            Some(process) => match process.restart() {
                Ok(()) => {
                    info!(task = %id, process = %process.describe(), "external process restart requested");
                    true
                }
                Err(e) => {
                    warn!(task = %id, error = %e, "external process restart failed");
                    false
                }
            },
            None if paused => self.resume_request(id),
            None => {
                debug!(task = %id, "restart request without external process ignored");
                false
            }
        }
    }

    /// Remove a finished or canceled task from the table.
    ///
    /// Active tasks are rejected; removing an unknown (or already removed)
    /// task is a no-op. Returns whether a row was removed.
    pub fn remove_task_from_table(&mut self, id: &str) -> bool {
        match self.tasks.get(id) {
            Some(task) if task.state.is_terminal() => {
                self.drop_task(id);
                true
            }
            Some(task) => {
                debug!(task = %id, state = %task.state, "cannot remove an active task");
                false
            }
            None => false,
        }
    }

    /// Batch variant of [`remove_task_from_table`](Self::remove_task_from_table).
    /// Returns the number of rows removed.
    pub fn remove_tasks_from_table<S: AsRef<str>>(&mut self, ids: &[S]) -> usize {
        let mut removed = 0;
        for id in ids {
            if self.remove_task_from_table(id.as_ref()) {
                removed += 1;
            }
        }
        removed
    }

    /// Remove every finished or canceled row.
    pub fn clear_finished(&mut self) -> usize {
        let terminal: Vec<TaskId> = self
            .order
            .iter()
            .filter(|id| self.tasks.get(*id).is_some_and(|t| t.state.is_terminal()))
            .cloned()
            .collect();
        self.remove_tasks_from_table(&terminal)
    }

    /// Switch between parallel and queued rendering.
    pub fn set_queue_renders(&mut self, enabled: bool) {
        let now = self.clock.now();
        self.options.queue_mode = QueueMode::from_enabled(enabled);
        self.queue.set_limit(self.options.concurrency_limit());
        info!(queue_renders = enabled, limit = ?self.queue.limit(), "render queueing changed");
        self.admit_waiting(now);
    }

    // ------------------------------------------------------------------
    // Selection and queries
    // ------------------------------------------------------------------

    /// Replace the selection. Unknown ids are dropped.
    pub fn set_selection<S: AsRef<str>>(&mut self, ids: &[S]) {
        self.selection = ids
            .iter()
            .map(|id| id.as_ref())
            .filter(|id| self.tasks.contains_key(*id))
            .map(str::to_string)
            .collect();
    }

    /// Rows of the selected tasks, in selection order.
    pub fn selected_tasks(&self) -> Vec<TaskRow> {
        let now = self.clock.now();
        self.selection
            .iter()
            .filter_map(|id| self.tasks.get(id))
            .map(|t| t.row(now))
            .collect()
    }

    /// Control availability for the current selection.
    pub fn controls(&self) -> ControlState {
        controls_for(&self.selected_tasks())
    }

    pub fn task(&self, id: &str) -> Option<TaskRow> {
        let now = self.clock.now();
        self.tasks.get(id).map(|t| t.row(now))
    }

    /// All visible rows in display order.
    pub fn rows(&self) -> Vec<TaskRow> {
        let now = self.clock.now();
        self.order
            .iter()
            .filter_map(|id| self.tasks.get(id))
            .map(|t| t.row(now))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// `true` when no task is queued, running or paused.
    pub fn is_idle(&self) -> bool {
        self.tasks.values().all(|t| t.state.is_terminal())
    }

    /// Re-evaluate estimates that may have gone stale and refresh the rows
    /// whose remaining time switched between known and indeterminate.
    pub fn refresh_estimates(&mut self) {
        let now = self.clock.now();
        let mut changed = Vec::new();

        for id in &self.order {
            let Some(task) = self.tasks.get_mut(id) else {
                continue;
            };
            if task.state != TaskState::Running {
                continue;
            }
            let remaining = task.remaining(now);
            if remaining.is_indeterminate() != task.shown_remaining.is_indeterminate() {
                task.shown_remaining = remaining;
                changed.push(id.clone());
            }
        }

        for id in changed {
            debug!(task = %id, "estimate staleness changed");
            self.emit_updated(&id, now);
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Grant slots to waiting tasks, oldest first.
    fn admit_waiting(&mut self, now: Instant) {
        loop {
            let admitted = self.queue.admit();
            if admitted.is_empty() {
                break;
            }
            for id in admitted {
                self.apply_admit(&id, now, true);
            }
        }
    }

    fn apply_admit(&mut self, id: &str, now: Instant, notify: bool) {
        let Some(task) = self.tasks.get_mut(id) else {
            warn!(task = %id, "admitted task missing from registry; releasing slot");
            self.queue.release(id);
            return;
        };
        let Some(to) = Transition::Admit.target(task.state, task.capabilities) else {
            warn!(task = %id, state = %task.state, "admitted task was not queued; releasing slot");
            self.queue.release(id);
            return;
        };

        task.state = to;
        // Time spent waiting is not render time.
        task.estimator.reset(now);
        task.publish();
        debug!(task = %id, generation = task.generation, "task admitted");

        if notify {
            self.emit_updated(id, now);
        }
    }

    /// Move `id` to `Finished`, free its slot and hand it to the next waiter.
    fn finish(&mut self, id: &str, now: Instant) {
        let Some(task) = self.tasks.get_mut(id) else {
            return;
        };
        let Some(to) = Transition::Finish.target(task.state, task.capabilities) else {
            return;
        };
        if task.state == TaskState::Running {
            task.progress = 1.0;
        }
        task.state = to;
        task.cancel_pending = false;
        task.publish();
        info!(task = %id, generation = task.generation, "task finished");

        self.queue.release(id);
        self.emit_updated(id, now);
        self.admit_waiting(now);

        if self.options.remove_finished {
            self.drop_task(id);
        }
    }

    fn drop_task(&mut self, id: &str) {
        if let Some(task) = self.tasks.remove(id) {
            if let Some(signal) = &task.signal {
                signal.retire();
            }
        }
        self.order.retain(|o| o != id);
        self.selection.retain(|s| s != id);
        self.queue.release(id);
        debug!(task = %id, "task removed from table");
        self.outbox.push(DisplayNotice::RowRemoved(id.to_string()));
    }

    fn emit_added(&mut self, id: &str, now: Instant) {
        if let Some(row) = self.tasks.get(id).map(|t| t.row(now)) {
            self.outbox.push(DisplayNotice::RowAdded(row));
        }
    }

    fn emit_updated(&mut self, id: &str, now: Instant) {
        if let Some(row) = self.tasks.get(id).map(|t| t.row(now)) {
            self.outbox.push(DisplayNotice::RowUpdated(row));
        }
    }
}

fn existing_generation(generations: &HashMap<TaskId, Generation>, id: &str) -> Generation {
    generations.get(id).copied().unwrap_or(0)
}
