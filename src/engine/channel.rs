// src/engine/channel.rs

//! Cross-thread channel between workers / display and the supervisor.
//!
//! Workers never touch registry state. Every report is packaged as a
//! [`SupervisorEvent`] and pushed onto a single unbounded tokio mpsc channel,
//! so:
//! - enqueueing never blocks (it works from plain OS threads as well as from
//!   async tasks);
//! - messages are delivered in enqueue order, hence per-task order is kept.
//!
//! `TaskReporter::update` is fire-and-forget: it enqueues the progress and
//! answers "keep going?" from the run's [`RunSignal`], which only the
//! supervisor writes. A pause or cancel is therefore seen by the job at most
//! one update late.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::engine::{Generation, SupervisorEvent, TaskId};
use crate::errors::{RendertrackError, Result};
use crate::exec::ExternalProcess;
use crate::registry::ControlState;
use crate::task::{FrameRange, TaskRow, TaskSpec};
use crate::types::TaskState;

const UNASSIGNED: u64 = u64::MAX;

/// State of one run of a task, as last published by the supervisor.
///
/// One signal is created per run (start or restart) by the worker side and
/// handed to the supervisor inside the start/restart event. The supervisor
/// stores the run's generation in it before any of the run's progress
/// reports are processed, which is what lets it discard reports from older
/// runs.
#[derive(Debug)]
pub struct RunSignal {
    generation: AtomicU64,
    state: AtomicU8,
    abort: AtomicBool,
    retired: AtomicBool,
}

impl RunSignal {
    pub fn new() -> Self {
        Self {
            generation: AtomicU64::new(UNASSIGNED),
            state: AtomicU8::new(TaskState::Queued.as_u8()),
            abort: AtomicBool::new(false),
            retired: AtomicBool::new(false),
        }
    }

    /// Generation of this run, once the supervisor has registered it.
    pub fn generation(&self) -> Option<Generation> {
        match self.generation.load(Ordering::Acquire) {
            UNASSIGNED => None,
            g => Some(g),
        }
    }

    /// Last state published for this run.
    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether this run was superseded by a restart or removed.
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    /// Whether the job should keep working.
    ///
    /// Before the supervisor has seen the run there is nothing to object to,
    /// so the answer is `true`.
    pub fn should_continue(&self) -> bool {
        if self.is_retired() || self.abort.load(Ordering::Acquire) {
            return false;
        }
        match self.generation() {
            None => true,
            Some(_) => self.state() == TaskState::Running,
        }
    }

    pub(crate) fn assign_generation(&self, generation: Generation) {
        self.generation.store(generation, Ordering::Release);
    }

    pub(crate) fn publish(&self, generation: Generation, state: TaskState, abort: bool) {
        self.generation.store(generation, Ordering::Release);
        self.abort.store(abort || state == TaskState::Canceled, Ordering::Release);
        self.state.store(state.as_u8(), Ordering::Release);
    }

    pub(crate) fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }
}

impl Default for RunSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only questions the display may ask; answered by the supervisor loop.
#[derive(Debug)]
pub enum SupervisorQuery {
    /// Enabled state of the pause/cancel/restart controls.
    Controls(oneshot::Sender<ControlState>),
    /// Rows of the selected tasks.
    Selected(oneshot::Sender<Vec<TaskRow>>),
    /// Every visible row.
    Snapshot(oneshot::Sender<Vec<TaskRow>>),
}

/// What travels over the channel.
#[derive(Debug)]
pub enum SupervisorMessage {
    Event(SupervisorEvent),
    Query(SupervisorQuery),
}

/// Create the channel: a cloneable handle plus the receiver the
/// [`Supervisor`](crate::engine::Supervisor) consumes.
pub fn channel() -> (SupervisorHandle, mpsc::UnboundedReceiver<SupervisorMessage>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SupervisorHandle { tx }, rx)
}

/// Sending side of the supervisor channel.
///
/// Cheap to clone; safe to use from any thread.
#[derive(Debug, Clone)]
pub struct SupervisorHandle {
    tx: mpsc::UnboundedSender<SupervisorMessage>,
}

impl SupervisorHandle {
    /// Enqueue a raw event.
    pub fn send(&self, event: SupervisorEvent) -> Result<()> {
        let name = event.name();
        self.tx
            .send(SupervisorMessage::Event(event))
            .map_err(|_| RendertrackError::SupervisorClosed(name))
    }

    /// Report a new job and get the reporter its worker uses.
    ///
    /// If the supervisor is gone the reporter's run is retired, so the job
    /// stops at its first update.
    pub fn start_task(&self, spec: TaskSpec) -> TaskReporter {
        let run = Arc::new(RunSignal::new());
        let reporter = TaskReporter {
            task: spec.id.clone(),
            frame_range: spec.frame_range,
            run: Arc::clone(&run),
            tx: self.tx.clone(),
        };

        if let Err(e) = self.send(SupervisorEvent::TaskStarted { spec, run }) {
            warn!(task = %reporter.task, error = %e, "could not report task start");
            reporter.run.retire();
        }
        reporter
    }

    pub fn pause(&self, tasks: Vec<TaskId>) -> Result<()> {
        self.send(SupervisorEvent::PauseRequested { tasks })
    }

    pub fn resume(&self, tasks: Vec<TaskId>) -> Result<()> {
        self.send(SupervisorEvent::ResumeRequested { tasks })
    }

    pub fn cancel(&self, tasks: Vec<TaskId>) -> Result<()> {
        self.send(SupervisorEvent::CancelRequested { tasks })
    }

    pub fn restart(&self, tasks: Vec<TaskId>) -> Result<()> {
        self.send(SupervisorEvent::RestartRequested { tasks })
    }

    pub fn remove(&self, tasks: Vec<TaskId>) -> Result<()> {
        self.send(SupervisorEvent::RemoveRequested { tasks })
    }

    pub fn clear_finished(&self) -> Result<()> {
        self.send(SupervisorEvent::ClearFinishedRequested)
    }

    pub fn select(&self, tasks: Vec<TaskId>) -> Result<()> {
        self.send(SupervisorEvent::SelectionChanged { tasks })
    }

    pub fn set_queue_renders(&self, enabled: bool) -> Result<()> {
        self.send(SupervisorEvent::QueueRendersToggled { enabled })
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(SupervisorEvent::ShutdownRequested)
    }

    /// Enabled state of the table controls for the current selection.
    pub async fn controls(&self) -> Result<ControlState> {
        self.query("controls", SupervisorQuery::Controls).await
    }

    /// Rows of the currently selected tasks.
    pub async fn selected(&self) -> Result<Vec<TaskRow>> {
        self.query("selected", SupervisorQuery::Selected).await
    }

    /// Every visible row, in display order.
    pub async fn snapshot(&self) -> Result<Vec<TaskRow>> {
        self.query("snapshot", SupervisorQuery::Snapshot).await
    }

    async fn query<T>(
        &self,
        name: &'static str,
        make: impl FnOnce(oneshot::Sender<T>) -> SupervisorQuery,
    ) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SupervisorMessage::Query(make(reply_tx)))
            .map_err(|_| RendertrackError::SupervisorClosed(name))?;
        reply_rx
            .await
            .map_err(|_| RendertrackError::SupervisorClosed(name))
    }
}

/// Worker-side handle for one run of a task.
///
/// Clones report for the same run. After [`restarted`](Self::restarted)
/// the old reporter (and its clones) belong to a superseded run: their
/// reports are discarded and `update` answers `false`.
#[derive(Debug, Clone)]
pub struct TaskReporter {
    task: TaskId,
    frame_range: FrameRange,
    run: Arc<RunSignal>,
    tx: mpsc::UnboundedSender<SupervisorMessage>,
}

impl TaskReporter {
    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn frame_range(&self) -> FrameRange {
        self.frame_range
    }

    /// Generation of this run, once the supervisor has registered it.
    pub fn generation(&self) -> Option<Generation> {
        self.run.generation()
    }

    /// Last state the supervisor published for this run.
    pub fn state(&self) -> TaskState {
        self.run.state()
    }

    /// Whether the supervisor has seen this run yet.
    pub fn is_registered(&self) -> bool {
        self.run.generation().is_some()
    }

    pub fn is_retired(&self) -> bool {
        self.run.is_retired()
    }

    /// Whether the supervisor is still receiving reports.
    pub fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Cached continue/abort answer, without reporting anything.
    pub fn should_continue(&self) -> bool {
        self.run.should_continue()
    }

    fn send(&self, event: SupervisorEvent) -> bool {
        match self.tx.send(SupervisorMessage::Event(event)) {
            Ok(()) => true,
            Err(_) => {
                debug!(task = %self.task, "supervisor gone; report dropped");
                false
            }
        }
    }

    /// Report progress in `[0, 1]`.
    ///
    /// Returns `false` if the job should stop. The answer reflects what the
    /// supervisor had published before this call.
    pub fn update(&self, progress: f64) -> bool {
        let sent = self.send(SupervisorEvent::TaskProgressed {
            task: self.task.clone(),
            run: Arc::clone(&self.run),
            progress,
        });
        sent && self.run.should_continue()
    }

    /// Report that `frame` has been rendered; progress is derived from the
    /// task's frame range.
    pub fn report_frame(&self, frame: i32) -> bool {
        self.update(self.frame_range.progress_for_frame(frame))
    }

    /// Report that this run ended.
    pub fn end(&self) {
        self.send(SupervisorEvent::TaskEnded {
            task: self.task.clone(),
            run: Arc::clone(&self.run),
        });
    }

    /// Report that the external process of this run failed.
    pub fn fail(&self, reason: impl Into<String>) {
        self.send(SupervisorEvent::TaskFailed {
            task: self.task.clone(),
            run: Arc::clone(&self.run),
            reason: reason.into(),
        });
    }

    /// Report that the job restarted and return the reporter of the new run.
    ///
    /// `process` replaces the task's external process handle when given.
    pub fn restarted(&self, process: Option<Box<dyn ExternalProcess>>) -> TaskReporter {
        let run = Arc::new(RunSignal::new());
        let next = TaskReporter {
            task: self.task.clone(),
            frame_range: self.frame_range,
            run: Arc::clone(&run),
            tx: self.tx.clone(),
        };
        if !self.send(SupervisorEvent::TaskRestarted {
            task: self.task.clone(),
            run,
            process,
        }) {
            next.run.retire();
        }
        next
    }
}
