// src/task/model.rs

//! Task records and their read-only projections.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::engine::channel::RunSignal;
use crate::engine::{Generation, TaskId};
use crate::exec::ExternalProcess;
use crate::task::estimator::{EstimatorConfig, TimeEstimator};
use crate::types::{Remaining, TaskState};

/// Inclusive frame range of a render job.
///
/// Used to turn "frame N is done" into a progress fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRange {
    pub first: i32,
    pub last: i32,
    pub step: i32,
}

impl FrameRange {
    /// Build a range, normalising a reversed range and a zero/negative step.
    pub fn new(first: i32, last: i32, step: i32) -> Self {
        let (first, last) = if last < first { (last, first) } else { (first, last) };
        let step = if step == 0 { 1 } else { step.abs() };
        Self { first, last, step }
    }

    pub fn single(frame: i32) -> Self {
        Self::new(frame, frame, 1)
    }

    /// Number of frames the job renders.
    pub fn frame_count(&self) -> u64 {
        let span = i64::from(self.last) - i64::from(self.first);
        (span / i64::from(self.step)) as u64 + 1
    }

    /// Progress fraction once `frame` has been completed.
    pub fn progress_for_frame(&self, frame: i32) -> f64 {
        if frame < self.first {
            return 0.0;
        }
        let done = (i64::from(frame) - i64::from(self.first)) / i64::from(self.step) + 1;
        (done as f64 / self.frame_count() as f64).clamp(0.0, 1.0)
    }
}

impl Default for FrameRange {
    fn default() -> Self {
        Self::single(1)
    }
}

/// What the user may do with a task. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub can_pause: bool,
    pub can_cancel: bool,
}

impl Capabilities {
    pub fn new(can_pause: bool, can_cancel: bool) -> Self {
        Self { can_pause, can_cancel }
    }

    pub fn all() -> Self {
        Self::new(true, true)
    }
}

/// Everything the render collaborator provides when starting a task.
pub struct TaskSpec {
    pub id: TaskId,
    pub frame_range: FrameRange,
    pub capabilities: Capabilities,
    pub message: String,
    pub process: Option<Box<dyn ExternalProcess>>,
}

impl TaskSpec {
    pub fn new(id: impl Into<TaskId>, frame_range: FrameRange, capabilities: Capabilities) -> Self {
        let id = id.into();
        Self {
            message: id.clone(),
            id,
            frame_range,
            capabilities,
            process: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_process(mut self, process: Box<dyn ExternalProcess>) -> Self {
        self.process = Some(process);
        self
    }
}

impl fmt::Debug for TaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSpec")
            .field("id", &self.id)
            .field("frame_range", &self.frame_range)
            .field("capabilities", &self.capabilities)
            .field("message", &self.message)
            .field("has_process", &self.process.is_some())
            .finish()
    }
}

/// Read-only view of a task handed to collaborators (display, queries).
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRow {
    pub id: TaskId,
    pub message: String,
    pub state: TaskState,
    pub progress: f64,
    pub remaining: Remaining,
    pub generation: Generation,
    pub frame_range: FrameRange,
    /// Set when an external process terminated abnormally.
    pub failure: Option<String>,
    pub can_pause: bool,
    pub can_cancel: bool,
    pub has_process: bool,
}

/// The supervisor's record of one job.
///
/// Only the registry holds `Task`s; everything else sees [`TaskRow`]s.
pub(crate) struct Task {
    pub id: TaskId,
    pub generation: Generation,
    pub frame_range: FrameRange,
    pub capabilities: Capabilities,
    pub state: TaskState,
    pub progress: f64,
    pub message: String,
    pub failure: Option<String>,
    /// A cancel was requested and the job has not been told yet.
    pub cancel_pending: bool,
    pub estimator: TimeEstimator,
    /// Last `remaining` value shown, to detect staleness flips on refresh.
    pub shown_remaining: Remaining,
    pub process: Option<Box<dyn ExternalProcess>>,
    pub signal: Option<Arc<RunSignal>>,
}

impl Task {
    pub fn new(spec: TaskSpec, generation: Generation, estimator: EstimatorConfig, now: Instant) -> Self {
        Self {
            id: spec.id,
            generation,
            frame_range: spec.frame_range,
            capabilities: spec.capabilities,
            state: TaskState::Queued,
            progress: 0.0,
            message: spec.message,
            failure: None,
            cancel_pending: false,
            estimator: TimeEstimator::new(estimator, now),
            shown_remaining: Remaining::Indeterminate,
            process: spec.process,
            signal: None,
        }
    }

    pub fn row(&self, now: Instant) -> TaskRow {
        TaskRow {
            id: self.id.clone(),
            message: self.message.clone(),
            state: self.state,
            progress: self.progress,
            remaining: self.remaining(now),
            generation: self.generation,
            frame_range: self.frame_range,
            failure: self.failure.clone(),
            can_pause: self.capabilities.can_pause,
            can_cancel: self.capabilities.can_cancel,
            has_process: self.process.is_some(),
        }
    }

    pub fn remaining(&self, now: Instant) -> Remaining {
        match self.state {
            TaskState::Running | TaskState::Paused => self.estimator.remaining(now),
            TaskState::Finished => Remaining::Estimated(std::time::Duration::ZERO),
            TaskState::Queued | TaskState::Canceled => Remaining::Indeterminate,
        }
    }

    /// Attach the worker-side signal of the current run.
    pub fn attach_signal(&mut self, signal: Arc<RunSignal>) {
        self.signal = Some(signal);
        self.publish();
    }

    /// Mirror the state the worker is allowed to observe into the run signal.
    pub fn publish(&self) {
        if let Some(signal) = &self.signal {
            signal.publish(self.generation, self.state, self.cancel_pending);
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .field("state", &self.state)
            .field("progress", &self.progress)
            .field("cancel_pending", &self.cancel_pending)
            .field("has_process", &self.process.is_some())
            .finish_non_exhaustive()
    }
}
