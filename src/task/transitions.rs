// src/task/transitions.rs

//! The task state machine.
//!
//! Every state change in the registry goes through [`Transition::target`], so
//! the allowed graph lives in one place:
//!
//! ```text
//! Queued  --admit-->   Running
//! Running --pause-->   Paused      (can_pause)
//! Paused  --resume-->  Running
//! Running --cancel-->  Canceled    (can_cancel)
//! Running --finish-->  Finished    (progress reaches 1.0, or end reported)
//! Running/Paused --restart--> Running   (generation + 1)
//! Queued         --restart--> Queued    (generation + 1, keeps its FIFO place)
//! Queued/Running/Paused --fail-->    Canceled           (external process died)
//! Queued/Paused         --finish-->  Finished           (job reported gone)
//! ```

use tracing::debug;

use crate::task::model::Capabilities;
use crate::types::TaskState;

/// A requested state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The concurrency queue granted a slot.
    Admit,
    Pause,
    Resume,
    Cancel,
    /// The job ended (natural completion or collaborator-driven end).
    Finish,
    /// A new run of the same identity.
    Restart,
    /// The external process terminated abnormally.
    Fail,
}

impl Transition {
    /// Target state of applying `self` to a task in `from`, or `None` if the
    /// transition is not allowed.
    pub fn target(self, from: TaskState, caps: Capabilities) -> Option<TaskState> {
        use TaskState::*;

        let to = match (self, from) {
            (Transition::Admit, Queued) => Running,
            (Transition::Pause, Running) if caps.can_pause => Paused,
            (Transition::Resume, Paused) => Running,
            (Transition::Cancel, Running) if caps.can_cancel => Canceled,
            (Transition::Finish, Running | Paused | Queued) => Finished,
            (Transition::Restart, Running | Paused) => Running,
            (Transition::Restart, Queued) => Queued,
            (Transition::Fail, Running | Paused | Queued) => Canceled,
            _ => {
                debug!(?self, ?from, ?caps, "rejected task state transition");
                return None;
            }
        };

        Some(to)
    }
}
