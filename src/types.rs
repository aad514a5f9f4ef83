use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// Lifecycle state of a supervised task.
///
/// `Canceled` and `Finished` are terminal: a task in one of these states only
/// waits to be removed from the table (or replaced by a fresh start of the
/// same identity).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Waiting for a concurrency slot.
    Queued,
    Running,
    /// Paused by the user; the job is expected to wait until resumed.
    Paused,
    /// Canceled by the user or because its external process failed.
    Canceled,
    Finished,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Canceled | TaskState::Finished)
    }

    pub(crate) fn as_u8(self) -> u8 {
        match self {
            TaskState::Queued => 0,
            TaskState::Running => 1,
            TaskState::Paused => 2,
            TaskState::Canceled => 3,
            TaskState::Finished => 4,
        }
    }

    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            0 => TaskState::Queued,
            1 => TaskState::Running,
            2 => TaskState::Paused,
            3 => TaskState::Canceled,
            _ => TaskState::Finished,
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Queued => "queued",
            TaskState::Running => "running",
            TaskState::Paused => "paused",
            TaskState::Canceled => "canceled",
            TaskState::Finished => "finished",
        };
        f.write_str(s)
    }
}

/// Remaining-time estimate for a task.
///
/// "Unknown" is modelled explicitly instead of being squeezed into a zero or
/// infinite duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Remaining {
    Indeterminate,
    Estimated(Duration),
}

impl Remaining {
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, Remaining::Indeterminate)
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Remaining::Indeterminate => None,
            Remaining::Estimated(d) => Some(*d),
        }
    }
}

impl fmt::Display for Remaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Remaining::Indeterminate => f.write_str("--"),
            Remaining::Estimated(d) => {
                let secs = d.as_secs();
                write!(f, "{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
            }
        }
    }
}

/// How render jobs share the machine.
///
/// - `Parallel`: every started task runs immediately (default).
/// - `Queued`: at most `max_concurrent` tasks run; the rest wait in FIFO
///   order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueMode {
    Parallel,
    Queued,
}

impl Default for QueueMode {
    fn default() -> Self {
        QueueMode::Parallel
    }
}

impl QueueMode {
    pub fn from_enabled(queue_renders: bool) -> Self {
        if queue_renders {
            QueueMode::Queued
        } else {
            QueueMode::Parallel
        }
    }

    pub fn is_queued(self) -> bool {
        self == QueueMode::Queued
    }
}

impl FromStr for QueueMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "parallel" => Ok(QueueMode::Parallel),
            "queued" | "queue" => Ok(QueueMode::Queued),
            other => Err(format!(
                "invalid queue mode: {other} (expected \"parallel\" or \"queued\")"
            )),
        }
    }
}
