// src/engine/queue.rs

use std::collections::{HashSet, VecDeque};

use tracing::debug;

use super::TaskId;

/// Admission control for render tasks.
///
/// Semantics:
/// - `limit` is the maximum number of tasks holding a slot (Running or
///   Paused). `None` means unconstrained, which is the default: every request
///   is admitted straight away.
/// - Requests that cannot be admitted wait in a FIFO. FIFO order is the only
///   tie-break; there are no priorities.
/// - Shrinking the limit never preempts tasks that already hold a slot; they
///   simply keep it until they release it.
#[derive(Debug, Default)]
pub struct ConcurrencyQueue {
    limit: Option<usize>,
    holders: HashSet<TaskId>,
    waiting: VecDeque<TaskId>,
}

impl ConcurrencyQueue {
    /// Create a queue with the given limit.
    ///
    /// A limit of `Some(0)` is clamped to 1, as a zero-slot queue would never
    /// admit anything.
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            limit: limit.map(|l| l.max(1)),
            holders: HashSet::new(),
            waiting: VecDeque::new(),
        }
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Number of tasks currently holding a slot.
    pub fn running_count(&self) -> usize {
        self.holders.len()
    }

    pub fn waiting(&self) -> impl Iterator<Item = &str> {
        self.waiting.iter().map(String::as_str)
    }

    pub fn is_waiting(&self, id: &str) -> bool {
        self.waiting.iter().any(|w| w == id)
    }

    pub fn holds_slot(&self, id: &str) -> bool {
        self.holders.contains(id)
    }

    fn has_free_slot(&self) -> bool {
        self.limit.is_none_or(|limit| self.holders.len() < limit)
    }

    /// Whether a slot would be granted right now to a new request.
    pub fn slot_available(&self) -> bool {
        self.waiting.is_empty() && self.has_free_slot()
    }

    /// Ask for a slot for `id`.
    ///
    /// The request joins the back of the FIFO; call [`admit`](Self::admit)
    /// to hand out free slots. Requests from a task that already holds a slot
    /// or is already waiting are ignored.
    pub fn request(&mut self, id: &str) {
        if self.holders.contains(id) || self.is_waiting(id) {
            debug!(task = %id, "slot already held or requested");
            return;
        }
        self.waiting.push_back(id.to_string());
        debug!(task = %id, waiting = self.waiting.len(), "slot requested");
    }

    /// Admit waiting tasks, oldest first, while slots are free.
    ///
    /// Returns the newly admitted ids in admission order.
    pub fn admit(&mut self) -> Vec<TaskId> {
        let mut admitted = Vec::new();

        while self.has_free_slot() {
            let Some(next) = self.waiting.pop_front() else {
                break;
            };
            debug!(task = %next, running = self.holders.len() + 1, "slot granted");
            self.holders.insert(next.clone());
            admitted.push(next);
        }

        admitted
    }

    /// Give back the slot held by `id`, or drop its waiting request.
    pub fn release(&mut self, id: &str) {
        if self.holders.remove(id) {
            debug!(task = %id, running = self.holders.len(), "slot released");
        } else if let Some(pos) = self.waiting.iter().position(|w| w == id) {
            self.waiting.remove(pos);
            debug!(task = %id, "waiting request dropped");
        }
    }

    /// Change the limit. Call [`admit`](Self::admit) afterwards to fill any
    /// slots the change freed.
    pub fn set_limit(&mut self, limit: Option<usize>) {
        self.limit = limit.map(|l| l.max(1));
        debug!(limit = ?self.limit, "concurrency limit changed");
    }
}
