// src/display/mod.rs

//! Display collaborator interface.
//!
//! The supervisor never draws anything itself. It emits [`DisplayNotice`]s
//! keyed by task identity and hands them to a [`DisplaySink`]:
//!
//! - [`LogTable`] writes each row change through `tracing` (used by the CLI).
//! - [`RowStore`] keeps the latest row per task in memory, in insertion
//!   order, for embedders that poll.

use std::collections::HashMap;

use tracing::info;

use crate::engine::TaskId;
use crate::task::TaskRow;

/// Row-level change produced by the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayNotice {
    RowAdded(TaskRow),
    RowUpdated(TaskRow),
    RowRemoved(TaskId),
}

impl DisplayNotice {
    pub fn task_id(&self) -> &str {
        match self {
            DisplayNotice::RowAdded(row) | DisplayNotice::RowUpdated(row) => &row.id,
            DisplayNotice::RowRemoved(id) => id,
        }
    }
}

/// Trait implemented by whatever shows the task table.
///
/// Calls always happen on the supervisor task, in the order the registry
/// produced them.
pub trait DisplaySink: Send {
    fn row_added(&mut self, row: &TaskRow);
    fn row_updated(&mut self, row: &TaskRow);
    fn row_removed(&mut self, id: &str);

    /// Dispatch a notice to the matching method.
    fn apply(&mut self, notice: &DisplayNotice) {
        match notice {
            DisplayNotice::RowAdded(row) => self.row_added(row),
            DisplayNotice::RowUpdated(row) => self.row_updated(row),
            DisplayNotice::RowRemoved(id) => self.row_removed(id),
        }
    }
}

/// Sink that logs the table through `tracing`.
#[derive(Debug, Default)]
pub struct LogTable;

impl DisplaySink for LogTable {
    fn row_added(&mut self, row: &TaskRow) {
        info!(
            task = %row.id,
            state = %row.state,
            frames = %format!("{}-{}/{}", row.frame_range.first, row.frame_range.last, row.frame_range.step),
            "{}",
            row.message
        );
    }

    fn row_updated(&mut self, row: &TaskRow) {
        match &row.failure {
            Some(reason) => info!(
                task = %row.id,
                state = %row.state,
                failure = %reason,
                "{}",
                row.message
            ),
            None => info!(
                task = %row.id,
                state = %row.state,
                progress = %format!("{:5.1}%", row.progress * 100.0),
                remaining = %row.remaining,
                generation = row.generation,
                "{}",
                row.message
            ),
        }
    }

    fn row_removed(&mut self, id: &str) {
        info!(task = %id, "removed from table");
    }
}

/// In-memory table holding the latest row of every visible task.
#[derive(Debug, Default, Clone)]
pub struct RowStore {
    order: Vec<TaskId>,
    rows: HashMap<TaskId, TaskRow>,
}

impl RowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&TaskRow> {
        self.rows.get(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Rows in the order they were added.
    pub fn rows(&self) -> impl Iterator<Item = &TaskRow> {
        self.order.iter().filter_map(|id| self.rows.get(id))
    }
}

impl DisplaySink for RowStore {
    fn row_added(&mut self, row: &TaskRow) {
        if !self.rows.contains_key(&row.id) {
            self.order.push(row.id.clone());
        }
        self.rows.insert(row.id.clone(), row.clone());
    }

    fn row_updated(&mut self, row: &TaskRow) {
        if let Some(existing) = self.rows.get_mut(&row.id) {
            *existing = row.clone();
        }
    }

    fn row_removed(&mut self, id: &str) {
        self.rows.remove(id);
        self.order.retain(|o| o != id);
    }
}
