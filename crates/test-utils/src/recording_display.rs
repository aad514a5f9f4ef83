use std::sync::{Arc, Mutex};

use rendertrack::display::{DisplayNotice, DisplaySink};
use rendertrack::task::TaskRow;

/// A display that records every notice it receives.
///
/// Clones share the log, so a test can inspect notices while the supervisor
/// owns the other clone.
#[derive(Debug, Clone, Default)]
pub struct RecordingDisplay {
    notices: Arc<Mutex<Vec<DisplayNotice>>>,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<DisplayNotice> {
        self.notices.lock().unwrap().clone()
    }

    /// Notices about `task`, in arrival order.
    pub fn notices_for(&self, task: &str) -> Vec<DisplayNotice> {
        self.notices()
            .into_iter()
            .filter(|n| n.task_id() == task)
            .collect()
    }

    pub fn removed(&self) -> Vec<String> {
        self.notices()
            .into_iter()
            .filter_map(|n| match n {
                DisplayNotice::RowRemoved(id) => Some(id),
                _ => None,
            })
            .collect()
    }
}

impl DisplaySink for RecordingDisplay {
    fn row_added(&mut self, row: &TaskRow) {
        self.notices
            .lock()
            .unwrap()
            .push(DisplayNotice::RowAdded(row.clone()));
    }

    fn row_updated(&mut self, row: &TaskRow) {
        self.notices
            .lock()
            .unwrap()
            .push(DisplayNotice::RowUpdated(row.clone()));
    }

    fn row_removed(&mut self, id: &str) {
        self.notices
            .lock()
            .unwrap()
            .push(DisplayNotice::RowRemoved(id.to_string()));
    }
}
