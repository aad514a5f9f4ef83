use std::sync::{Arc, Mutex};

use rendertrack::errors::{RendertrackError, Result};
use rendertrack::exec::{ExternalProcess, ProcessControl};

/// An `ExternalProcess` that only records what was asked of it.
///
/// Clones share the same call log, so a test can keep one clone and hand the
/// other to a task.
#[derive(Debug, Clone, Default)]
pub struct FakeProcess {
    calls: Arc<Mutex<Vec<ProcessControl>>>,
    fail_restart: bool,
}

impl FakeProcess {
    pub fn new() -> Self {
        Self::default()
    }

    /// A process whose restart always errors.
    pub fn failing_restart() -> Self {
        Self {
            fail_restart: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<ProcessControl> {
        self.calls.lock().unwrap().clone()
    }

    pub fn kill_count(&self) -> usize {
        self.count(ProcessControl::Kill)
    }

    pub fn restart_count(&self) -> usize {
        self.count(ProcessControl::Restart)
    }

    fn count(&self, call: ProcessControl) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == call).count()
    }
}

impl ExternalProcess for FakeProcess {
    fn kill(&mut self) -> Result<()> {
        self.calls.lock().unwrap().push(ProcessControl::Kill);
        Ok(())
    }

    fn restart(&mut self) -> Result<()> {
        self.calls.lock().unwrap().push(ProcessControl::Restart);
        if self.fail_restart {
            return Err(RendertrackError::ProcessError {
                task: "fake".to_string(),
                reason: "restart refused".to_string(),
            });
        }
        Ok(())
    }

    fn describe(&self) -> String {
        "fake process".to_string()
    }
}
