// src/exec/simulated.rs

//! In-process frame loop, used for jobs without a `cmd`.
//!
//! Runs on a blocking worker thread so progress is reported from outside the
//! async runtime, like a renderer callback would.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::engine::TaskReporter;
use crate::exec::{Wait, wait_while_held};

pub fn spawn_simulated(reporter: TaskReporter, frame_time: Duration) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || render_frames(&reporter, frame_time))
}

/// Render every frame of the reporter's range, honouring pause and cancel.
pub fn render_frames(reporter: &TaskReporter, frame_time: Duration) {
    let range = reporter.frame_range();

    if wait_while_held(reporter) == Wait::Stop {
        debug!(task = %reporter.task(), "simulated job stopped before its first frame");
        reporter.end();
        return;
    }
    info!(task = %reporter.task(), frames = range.frame_count(), "simulated render started");

    let mut frame = range.first;
    while frame <= range.last {
        std::thread::sleep(frame_time);

        if !reporter.report_frame(frame) {
            // A pause drops the frame report; it is sent again on resume.
            if wait_while_held(reporter) == Wait::Stop {
                info!(task = %reporter.task(), frame, "simulated render stopped");
                break;
            }
            continue;
        }

        match frame.checked_add(range.step) {
            Some(next) => frame = next,
            None => break,
        }
    }

    reporter.end();
}
