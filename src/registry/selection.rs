// src/registry/selection.rs

//! Which task-table controls are usable for the current selection.

use crate::task::TaskRow;
use crate::types::TaskState;

/// Enabled/disabled state of the pause, cancel and restart controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlState {
    pub pause_enabled: bool,
    pub cancel_enabled: bool,
    pub restart_enabled: bool,
}

/// Derive control availability from the selected rows.
///
/// - pause: some selected task is Running and may be paused.
/// - cancel: some selected task is Running and may be canceled.
/// - restart: some selected task is Paused (restart resumes it), or is still
///   active and backed by an external process that can be respawned.
pub fn controls_for<'a>(selected: impl IntoIterator<Item = &'a TaskRow>) -> ControlState {
    let mut state = ControlState::default();

    for row in selected {
        let running = row.state == TaskState::Running;
        state.pause_enabled |= running && row.can_pause;
        state.cancel_enabled |= running && row.can_cancel;
        state.restart_enabled |=
            row.state == TaskState::Paused || (!row.state.is_terminal() && row.has_process);
    }

    state
}
