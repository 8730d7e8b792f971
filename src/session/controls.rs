use crate::session::compositor::RunState;

/// Which user actions are currently meaningful.
///
/// Overlay can only start once the camera is live, and each start/stop pair is mutually
/// exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ControlState {
    /// Begin foreground capture.
    pub can_begin_capture: bool,
    /// End foreground capture.
    pub can_end_capture: bool,
    /// Start compositing.
    pub can_start_overlay: bool,
    /// Stop compositing.
    pub can_stop_overlay: bool,
}

impl ControlState {
    /// Derive enablement from the observed run state and capture state.
    pub fn derive(run: RunState, capture_active: bool) -> Self {
        let running = run == RunState::Running;
        Self {
            can_begin_capture: !capture_active,
            can_end_capture: capture_active,
            can_start_overlay: !running && capture_active,
            can_stop_overlay: running,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/controls.rs"]
mod tests;
