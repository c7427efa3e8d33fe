use std::process::Child;

use tracing::debug;

/// Check if a child process is still running.
pub fn is_running(child: &mut Child) -> bool {
    matches!(child.try_wait(), Ok(None))
}

pub fn kill_child(child: &mut Child) {
    debug!(pid = child.id(), "killing node process");
    let _ = child.kill();
    let _ = child.wait();
}
