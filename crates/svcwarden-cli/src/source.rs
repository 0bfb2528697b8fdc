//! Status source used by the binary.

use std::time::Instant;

use svcwarden_core::{ObserveError, StatusReport, StatusSource};

/// Reports how long the supervisor process has been up.
///
/// The binary has no in-process application state of its own, so uptime is
/// the only counter it can offer the performance loop.
#[derive(Debug)]
pub struct UptimeSource {
    started: Instant,
}

impl Default for UptimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl UptimeSource {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl StatusSource for UptimeSource {
    fn current_status(&self) -> Result<StatusReport, ObserveError> {
        Ok(StatusReport::new(self.started.elapsed()))
    }
}
