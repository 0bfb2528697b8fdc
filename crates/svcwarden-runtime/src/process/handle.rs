use std::io;
use std::process::ExitStatus;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::process::Child;

/// The spawned child process.
///
/// Owned exclusively by the supervisor. Dropping it kills the child
/// (the command is spawned with `kill_on_drop`).
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    pid: u32,
    started_at: DateTime<Utc>,
    started: Instant,
    exit_status: Option<ExitStatus>,
}

impl ProcessHandle {
    pub(crate) fn new(child: Child, pid: u32) -> Self {
        Self {
            child,
            pid,
            started_at: Utc::now(),
            started: Instant::now(),
            exit_status: None,
        }
    }

    pub const fn pid(&self) -> u32 {
        self.pid
    }

    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Non-blocking exit check. Returns the status if the child has exited.
    pub fn poll_exit(&mut self) -> io::Result<Option<ExitStatus>> {
        if self.exit_status.is_none() {
            self.exit_status = self.child.try_wait()?;
        }
        Ok(self.exit_status)
    }

    pub(crate) fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }
}
