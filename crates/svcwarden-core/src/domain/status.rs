//! Point-in-time reports returned by the supervisor.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DeploymentState, Endpoint, HealthSnapshot, PerformanceSnapshot};

/// Snapshot of everything the supervisor knows about its deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentStatus {
    pub state: DeploymentState,
    /// Child PID while a process handle is held.
    pub pid: Option<u32>,
    pub endpoint: Endpoint,
    /// Descriptors acknowledged by the service (0 if registration failed).
    pub registered_services: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub uptime: Option<Duration>,
    /// Reason recorded when the deployment entered `Failed`.
    pub failure: Option<String>,
    pub last_health: Option<HealthSnapshot>,
    pub last_performance: Option<PerformanceSnapshot>,
}

/// Outcome of a shutdown request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownReport {
    /// State after the call returned.
    pub state: DeploymentState,
    /// Whether a termination signal was sent by this call.
    pub signalled: bool,
    /// Whether the grace period expired and the child was killed.
    pub forced: bool,
    /// Exit code of the child, if it exited normally.
    pub exit_code: Option<i32>,
    /// Time spent inside the shutdown call.
    pub elapsed: Duration,
}

impl ShutdownReport {
    /// Report for a call that found nothing to do.
    pub const fn noop(state: DeploymentState, elapsed: Duration) -> Self {
        Self {
            state,
            signalled: false,
            forced: false,
            exit_code: None,
            elapsed,
        }
    }
}
