//! Ephemeral observations produced by the monitor loops.
//!
//! Snapshots are produced once per tick and never persisted; the supervisor
//! only keeps the most recent one of each kind for status reports.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of one health-loop tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub timestamp: DateTime<Utc>,
    /// Child process has not exited.
    pub child_alive: bool,
    /// Single-shot readiness probe succeeded.
    pub endpoint_reachable: bool,
    /// At least one service descriptor was acknowledged.
    pub registered: bool,
}

impl HealthSnapshot {
    /// Create a snapshot stamped with the current time.
    pub fn now(child_alive: bool, endpoint_reachable: bool, registered: bool) -> Self {
        Self {
            timestamp: Utc::now(),
            child_alive,
            endpoint_reachable,
            registered,
        }
    }

    /// All checks passed.
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        self.child_alive && self.endpoint_reachable && self.registered
    }
}

/// Resource usage of the child process as reported by the OS.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// Resident memory in bytes.
    pub memory_bytes: u64,
    /// CPU usage since the previous sample, in percent of one core.
    pub cpu_percent: f32,
}

/// Result of one performance-loop tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub timestamp: DateTime<Utc>,
    /// Named counters from the status source (request counts, completed tasks, ...).
    pub counters: BTreeMap<String, f64>,
    /// Uptime reported by the status source.
    pub uptime: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceUsage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_requires_all_checks() {
        assert!(HealthSnapshot::now(true, true, true).is_healthy());
        assert!(!HealthSnapshot::now(true, true, false).is_healthy());
        assert!(!HealthSnapshot::now(false, true, true).is_healthy());
        assert!(!HealthSnapshot::now(true, false, true).is_healthy());
    }

    #[test]
    fn test_performance_snapshot_omits_missing_resources() {
        let snapshot = PerformanceSnapshot {
            timestamp: Utc::now(),
            counters: BTreeMap::from([("requests".to_string(), 3.0)]),
            uptime: Duration::from_secs(5),
            resources: None,
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json.get("resources").is_none());
        assert_eq!(json["counters"]["requests"], 3.0);
    }
}
