//! Status source port.
//!
//! The application logic running alongside the supervisor (collaboration,
//! memory and task subsystems) is opaque to svcwarden; it only exposes a
//! cheap synchronous status query polled by the performance loop.

use std::collections::BTreeMap;
use std::time::Duration;

use super::ObserveError;

/// Counters and uptime reported by the application.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusReport {
    pub counters: BTreeMap<String, f64>,
    pub uptime: Duration,
}

impl StatusReport {
    /// Create an empty report with the given uptime.
    pub const fn new(uptime: Duration) -> Self {
        Self {
            counters: BTreeMap::new(),
            uptime,
        }
    }

    /// Add a named counter.
    #[must_use]
    pub fn with_counter(mut self, name: impl Into<String>, value: f64) -> Self {
        self.counters.insert(name.into(), value);
        self
    }
}

/// Synchronous in-process status query.
///
/// Implementations must not block for long: the call runs on a runtime
/// worker inside the performance loop.
pub trait StatusSource: Send + Sync {
    fn current_status(&self) -> Result<StatusReport, ObserveError>;
}
